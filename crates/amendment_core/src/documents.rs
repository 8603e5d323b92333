//! Ordinance/resolution registry and supporting-document attachments.
//!
//! Attachment bytes are delegated to a [`FileStore`]; the database only
//! carries metadata rows pointing at the stored path.

use crate::audit;
use crate::db;
use crate::error::{Result, WorkflowError};
use crate::schema::{ActorContext, Document, DocumentKind, SupportingDocument};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use std::fs;
use std::path::{Path, PathBuf};

pub fn register_document(
    conn: &mut Connection,
    kind: DocumentKind,
    title: &str,
    actor: &ActorContext,
) -> Result<Document> {
    let title = title.trim();
    if title.is_empty() {
        return Err(WorkflowError::validation("Document title is required"));
    }
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let prefix = match kind {
        DocumentKind::Ordinance => "ORD",
        DocumentKind::Resolution => "RES",
    };
    let number = db::next_number(&tx, "documents", "number", prefix, db::current_year())?;
    let created_at = db::now_utc();

    tx.execute(
        r#"
        INSERT INTO documents (kind, number, title, created_at)
        VALUES (?1, ?2, ?3, ?4)
        "#,
        params![kind.as_str(), number, title, created_at],
    )?;
    let id = tx.last_insert_rowid();

    audit::record(
        &tx,
        actor,
        audit::DOCUMENT_REGISTER,
        &format!("Registered {kind} {number}"),
    )?;

    tx.commit()?;
    Ok(Document {
        id,
        kind,
        number,
        title: title.to_string(),
        created_at,
    })
}

pub fn get_document(conn: &Connection, id: i64) -> Result<Option<Document>> {
    let doc = conn
        .query_row(
            "SELECT id, kind, number, title, created_at FROM documents WHERE id = ?1",
            params![id],
            |row| {
                let kind: String = row.get(1)?;
                Ok(Document {
                    id: row.get(0)?,
                    kind: DocumentKind::parse(&kind).unwrap_or(DocumentKind::Ordinance),
                    number: row.get(2)?,
                    title: row.get(3)?,
                    created_at: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(doc)
}

/// Where attachment bytes live. The engine never touches the bytes itself.
pub trait FileStore {
    /// Persist `bytes` under a name derived from `file_name`; returns the
    /// stored path used for later removal.
    fn store(&self, file_name: &str, bytes: &[u8]) -> Result<String>;

    fn remove(&self, stored_path: &str) -> Result<()>;
}

/// Plain directory-backed store.
pub struct FsFileStore {
    root: PathBuf,
}

impl FsFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl FileStore for FsFileStore {
    fn store(&self, file_name: &str, bytes: &[u8]) -> Result<String> {
        fs::create_dir_all(&self.root).map_err(|e| WorkflowError::Storage {
            detail: format!("Cannot create {}: {e}", self.root.display()),
        })?;

        // Strip any path components the caller smuggled into the name.
        let base = Path::new(file_name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("attachment");
        let mut stored = self.root.join(base);
        let mut counter = 1u32;
        while stored.exists() {
            stored = self.root.join(format!("{counter}_{base}"));
            counter += 1;
        }

        fs::write(&stored, bytes).map_err(|e| WorkflowError::Storage {
            detail: format!("Cannot write {}: {e}", stored.display()),
        })?;
        Ok(stored.to_string_lossy().into_owned())
    }

    fn remove(&self, stored_path: &str) -> Result<()> {
        fs::remove_file(stored_path).map_err(|e| WorkflowError::Storage {
            detail: format!("Cannot delete {stored_path}: {e}"),
        })
    }
}

pub fn attach_supporting_document(
    conn: &mut Connection,
    store: &dyn FileStore,
    document_id: i64,
    file_name: &str,
    content_type: Option<&str>,
    bytes: &[u8],
    actor: &ActorContext,
) -> Result<SupportingDocument> {
    if file_name.trim().is_empty() {
        return Err(WorkflowError::validation("File name is required"));
    }
    let document = get_document(conn, document_id)?
        .ok_or_else(|| WorkflowError::validation(format!("No document with id {document_id}")))?;

    // Bytes land before the metadata row. If the insert below fails the
    // stray file is harmless; a committed row pointing nowhere is not.
    let stored_path = store.store(file_name, bytes)?;
    let uploaded_at = db::now_utc();

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute(
        r#"
        INSERT INTO supporting_documents
          (document_id, file_name, stored_path, content_type, size_bytes, uploaded_by, uploaded_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            document_id,
            file_name,
            stored_path,
            content_type,
            bytes.len() as i64,
            actor.actor_id,
            uploaded_at
        ],
    )?;
    let id = tx.last_insert_rowid();

    audit::record(
        &tx,
        actor,
        audit::ATTACHMENT_ADD,
        &format!("Attached '{file_name}' to {}", document.number),
    )?;

    tx.commit()?;
    Ok(SupportingDocument {
        id,
        document_id,
        file_name: file_name.to_string(),
        stored_path,
        content_type: content_type.map(str::to_string),
        size_bytes: bytes.len() as i64,
        uploaded_by: actor.actor_id.clone(),
        uploaded_at,
    })
}

pub fn list_supporting_documents(
    conn: &Connection,
    document_id: i64,
) -> Result<Vec<SupportingDocument>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, document_id, file_name, stored_path, content_type,
               size_bytes, uploaded_by, uploaded_at
        FROM supporting_documents
        WHERE document_id = ?1
        ORDER BY uploaded_at DESC, id DESC
        "#,
    )?;
    let rows = stmt.query_map(params![document_id], |row| {
        Ok(SupportingDocument {
            id: row.get(0)?,
            document_id: row.get(1)?,
            file_name: row.get(2)?,
            stored_path: row.get(3)?,
            content_type: row.get(4)?,
            size_bytes: row.get(5)?,
            uploaded_by: row.get(6)?,
            uploaded_at: row.get(7)?,
        })
    })?;

    let mut attachments = Vec::new();
    for row in rows {
        attachments.push(row?);
    }
    Ok(attachments)
}

/// Removes the stored file first, then the metadata row. A row pointing at
/// a missing file is worse than a stray file, so the order is fixed.
pub fn remove_supporting_document(
    conn: &mut Connection,
    store: &dyn FileStore,
    attachment_id: i64,
    actor: &ActorContext,
) -> Result<()> {
    let (file_name, stored_path): (String, String) = conn
        .query_row(
            "SELECT file_name, stored_path FROM supporting_documents WHERE id = ?1",
            params![attachment_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
        .ok_or_else(|| {
            WorkflowError::validation(format!("No attachment with id {attachment_id}"))
        })?;

    store.remove(&stored_path)?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute(
        "DELETE FROM supporting_documents WHERE id = ?1",
        params![attachment_id],
    )?;

    audit::record(
        &tx,
        actor,
        audit::ATTACHMENT_REMOVE,
        &format!("Removed attachment '{file_name}'"),
    )?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ActorRole;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// In-memory stand-in for the filesystem store.
    struct MemStore {
        files: RefCell<HashMap<String, Vec<u8>>>,
        fail_removal: bool,
    }

    impl MemStore {
        fn new() -> Self {
            Self {
                files: RefCell::new(HashMap::new()),
                fail_removal: false,
            }
        }
    }

    impl FileStore for MemStore {
        fn store(&self, file_name: &str, bytes: &[u8]) -> Result<String> {
            let path = format!("mem://{file_name}");
            self.files.borrow_mut().insert(path.clone(), bytes.to_vec());
            Ok(path)
        }

        fn remove(&self, stored_path: &str) -> Result<()> {
            if self.fail_removal {
                return Err(WorkflowError::Storage {
                    detail: "simulated outage".to_string(),
                });
            }
            self.files.borrow_mut().remove(stored_path);
            Ok(())
        }
    }

    fn clerk() -> ActorContext {
        ActorContext::new("clerk", ActorRole::SuperAdmin)
    }

    fn setup() -> (rusqlite::Connection, Document) {
        let mut conn = crate::db::open_in_memory().unwrap();
        let doc = register_document(
            &mut conn,
            DocumentKind::Resolution,
            "Budget resolution FY27",
            &clerk(),
        )
        .unwrap();
        (conn, doc)
    }

    #[test]
    fn register_assigns_series_number_and_audits() {
        let (mut conn, doc) = setup();
        assert!(doc.number.starts_with("RES-"));
        assert!(doc.number.ends_with("-001"));

        let second =
            register_document(&mut conn, DocumentKind::Resolution, "Follow-up", &clerk()).unwrap();
        assert!(second.number.ends_with("-002"));

        let entries = audit::recent(&conn, None, 10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, audit::DOCUMENT_REGISTER);
    }

    #[test]
    fn failed_register_commits_nothing() {
        let (mut conn, _) = setup();
        // Sabotage the audit ledger so the final write of the operation fails.
        conn.execute_batch("DROP TABLE audit_logs").unwrap();

        let err = register_document(&mut conn, DocumentKind::Ordinance, "Noise", &clerk())
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Persistence(_)));

        let docs: i64 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .unwrap();
        assert_eq!(docs, 1, "only the seed document should exist");
    }

    #[test]
    fn attach_stores_bytes_and_metadata() {
        let (mut conn, doc) = setup();
        let store = MemStore::new();

        let attachment = attach_supporting_document(
            &mut conn,
            &store,
            doc.id,
            "minutes.pdf",
            Some("application/pdf"),
            b"%PDF-1.7",
            &clerk(),
        )
        .unwrap();

        assert_eq!(attachment.size_bytes, 8);
        assert!(store.files.borrow().contains_key(&attachment.stored_path));

        let listed = list_supporting_documents(&conn, doc.id).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].file_name, "minutes.pdf");
    }

    #[test]
    fn attach_to_unknown_document_fails() {
        let (mut conn, _) = setup();
        let store = MemStore::new();
        let err =
            attach_supporting_document(&mut conn, &store, 404, "x.txt", None, b"x", &clerk())
                .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation { .. }));
        assert!(store.files.borrow().is_empty());
    }

    #[test]
    fn removal_deletes_file_before_row() {
        let (mut conn, doc) = setup();
        let store = MemStore::new();
        let attachment = attach_supporting_document(
            &mut conn, &store, doc.id, "a.txt", None, b"a", &clerk(),
        )
        .unwrap();

        remove_supporting_document(&mut conn, &store, attachment.id, &clerk()).unwrap();
        assert!(store.files.borrow().is_empty());
        assert!(list_supporting_documents(&conn, doc.id).unwrap().is_empty());
    }

    #[test]
    fn failed_removal_keeps_metadata_row() {
        let (mut conn, doc) = setup();
        let mut store = MemStore::new();
        let attachment = attach_supporting_document(
            &mut conn, &store, doc.id, "b.txt", None, b"b", &clerk(),
        )
        .unwrap();

        store.fail_removal = true;
        let err =
            remove_supporting_document(&mut conn, &store, attachment.id, &clerk()).unwrap_err();
        assert!(matches!(err, WorkflowError::Storage { .. }));
        // The row still points at the (still existing) file.
        assert_eq!(list_supporting_documents(&conn, doc.id).unwrap().len(), 1);
    }

    #[test]
    fn fs_store_deduplicates_colliding_names() {
        let dir = std::env::temp_dir().join(format!("ordtrack-test-{}", std::process::id()));
        let store = FsFileStore::new(&dir);

        let first = store.store("report.txt", b"one").unwrap();
        let second = store.store("report.txt", b"two").unwrap();
        assert_ne!(first, second);

        store.remove(&first).unwrap();
        store.remove(&second).unwrap();
        let _ = std::fs::remove_dir(&dir);
    }
}
