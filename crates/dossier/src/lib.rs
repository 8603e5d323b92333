//! Markdown dossier export. Reconstructs each amendment's full history from
//! the append-only workflow/signature/vote ledgers and writes one note per
//! amendment plus a generated index.

use anyhow::Result;
use rusqlite::{Connection, params};
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub struct DossierPaths {
    pub root: PathBuf,
    pub index_dir: PathBuf,
    pub amendments_dir: PathBuf,
}

impl DossierPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            index_dir: root.join("00_Index"),
            amendments_dir: root.join("Amendments"),
            root,
        }
    }

    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.index_dir)?;
        fs::create_dir_all(&self.amendments_dir)?;
        Ok(())
    }
}

pub fn build_dossiers(conn: &Connection, out_root: &Path) -> Result<usize> {
    let paths = DossierPaths::new(out_root);
    paths.ensure()?;

    let mut stmt = conn.prepare(
        r#"
        SELECT a.id, a.amendment_number, a.title, a.status, a.priority,
               a.submitted_by, a.reviewed_by, a.rejection_reason,
               a.created_at, a.approved_at, a.description,
               d.kind, d.number, d.title
        FROM amendments a
        JOIN documents d ON d.id = a.document_id
        ORDER BY a.created_at DESC, a.id DESC
        "#,
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(AmendmentRow {
            id: row.get(0)?,
            amendment_number: row.get(1)?,
            title: row.get(2)?,
            status: row.get(3)?,
            priority: row.get(4)?,
            submitted_by: row.get(5)?,
            reviewed_by: row.get(6)?,
            rejection_reason: row.get(7)?,
            created_at: row.get(8)?,
            approved_at: row.get(9)?,
            description: row.get(10)?,
            document_kind: row.get(11)?,
            document_number: row.get(12)?,
            document_title: row.get(13)?,
        })
    })?;

    let generated_at = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();

    let mut index_lines: Vec<String> = Vec::new();
    index_lines.push("# MOC - Amendments".to_string());
    index_lines.push(String::new());
    index_lines.push("This index is generated. Do not edit manually.".to_string());
    index_lines.push(format!("Generated: {generated_at}"));
    index_lines.push(String::new());

    let mut written = 0usize;
    for r in rows {
        let a = r?;
        write_amendment_note(conn, &paths, &a)?;
        index_lines.push(format!(
            "- [[Amendments/{}|{} - {}]] ({})",
            a.amendment_number, a.amendment_number, a.title, a.status
        ));
        written += 1;
    }

    let moc_path = paths.index_dir.join("MOC - Amendments.md");
    fs::write(moc_path, index_lines.join("\n"))?;

    Ok(written)
}

#[derive(Debug)]
struct AmendmentRow {
    id: i64,
    amendment_number: String,
    title: String,
    status: String,
    priority: String,
    submitted_by: String,
    reviewed_by: Option<String>,
    rejection_reason: Option<String>,
    created_at: String,
    approved_at: Option<String>,
    description: String,
    document_kind: String,
    document_number: String,
    document_title: String,
}

fn write_amendment_note(conn: &Connection, paths: &DossierPaths, a: &AmendmentRow) -> Result<()> {
    let note_path = paths
        .amendments_dir
        .join(format!("{}.md", a.amendment_number));

    let mut md = String::new();
    md.push_str("---\n");
    md.push_str(&format!("amendment_number: {}\n", a.amendment_number));
    md.push_str(&format!("status: {}\n", a.status));
    md.push_str(&format!("priority: {}\n", a.priority));
    md.push_str(&format!("target: {} {}\n", a.document_kind, a.document_number));
    md.push_str(&format!("created_at: {}\n", a.created_at));
    md.push_str("---\n\n");

    md.push_str(&format!("# {} - {}\n\n", a.amendment_number, a.title));
    md.push_str(&format!(
        "Amends **{} {}**: {}\n\n",
        a.document_kind, a.document_number, a.document_title
    ));

    md.push_str("## Status\n");
    md.push_str(&format!("- Status: `{}`\n", a.status));
    md.push_str(&format!("- Submitted by: {}\n", a.submitted_by));
    if let Some(reviewer) = &a.reviewed_by {
        md.push_str(&format!("- Reviewed by: {reviewer}\n"));
    }
    if let Some(approved_at) = &a.approved_at {
        md.push_str(&format!("- Approved: `{approved_at}`\n"));
    }
    if let Some(reason) = &a.rejection_reason {
        md.push_str(&format!("- Rejection reason: {reason}\n"));
    }
    md.push('\n');

    if !a.description.trim().is_empty() {
        md.push_str("## Description\n");
        md.push_str(a.description.trim());
        md.push_str("\n\n");
    }

    append_history(conn, a.id, &mut md)?;
    append_signatures(conn, a.id, &mut md)?;
    append_votes(conn, a.id, &mut md)?;

    fs::write(note_path, md)?;
    Ok(())
}

fn append_history(conn: &Connection, amendment_id: i64, md: &mut String) -> Result<()> {
    let mut stmt = conn.prepare(
        r#"
        SELECT step, status_after, actor, comments, created_at
        FROM workflow_steps
        WHERE amendment_id = ?1
        ORDER BY id ASC
        "#,
    )?;
    let rows = stmt.query_map(params![amendment_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    md.push_str("## Workflow History\n");
    let mut any = false;
    for r in rows {
        let (step, status_after, actor, comments, created_at) = r?;
        any = true;
        match comments {
            Some(c) if !c.is_empty() => md.push_str(&format!(
                "- `{created_at}` {actor} {step} -> {status_after}: {c}\n"
            )),
            _ => md.push_str(&format!(
                "- `{created_at}` {actor} {step} -> {status_after}\n"
            )),
        }
    }
    if !any {
        md.push_str("_No workflow actions recorded._\n");
    }
    md.push('\n');
    Ok(())
}

fn append_signatures(conn: &Connection, amendment_id: i64, md: &mut String) -> Result<()> {
    let mut stmt = conn.prepare(
        r#"
        SELECT signatory, signatory_role, outcome, signed_at
        FROM approval_signatures
        WHERE amendment_id = ?1
        ORDER BY id ASC
        "#,
    )?;
    let rows = stmt.query_map(params![amendment_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
        ))
    })?;

    md.push_str("## Signatures\n");
    let mut any = false;
    for r in rows {
        let (signatory, role, outcome, signed_at) = r?;
        any = true;
        match signed_at {
            Some(at) => md.push_str(&format!("- {signatory} ({role}): {outcome} at `{at}`\n")),
            None => md.push_str(&format!("- {signatory} ({role}): {outcome}\n")),
        }
    }
    if !any {
        md.push_str("_No signatures recorded._\n");
    }
    md.push('\n');
    Ok(())
}

fn append_votes(conn: &Connection, amendment_id: i64, md: &mut String) -> Result<()> {
    let mut stmt = conn.prepare(
        r#"
        SELECT voter, choice, cast_at
        FROM amendment_votes
        WHERE amendment_id = ?1
        ORDER BY voter ASC
        "#,
    )?;
    let rows = stmt.query_map(params![amendment_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    md.push_str("## Votes\n");
    let mut yes = 0u32;
    let mut no = 0u32;
    let mut total = 0u32;
    let mut lines = Vec::new();
    for r in rows {
        let (voter, choice, cast_at) = r?;
        total += 1;
        match choice.as_str() {
            "yes" => yes += 1,
            "no" => no += 1,
            _ => {}
        }
        lines.push(format!("- {voter}: {choice} (`{cast_at}`)"));
    }
    if lines.is_empty() {
        md.push_str("_No votes recorded._\n");
    } else {
        md.push_str(&format!("Tally: {yes} yes / {no} no / {total} cast\n\n"));
        md.push_str(&lines.join("\n"));
        md.push('\n');
    }
    md.push('\n');
    Ok(())
}
