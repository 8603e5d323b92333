//! Append-only security trail. Rows are inserted by every state-changing
//! operation and never updated or deleted afterward.

use crate::db;
use crate::error::Result;
use crate::schema::{ActorContext, AuditLogEntry};
use rusqlite::{Connection, params};

pub const AMENDMENT_FILE: &str = "AMENDMENT_FILE";
pub const AMENDMENT_APPROVE: &str = "AMENDMENT_APPROVE";
pub const AMENDMENT_REJECT: &str = "AMENDMENT_REJECT";
pub const AMENDMENT_RETURN: &str = "AMENDMENT_RETURN";
pub const DOCUMENT_REGISTER: &str = "DOCUMENT_REGISTER";
pub const VOTE_CAST: &str = "VOTE_CAST";
pub const ATTACHMENT_ADD: &str = "ATTACHMENT_ADD";
pub const ATTACHMENT_REMOVE: &str = "ATTACHMENT_REMOVE";

/// Append one entry. Works inside a transaction (rusqlite `Transaction`
/// derefs to `Connection`) so the entry commits or rolls back with the
/// operation that produced it.
pub fn record(
    conn: &Connection,
    actor: &ActorContext,
    action: &str,
    description: &str,
) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO audit_logs (actor, action, description, ip, user_agent, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            actor.actor_id,
            action,
            description,
            actor.ip,
            actor.user_agent,
            db::now_utc()
        ],
    )?;
    Ok(())
}

/// Newest entries first, optionally filtered to one actor
/// (case-insensitive substring match).
pub fn recent(conn: &Connection, actor: Option<&str>, limit: u32) -> Result<Vec<AuditLogEntry>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, actor, action, description, ip, user_agent, created_at
        FROM audit_logs
        WHERE ?1 IS NULL OR LOWER(actor) LIKE ?1 ESCAPE '\'
        ORDER BY id DESC
        LIMIT ?2
        "#,
    )?;
    let pattern = actor.map(|a| format!("%{}%", db::escape_like(&a.to_lowercase())));
    let rows = stmt.query_map(params![pattern, limit], |row| {
        Ok(AuditLogEntry {
            id: row.get(0)?,
            actor: row.get(1)?,
            action: row.get(2)?,
            description: row.get(3)?,
            ip: row.get(4)?,
            user_agent: row.get(5)?,
            created_at: row.get(6)?,
        })
    })?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ActorRole;

    #[test]
    fn actor_filter_treats_underscore_literally() {
        let conn = crate::db::open_in_memory().unwrap();
        for actor_id in ["svc_deploy", "svcxdeploy"] {
            let actor = ActorContext::new(actor_id, ActorRole::Admin);
            record(&conn, &actor, "TEST", "noop").unwrap();
        }

        let hits = recent(&conn, Some("svc_"), 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].actor, "svc_deploy");

        // A lone wildcard character is not a match-everything filter.
        assert!(recent(&conn, Some("%"), 10).unwrap().is_empty());
    }
}
