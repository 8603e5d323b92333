use crate::error::{Result, WorkflowError};
use crate::schema::{Amendment, AmendmentStatus, Priority};
use rusqlite::{Connection, OptionalExtension, Row, params};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub fn open(db_path: &str) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    init(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    init(&conn)?;
    Ok(conn)
}

fn init(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
          id INTEGER PRIMARY KEY,
          kind TEXT NOT NULL,
          number TEXT NOT NULL UNIQUE,
          title TEXT NOT NULL,
          created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS amendments (
          id INTEGER PRIMARY KEY,
          amendment_number TEXT NOT NULL UNIQUE,
          title TEXT NOT NULL,
          description TEXT NOT NULL,
          document_id INTEGER NOT NULL REFERENCES documents(id),
          priority TEXT NOT NULL,
          status TEXT NOT NULL,
          submitted_by TEXT NOT NULL,
          reviewed_by TEXT,
          rejection_reason TEXT,
          created_at TEXT NOT NULL,
          approved_at TEXT
        );

        CREATE TABLE IF NOT EXISTS approval_signatures (
          id INTEGER PRIMARY KEY,
          amendment_id INTEGER NOT NULL REFERENCES amendments(id),
          signatory TEXT NOT NULL,
          signatory_role TEXT NOT NULL,
          outcome TEXT NOT NULL,
          notes TEXT,
          signed_at TEXT
        );

        CREATE TABLE IF NOT EXISTS workflow_steps (
          id INTEGER PRIMARY KEY,
          amendment_id INTEGER NOT NULL REFERENCES amendments(id),
          step TEXT NOT NULL,
          assignee TEXT NOT NULL,
          status_after TEXT NOT NULL,
          comments TEXT,
          actor TEXT NOT NULL,
          created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS audit_logs (
          id INTEGER PRIMARY KEY,
          actor TEXT NOT NULL,
          action TEXT NOT NULL,
          description TEXT NOT NULL,
          ip TEXT,
          user_agent TEXT,
          created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS amendment_votes (
          id INTEGER PRIMARY KEY,
          amendment_id INTEGER NOT NULL REFERENCES amendments(id),
          voter TEXT NOT NULL,
          choice TEXT NOT NULL,
          cast_at TEXT NOT NULL,
          UNIQUE(amendment_id, voter)
        );

        CREATE TABLE IF NOT EXISTS supporting_documents (
          id INTEGER PRIMARY KEY,
          document_id INTEGER NOT NULL REFERENCES documents(id),
          file_name TEXT NOT NULL,
          stored_path TEXT NOT NULL,
          content_type TEXT,
          size_bytes INTEGER NOT NULL,
          uploaded_by TEXT NOT NULL,
          uploaded_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_amendments_status ON amendments(status);
        CREATE INDEX IF NOT EXISTS idx_amendments_created_at ON amendments(created_at);
        CREATE INDEX IF NOT EXISTS idx_signatures_amendment ON approval_signatures(amendment_id);
        CREATE INDEX IF NOT EXISTS idx_steps_amendment ON workflow_steps(amendment_id);
        CREATE INDEX IF NOT EXISTS idx_votes_amendment ON amendment_votes(amendment_id);
        CREATE INDEX IF NOT EXISTS idx_attachments_document ON supporting_documents(document_id);
        "#,
    )?;
    Ok(())
}

/// Current time as RFC 3339 UTC text, the format every table stores.
pub fn now_utc() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

pub(crate) fn amendment_from_row(row: &Row<'_>) -> rusqlite::Result<Amendment> {
    let priority: String = row.get("priority")?;
    let status: String = row.get("status")?;
    Ok(Amendment {
        id: row.get("id")?,
        amendment_number: row.get("amendment_number")?,
        title: row.get("title")?,
        description: row.get("description")?,
        document_id: row.get("document_id")?,
        priority: Priority::parse(&priority).unwrap_or(Priority::Medium),
        status: AmendmentStatus::parse(&status).unwrap_or(AmendmentStatus::Draft),
        submitted_by: row.get("submitted_by")?,
        reviewed_by: row.get("reviewed_by")?,
        rejection_reason: row.get("rejection_reason")?,
        created_at: row.get("created_at")?,
        approved_at: row.get("approved_at")?,
    })
}

pub fn get_amendment(conn: &Connection, id: i64) -> Result<Amendment> {
    let amendment = conn
        .query_row(
            r#"
            SELECT id, amendment_number, title, description, document_id,
                   priority, status, submitted_by, reviewed_by,
                   rejection_reason, created_at, approved_at
            FROM amendments
            WHERE id = ?1
            "#,
            params![id],
            |row| amendment_from_row(row),
        )
        .optional()?;
    amendment.ok_or(WorkflowError::NotFound { id })
}

/// Next human-readable number in a `PREFIX-YYYY-NNN` series, scanning the
/// existing rows of `table.column` for the given prefix and year.
///
/// The suffix comes from the highest number already issued, not the row
/// count, so the series keeps advancing past deleted rows instead of
/// reissuing a taken number.
pub(crate) fn next_number(
    conn: &Connection,
    table: &str,
    column: &str,
    prefix: &str,
    year: i32,
) -> Result<String> {
    // Table and column names come from crate-internal callers, never input.
    let sql = format!(
        "SELECT COALESCE(MAX(CAST(SUBSTR({column}, ?2) AS INTEGER)), 0) \
         FROM {table} WHERE {column} LIKE ?1"
    );
    let pattern = format!("{prefix}-{year}-%");
    // 1-based offset of the numeric suffix, past "PREFIX-YYYY-".
    let suffix_start = (prefix.len() + 7) as i64;
    let max: i64 = conn.query_row(&sql, params![pattern, suffix_start], |row| row.get(0))?;
    Ok(format!("{prefix}-{year}-{:03}", max + 1))
}

/// Escapes `%`, `_`, and `\` in a user-supplied LIKE needle so the query
/// matches them literally. Pair with `ESCAPE '\'` in the SQL.
pub(crate) fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

pub(crate) fn current_year() -> i32 {
    OffsetDateTime::now_utc().year()
}
