//! The amendment approval workflow engine.
//!
//! Every decision runs inside one immediate transaction: the status update,
//! the signature insert (approve/reject only), the workflow step, and the
//! audit entry commit together or not at all. Transition legality is a
//! closed table over (current status, action); illegal combinations fail
//! with [`WorkflowError::Conflict`] before anything is written.

use crate::audit;
use crate::db;
use crate::documents;
use crate::error::{Result, WorkflowError};
use crate::schema::{
    ActorContext, ActorRole, Amendment, AmendmentFilter, AmendmentStatus, AmendmentSummary,
    ApprovalSignature, ApprovalStatistics, DecisionAction, DocumentKind, Priority,
    SignatureOutcome, VoteChoice, VoteTally, WorkflowStep,
};
use rusqlite::{Connection, TransactionBehavior, params};

/// Intake form for a new amendment.
pub struct NewAmendment<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub document_id: i64,
    pub priority: Priority,
    /// Files straight into `pending`; otherwise the amendment starts as a
    /// draft the submitter can still work on.
    pub submit: bool,
}

/// Parses the raw action string from the transport boundary.
pub fn parse_action(value: &str) -> Result<DecisionAction> {
    DecisionAction::parse(value).ok_or_else(|| WorkflowError::InvalidAction {
        action: value.to_string(),
    })
}

/// The transition table. Approve/reject are only legal from the review
/// pipeline; return resets any non-terminal amendment to draft.
fn transition(status: AmendmentStatus, action: DecisionAction) -> Result<AmendmentStatus> {
    use AmendmentStatus::*;
    use DecisionAction::*;
    match (status, action) {
        (Pending | UnderReview, Approve) => Ok(Approved),
        (Pending | UnderReview, Reject) => Ok(Rejected),
        (Draft | Pending | UnderReview, Return) => Ok(Draft),
        (status, action) => Err(WorkflowError::Conflict {
            status: status.as_str().to_string(),
            action: action.as_str().to_string(),
        }),
    }
}

/// Applies one approve/reject/return decision to an amendment.
///
/// Comments are required for reject (they become the rejection reason) and
/// for return (the submitter needs to know what to fix). Any failure rolls
/// the whole call back; the caller must resubmit explicitly, the engine
/// never retries on its own.
pub fn submit_decision(
    conn: &mut Connection,
    amendment_id: i64,
    action: DecisionAction,
    actor: &ActorContext,
    comments: Option<&str>,
) -> Result<Amendment> {
    let comments = comments.map(str::trim).filter(|c| !c.is_empty());
    if comments.is_none() && matches!(action, DecisionAction::Reject | DecisionAction::Return) {
        return Err(WorkflowError::validation(format!(
            "Comments are required to {action} an amendment"
        )));
    }

    // Immediate mode takes the write lock up front, so a concurrent decision
    // on the same amendment serializes here and the loser sees the updated
    // status instead of appending duplicate ledger rows.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let amendment = db::get_amendment(&tx, amendment_id)?;
    let new_status = transition(amendment.status, action)?;
    let now = db::now_utc();

    match action {
        DecisionAction::Approve => {
            tx.execute(
                r#"
                UPDATE amendments
                SET status = ?1, reviewed_by = ?2, approved_at = ?3, rejection_reason = NULL
                WHERE id = ?4
                "#,
                params![new_status.as_str(), actor.actor_id, now, amendment_id],
            )?;
            tx.execute(
                r#"
                INSERT INTO approval_signatures
                  (amendment_id, signatory, signatory_role, outcome, notes, signed_at)
                VALUES (?1, ?2, ?3, 'signed', ?4, ?5)
                "#,
                params![amendment_id, actor.actor_id, actor.role.as_str(), comments, now],
            )?;
        }
        DecisionAction::Reject => {
            tx.execute(
                r#"
                UPDATE amendments
                SET status = ?1, reviewed_by = ?2, rejection_reason = ?3, approved_at = NULL
                WHERE id = ?4
                "#,
                params![new_status.as_str(), actor.actor_id, comments, amendment_id],
            )?;
            tx.execute(
                r#"
                INSERT INTO approval_signatures
                  (amendment_id, signatory, signatory_role, outcome, notes, signed_at)
                VALUES (?1, ?2, ?3, 'rejected', ?4, NULL)
                "#,
                params![amendment_id, actor.actor_id, actor.role.as_str(), comments],
            )?;
        }
        DecisionAction::Return => {
            tx.execute(
                r#"
                UPDATE amendments
                SET status = ?1, reviewed_by = NULL, approved_at = NULL, rejection_reason = NULL
                WHERE id = ?2
                "#,
                params![new_status.as_str(), amendment_id],
            )?;
        }
    }

    tx.execute(
        r#"
        INSERT INTO workflow_steps
          (amendment_id, step, assignee, status_after, comments, actor, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            amendment_id,
            action.as_str(),
            actor.actor_id,
            new_status.as_str(),
            comments,
            actor.actor_id,
            now
        ],
    )?;

    let (code, verb) = match action {
        DecisionAction::Approve => (audit::AMENDMENT_APPROVE, "Approved"),
        DecisionAction::Reject => (audit::AMENDMENT_REJECT, "Rejected"),
        DecisionAction::Return => (audit::AMENDMENT_RETURN, "Returned"),
    };
    audit::record(
        &tx,
        actor,
        code,
        &format!("{verb} amendment {}", amendment.amendment_number),
    )?;

    let updated = db::get_amendment(&tx, amendment_id)?;
    tx.commit()?;
    Ok(updated)
}

/// Files a new amendment against a registered document, in `pending` when
/// submitted for review or `draft` otherwise.
pub fn file_amendment(
    conn: &mut Connection,
    new: &NewAmendment<'_>,
    actor: &ActorContext,
) -> Result<Amendment> {
    let title = new.title.trim();
    if title.is_empty() {
        return Err(WorkflowError::validation("Amendment title is required"));
    }
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let document = documents::get_document(&tx, new.document_id)?.ok_or_else(|| {
        WorkflowError::validation(format!("No document with id {}", new.document_id))
    })?;

    let number = db::next_number(&tx, "amendments", "amendment_number", "AM", db::current_year())?;
    let status = if new.submit {
        AmendmentStatus::Pending
    } else {
        AmendmentStatus::Draft
    };
    let created_at = db::now_utc();

    tx.execute(
        r#"
        INSERT INTO amendments
          (amendment_number, title, description, document_id, priority,
           status, submitted_by, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        params![
            number,
            title,
            new.description,
            new.document_id,
            new.priority.as_str(),
            status.as_str(),
            actor.actor_id,
            created_at
        ],
    )?;
    let id = tx.last_insert_rowid();

    audit::record(
        &tx,
        actor,
        audit::AMENDMENT_FILE,
        &format!("Filed amendment {number} against {}", document.number),
    )?;

    let amendment = db::get_amendment(&tx, id)?;
    tx.commit()?;
    Ok(amendment)
}

/// Records (or revises) one councilor's vote on an amendment.
pub fn cast_vote(
    conn: &mut Connection,
    amendment_id: i64,
    voter: &str,
    choice: VoteChoice,
    actor: &ActorContext,
) -> Result<()> {
    let voter = voter.trim();
    if voter.is_empty() {
        return Err(WorkflowError::validation("Voter name is required"));
    }
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let amendment = db::get_amendment(&tx, amendment_id)?;
    tx.execute(
        r#"
        INSERT INTO amendment_votes (amendment_id, voter, choice, cast_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(amendment_id, voter) DO UPDATE SET
          choice = excluded.choice,
          cast_at = excluded.cast_at
        "#,
        params![amendment_id, voter, choice.as_str(), db::now_utc()],
    )?;

    audit::record(
        &tx,
        actor,
        audit::VOTE_CAST,
        &format!(
            "Recorded {} vote by {voter} on amendment {}",
            choice.as_str(),
            amendment.amendment_number
        ),
    )?;

    tx.commit()?;
    Ok(())
}

/// Lists amendments with document details and vote tallies, newest first.
///
/// The pending bucket covers both `pending` and `under_review`. Search is a
/// case-insensitive substring match over amendment title, amendment number,
/// and the target document's number. The full result set is returned; there
/// is no pagination.
pub fn list_amendments(
    conn: &Connection,
    filter: &AmendmentFilter,
) -> Result<Vec<AmendmentSummary>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT a.id, a.amendment_number, a.title, a.description, a.document_id,
               a.priority, a.status, a.submitted_by, a.reviewed_by,
               a.rejection_reason, a.created_at, a.approved_at,
               d.kind, d.number, d.title,
               SUM(CASE WHEN v.choice = 'yes' THEN 1 ELSE 0 END),
               SUM(CASE WHEN v.choice = 'no' THEN 1 ELSE 0 END),
               COUNT(v.id)
        FROM amendments a
        JOIN documents d ON d.id = a.document_id
        LEFT JOIN amendment_votes v ON v.amendment_id = a.id
        WHERE (?1 = 'all'
               OR (?1 = 'pending' AND a.status IN ('pending', 'under_review'))
               OR (?1 != 'pending' AND a.status = ?1))
          AND (?2 IS NULL
               OR LOWER(a.title) LIKE ?2 ESCAPE '\'
               OR LOWER(a.amendment_number) LIKE ?2 ESCAPE '\'
               OR LOWER(d.number) LIKE ?2 ESCAPE '\')
        GROUP BY a.id
        ORDER BY a.created_at DESC, a.id DESC
        "#,
    )?;

    let pattern = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", db::escape_like(&s.to_lowercase())));

    let rows = stmt.query_map(params![filter.status.as_str(), pattern], |row| {
        let priority: String = row.get(5)?;
        let status: String = row.get(6)?;
        let kind: String = row.get(12)?;
        Ok(AmendmentSummary {
            amendment: Amendment {
                id: row.get(0)?,
                amendment_number: row.get(1)?,
                title: row.get(2)?,
                description: row.get(3)?,
                document_id: row.get(4)?,
                priority: Priority::parse(&priority).unwrap_or(Priority::Medium),
                status: AmendmentStatus::parse(&status).unwrap_or(AmendmentStatus::Draft),
                submitted_by: row.get(7)?,
                reviewed_by: row.get(8)?,
                rejection_reason: row.get(9)?,
                created_at: row.get(10)?,
                approved_at: row.get(11)?,
            },
            document_kind: DocumentKind::parse(&kind).unwrap_or(DocumentKind::Ordinance),
            document_number: row.get(13)?,
            document_title: row.get(14)?,
            tally: VoteTally {
                yes: row.get::<_, i64>(15)? as u32,
                no: row.get::<_, i64>(16)? as u32,
                total: row.get::<_, i64>(17)? as u32,
            },
        })
    })?;

    let mut summaries = Vec::new();
    for row in rows {
        summaries.push(row?);
    }
    Ok(summaries)
}

/// The amendment's workflow ledger, oldest step first.
pub fn workflow_history(conn: &Connection, amendment_id: i64) -> Result<Vec<WorkflowStep>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, amendment_id, step, assignee, status_after, comments, actor, created_at
        FROM workflow_steps
        WHERE amendment_id = ?1
        ORDER BY id ASC
        "#,
    )?;
    let rows = stmt.query_map(params![amendment_id], |row| {
        let step: String = row.get(2)?;
        let status_after: String = row.get(4)?;
        Ok(WorkflowStep {
            id: row.get(0)?,
            amendment_id: row.get(1)?,
            step: DecisionAction::parse(&step).unwrap_or(DecisionAction::Return),
            assignee: row.get(3)?,
            status_after: AmendmentStatus::parse(&status_after)
                .unwrap_or(AmendmentStatus::Draft),
            comments: row.get(5)?,
            actor: row.get(6)?,
            created_at: row.get(7)?,
        })
    })?;

    let mut steps = Vec::new();
    for row in rows {
        steps.push(row?);
    }
    Ok(steps)
}

/// Every signature recorded against the amendment, oldest first.
pub fn signatures(conn: &Connection, amendment_id: i64) -> Result<Vec<ApprovalSignature>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, amendment_id, signatory, signatory_role, outcome, notes, signed_at
        FROM approval_signatures
        WHERE amendment_id = ?1
        ORDER BY id ASC
        "#,
    )?;
    let rows = stmt.query_map(params![amendment_id], |row| {
        let role: String = row.get(3)?;
        let outcome: String = row.get(4)?;
        Ok(ApprovalSignature {
            id: row.get(0)?,
            amendment_id: row.get(1)?,
            signatory: row.get(2)?,
            signatory_role: ActorRole::parse(&role).unwrap_or(ActorRole::Councilor),
            outcome: SignatureOutcome::parse(&outcome).unwrap_or(SignatureOutcome::Rejected),
            notes: row.get(5)?,
            signed_at: row.get(6)?,
        })
    })?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

/// Counts of amendments per status bucket. Pure read.
pub fn approval_statistics(conn: &Connection) -> Result<ApprovalStatistics> {
    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM amendments GROUP BY status")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u32))
    })?;

    let mut stats = ApprovalStatistics::default();
    for row in rows {
        let (status, count) = row?;
        stats.total += count;
        match AmendmentStatus::parse(&status) {
            Some(AmendmentStatus::Pending) | Some(AmendmentStatus::UnderReview) => {
                stats.pending += count
            }
            Some(AmendmentStatus::Approved) => stats.approved += count,
            Some(AmendmentStatus::Rejected) => stats.rejected += count,
            Some(AmendmentStatus::Draft) => stats.draft += count,
            None => {}
        }
    }
    Ok(stats)
}
