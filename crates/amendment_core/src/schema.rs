use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Legislative document kinds an amendment can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Ordinance,
    Resolution,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Ordinance => "ordinance",
            DocumentKind::Resolution => "resolution",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ordinance" => Some(DocumentKind::Ordinance),
            "resolution" => Some(DocumentKind::Resolution),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The amendment state machine's state field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AmendmentStatus {
    Draft,
    Pending,
    UnderReview,
    Approved,
    Rejected,
}

impl AmendmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AmendmentStatus::Draft => "draft",
            AmendmentStatus::Pending => "pending",
            AmendmentStatus::UnderReview => "under_review",
            AmendmentStatus::Approved => "approved",
            AmendmentStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(AmendmentStatus::Draft),
            "pending" => Some(AmendmentStatus::Pending),
            "under_review" => Some(AmendmentStatus::UnderReview),
            "approved" => Some(AmendmentStatus::Approved),
            "rejected" => Some(AmendmentStatus::Rejected),
            _ => None,
        }
    }

    /// Approved and rejected amendments have left the review pipeline.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AmendmentStatus::Approved | AmendmentStatus::Rejected)
    }
}

impl std::fmt::Display for AmendmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            "urgent" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

/// The closed set of workflow decisions. Raw strings are parsed at the
/// boundary; nothing else reaches the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Approve,
    Reject,
    Return,
}

impl DecisionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionAction::Approve => "approve",
            DecisionAction::Reject => "reject",
            DecisionAction::Return => "return",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "approve" => Some(DecisionAction::Approve),
            "reject" => Some(DecisionAction::Reject),
            "return" => Some(DecisionAction::Return),
            _ => None,
        }
    }
}

impl std::fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Roles permitted to act on the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    SuperAdmin,
    Admin,
    Councilor,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::SuperAdmin => "super_admin",
            ActorRole::Admin => "admin",
            ActorRole::Councilor => "councilor",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "super_admin" => Some(ActorRole::SuperAdmin),
            "admin" => Some(ActorRole::Admin),
            "councilor" => Some(ActorRole::Councilor),
            _ => None,
        }
    }
}

/// Identity of the acting user, passed explicitly into every operation
/// rather than read from ambient session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ActorContext {
    pub actor_id: String,
    pub role: ActorRole,
    pub ip: Option<String>,         // client IP when invoked over a transport
    pub user_agent: Option<String>,
}

impl ActorContext {
    pub fn new(actor_id: impl Into<String>, role: ActorRole) -> Self {
        Self {
            actor_id: actor_id.into(),
            role,
            ip: None,
            user_agent: None,
        }
    }
}

/// An ordinance or resolution in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Document {
    pub id: i64,
    pub kind: DocumentKind,
    pub number: String, // e.g. "ORD-2026-014"
    pub title: String,
    pub created_at: String, // RFC 3339 UTC
}

/// A proposed change to an ordinance or resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Amendment {
    pub id: i64,
    pub amendment_number: String, // e.g. "AM-2026-007"
    pub title: String,
    pub description: String,
    pub document_id: i64,
    pub priority: Priority,
    pub status: AmendmentStatus,
    pub submitted_by: String,
    pub reviewed_by: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: String,
    pub approved_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SignatureOutcome {
    Signed,
    Rejected,
}

impl SignatureOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureOutcome::Signed => "signed",
            SignatureOutcome::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "signed" => Some(SignatureOutcome::Signed),
            "rejected" => Some(SignatureOutcome::Rejected),
            _ => None,
        }
    }
}

/// Immutable record that a signatory acted on an amendment. A signatory may
/// accumulate several of these over time (reject, then sign after a return).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ApprovalSignature {
    pub id: i64,
    pub amendment_id: i64,
    pub signatory: String,
    pub signatory_role: ActorRole,
    pub outcome: SignatureOutcome,
    pub notes: Option<String>,
    pub signed_at: Option<String>, // set only for `signed`
}

/// Append-only ledger entry recording one workflow action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WorkflowStep {
    pub id: i64,
    pub amendment_id: i64,
    pub step: DecisionAction,
    pub assignee: String,
    pub status_after: AmendmentStatus,
    pub comments: Option<String>,
    pub actor: String,
    pub created_at: String,
}

/// System-wide security trail entry. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AuditLogEntry {
    pub id: i64,
    pub actor: String,
    pub action: String, // e.g. "AMENDMENT_APPROVE"
    pub description: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    Yes,
    No,
    Abstain,
}

impl VoteChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteChoice::Yes => "yes",
            VoteChoice::No => "no",
            VoteChoice::Abstain => "abstain",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "yes" => Some(VoteChoice::Yes),
            "no" => Some(VoteChoice::No),
            "abstain" => Some(VoteChoice::Abstain),
            _ => None,
        }
    }
}

/// Yes/no/total counts for one amendment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct VoteTally {
    pub yes: u32,
    pub no: u32,
    pub total: u32,
}

/// An amendment joined with its target document and vote tally, as returned
/// by listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AmendmentSummary {
    pub amendment: Amendment,
    pub document_kind: DocumentKind,
    pub document_number: String,
    pub document_title: String,
    pub tally: VoteTally,
}

/// Status bucket for listings. `Pending` covers both pending and
/// under_review, matching how the review queue is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    All,
    Draft,
    Pending,
    Approved,
    Rejected,
}

impl StatusFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Draft => "draft",
            StatusFilter::Pending => "pending",
            StatusFilter::Approved => "approved",
            StatusFilter::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "all" => Some(StatusFilter::All),
            "draft" => Some(StatusFilter::Draft),
            "pending" => Some(StatusFilter::Pending),
            "approved" => Some(StatusFilter::Approved),
            "rejected" => Some(StatusFilter::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AmendmentFilter {
    pub status: StatusFilter,
    pub search: Option<String>,
}

impl Default for AmendmentFilter {
    fn default() -> Self {
        Self {
            status: StatusFilter::All,
            search: None,
        }
    }
}

/// Counts of amendments by status bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ApprovalStatistics {
    pub total: u32,
    pub pending: u32, // pending + under_review
    pub approved: u32,
    pub rejected: u32,
    pub draft: u32,
}

/// Metadata row for a file attached to a legislative record. Bytes live in
/// the file store, never in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SupportingDocument {
    pub id: i64,
    pub document_id: i64,
    pub file_name: String,
    pub stored_path: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub uploaded_by: String,
    pub uploaded_at: String,
}
