/// Errors surfaced by the workflow engine and the document modules.
///
/// User-input problems (`Validation`, `InvalidAction`, `Conflict`,
/// `NotFound`) are kept distinct from infrastructure failures
/// (`Persistence`, `Storage`) so callers can choose what to show and what
/// to log.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Invalid input: {detail}")]
    Validation { detail: String },

    #[error("Amendment {id} not found")]
    NotFound { id: i64 },

    #[error("Unknown action '{action}': expected approve, reject, or return")]
    InvalidAction { action: String },

    #[error("Cannot {action} an amendment that is {status}")]
    Conflict { status: String, action: String },

    #[error("Database error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("File storage error: {detail}")]
    Storage { detail: String },
}

impl WorkflowError {
    pub fn validation(detail: impl Into<String>) -> Self {
        WorkflowError::Validation {
            detail: detail.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, WorkflowError>;
