//! Core of the municipal ordinance/amendment tracking system: domain
//! types, SQLite persistence, the approval workflow engine, and the
//! append-only audit trail. Presentation and session handling live in the
//! callers; every operation takes an explicit [`schema::ActorContext`].

pub mod audit;
pub mod db;
pub mod documents;
pub mod error;
pub mod schema;
pub mod workflow;

pub use error::{Result, WorkflowError};
