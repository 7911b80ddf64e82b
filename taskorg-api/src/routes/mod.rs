//! API route handlers
//!
//! - `health`: Health check endpoint
//! - `permit`: Policy service proxy
//! - `users`, `orgs`, `members`, `tasks`: workflow endpoints
//! - `live`: SSE live feeds

pub mod health;
pub mod live;
pub mod members;
pub mod orgs;
pub mod permit;
pub mod tasks;
pub mod users;

use serde::Serialize;
use taskorg_shared::workflows::{SyncReport, WorkflowOutcome};

/// Success envelope of the workflow endpoints
///
/// `data` is flattened into the top level next to `success` and `message`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub data: T,
    /// Policy sync calls that failed after the write, if any
    pub sync: SyncReport,
}

impl<T> ApiResponse<T> {
    pub fn from_outcome<U>(outcome: WorkflowOutcome<U>, shape: impl FnOnce(U) -> T) -> Self {
        Self {
            success: true,
            message: outcome.message,
            data: shape(outcome.value),
            sync: outcome.sync,
        }
    }
}
