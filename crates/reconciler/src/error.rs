//! Reconciler error types.

use thiserror::Error;
use ticket_store::TicketStoreError;

/// Errors that abort a batch.
///
/// Failures confined to one ticket are logged and counted in the
/// [`crate::FoldOutcome`] instead.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The ticket table could not be reached.
    #[error("Ticket store error: {0}")]
    Store(#[from] TicketStoreError),

    /// The notification body is not a lifecycle event.
    #[error("Event payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Result type for reconciler operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;
