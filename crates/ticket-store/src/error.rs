use thiserror::Error;

use crate::TicketId;
use crate::validation::ValidationError;

/// Errors raised by a ticket table backend.
#[derive(Debug, Error)]
pub enum TableError {
    /// The write precondition (`attribute_exists` / `attribute_not_exists`)
    /// did not hold for this key.
    #[error("Conditional check failed for ticket {ticket_id}")]
    ConditionalCheckFailed { ticket_id: TicketId },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored record could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors surfaced by [`crate::TicketStore`] operations.
#[derive(Debug, Error)]
pub enum TicketStoreError {
    /// The operation targets a ticket id absent from the table.
    #[error("Matchmaking ticket with id '{0}' not found")]
    NotFound(TicketId),

    /// The ticket failed schema validation.
    #[error("{0}")]
    BadRequest(String),

    /// Every create attempt hit an existing record.
    #[error("Matchmaking ticket with id '{ticket_id}' already exists after {attempts} attempts")]
    Collision { ticket_id: TicketId, attempts: u32 },

    /// The table operation failed.
    #[error("Ticket table error: {0}")]
    Table(#[from] TableError),
}

impl TicketStoreError {
    /// Returns true for failures of the backing table rather than of the
    /// individual ticket. A record that fails to decode is a per-ticket
    /// failure.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            TicketStoreError::Table(err) if !matches!(err, TableError::Serialization(_))
        )
    }
}

impl From<ValidationError> for TicketStoreError {
    fn from(err: ValidationError) -> Self {
        TicketStoreError::BadRequest(err.message)
    }
}

/// Result type for ticket table operations.
pub type TableResult<T> = std::result::Result<T, TableError>;

/// Result type for ticket store operations.
pub type Result<T> = std::result::Result<T, TicketStoreError>;
