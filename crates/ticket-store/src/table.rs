use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{TableResult, Ticket, TicketId};

/// Precondition on the existing record for a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteCondition {
    /// Unconditional write.
    #[default]
    None,
    /// `attribute_not_exists(ticketId)`: the key must be free.
    NotExists,
    /// `attribute_exists(ticketId)`: the key must already be taken.
    Exists,
}

impl WriteCondition {
    /// Returns true if the precondition holds given whether a record exists.
    pub fn holds(&self, exists: bool) -> bool {
        match self {
            WriteCondition::None => true,
            WriteCondition::NotExists => !exists,
            WriteCondition::Exists => exists,
        }
    }
}

/// A stream of tickets.
pub type TicketStream = Pin<Box<dyn Stream<Item = TableResult<Ticket>> + Send>>;

/// Durable key-value table holding one record per ticket id.
///
/// Implementations must check the write precondition and apply the write
/// atomically; the precondition is the only concurrency control the ticket
/// store relies on. A failed precondition is reported as
/// [`crate::TableError::ConditionalCheckFailed`].
#[async_trait]
pub trait TicketTable: Send + Sync {
    /// Reads a single record.
    async fn get(&self, ticket_id: &TicketId) -> TableResult<Option<Ticket>>;

    /// Writes a full record, replacing any existing one.
    async fn put(&self, ticket: Ticket, condition: WriteCondition) -> TableResult<()>;

    /// Removes a record.
    async fn delete(&self, ticket_id: &TicketId, condition: WriteCondition) -> TableResult<()>;

    /// Streams every record in the table, in no particular order.
    async fn scan(&self) -> TableResult<TicketStream>;
}
