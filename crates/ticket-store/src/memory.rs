use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    TableError, TableResult, Ticket, TicketId,
    table::{TicketStream, TicketTable, WriteCondition},
};

/// In-memory ticket table for tests and local runs.
///
/// Preconditions are checked and applied under a single write lock, which
/// gives the same atomicity as the conditional writes of a real table.
#[derive(Clone, Default)]
pub struct InMemoryTicketTable {
    tickets: Arc<RwLock<HashMap<TicketId, Ticket>>>,
}

impl InMemoryTicketTable {
    /// Creates a new empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records stored.
    pub async fn len(&self) -> usize {
        self.tickets.read().await.len()
    }

    /// Returns true if the table holds no records.
    pub async fn is_empty(&self) -> bool {
        self.tickets.read().await.is_empty()
    }

    /// Removes every record.
    pub async fn clear(&self) {
        self.tickets.write().await.clear();
    }
}

#[async_trait]
impl TicketTable for InMemoryTicketTable {
    async fn get(&self, ticket_id: &TicketId) -> TableResult<Option<Ticket>> {
        Ok(self.tickets.read().await.get(ticket_id).cloned())
    }

    async fn put(&self, ticket: Ticket, condition: WriteCondition) -> TableResult<()> {
        let mut tickets = self.tickets.write().await;

        if !condition.holds(tickets.contains_key(&ticket.ticket_id)) {
            return Err(TableError::ConditionalCheckFailed {
                ticket_id: ticket.ticket_id,
            });
        }

        tickets.insert(ticket.ticket_id.clone(), ticket);
        Ok(())
    }

    async fn delete(&self, ticket_id: &TicketId, condition: WriteCondition) -> TableResult<()> {
        let mut tickets = self.tickets.write().await;

        if !condition.holds(tickets.contains_key(ticket_id)) {
            return Err(TableError::ConditionalCheckFailed {
                ticket_id: ticket_id.clone(),
            });
        }

        tickets.remove(ticket_id);
        Ok(())
    }

    async fn scan(&self) -> TableResult<TicketStream> {
        use futures_util::stream;

        let tickets: Vec<Ticket> = self.tickets.read().await.values().cloned().collect();
        Ok(Box::pin(stream::iter(tickets.into_iter().map(Ok))))
    }
}
