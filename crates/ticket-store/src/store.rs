//! The ticket store: the single gateway to the ticket table.

use futures_util::TryStreamExt;

use crate::table::{TicketTable, WriteCondition};
use crate::validation;
use crate::{Result, TableError, Ticket, TicketDraft, TicketId, TicketStoreError};

/// Retries granted to a create when the key is already taken.
pub const DEFAULT_CREATE_RETRIES: u32 = 2;

/// Reads, writes and validates matchmaking tickets.
///
/// Every write is conditional: creates require the key to be free and
/// updates and deletes require it to exist. A failed precondition is turned
/// into [`TicketStoreError::NotFound`] on the update/delete paths and into a
/// bounded retry on the create path.
pub struct TicketStore<T: TicketTable> {
    table: T,
    create_retries: u32,
}

impl<T: TicketTable> TicketStore<T> {
    /// Creates a new ticket store over the given table.
    pub fn new(table: T) -> Self {
        Self {
            table,
            create_retries: DEFAULT_CREATE_RETRIES,
        }
    }

    /// Sets the retry budget used by [`TicketStore::create_or_update`].
    pub fn with_create_retries(mut self, retries: u32) -> Self {
        self.create_retries = retries;
        self
    }

    /// Returns a reference to the underlying table.
    pub fn table(&self) -> &T {
        &self.table
    }

    /// Fetches a ticket, failing with `NotFound` if it is absent.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, ticket_id: &TicketId) -> Result<Ticket> {
        match self.table.get(ticket_id).await? {
            Some(ticket) => Ok(ticket),
            None => {
                tracing::debug!(%ticket_id, "ticket not found");
                Err(TicketStoreError::NotFound(ticket_id.clone()))
            }
        }
    }

    /// Fetches a ticket, returning `None` if it is absent.
    #[tracing::instrument(skip(self))]
    pub async fn get_optional(&self, ticket_id: &TicketId) -> Result<Option<Ticket>> {
        Ok(self.table.get(ticket_id).await?)
    }

    /// Lists every ticket in the table.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Ticket>> {
        let tickets: Vec<Ticket> = self.table.scan().await?.try_collect().await?;
        Ok(tickets)
    }

    /// Creates a ticket from a partial draft.
    ///
    /// The ttl is forced to zero; expiry is only ever assigned by the event
    /// fold. When the draft carries no id, one is generated and a fresh id is
    /// drawn for every retry. A caller-supplied id is retried unchanged, which
    /// only helps if the previous failure was transient.
    #[tracing::instrument(skip(self, draft))]
    pub async fn create(&self, draft: TicketDraft, max_retries: u32) -> Result<Ticket> {
        let generated = draft.ticket_id.is_none();
        let ticket_id = draft.ticket_id.clone().unwrap_or_else(TicketId::generate);
        let ticket = draft.into_ticket(ticket_id);

        self.insert(ticket, generated, max_retries).await
    }

    /// Replaces an existing ticket.
    ///
    /// When `prior` is given the caller has already proven the record exists
    /// and the lookup is skipped. The existence precondition on the write is
    /// enforced either way.
    #[tracing::instrument(skip(self, ticket, prior), fields(ticket_id = %ticket.ticket_id))]
    pub async fn update(&self, ticket: Ticket, prior: Option<&Ticket>) -> Result<Ticket> {
        if prior.is_none() {
            self.get(&ticket.ticket_id).await?;
        }

        validation::validate(&ticket)?;

        match self.table.put(ticket.clone(), WriteCondition::Exists).await {
            Ok(()) => {
                metrics::counter!("tickets_updated").increment(1);
                Ok(ticket)
            }
            Err(TableError::ConditionalCheckFailed { ticket_id }) => {
                tracing::debug!(%ticket_id, "ticket vanished before update");
                Err(TicketStoreError::NotFound(ticket_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Updates when prior state is known, otherwise creates.
    ///
    /// Unlike [`TicketStore::create`] the create branch keeps the ticket's
    /// ttl, so the event fold can assign expiry on every accepted write.
    pub async fn create_or_update(&self, ticket: Ticket, prior: Option<&Ticket>) -> Result<Ticket> {
        match prior {
            Some(prior) => self.update(ticket, Some(prior)).await,
            None => self.insert(ticket, false, self.create_retries).await,
        }
    }

    /// Deletes an existing ticket.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, ticket_id: &TicketId) -> Result<()> {
        match self.table.delete(ticket_id, WriteCondition::Exists).await {
            Ok(()) => {
                metrics::counter!("tickets_deleted").increment(1);
                Ok(())
            }
            Err(TableError::ConditionalCheckFailed { ticket_id }) => {
                Err(TicketStoreError::NotFound(ticket_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Validates a ticket against the schema, handing it back on success.
    pub fn validate(&self, ticket: Ticket) -> Result<Ticket> {
        validation::validate(&ticket)?;
        Ok(ticket)
    }

    /// Parses and validates a JSON ticket body.
    pub fn parse(&self, body: &str) -> Result<Ticket> {
        let value: serde_json::Value = serde_json::from_str(body)
            .map_err(|_| TicketStoreError::BadRequest("Invalid JSON".to_string()))?;
        validation::validate_value(&value)?;

        let ticket: Ticket = serde_json::from_value(value)
            .map_err(|e| TicketStoreError::BadRequest(e.to_string()))?;
        self.validate(ticket)
    }

    async fn insert(&self, mut ticket: Ticket, regenerate_id: bool, max_retries: u32) -> Result<Ticket> {
        validation::validate(&ticket)?;

        let mut attempts: u32 = 0;
        loop {
            attempts += 1;

            match self.table.put(ticket.clone(), WriteCondition::NotExists).await {
                Ok(()) => {
                    metrics::counter!("tickets_created").increment(1);
                    tracing::debug!(ticket_id = %ticket.ticket_id, attempts, "ticket created");
                    return Ok(ticket);
                }
                Err(TableError::ConditionalCheckFailed { ticket_id }) => {
                    metrics::counter!("ticket_create_collisions").increment(1);

                    if attempts > max_retries {
                        return Err(TicketStoreError::Collision {
                            ticket_id,
                            attempts,
                        });
                    }

                    tracing::warn!(
                        %ticket_id,
                        attempts,
                        regenerate_id,
                        "ticket id already exists, retrying create"
                    );
                    if regenerate_id {
                        ticket.ticket_id = TicketId::generate();
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
