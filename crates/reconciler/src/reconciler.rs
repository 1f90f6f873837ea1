//! Folds lifecycle events into the ticket store.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use ticket_store::{MatchmakingStatus, Ticket, TicketStore, TicketStoreError, TicketTable};

use crate::Result;
use crate::event::{EventTicket, MatchmakingEvent};
use crate::precedence::PrecedencePolicy;

/// How long an accepted ticket lives before the table may expire it.
pub const DEFAULT_TTL_HORIZON_SECS: i64 = 3600;

/// Per-ticket tally of what a fold did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FoldOutcome {
    /// Tickets written.
    pub applied: u64,
    /// Tickets skipped because the stored status is further along.
    pub stale: u64,
    /// Tickets that disappeared between the read and the conditional write.
    pub raced: u64,
    /// Tickets whose write was rejected (validation or id collision).
    pub failed: u64,
    /// Events skipped because their type is not a ticket status.
    pub ignored: u64,
}

impl FoldOutcome {
    /// Adds another outcome's counts to this one.
    pub fn merge(&mut self, other: FoldOutcome) {
        self.applied += other.applied;
        self.stale += other.stale;
        self.raced += other.raced;
        self.failed += other.failed;
        self.ignored += other.ignored;
    }
}

impl std::fmt::Display for FoldOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "applied={} stale={} raced={} failed={} ignored={}",
            self.applied, self.stale, self.raced, self.failed, self.ignored
        )
    }
}

/// Decides, per ticket, whether an incoming lifecycle event is the new truth
/// and writes it through the [`TicketStore`].
///
/// Events are processed one ticket at a time. A ticket that fails validation
/// or collides is counted and skipped; a table failure aborts the batch.
pub struct EventReconciler<T: TicketTable> {
    store: Arc<TicketStore<T>>,
    ttl_horizon: Duration,
    policy: PrecedencePolicy,
}

impl<T: TicketTable> EventReconciler<T> {
    /// Creates a reconciler writing to the given store.
    pub fn new(store: Arc<TicketStore<T>>) -> Self {
        Self {
            store,
            ttl_horizon: Duration::seconds(DEFAULT_TTL_HORIZON_SECS),
            policy: PrecedencePolicy::default(),
        }
    }

    /// Sets how far ahead of processing time accepted tickets expire.
    pub fn with_ttl_horizon(mut self, ttl_horizon: Duration) -> Self {
        self.ttl_horizon = ttl_horizon;
        self
    }

    /// Sets the staleness rule.
    pub fn with_policy(mut self, policy: PrecedencePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the store this reconciler writes to.
    pub fn store(&self) -> &Arc<TicketStore<T>> {
        &self.store
    }

    /// Processes a batch of events in order.
    #[tracing::instrument(skip(self, events), fields(events = events.len()))]
    pub async fn process_batch(&self, events: &[MatchmakingEvent]) -> Result<FoldOutcome> {
        self.process_batch_at(events, Utc::now()).await
    }

    /// Processes a batch of events as of `now`. All tickets touched by the
    /// batch share the same expiry.
    pub async fn process_batch_at(
        &self,
        events: &[MatchmakingEvent],
        now: DateTime<Utc>,
    ) -> Result<FoldOutcome> {
        let mut outcome = FoldOutcome::default();
        for event in events {
            outcome.merge(self.process_event_at(event, now).await?);
        }

        tracing::info!(%outcome, "event batch reconciled");
        Ok(outcome)
    }

    /// Processes a single event.
    pub async fn process_event(&self, event: &MatchmakingEvent) -> Result<FoldOutcome> {
        self.process_event_at(event, Utc::now()).await
    }

    /// Processes a single event as of `now`.
    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type))]
    pub async fn process_event_at(
        &self,
        event: &MatchmakingEvent,
        now: DateTime<Utc>,
    ) -> Result<FoldOutcome> {
        let mut outcome = FoldOutcome::default();

        let Some(status) = event.status() else {
            tracing::debug!("ignoring event type without a ticket status");
            metrics::counter!("reconciler_events_ignored").increment(1);
            outcome.ignored += 1;
            return Ok(outcome);
        };

        let expiry = now
            .checked_add_signed(self.ttl_horizon)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
            .timestamp();

        for event_ticket in &event.tickets {
            let ticket_id = &event_ticket.ticket_id;

            match self.fold_ticket(event, event_ticket, status, expiry).await {
                Ok(TicketFold::Applied) => {
                    metrics::counter!("reconciler_events_applied").increment(1);
                    outcome.applied += 1;
                }
                Ok(TicketFold::Stale) => {
                    tracing::debug!(%ticket_id, %status, "stored status is newer, skipping");
                    metrics::counter!("reconciler_events_stale").increment(1);
                    outcome.stale += 1;
                }
                Ok(TicketFold::Raced) => {
                    tracing::debug!(%ticket_id, "ticket removed during fold, skipping");
                    outcome.raced += 1;
                }
                Err(e) if e.is_infrastructure() => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(%ticket_id, %status, error = %e, "failed to fold event into ticket");
                    metrics::counter!("reconciler_events_failed").increment(1);
                    outcome.failed += 1;
                }
            }
        }

        Ok(outcome)
    }

    /// Reads, checks and writes one ticket.
    ///
    /// A create that collides means another writer inserted the ticket after
    /// the read. The fold then re-reads, re-checks staleness against the
    /// record that won and retries as an update.
    async fn fold_ticket(
        &self,
        event: &MatchmakingEvent,
        event_ticket: &EventTicket,
        status: MatchmakingStatus,
        expiry: i64,
    ) -> std::result::Result<TicketFold, TicketStoreError> {
        let ticket_id = &event_ticket.ticket_id;
        let current = self.store.get_optional(ticket_id).await?;

        if self.is_stale(status, current.as_ref()) {
            return Ok(TicketFold::Stale);
        }

        let merged = merge(event, event_ticket, status, expiry);

        let result = match self
            .store
            .create_or_update(merged.clone(), current.as_ref())
            .await
        {
            Err(TicketStoreError::Collision { .. }) if current.is_none() => {
                tracing::debug!(%ticket_id, "ticket created concurrently, folding as update");
                match self.store.get_optional(ticket_id).await? {
                    Some(latest) if self.is_stale(status, Some(&latest)) => {
                        return Ok(TicketFold::Stale);
                    }
                    Some(latest) => self.store.update(merged, Some(&latest)).await,
                    None => return Ok(TicketFold::Raced),
                }
            }
            other => other,
        };

        match result {
            Ok(_) => Ok(TicketFold::Applied),
            Err(TicketStoreError::NotFound(_)) => Ok(TicketFold::Raced),
            Err(e) => Err(e),
        }
    }

    fn is_stale(&self, incoming: MatchmakingStatus, current: Option<&Ticket>) -> bool {
        self.policy
            .is_stale(incoming, current.map(|t| t.matchmaking_status))
    }
}

/// What happened to one ticket of an event.
enum TicketFold {
    Applied,
    Stale,
    Raced,
}

/// Builds the record an accepted event leaves behind for one ticket.
fn merge(
    event: &MatchmakingEvent,
    event_ticket: &EventTicket,
    status: MatchmakingStatus,
    expiry: i64,
) -> Ticket {
    let mut ticket = Ticket::new(event_ticket.ticket_id.clone(), status).with_ttl(expiry);
    ticket.player_session_id = event_ticket.player_session_id().map(str::to_string);

    if status == MatchmakingStatus::Succeeded
        && let Some(ref info) = event.game_session_info
    {
        ticket.ip = info.ip_address.clone();
        ticket.port = info.port.map(|p| p.to_string());
        ticket.dns_name = info.dns_name.clone();
    }

    ticket
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use ticket_store::{
        InMemoryTicketTable, TableError, TableResult, TicketId, TicketStream, WriteCondition,
    };

    use super::*;

    fn setup() -> EventReconciler<InMemoryTicketTable> {
        let store = Arc::new(TicketStore::new(InMemoryTicketTable::new()));
        EventReconciler::new(store)
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn merge_sets_connection_only_on_success() {
        let event = MatchmakingEvent::new(MatchmakingStatus::Failed)
            .ticket("T1", "P1")
            .game_session("10.0.0.1", 7777, "srv.example");

        let ticket = merge(&event, &event.tickets[0], MatchmakingStatus::Failed, 42);
        assert!(!ticket.has_connection_info());
        assert_eq!(ticket.player_session_id.as_deref(), Some("P1"));
        assert_eq!(ticket.ttl, 42);

        let ticket = merge(&event, &event.tickets[0], MatchmakingStatus::Succeeded, 42);
        assert_eq!(ticket.ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(ticket.port.as_deref(), Some("7777"));
        assert_eq!(ticket.dns_name.as_deref(), Some("srv.example"));
    }

    #[tokio::test]
    async fn first_event_creates_ticket_with_expiry() {
        let reconciler = setup();
        let event = MatchmakingEvent::new(MatchmakingStatus::Searching).ticket("T1", "P1");

        let outcome = reconciler.process_event_at(&event, now()).await.unwrap();
        assert_eq!(outcome.applied, 1);

        let stored = reconciler.store().get(&TicketId::new("T1")).await.unwrap();
        assert_eq!(stored.matchmaking_status, MatchmakingStatus::Searching);
        assert_eq!(stored.ttl, 1_700_000_000 + DEFAULT_TTL_HORIZON_SECS);
    }

    #[tokio::test]
    async fn unrecognized_event_type_is_ignored() {
        let reconciler = setup();
        let mut event = MatchmakingEvent::new(MatchmakingStatus::Searching).ticket("T1", "P1");
        event.event_type = "AcceptMatch".to_string();

        let outcome = reconciler.process_event_at(&event, now()).await.unwrap();
        assert_eq!(outcome.ignored, 1);
        assert!(reconciler.store().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn custom_ttl_horizon_applies() {
        let reconciler = setup().with_ttl_horizon(Duration::seconds(60));
        let event = MatchmakingEvent::new(MatchmakingStatus::Searching).ticket("T1", "P1");

        reconciler.process_event_at(&event, now()).await.unwrap();

        let stored = reconciler.store().get(&TicketId::new("T1")).await.unwrap();
        assert_eq!(stored.ttl, 1_700_000_060);
    }

    #[tokio::test]
    async fn oversized_ttl_horizon_saturates() {
        let reconciler = setup().with_ttl_horizon(Duration::MAX);
        let event = MatchmakingEvent::new(MatchmakingStatus::Searching).ticket("T1", "P1");

        let outcome = reconciler.process_event_at(&event, now()).await.unwrap();

        assert_eq!(outcome.applied, 1);
        let stored = reconciler.store().get(&TicketId::new("T1")).await.unwrap();
        assert_eq!(stored.ttl, DateTime::<Utc>::MAX_UTC.timestamp());
    }

    #[tokio::test]
    async fn strict_policy_keeps_first_terminal_status() {
        let reconciler = setup().with_policy(PrecedencePolicy::StrictTerminal);
        let succeeded = MatchmakingEvent::new(MatchmakingStatus::Succeeded)
            .ticket("T1", "P1")
            .game_session("10.0.0.1", 7777, "srv.example");
        let failed = MatchmakingEvent::new(MatchmakingStatus::Failed).ticket("T1", "P1");

        reconciler.process_event_at(&succeeded, now()).await.unwrap();
        let outcome = reconciler.process_event_at(&failed, now()).await.unwrap();

        assert_eq!(outcome.stale, 1);
        let stored = reconciler.store().get(&TicketId::new("T1")).await.unwrap();
        assert_eq!(stored.matchmaking_status, MatchmakingStatus::Succeeded);
    }

    #[tokio::test]
    async fn lenient_policy_lets_last_terminal_win() {
        let reconciler = setup();
        let succeeded = MatchmakingEvent::new(MatchmakingStatus::Succeeded)
            .ticket("T1", "P1")
            .game_session("10.0.0.1", 7777, "srv.example");
        let failed = MatchmakingEvent::new(MatchmakingStatus::Failed).ticket("T1", "P1");

        reconciler.process_event_at(&succeeded, now()).await.unwrap();
        reconciler.process_event_at(&failed, now()).await.unwrap();

        let stored = reconciler.store().get(&TicketId::new("T1")).await.unwrap();
        assert_eq!(stored.matchmaking_status, MatchmakingStatus::Failed);
        assert!(!stored.has_connection_info());
    }

    /// A table whose reads fail once `down` is set.
    #[derive(Clone, Default)]
    struct FlakyTable {
        inner: InMemoryTicketTable,
        down: Arc<AtomicBool>,
    }

    #[async_trait]
    impl TicketTable for FlakyTable {
        async fn get(&self, ticket_id: &TicketId) -> TableResult<Option<Ticket>> {
            if self.down.load(Ordering::SeqCst) {
                return Err(TableError::Database(sqlx::Error::PoolTimedOut));
            }
            self.inner.get(ticket_id).await
        }

        async fn put(&self, ticket: Ticket, condition: WriteCondition) -> TableResult<()> {
            self.inner.put(ticket, condition).await
        }

        async fn delete(&self, ticket_id: &TicketId, condition: WriteCondition) -> TableResult<()> {
            self.inner.delete(ticket_id, condition).await
        }

        async fn scan(&self) -> TableResult<TicketStream> {
            self.inner.scan().await
        }
    }

    #[tokio::test]
    async fn unreachable_table_aborts_batch() {
        let table = FlakyTable::default();
        table.down.store(true, Ordering::SeqCst);
        let reconciler = EventReconciler::new(Arc::new(TicketStore::new(table)));

        let events = vec![MatchmakingEvent::new(MatchmakingStatus::Searching).ticket("T1", "P1")];
        let result = reconciler.process_batch_at(&events, now()).await;

        assert!(matches!(
            result,
            Err(crate::ReconcileError::Store(TicketStoreError::Table(_)))
        ));
    }

    /// A table whose first read misses a record that is already stored, as
    /// if another writer created it just after the read.
    #[derive(Clone, Default)]
    struct LateCreateTable {
        inner: InMemoryTicketTable,
        missed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl TicketTable for LateCreateTable {
        async fn get(&self, ticket_id: &TicketId) -> TableResult<Option<Ticket>> {
            if !self.missed.swap(true, Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.get(ticket_id).await
        }

        async fn put(&self, ticket: Ticket, condition: WriteCondition) -> TableResult<()> {
            self.inner.put(ticket, condition).await
        }

        async fn delete(&self, ticket_id: &TicketId, condition: WriteCondition) -> TableResult<()> {
            self.inner.delete(ticket_id, condition).await
        }

        async fn scan(&self) -> TableResult<TicketStream> {
            self.inner.scan().await
        }
    }

    async fn late_create_setup(existing: Ticket) -> EventReconciler<LateCreateTable> {
        let table = LateCreateTable::default();
        table.inner.put(existing, WriteCondition::None).await.unwrap();
        EventReconciler::new(Arc::new(TicketStore::new(table)))
    }

    #[tokio::test]
    async fn terminal_event_survives_concurrent_create() {
        let reconciler = late_create_setup(
            Ticket::new("T1", MatchmakingStatus::Searching).with_player_session("P1"),
        )
        .await;
        let event = MatchmakingEvent::new(MatchmakingStatus::Succeeded)
            .ticket("T1", "P1")
            .game_session("10.0.0.1", 7777, "srv.example");

        let outcome = reconciler.process_event_at(&event, now()).await.unwrap();

        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.failed, 0);
        let stored = reconciler.store().get(&TicketId::new("T1")).await.unwrap();
        assert_eq!(stored.matchmaking_status, MatchmakingStatus::Succeeded);
        assert_eq!(stored.ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(stored.port.as_deref(), Some("7777"));
    }

    #[tokio::test]
    async fn concurrent_create_rechecks_staleness() {
        let reconciler = late_create_setup(
            Ticket::new("T1", MatchmakingStatus::Succeeded)
                .with_player_session("P1")
                .with_connection("10.0.0.1", 7777, "srv.example"),
        )
        .await;
        let event = MatchmakingEvent::new(MatchmakingStatus::Searching).ticket("T1", "P1");

        let outcome = reconciler.process_event_at(&event, now()).await.unwrap();

        assert_eq!(outcome.stale, 1);
        assert_eq!(outcome.applied, 0);
        let stored = reconciler.store().get(&TicketId::new("T1")).await.unwrap();
        assert_eq!(stored.matchmaking_status, MatchmakingStatus::Succeeded);
        assert!(stored.has_connection_info());
    }

    /// A table holding one record that cannot be decoded.
    #[derive(Clone, Default)]
    struct CorruptRecordTable {
        inner: InMemoryTicketTable,
    }

    #[async_trait]
    impl TicketTable for CorruptRecordTable {
        async fn get(&self, ticket_id: &TicketId) -> TableResult<Option<Ticket>> {
            if ticket_id.as_str() == "corrupt" {
                let err = serde_json::from_str::<MatchmakingStatus>("\"Matched\"").unwrap_err();
                return Err(TableError::Serialization(err));
            }
            self.inner.get(ticket_id).await
        }

        async fn put(&self, ticket: Ticket, condition: WriteCondition) -> TableResult<()> {
            self.inner.put(ticket, condition).await
        }

        async fn delete(&self, ticket_id: &TicketId, condition: WriteCondition) -> TableResult<()> {
            self.inner.delete(ticket_id, condition).await
        }

        async fn scan(&self) -> TableResult<TicketStream> {
            self.inner.scan().await
        }
    }

    #[tokio::test]
    async fn undecodable_record_does_not_abort_batch() {
        let reconciler =
            EventReconciler::new(Arc::new(TicketStore::new(CorruptRecordTable::default())));
        let events = vec![
            MatchmakingEvent::new(MatchmakingStatus::Searching)
                .ticket("corrupt", "P0")
                .ticket("T1", "P1"),
            MatchmakingEvent::new(MatchmakingStatus::Searching).ticket("T2", "P2"),
        ];

        let outcome = reconciler.process_batch_at(&events, now()).await.unwrap();

        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.applied, 2);
        assert!(reconciler.store().get_optional(&TicketId::new("T2")).await.unwrap().is_some());
    }
}
