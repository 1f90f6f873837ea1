//! Reconciliation of matchmaking lifecycle events into ticket state.
//!
//! - [`MatchmakingEvent`] and [`parse_notification`] for inbound payloads
//! - [`is_stale`] / [`PrecedencePolicy`], the status precedence rule
//! - [`EventReconciler`], which folds accepted events into the
//!   [`ticket_store::TicketStore`]

pub mod error;
pub mod event;
pub mod precedence;
pub mod reconciler;

pub use error::{ReconcileError, Result};
pub use event::{
    EventPlayer, EventTicket, GameSessionInfo, MatchmakingEvent, parse_notification,
    parse_notifications,
};
pub use precedence::{PrecedencePolicy, is_stale};
pub use reconciler::{DEFAULT_TTL_HORIZON_SECS, EventReconciler, FoldOutcome};
