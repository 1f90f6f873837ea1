//! Matchmaking ticket storage.
//!
//! - [`Ticket`] and [`MatchmakingStatus`], the stored record
//! - [`TicketTable`], the conditional key-value table capability, with
//!   in-memory and PostgreSQL implementations
//! - [`TicketStore`], the only component allowed to read or write tickets
//! - schema [`validation`] compiled from an embedded JSON schema

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod table;
pub mod ticket;
pub mod validation;

pub use common::TicketId;
pub use error::{Result, TableError, TableResult, TicketStoreError};
pub use memory::InMemoryTicketTable;
pub use postgres::PostgresTicketTable;
pub use store::{DEFAULT_CREATE_RETRIES, TicketStore};
pub use table::{TicketStream, TicketTable, WriteCondition};
pub use ticket::{MatchmakingStatus, Ticket, TicketDraft};
pub use validation::ValidationError;
