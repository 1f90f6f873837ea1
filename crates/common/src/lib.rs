//! Shared types for the matchmaking ticket workspace.

pub mod types;

pub use types::TicketId;
