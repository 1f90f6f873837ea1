use serde::{Deserialize, Serialize};

use crate::TicketId;

/// Lifecycle stage of a matchmaking ticket.
///
/// Serialized with the event type names published by the matchmaking
/// backend (`MatchmakingSearching`, ...). The short names are accepted on
/// input as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchmakingStatus {
    #[serde(rename = "MatchmakingSearching", alias = "Searching")]
    Searching,
    #[serde(rename = "PotentialMatchCreated")]
    PotentialMatchCreated,
    #[serde(rename = "MatchmakingSucceeded", alias = "Succeeded")]
    Succeeded,
    #[serde(rename = "MatchmakingFailed", alias = "Failed")]
    Failed,
    #[serde(rename = "MatchmakingTimedOut", alias = "TimedOut")]
    TimedOut,
    #[serde(rename = "MatchmakingCancelled", alias = "Cancelled")]
    Cancelled,
}

impl MatchmakingStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [MatchmakingStatus; 6] = [
        MatchmakingStatus::Searching,
        MatchmakingStatus::PotentialMatchCreated,
        MatchmakingStatus::Succeeded,
        MatchmakingStatus::Failed,
        MatchmakingStatus::TimedOut,
        MatchmakingStatus::Cancelled,
    ];

    /// Returns the wire name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchmakingStatus::Searching => "MatchmakingSearching",
            MatchmakingStatus::PotentialMatchCreated => "PotentialMatchCreated",
            MatchmakingStatus::Succeeded => "MatchmakingSucceeded",
            MatchmakingStatus::Failed => "MatchmakingFailed",
            MatchmakingStatus::TimedOut => "MatchmakingTimedOut",
            MatchmakingStatus::Cancelled => "MatchmakingCancelled",
        }
    }

    /// Maps a lifecycle event type to a status.
    ///
    /// Returns `None` for event types that do not correspond to a ticket
    /// status (e.g. `AcceptMatch`), so callers can skip them.
    pub fn from_event_type(event_type: &str) -> Option<Self> {
        match event_type {
            "MatchmakingSearching" | "Searching" => Some(MatchmakingStatus::Searching),
            "PotentialMatchCreated" => Some(MatchmakingStatus::PotentialMatchCreated),
            "MatchmakingSucceeded" | "Succeeded" => Some(MatchmakingStatus::Succeeded),
            "MatchmakingFailed" | "Failed" => Some(MatchmakingStatus::Failed),
            "MatchmakingTimedOut" | "TimedOut" => Some(MatchmakingStatus::TimedOut),
            "MatchmakingCancelled" | "Cancelled" => Some(MatchmakingStatus::Cancelled),
            _ => None,
        }
    }

    /// Returns true if no further matchmaking happens after this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MatchmakingStatus::Succeeded
                | MatchmakingStatus::Failed
                | MatchmakingStatus::TimedOut
                | MatchmakingStatus::Cancelled
        )
    }
}

impl std::fmt::Display for MatchmakingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The tracked state of a single matchmaking attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    /// Partition key, immutable after creation.
    pub ticket_id: TicketId,

    /// Current lifecycle stage.
    pub matchmaking_status: MatchmakingStatus,

    /// Session handle for the requesting player.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_session_id: Option<String>,

    /// Game server address. Only set once matchmaking succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    /// Game server port, stored as a string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_name: Option<String>,

    /// Expiry in epoch seconds, swept lazily by the storage layer. Zero means
    /// no expiry has been assigned.
    #[serde(default)]
    pub ttl: i64,
}

impl Ticket {
    /// Creates a ticket with the given id and status and no optional data.
    pub fn new(ticket_id: impl Into<TicketId>, status: MatchmakingStatus) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            matchmaking_status: status,
            player_session_id: None,
            ip: None,
            port: None,
            dns_name: None,
            ttl: 0,
        }
    }

    /// Sets the player session id.
    pub fn with_player_session(mut self, player_session_id: impl Into<String>) -> Self {
        self.player_session_id = Some(player_session_id.into());
        self
    }

    /// Sets the game server connection info.
    pub fn with_connection(
        mut self,
        ip: impl Into<String>,
        port: u16,
        dns_name: impl Into<String>,
    ) -> Self {
        self.ip = Some(ip.into());
        self.port = Some(port.to_string());
        self.dns_name = Some(dns_name.into());
        self
    }

    /// Sets the expiry.
    pub fn with_ttl(mut self, ttl: i64) -> Self {
        self.ttl = ttl;
        self
    }

    /// Returns true if any connection field is populated.
    pub fn has_connection_info(&self) -> bool {
        self.ip.is_some() || self.port.is_some() || self.dns_name.is_some()
    }
}

/// A partial ticket, as accepted by the creation path.
///
/// Missing fields are filled in by [`crate::TicketStore::create`]: a fresh
/// id, `Searching` status and a zero ttl.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketDraft {
    #[serde(default)]
    pub ticket_id: Option<TicketId>,
    #[serde(default)]
    pub matchmaking_status: Option<MatchmakingStatus>,
    #[serde(default)]
    pub player_session_id: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default)]
    pub dns_name: Option<String>,
}

impl TicketDraft {
    /// Creates an empty draft.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a caller-supplied id instead of a generated one.
    pub fn ticket_id(mut self, ticket_id: impl Into<TicketId>) -> Self {
        self.ticket_id = Some(ticket_id.into());
        self
    }

    pub fn status(mut self, status: MatchmakingStatus) -> Self {
        self.matchmaking_status = Some(status);
        self
    }

    pub fn player_session(mut self, player_session_id: impl Into<String>) -> Self {
        self.player_session_id = Some(player_session_id.into());
        self
    }

    /// Builds a full ticket under the given id, with a zero ttl.
    pub(crate) fn into_ticket(self, ticket_id: TicketId) -> Ticket {
        Ticket {
            ticket_id,
            matchmaking_status: self
                .matchmaking_status
                .unwrap_or(MatchmakingStatus::Searching),
            player_session_id: self.player_session_id,
            ip: self.ip,
            port: self.port,
            dns_name: self.dns_name,
            ttl: 0,
        }
    }
}
