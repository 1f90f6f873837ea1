//! Lifecycle event payloads published by the matchmaking backend.

use serde::{Deserialize, Serialize};
use ticket_store::{MatchmakingStatus, TicketId};

/// One lifecycle notification covering one or more tickets.
///
/// Only the fields the fold consumes are modelled; anything else in the
/// payload is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchmakingEvent {
    /// Event type, e.g. `MatchmakingSucceeded`. Kept as a string so event
    /// types this crate does not know about still parse.
    #[serde(rename = "type")]
    pub event_type: String,

    #[serde(default)]
    pub tickets: Vec<EventTicket>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_session_info: Option<GameSessionInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTicket {
    pub ticket_id: TicketId,
    #[serde(default)]
    pub players: Vec<EventPlayer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPlayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_session_id: Option<String>,
}

/// Game server connection info. Populated by the backend once a match has
/// been placed on a game session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSessionInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_name: Option<String>,
}

impl MatchmakingEvent {
    /// Creates an event of the given status with no tickets.
    pub fn new(status: MatchmakingStatus) -> Self {
        Self {
            event_type: status.as_str().to_string(),
            tickets: Vec::new(),
            game_session_info: None,
        }
    }

    /// Adds a ticket with a single player session.
    pub fn ticket(mut self, ticket_id: impl Into<TicketId>, player_session_id: &str) -> Self {
        self.tickets.push(EventTicket {
            ticket_id: ticket_id.into(),
            players: vec![EventPlayer {
                player_id: None,
                player_session_id: Some(player_session_id.to_string()),
            }],
        });
        self
    }

    /// Sets the game session connection info.
    pub fn game_session(mut self, ip_address: &str, port: u16, dns_name: &str) -> Self {
        self.game_session_info = Some(GameSessionInfo {
            ip_address: Some(ip_address.to_string()),
            port: Some(port),
            dns_name: Some(dns_name.to_string()),
        });
        self
    }

    /// Returns the ticket status this event carries, or `None` if the type
    /// is not a ticket status.
    pub fn status(&self) -> Option<MatchmakingStatus> {
        MatchmakingStatus::from_event_type(&self.event_type)
    }
}

impl EventTicket {
    /// Session of the first player on the ticket. Tickets carry one player
    /// each in this game.
    pub fn player_session_id(&self) -> Option<&str> {
        self.players
            .first()
            .and_then(|p| p.player_session_id.as_deref())
    }
}

/// Parses a notification body.
///
/// Accepts either the bare event object or the notification envelope the
/// backend publishes, in which the event sits under `detail`.
pub fn parse_notification(body: &str) -> Result<MatchmakingEvent, serde_json::Error> {
    from_notification_value(serde_json::from_str(body)?)
}

/// Parses a body holding either one notification or a JSON array of them.
pub fn parse_notifications(body: &str) -> Result<Vec<MatchmakingEvent>, serde_json::Error> {
    match serde_json::from_str(body)? {
        serde_json::Value::Array(values) => {
            values.into_iter().map(from_notification_value).collect()
        }
        value => Ok(vec![from_notification_value(value)?]),
    }
}

fn from_notification_value(
    mut value: serde_json::Value,
) -> Result<MatchmakingEvent, serde_json::Error> {
    if let Some(detail) = value.get_mut("detail")
        && detail.is_object()
    {
        return serde_json::from_value(detail.take());
    }

    serde_json::from_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_event() {
        let body = r#"{
            "type": "MatchmakingSearching",
            "tickets": [{ "ticketId": "T1", "players": [{ "playerSessionId": "P1" }] }]
        }"#;

        let event = parse_notification(body).unwrap();
        assert_eq!(event.status(), Some(MatchmakingStatus::Searching));
        assert_eq!(event.tickets.len(), 1);
        assert_eq!(event.tickets[0].ticket_id, TicketId::new("T1"));
        assert_eq!(event.tickets[0].player_session_id(), Some("P1"));
        assert!(event.game_session_info.is_none());
    }

    #[test]
    fn unwraps_detail_envelope() {
        let body = r#"{
            "version": "0",
            "detail-type": "GameLift Matchmaking Event",
            "detail": {
                "type": "MatchmakingSucceeded",
                "tickets": [{
                    "ticketId": "T1",
                    "startTime": "2022-05-04T00:00:00.000Z",
                    "players": [{ "playerId": "player-1", "playerSessionId": "P1", "team": "red" }]
                }],
                "gameSessionInfo": { "ipAddress": "10.0.0.1", "port": 7777, "dnsName": "srv.example" },
                "matchId": "m-1"
            }
        }"#;

        let event = parse_notification(body).unwrap();
        assert_eq!(event.status(), Some(MatchmakingStatus::Succeeded));
        assert_eq!(event.tickets[0].players[0].player_id.as_deref(), Some("player-1"));
        let info = event.game_session_info.unwrap();
        assert_eq!(info.ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(info.port, Some(7777));
        assert_eq!(info.dns_name.as_deref(), Some("srv.example"));
    }

    #[test]
    fn unknown_event_type_still_parses() {
        let event = parse_notification(r#"{ "type": "AcceptMatch", "tickets": [] }"#).unwrap();
        assert_eq!(event.status(), None);
    }

    #[test]
    fn game_session_without_connection_parses() {
        let body = r#"{
            "type": "PotentialMatchCreated",
            "tickets": [{ "ticketId": "T1", "players": [] }],
            "gameSessionInfo": { "players": [{ "playerId": "player-1" }] }
        }"#;

        let event = parse_notification(body).unwrap();
        let info = event.game_session_info.unwrap();
        assert!(info.ip_address.is_none());
        assert_eq!(event.tickets[0].player_session_id(), None);
    }

    #[test]
    fn parses_array_of_notifications() {
        let body = r#"[
            { "detail": { "type": "MatchmakingSearching", "tickets": [] } },
            { "type": "MatchmakingFailed", "tickets": [{ "ticketId": "T1" }] }
        ]"#;

        let events = parse_notifications(body).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].status(), Some(MatchmakingStatus::Searching));
        assert_eq!(events[1].status(), Some(MatchmakingStatus::Failed));
        assert!(events[1].tickets[0].players.is_empty());
    }

    #[test]
    fn single_notification_parses_as_batch_of_one() {
        let events = parse_notifications(r#"{ "type": "MatchmakingTimedOut" }"#).unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].tickets.is_empty());
    }

    #[test]
    fn missing_type_is_an_error() {
        assert!(parse_notification(r#"{ "tickets": [] }"#).is_err());
        assert!(parse_notification("not json").is_err());
    }

    #[test]
    fn builder_matches_wire_shape() {
        let event = MatchmakingEvent::new(MatchmakingStatus::Succeeded)
            .ticket("T1", "P1")
            .game_session("10.0.0.1", 7777, "srv.example");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "MatchmakingSucceeded",
                "tickets": [{ "ticketId": "T1", "players": [{ "playerSessionId": "P1" }] }],
                "gameSessionInfo": { "ipAddress": "10.0.0.1", "port": 7777, "dnsName": "srv.example" }
            })
        );
    }
}
