//! Ticket schema validation.
//!
//! The ticket schema is a JSON Schema document embedded at build time. It is
//! compiled once into a [`jsonschema::Validator`] on first use and then
//! applied to the JSON form of every ticket before it is written.

use std::sync::LazyLock;

use serde_json::Value;
use thiserror::Error;

use crate::{MatchmakingStatus, Ticket};

const TICKET_SCHEMA: &str = include_str!("../schema/matchmaking-ticket.schema.json");

static TICKET_VALIDATOR: LazyLock<jsonschema::Validator> = LazyLock::new(|| {
    let schema: Value =
        serde_json::from_str(TICKET_SCHEMA).expect("embedded ticket schema must be valid JSON");
    compile(&schema).expect("embedded ticket schema must compile")
});

/// A ticket failed schema validation. Carries the first violation found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    fn from_schema_error(error: &jsonschema::ValidationError<'_>) -> Self {
        let path = error.instance_path.to_string();
        if path.is_empty() {
            Self::new(error.to_string())
        } else {
            Self::new(format!("{path}: {error}"))
        }
    }
}

/// Validates a ticket against the embedded schema and the connection-info
/// rules.
pub fn validate(ticket: &Ticket) -> Result<(), ValidationError> {
    let value = serde_json::to_value(ticket)
        .map_err(|e| ValidationError::new(format!("unserializable ticket: {e}")))?;
    validate_value(&value)?;
    check_connection_info(ticket)
}

/// Validates a raw JSON value against the embedded schema.
///
/// Only the schema rules run here; cross-field rules need a typed ticket.
pub fn validate_value(value: &Value) -> Result<(), ValidationError> {
    check_schema(&TICKET_VALIDATOR, value)
}

fn compile(schema: &Value) -> Result<jsonschema::Validator, ValidationError> {
    jsonschema::options()
        .should_validate_formats(true)
        .build(schema)
        .map_err(|e| ValidationError::new(format!("invalid schema: {e}")))
}

fn check_schema(validator: &jsonschema::Validator, value: &Value) -> Result<(), ValidationError> {
    match validator.iter_errors(value).next() {
        Some(error) => Err(ValidationError::from_schema_error(&error)),
        None => Ok(()),
    }
}

/// Connection info is present exactly when matchmaking succeeded.
fn check_connection_info(ticket: &Ticket) -> Result<(), ValidationError> {
    if ticket.matchmaking_status == MatchmakingStatus::Succeeded {
        let fields = [
            ("ip", ticket.ip.is_some()),
            ("port", ticket.port.is_some()),
            ("dnsName", ticket.dns_name.is_some()),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, present)| !present) {
            return Err(ValidationError::new(format!(
                "must have property '{name}' when matchmakingStatus is {}",
                MatchmakingStatus::Succeeded
            )));
        }
    } else if ticket.has_connection_info() {
        return Err(ValidationError::new(format!(
            "must NOT have connection info when matchmakingStatus is {}",
            ticket.matchmaking_status
        )));
    }

    if let Some(ref port) = ticket.port {
        match port.parse::<u16>() {
            Ok(p) if p > 0 => {}
            _ => {
                return Err(ValidationError::new(
                    "/port must be a port number between 1 and 65535",
                ));
            }
        }
    }

    Ok(())
}
