//! Application configuration loaded from environment variables.

use reconciler::{DEFAULT_TTL_HORIZON_SECS, PrecedencePolicy};
use ticket_store::DEFAULT_CREATE_RETRIES;

/// Longest expiry horizon accepted from `TICKET_TTL_SECS` (30 days).
pub const MAX_TICKET_TTL_SECS: i64 = 30 * 24 * 3600;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; in-memory table when unset
/// - `TICKET_TTL_SECS`: expiry horizon for folded tickets, at most
///   [`MAX_TICKET_TTL_SECS`] (default: `3600`)
/// - `TICKET_CREATE_RETRIES`: retries on ticket id collision (default: `2`)
/// - `RECONCILER_STRICT_TERMINAL`: never replace a terminal status (default: `false`)
/// - `TICKET_SWEEP_INTERVAL_SECS`: how often expired tickets are purged from
///   PostgreSQL (default: `60`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub ticket_ttl_secs: i64,
    pub create_retries: u32,
    pub strict_terminal: bool,
    pub sweep_interval_secs: u64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            ticket_ttl_secs: lookup("TICKET_TTL_SECS")
                .and_then(|v| v.parse().ok())
                .filter(|secs: &i64| (1..=MAX_TICKET_TTL_SECS).contains(secs))
                .unwrap_or(defaults.ticket_ttl_secs),
            create_retries: lookup("TICKET_CREATE_RETRIES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.create_retries),
            strict_terminal: lookup("RECONCILER_STRICT_TERMINAL")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.strict_terminal),
            sweep_interval_secs: lookup("TICKET_SWEEP_INTERVAL_SECS")
                .and_then(|v| v.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .unwrap_or(defaults.sweep_interval_secs),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the staleness rule selected by configuration.
    pub fn precedence_policy(&self) -> PrecedencePolicy {
        if self.strict_terminal {
            PrecedencePolicy::StrictTerminal
        } else {
            PrecedencePolicy::Lenient
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            ticket_ttl_secs: DEFAULT_TTL_HORIZON_SECS,
            create_retries: DEFAULT_CREATE_RETRIES,
            strict_terminal: false,
            sweep_interval_secs: 60,
        }
    }
}
