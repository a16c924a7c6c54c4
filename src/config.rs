// =============================================================================
// Configuration — typed, env-backed, fatal on missing required keys
// =============================================================================
//
// Every recognized option lives here. The four credentials are required and
// construction fails without them (the process exits 1); everything else has
// a default. Nothing is persisted — configuration is read once at startup.
// =============================================================================

use anyhow::{Context, Result};
use tracing::info;

/// Default tick cadence: 5 minutes.
const DEFAULT_UPDATE_INTERVAL_MS: u64 = 300_000;

/// Default discovery-phase publish hours (UTC).
const DEFAULT_PUBLISH_HOURS: [u32; 2] = [0, 12];

/// Default bind address for the status API.
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";

/// Runtime configuration for the daemon.
#[derive(Clone)]
pub struct Config {
    /// Address of the oracle contract behind the gateway.
    pub oracle_address: String,
    /// HTTP endpoint of the oracle gateway.
    pub rpc_url: String,
    /// Signing key for oracle writes. Never logged.
    pub private_key: String,
    /// Token for the quote source. Never logged.
    pub quote_api_key: String,
    /// Tick cadence in milliseconds.
    pub update_interval_ms: u64,
    /// UTC hours at which discovery-phase publishes may fire.
    pub publish_hours_utc: Vec<u32>,
    /// Whether the publish-hour gate is active.
    pub discovery_phase: bool,
    /// Bind address for the status API.
    pub bind_addr: String,
}

impl Config {
    /// Build the configuration from the process environment.
    ///
    /// Missing or empty required variables and unparseable optional ones are
    /// construction errors; the caller treats them as fatal.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            oracle_address: required_var("ORACLE_ADDRESS")?,
            rpc_url: required_var("RPC_URL")?,
            private_key: required_var("PRIVATE_KEY")?,
            quote_api_key: required_var("QUOTE_API_KEY")?,
            update_interval_ms: match std::env::var("UPDATE_INTERVAL_MS") {
                Ok(raw) => raw
                    .trim()
                    .parse()
                    .with_context(|| format!("UPDATE_INTERVAL_MS is not an integer: '{raw}'"))?,
                Err(_) => DEFAULT_UPDATE_INTERVAL_MS,
            },
            publish_hours_utc: match std::env::var("PUBLISH_HOURS_UTC") {
                Ok(raw) => parse_publish_hours(&raw)?,
                Err(_) => DEFAULT_PUBLISH_HOURS.to_vec(),
            },
            discovery_phase: match std::env::var("DISCOVERY_PHASE") {
                Ok(raw) => parse_bool(&raw)
                    .with_context(|| format!("DISCOVERY_PHASE is not a boolean: '{raw}'"))?,
                Err(_) => true,
            },
            bind_addr: std::env::var("BULLION_BIND_ADDR")
                .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
        };

        info!(
            oracle_address = %config.oracle_address,
            rpc_url = %config.rpc_url,
            update_interval_ms = config.update_interval_ms,
            publish_hours = ?config.publish_hours_utc,
            discovery_phase = config.discovery_phase,
            "configuration loaded"
        );
        Ok(config)
    }
}

fn required_var(key: &str) -> Result<String> {
    let value = std::env::var(key)
        .with_context(|| format!("missing required environment variable {key}"))?;
    if value.trim().is_empty() {
        anyhow::bail!("required environment variable {key} is empty");
    }
    Ok(value)
}

/// Parse a comma-separated list of UTC hours, e.g. "0,12".
fn parse_publish_hours(raw: &str) -> Result<Vec<u32>> {
    let mut hours = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let hour: u32 = part
            .parse()
            .with_context(|| format!("PUBLISH_HOURS_UTC entry is not an integer: '{part}'"))?;
        if hour >= 24 {
            anyhow::bail!("PUBLISH_HOURS_UTC entry out of range (0-23): {hour}");
        }
        if !hours.contains(&hour) {
            hours.push(hour);
        }
    }
    if hours.is_empty() {
        anyhow::bail!("PUBLISH_HOURS_UTC contains no hours: '{raw}'");
    }
    Ok(hours)
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got '{other}'"),
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("oracle_address", &self.oracle_address)
            .field("rpc_url", &self.rpc_url)
            .field("private_key", &"<redacted>")
            .field("quote_api_key", &"<redacted>")
            .field("update_interval_ms", &self.update_interval_ms)
            .field("publish_hours_utc", &self.publish_hours_utc)
            .field("discovery_phase", &self.discovery_phase)
            .field("bind_addr", &self.bind_addr)
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_hours_parse_and_dedupe() {
        assert_eq!(parse_publish_hours("0,12").unwrap(), vec![0, 12]);
        assert_eq!(parse_publish_hours(" 6 , 18 ,6 ").unwrap(), vec![6, 18]);
        assert_eq!(parse_publish_hours("23").unwrap(), vec![23]);
    }

    #[test]
    fn publish_hours_reject_garbage() {
        assert!(parse_publish_hours("24").is_err());
        assert!(parse_publish_hours("noon").is_err());
        assert!(parse_publish_hours("").is_err());
        assert!(parse_publish_hours(",,").is_err());
    }

    #[test]
    fn bool_parsing_accepts_common_spellings() {
        assert!(parse_bool("true").unwrap());
        assert!(parse_bool("TRUE").unwrap());
        assert!(parse_bool("1").unwrap());
        assert!(!parse_bool("false").unwrap());
        assert!(!parse_bool("off").unwrap());
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = Config {
            oracle_address: "0xabc".into(),
            rpc_url: "http://localhost:8545".into(),
            private_key: "deadbeef-private".into(),
            quote_api_key: "goldapi-token".into(),
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            publish_hours_utc: DEFAULT_PUBLISH_HOURS.to_vec(),
            discovery_phase: true,
            bind_addr: DEFAULT_BIND_ADDR.into(),
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("deadbeef-private"));
        assert!(!rendered.contains("goldapi-token"));
        assert!(rendered.contains("<redacted>"));
    }
}
