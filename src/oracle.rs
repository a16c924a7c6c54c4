// =============================================================================
// Oracle Gateway Client — HMAC-SHA256 signed writes to the price oracle
// =============================================================================
//
// The on-chain oracle sits behind an HTTP gateway at RPC_URL. Calls are
// JSON-RPC shaped, address the contract at ORACLE_ADDRESS, and carry an
// HMAC-SHA256 signature over the canonical request body in the
// x-oracle-signature header.
//
// SECURITY: the signing key is never logged or serialized.
//
// The gateway enforces its own per-update change limit; a "price change too
// large" rejection is surfaced as a clean `None` so the caller can log it
// and move on — the smoothed weights converge over subsequent ticks.
// =============================================================================

use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, instrument, warn};

type HmacSha256 = Hmac<Sha256>;

/// Substring by which the gateway flags an over-limit price update.
const PRICE_CHANGE_REJECTION: &str = "price change too large";

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    message: String,
}

/// Client for the oracle gateway.
#[derive(Clone)]
pub struct OracleClient {
    rpc_url: String,
    oracle_address: String,
    signing_key: String,
    client: reqwest::Client,
}

impl OracleClient {
    pub fn new(
        rpc_url: impl Into<String>,
        oracle_address: impl Into<String>,
        signing_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");

        Self {
            rpc_url: rpc_url.into(),
            oracle_address: oracle_address.into(),
            signing_key: signing_key.into(),
            client,
        }
    }

    /// HMAC-SHA256 hex signature of `payload`.
    fn sign(&self, payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.signing_key.as_bytes())
            .expect("HMAC accepts any key size");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// POST one signed call and parse the JSON-RPC envelope.
    async fn call(&self, method: &str, params: serde_json::Value) -> Result<RpcResponse> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
            "address": self.oracle_address,
        });
        let canonical = body.to_string();
        let signature = self.sign(&canonical);

        let resp = self
            .client
            .post(&self.rpc_url)
            .header("x-oracle-signature", signature)
            .header("content-type", "application/json")
            .body(canonical)
            .send()
            .await
            .with_context(|| format!("oracle call {method} failed"))?;

        let status = resp.status();
        let envelope: RpcResponse = resp
            .json()
            .await
            .with_context(|| format!("failed to parse oracle response for {method}"))?;

        if !status.is_success() && envelope.error.is_none() {
            anyhow::bail!("oracle gateway returned {status} for {method}");
        }
        Ok(envelope)
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    /// Write the composite index and the four component prices atomically,
    /// all in micro-units (USD per gram, times 1e6).
    ///
    /// Returns `Ok(Some(tx_id))` on acceptance, `Ok(None)` when the gateway
    /// rejects the update for exceeding its per-update change limit, and
    /// `Err` for transport or protocol failures.
    #[instrument(skip(self), name = "oracle::set_price_with_metals")]
    pub async fn set_price_with_metals(
        &self,
        index_e6: u64,
        xau_e6: u64,
        xag_e6: u64,
        xpt_e6: u64,
        xpd_e6: u64,
    ) -> Result<Option<String>> {
        let params = serde_json::json!([index_e6, xau_e6, xag_e6, xpt_e6, xpd_e6]);
        let envelope = self.call("oracle_setPriceWithMetals", params).await?;

        if let Some(err) = envelope.error {
            if err.message.to_lowercase().contains(PRICE_CHANGE_REJECTION) {
                warn!(code = err.code, message = %err.message, "oracle rejected update");
                return Ok(None);
            }
            anyhow::bail!("oracle_setPriceWithMetals error {}: {}", err.code, err.message);
        }

        let tx_id = envelope
            .result
            .as_ref()
            .and_then(|v| v.as_str())
            .context("oracle_setPriceWithMetals returned no transaction id")?
            .to_string();
        debug!(tx_id = %tx_id, index_e6, "oracle update accepted");
        Ok(Some(tx_id))
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Currently published index in micro-units.
    #[instrument(skip(self), name = "oracle::get_price_e6")]
    pub async fn get_price_e6(&self) -> Result<u64> {
        let envelope = self.call("oracle_getPricePerOzE6", serde_json::json!([])).await?;
        Self::expect_u64(envelope, "oracle_getPricePerOzE6")
    }

    /// Unix timestamp (seconds) of the last accepted update.
    #[instrument(skip(self), name = "oracle::last_update_at")]
    pub async fn last_update_at(&self) -> Result<u64> {
        let envelope = self.call("oracle_lastUpdateAt", serde_json::json!([])).await?;
        Self::expect_u64(envelope, "oracle_lastUpdateAt")
    }

    /// Minimum seconds the oracle requires between updates. Used as the
    /// startup handshake: if this call fails the daemon refuses to start.
    #[instrument(skip(self), name = "oracle::min_update_interval")]
    pub async fn min_update_interval(&self) -> Result<u64> {
        let envelope = self.call("oracle_minUpdateInterval", serde_json::json!([])).await?;
        Self::expect_u64(envelope, "oracle_minUpdateInterval")
    }

    fn expect_u64(envelope: RpcResponse, method: &str) -> Result<u64> {
        if let Some(err) = envelope.error {
            anyhow::bail!("{method} error {}: {}", err.code, err.message);
        }
        envelope
            .result
            .as_ref()
            .and_then(|v| v.as_u64())
            .with_context(|| format!("{method} returned a non-integer result"))
    }
}

impl std::fmt::Debug for OracleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleClient")
            .field("rpc_url", &self.rpc_url)
            .field("oracle_address", &self.oracle_address)
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OracleClient {
        OracleClient::new("http://localhost:8545", "0xabc123", "test-signing-key")
    }

    #[test]
    fn signature_is_deterministic_hex() {
        let c = client();
        let sig1 = c.sign(r#"{"method":"oracle_setPriceWithMetals"}"#);
        let sig2 = c.sign(r#"{"method":"oracle_setPriceWithMetals"}"#);
        assert_eq!(sig1, sig2);
        // SHA-256 HMAC is 32 bytes, 64 hex chars.
        assert_eq!(sig1.len(), 64);
        assert!(sig1.chars().all(|ch| ch.is_ascii_hexdigit()));
        // A different payload signs differently.
        assert_ne!(sig1, c.sign("other payload"));
    }

    #[test]
    fn envelope_parses_result_and_error_variants() {
        let ok: RpcResponse = serde_json::from_str(r#"{"result": "0xdeadbeef"}"#).unwrap();
        assert_eq!(ok.result.as_ref().and_then(|v| v.as_str()), Some("0xdeadbeef"));
        assert!(ok.error.is_none());

        let err: RpcResponse = serde_json::from_str(
            r#"{"error": {"code": -32000, "message": "price change too large: 6.2% > 5.0%"}}"#,
        )
        .unwrap();
        let e = err.error.unwrap();
        assert_eq!(e.code, -32000);
        assert!(e.message.contains(PRICE_CHANGE_REJECTION));
    }

    #[test]
    fn expect_u64_accepts_integers_and_rejects_strings() {
        let ok: RpcResponse = serde_json::from_str(r#"{"result": 43200}"#).unwrap();
        assert_eq!(OracleClient::expect_u64(ok, "m").unwrap(), 43200);

        let bad: RpcResponse = serde_json::from_str(r#"{"result": "43200"}"#).unwrap();
        assert!(OracleClient::expect_u64(bad, "m").is_err());
    }

    #[test]
    fn debug_redacts_signing_key() {
        let rendered = format!("{:?}", client());
        assert!(!rendered.contains("test-signing-key"));
        assert!(rendered.contains("<redacted>"));
    }
}
