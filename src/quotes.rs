// =============================================================================
// Quote Source Client — goldapi.io spot prices
// =============================================================================
//
// One GET per metal per tick, authenticated with the x-access-token header.
// Requests are spaced ~1.5 s apart to respect the provider's rate limits.
// Non-2xx responses, malformed JSON and non-positive prices are all fetch
// failures; the tick driver abandons the tick on the first one.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::metal::{Metal, MetalMap};

/// Cooperative pause between consecutive quote requests.
pub const FETCH_SPACING: Duration = Duration::from_millis(1500);

const BASE_URL: &str = "https://www.goldapi.io/api";

/// Quote payload as returned by the API. Only `price` is load-bearing.
#[derive(Debug, Clone, Deserialize)]
pub struct Quote {
    /// USD per troy ounce.
    pub price: f64,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// REST client for the metal quote source.
#[derive(Clone)]
pub struct QuoteClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl QuoteClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();

        let mut default_headers = HeaderMap::new();
        if let Ok(val) = HeaderValue::from_str(&api_key) {
            default_headers.insert("x-access-token", val);
        }

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");

        Self {
            api_key,
            base_url: BASE_URL.to_string(),
            client,
        }
    }

    /// Fetch the spot price for one metal in USD per troy ounce.
    #[instrument(skip(self), name = "quotes::fetch")]
    pub async fn fetch(&self, metal: Metal) -> Result<f64> {
        let url = format!("{}/{}/USD", self.base_url, metal.code());

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("quote request for {metal} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("quote source returned {status} for {metal}: {body}");
        }

        let quote: Quote = resp
            .json()
            .await
            .with_context(|| format!("failed to parse quote response for {metal}"))?;

        if !quote.price.is_finite() || quote.price <= 0.0 {
            anyhow::bail!("quote source returned non-positive price for {metal}: {}", quote.price);
        }

        debug!(metal = %metal, price = quote.price, "quote fetched");
        Ok(quote.price)
    }

    /// Fetch all four metals in canonical order with the cooperative pause
    /// between requests. Fails fast on the first error.
    pub async fn fetch_all(&self) -> Result<MetalMap<f64>> {
        let mut quotes = MetalMap::splat(0.0);
        for (i, metal) in Metal::ALL.iter().copied().enumerate() {
            if i > 0 {
                tokio::time::sleep(FETCH_SPACING).await;
            }
            quotes[metal] = self.fetch(metal).await?;
        }
        Ok(quotes)
    }
}

impl std::fmt::Debug for QuoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuoteClient")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}
