// =============================================================================
// Index Engine — the stateful numerical pipeline behind the published index
// =============================================================================
//
// One Engine value owns all mutable state for the process lifetime. Each
// tick runs the full pipeline synchronously:
//
//   quotes -> history append -> volatility + correlations -> regime candidate
//          -> risk moderation (gates the regime change) -> weight smoothing
//          -> composite index -> publication gate
//
// The caller performs all I/O (quote fetches, oracle writes) around `tick`;
// the engine itself never suspends. A tick either mutates state completely
// or not at all: invalid quotes abort before the first history append.
// =============================================================================

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::history::HistoryStore;
use crate::metal::{Metal, MetalMap};
use crate::publish::PublicationGate;
use crate::regime::{self, Regime, RegimeTracker};
use crate::risk::{self, RiskAdjustedParams, RiskSignals};
use crate::volatility::{self, CorrelationMatrix};
use crate::weights;

/// Everything one tick produced, for publication and the status API.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub timestamp_ms: i64,
    /// Ingested prices, already converted to USD per gram.
    pub prices_per_gram: MetalMap<f64>,
    pub sigma: MetalMap<f64>,
    pub regime: Regime,
    pub regime_duration: u32,
    pub regime_changed: bool,
    pub params: RiskAdjustedParams,
    pub signals: RiskSignals,
    pub weights: MetalMap<f64>,
    /// Composite index value in USD per gram.
    pub index_value: f64,
    /// Whether the publication gate opened for this tick.
    pub publish: bool,
    pub tick_count: u64,
}

/// The index engine. Owned by the tick loop; never shared mutably.
pub struct Engine {
    history: HistoryStore,
    weights: MetalMap<f64>,
    regime: RegimeTracker,
    last_correlations: CorrelationMatrix,
    gate: PublicationGate,
    tick_count: u64,
}

impl Engine {
    /// Engine with warm-up defaults: initial weights, LOW regime, seeded
    /// correlation matrix, empty histories.
    pub fn new(gate: PublicationGate) -> Self {
        Self {
            history: HistoryStore::new(),
            weights: weights::initial_weights(),
            regime: RegimeTracker::new(),
            last_correlations: CorrelationMatrix::defaults(),
            gate,
            tick_count: 0,
        }
    }

    /// Run one full pipeline pass.
    ///
    /// `quotes_per_ounce` must hold a positive, finite USD-per-troy-ounce
    /// price for every metal; otherwise the tick is abandoned with no state
    /// change (the caller already fetched all four, so a bad value here
    /// means the quote source misbehaved).
    pub fn tick(
        &mut self,
        now: DateTime<Utc>,
        quotes_per_ounce: MetalMap<f64>,
    ) -> Result<TickReport> {
        for (metal, &quote) in quotes_per_ounce.iter() {
            if !quote.is_finite() || quote <= 0.0 {
                bail!("non-positive quote for {metal}: {quote}");
            }
        }

        // ── C1: ingest ───────────────────────────────────────────────────
        let timestamp_ms = now.timestamp_millis();
        let prices_per_gram = MetalMap::from_fn(|m| weights::per_gram(quotes_per_ounce[m]));
        for metal in Metal::ALL {
            self.history
                .record_price(metal, timestamp_ms, prices_per_gram[metal]);
        }

        // ── C2: volatility, correlations, liquidity ──────────────────────
        let price_series = MetalMap::from_fn(|m| self.history.price_values(m));
        let sigma =
            MetalMap::from_fn(|m| volatility::annualized_volatility(&price_series[m], m));
        let correlations = CorrelationMatrix::from_prices(&price_series);
        let liquidity = volatility::liquidity_stress(&sigma);

        // ── C3: regime candidate ─────────────────────────────────────────
        let daily_vol = regime::aggregate_daily_volatility(&sigma);
        let candidate = regime::classify(daily_vol);

        // ── C4: risk moderation (gates the regime change) ────────────────
        let index_series = self.history.index_values();
        let (params, signals) = risk::moderate(
            self.regime.current(),
            self.regime.duration(),
            &index_series,
            &correlations,
            &self.last_correlations,
            &self.weights,
            liquidity,
        );
        let regime_changed = self.regime.advance(candidate, params.allow_regime_change);

        // ── C5: weights and composite index ──────────────────────────────
        let target = weights::target_weights(&sigma, params.rebalance_bias);
        self.weights = weights::smooth_weights(&self.weights, &target, params.weight_speed);
        let index_value = weights::composite_index(&self.weights, &prices_per_gram);
        self.history.record_index(index_value);

        self.last_correlations = correlations;
        self.tick_count += 1;

        // ── C6: publication gate ─────────────────────────────────────────
        let publish = self.gate.should_publish(now);

        info!(
            tick = self.tick_count,
            index = format!("{:.4}", index_value),
            regime = %self.regime.current(),
            daily_vol = format!("{:.4}", daily_vol),
            drift_cap = params.drift_cap,
            weight_speed = params.weight_speed,
            publish,
            "tick complete"
        );
        debug!(
            xau = format!("{:.4}", self.weights[Metal::Xau]),
            xag = format!("{:.4}", self.weights[Metal::Xag]),
            xpt = format!("{:.4}", self.weights[Metal::Xpt]),
            xpd = format!("{:.4}", self.weights[Metal::Xpd]),
            "weights after smoothing"
        );

        Ok(TickReport {
            timestamp_ms,
            prices_per_gram,
            sigma,
            regime: self.regime.current(),
            regime_duration: self.regime.duration(),
            regime_changed,
            params,
            signals,
            weights: self.weights,
            index_value,
            publish,
            tick_count: self.tick_count,
        })
    }

    pub fn weights(&self) -> &MetalMap<f64> {
        &self.weights
    }

    pub fn regime(&self) -> Regime {
        self.regime.current()
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }
}
