// =============================================================================
// Shared State — snapshot bridge between the tick loop and the status API
// =============================================================================
//
// The engine is owned by the tick loop and never shared. After each tick the
// loop publishes a serializable snapshot here; the status API only ever
// reads clones. A version counter lets clients detect staleness cheaply.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::engine::TickReport;
use crate::metal::Metal;
use crate::regime::Regime;
use crate::risk::RebalanceBias;

/// Per-metal row in the status payload.
#[derive(Debug, Clone, Serialize)]
pub struct MetalSnapshot {
    pub metal: String,
    pub name: String,
    pub price_usd_per_gram: f64,
    pub weight: f64,
    pub volatility: f64,
}

/// Serializable snapshot of the most recent completed tick.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    /// ISO 8601 timestamp of when the snapshot was taken.
    pub updated_at: String,
    pub tick_count: u64,
    pub index_usd_per_gram: f64,
    pub regime: Regime,
    pub regime_duration: u32,
    pub drift_cap: f64,
    pub weight_speed: f64,
    pub rebalance_bias: RebalanceBias,
    pub drawdown: f64,
    pub correlation_stability: f64,
    pub weight_dispersion: f64,
    pub liquidity_stress: f64,
    pub metals: Vec<MetalSnapshot>,
    /// Whether this tick's update was accepted by the oracle.
    pub published: bool,
}

impl EngineSnapshot {
    pub fn from_report(report: &TickReport, published: bool) -> Self {
        let metals = Metal::ALL
            .iter()
            .copied()
            .map(|m| MetalSnapshot {
                metal: m.code().to_string(),
                name: m.name().to_string(),
                price_usd_per_gram: report.prices_per_gram[m],
                weight: report.weights[m],
                volatility: report.sigma[m],
            })
            .collect();

        Self {
            updated_at: Utc::now().to_rfc3339(),
            tick_count: report.tick_count,
            index_usd_per_gram: report.index_value,
            regime: report.regime,
            regime_duration: report.regime_duration,
            drift_cap: report.params.drift_cap,
            weight_speed: report.params.weight_speed,
            rebalance_bias: report.params.rebalance_bias,
            drawdown: report.signals.drawdown,
            correlation_stability: report.signals.correlation_stability,
            weight_dispersion: report.signals.weight_dispersion,
            liquidity_stress: report.signals.liquidity_stress,
            metals,
            published,
        }
    }
}

/// State shared with the status API.
pub struct SharedState {
    /// Monotonically increasing, bumped on every stored snapshot.
    pub state_version: AtomicU64,
    snapshot: RwLock<Option<EngineSnapshot>>,
}

impl SharedState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state_version: AtomicU64::new(0),
            snapshot: RwLock::new(None),
        })
    }

    /// Store the latest snapshot and bump the version.
    pub fn update(&self, snapshot: EngineSnapshot) {
        *self.snapshot.write() = Some(snapshot);
        self.state_version.fetch_add(1, Ordering::Relaxed);
    }

    /// Clone out the latest snapshot, if any tick has completed yet.
    pub fn snapshot(&self) -> Option<EngineSnapshot> {
        self.snapshot.read().clone()
    }
}
