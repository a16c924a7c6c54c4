// =============================================================================
// History Store — bounded in-memory rings for prices and index values
// =============================================================================
//
// Append-only ring buffers, oldest-out. Per-metal price history covers 24 h
// at the 5-minute cadence; the composite index history covers 14 days so the
// risk moderator can measure drawdown. Nothing is persisted — the engine
// warms up from domain defaults after a restart.
// =============================================================================

use std::collections::VecDeque;

use serde::Serialize;
use tracing::warn;

use crate::metal::{Metal, MetalMap};

/// Maximum retained price points per metal (24 h at 5-minute ticks).
pub const MAX_HISTORY_POINTS: usize = 288;

/// Maximum retained composite index values (14 days at 5-minute ticks).
pub const MAX_INDEX_HISTORY: usize = MAX_HISTORY_POINTS * 14;

/// A single observed price, immutable once stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PricePoint {
    pub timestamp_ms: i64,
    /// USD per gram, strictly positive.
    pub price: f64,
}

/// Bounded in-memory history for all four metals plus the composite index.
#[derive(Debug)]
pub struct HistoryStore {
    prices: MetalMap<VecDeque<PricePoint>>,
    index_values: VecDeque<f64>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self {
            prices: MetalMap::from_fn(|_| VecDeque::with_capacity(MAX_HISTORY_POINTS + 1)),
            index_values: VecDeque::with_capacity(MAX_INDEX_HISTORY + 1),
        }
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    /// Append a price observation for `metal`.
    ///
    /// Non-positive or non-finite prices are skipped without touching state.
    /// Timestamps are clamped so the series stays monotone non-decreasing.
    /// Returns whether the point was stored.
    pub fn record_price(&mut self, metal: Metal, timestamp_ms: i64, price: f64) -> bool {
        if !price.is_finite() || price <= 0.0 {
            warn!(metal = %metal, price, "skipping non-positive price observation");
            return false;
        }

        let ring = &mut self.prices[metal];
        let timestamp_ms = match ring.back() {
            Some(last) => timestamp_ms.max(last.timestamp_ms),
            None => timestamp_ms,
        };

        ring.push_back(PricePoint {
            timestamp_ms,
            price,
        });
        while ring.len() > MAX_HISTORY_POINTS {
            ring.pop_front();
        }
        true
    }

    /// Append a composite index value, trimming past the 14-day bound.
    pub fn record_index(&mut self, value: f64) {
        if !value.is_finite() {
            warn!(value, "skipping non-finite index value");
            return;
        }
        self.index_values.push_back(value);
        while self.index_values.len() > MAX_INDEX_HISTORY {
            self.index_values.pop_front();
        }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Number of stored price points for `metal`.
    pub fn len(&self, metal: Metal) -> usize {
        self.prices[metal].len()
    }

    /// Price values for `metal`, oldest first.
    pub fn price_values(&self, metal: Metal) -> Vec<f64> {
        self.prices[metal].iter().map(|p| p.price).collect()
    }

    /// Full price points for `metal`, oldest first.
    pub fn price_points(&self, metal: Metal) -> &VecDeque<PricePoint> {
        &self.prices[metal]
    }

    /// Composite index values, oldest first.
    pub fn index_values(&self) -> Vec<f64> {
        self.index_values.iter().copied().collect()
    }

    /// Number of stored composite index values.
    pub fn index_len(&self) -> usize {
        self.index_values.len()
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}
