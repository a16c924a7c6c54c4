// =============================================================================
// Risk Moderator — market-state signals gating how fast the index may move
// =============================================================================
//
// Derives four signals from engine state and turns them into the control
// parameters consumed by the weight solver and the regime tracker:
//
//   1. Drawdown        — worst peak-to-trough decline of the index over the
//                        14-day window.
//   2. Corr stability  — how much the correlation matrix moved since the
//                        previous tick.
//   3. Dispersion      — normalized Shannon entropy of the weight vector.
//   4. Liquidity       — aggregate volatility stress from the estimator.
//
// Each signal trips a boolean gate at a fixed threshold; the gates scale the
// drift cap and the weight-transition speed multiplicatively, with hard
// floors so the index never freezes entirely.
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::history::MAX_INDEX_HISTORY;
use crate::metal::{Metal, MetalMap};
use crate::regime::{Regime, MIN_REGIME_DURATION};
use crate::volatility::CorrelationMatrix;

/// Base weight-transition speed before risk scaling.
pub const LAMBDA: f64 = 0.08;

/// Drawdown fraction above which conservative scaling kicks in.
const DRAWDOWN_TRIGGER: f64 = 0.05;
/// Correlation-stability score below which the market counts as fragmented.
const STABILITY_FLOOR: f64 = 0.7;
/// Liquidity-stress score above which caps contract further.
const LIQUIDITY_TRIGGER: f64 = 0.8;
/// Weight-dispersion score below which the diversify bias engages.
const DISPERSION_FLOOR: f64 = 0.15;

/// Hard floors on the moderated outputs.
const DRIFT_CAP_FLOOR: f64 = 0.005;
const WEIGHT_SPEED_FLOOR: f64 = 0.01;

// =============================================================================
// Types
// =============================================================================

/// Direction in which the weight solver should lean when rebalancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RebalanceBias {
    /// Pull targets toward band centers.
    Diversify,
    /// No adjustment.
    Neutral,
    /// Reserved; never produced by the moderator.
    Concentrate,
}

impl std::fmt::Display for RebalanceBias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Diversify => write!(f, "diversify"),
            Self::Neutral => write!(f, "neutral"),
            Self::Concentrate => write!(f, "concentrate"),
        }
    }
}

/// Control parameters produced by one moderation pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskAdjustedParams {
    /// Upper bound on daily fractional drift of the published index.
    pub drift_cap: f64,
    /// Exponential-smoothing rate for the weight vector, in (0, 1].
    pub weight_speed: f64,
    pub rebalance_bias: RebalanceBias,
    /// Whether the regime tracker may accept a candidate change this tick.
    pub allow_regime_change: bool,
}

/// Derived signals and gate states, exposed for the status API.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskSignals {
    pub drawdown: f64,
    pub correlation_stability: f64,
    pub weight_dispersion: f64,
    pub liquidity_stress: f64,
    pub drawdown_mode: bool,
    pub fragmented: bool,
    pub stressed_liquidity: bool,
    pub overconcentration: bool,
    pub regime_locked: bool,
}

// =============================================================================
// Signal computation
// =============================================================================

/// Worst peak-to-trough fractional decline over the tail of `series`.
///
/// Looks at the last `min(MAX_INDEX_HISTORY, len)` values with a running
/// maximum. Zero when fewer than two points exist.
pub fn max_drawdown(series: &[f64]) -> f64 {
    let window_start = series.len().saturating_sub(MAX_INDEX_HISTORY);
    let window = &series[window_start..];
    if window.len() < 2 {
        return 0.0;
    }

    let mut peak = f64::MIN;
    let mut worst = 0.0f64;
    for &value in window {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            let dd = (peak - value) / peak;
            if dd > worst {
                worst = dd;
            }
        }
    }
    worst
}

/// Correlation-structure stability in [0, 1]: 1 means the matrix did not
/// move since the previous tick, 0 means it moved by half a unit or more on
/// average across the off-diagonal entries.
pub fn correlation_stability(current: &CorrelationMatrix, previous: &CorrelationMatrix) -> f64 {
    let mean_diff = current.mean_upper_abs_diff(previous);
    (1.0 - 2.0 * mean_diff).max(0.0)
}

/// Normalized Shannon entropy of the weight vector in [0, 1]. Zero-weight
/// entries contribute nothing.
pub fn weight_dispersion(weights: &MetalMap<f64>) -> f64 {
    let mut entropy = 0.0;
    for (_, &w) in weights.iter() {
        if w > 0.0 {
            entropy -= w * w.ln();
        }
    }
    entropy / (Metal::COUNT as f64).ln()
}

// =============================================================================
// Moderation
// =============================================================================

/// Run one moderation pass over the current market state.
pub fn moderate(
    regime: Regime,
    regime_duration: u32,
    index_series: &[f64],
    correlations: &CorrelationMatrix,
    last_correlations: &CorrelationMatrix,
    weights: &MetalMap<f64>,
    liquidity_stress: f64,
) -> (RiskAdjustedParams, RiskSignals) {
    let drawdown = max_drawdown(index_series);
    let stability = correlation_stability(correlations, last_correlations);
    let dispersion = weight_dispersion(weights);

    let drawdown_mode = drawdown > DRAWDOWN_TRIGGER;
    let fragmented = stability < STABILITY_FLOOR;
    let stressed_liquidity = liquidity_stress > LIQUIDITY_TRIGGER;
    let overconcentration = dispersion < DISPERSION_FLOOR;
    let regime_locked = regime_duration < MIN_REGIME_DURATION;

    if drawdown_mode {
        warn!(
            drawdown = format!("{:.4}", drawdown),
            "drawdown mode active — halving drift cap and weight speed"
        );
    }
    if stressed_liquidity {
        warn!(
            liquidity_stress = format!("{:.2}", liquidity_stress),
            "liquidity stressed — contracting drift cap"
        );
    }

    let mut drift_cap = regime.params().daily_drift_cap;
    if drawdown_mode {
        drift_cap *= 0.5;
    }
    if stressed_liquidity {
        drift_cap *= 0.7;
    }
    drift_cap = drift_cap.max(DRIFT_CAP_FLOOR);

    let mut weight_speed = LAMBDA;
    if drawdown_mode {
        weight_speed *= 0.5;
    }
    if fragmented {
        weight_speed *= 0.3;
    }
    weight_speed = weight_speed.max(WEIGHT_SPEED_FLOOR);

    let rebalance_bias = if overconcentration {
        RebalanceBias::Diversify
    } else {
        RebalanceBias::Neutral
    };

    let params = RiskAdjustedParams {
        drift_cap,
        weight_speed,
        rebalance_bias,
        allow_regime_change: !regime_locked,
    };
    let signals = RiskSignals {
        drawdown,
        correlation_stability: stability,
        weight_dispersion: dispersion,
        liquidity_stress,
        drawdown_mode,
        fragmented,
        stressed_liquidity,
        overconcentration,
        regime_locked,
    };
    (params, signals)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn initial_weights() -> MetalMap<f64> {
        MetalMap::from_fn(|m| m.initial_weight())
    }

    #[test]
    fn drawdown_empty_and_single_point_are_zero() {
        assert!((max_drawdown(&[]) - 0.0).abs() < f64::EPSILON);
        assert!((max_drawdown(&[55.0]) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn drawdown_measures_peak_to_trough() {
        // Peak 100, trough 88; the later recovery does not erase it.
        let series = [90.0, 100.0, 95.0, 88.0, 99.0];
        assert!((max_drawdown(&series) - 0.12).abs() < 1e-12);
    }

    #[test]
    fn drawdown_monotone_decline() {
        let series: Vec<f64> = (0..100).map(|i| 100.0 - i as f64 * 0.1).collect();
        // Peak 100.0, final 90.1.
        assert!((max_drawdown(&series) - (100.0 - 90.1) / 100.0).abs() < 1e-9);
    }

    #[test]
    fn stability_is_one_for_identical_matrices() {
        let m = CorrelationMatrix::defaults();
        assert!((correlation_stability(&m, &m) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stability_drops_as_the_matrix_moves() {
        let defaults = CorrelationMatrix::defaults();
        // Opposed oscillations push sample correlations to -1 for adjacent
        // metals, far from the seeded positives.
        let prices = MetalMap::from_fn(|m| {
            let sign = if m.index() % 2 == 0 { 1.0 } else { -1.0 };
            let mut p = 100.0;
            (0..60)
                .map(|i| {
                    p *= 1.0 + sign * if i % 2 == 0 { 0.02 } else { -0.02 };
                    p
                })
                .collect::<Vec<f64>>()
        });
        let moved = CorrelationMatrix::from_prices(&prices);
        let s = correlation_stability(&moved, &defaults);
        assert!(s < STABILITY_FLOOR, "got {s}");
    }

    #[test]
    fn dispersion_is_one_for_uniform_weights() {
        let uniform = MetalMap::splat(0.25);
        assert!((weight_dispersion(&uniform) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn dispersion_shrinks_with_concentration() {
        let mut concentrated = MetalMap::splat(0.01);
        concentrated[Metal::Xau] = 0.97;
        let d = weight_dispersion(&concentrated);
        assert!(d < 0.25, "got {d}");
        // Zero entries contribute nothing rather than NaN.
        let mut with_zero = MetalMap::splat(0.0);
        with_zero[Metal::Xau] = 1.0;
        assert!((weight_dispersion(&with_zero) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn calm_market_yields_base_params() {
        let m = CorrelationMatrix::defaults();
        let (params, signals) = moderate(
            Regime::Low,
            10,
            &[55.0, 55.1, 55.05],
            &m,
            &m,
            &initial_weights(),
            0.0,
        );
        assert!((params.drift_cap - 0.03).abs() < f64::EPSILON);
        assert!((params.weight_speed - LAMBDA).abs() < f64::EPSILON);
        assert_eq!(params.rebalance_bias, RebalanceBias::Neutral);
        assert!(params.allow_regime_change);
        assert!(!signals.drawdown_mode);
        assert!(!signals.fragmented);
    }

    #[test]
    fn drawdown_mode_halves_cap_and_speed() {
        let m = CorrelationMatrix::defaults();
        // 10% decline trips the 5% trigger.
        let series: Vec<f64> = (0..50).map(|i| 100.0 * (1.0 - i as f64 * 0.002)).collect();
        let (params, signals) =
            moderate(Regime::Low, 10, &series, &m, &m, &initial_weights(), 0.0);
        assert!(signals.drawdown_mode);
        assert!((params.drift_cap - 0.015).abs() < f64::EPSILON);
        assert!((params.weight_speed - 0.04).abs() < f64::EPSILON);
    }

    #[test]
    fn liquidity_stress_contracts_drift_cap_further() {
        let m = CorrelationMatrix::defaults();
        let series: Vec<f64> = (0..50).map(|i| 100.0 * (1.0 - i as f64 * 0.002)).collect();
        let (params, signals) =
            moderate(Regime::Low, 10, &series, &m, &m, &initial_weights(), 0.9);
        assert!(signals.drawdown_mode);
        assert!(signals.stressed_liquidity);
        // 0.03 * 0.5 * 0.7 = 0.0105.
        assert!((params.drift_cap - 0.0105).abs() < 1e-12);
    }

    #[test]
    fn floors_hold_under_every_gate() {
        let m = CorrelationMatrix::defaults();
        let series: Vec<f64> = (0..50).map(|i| 100.0 * (1.0 - i as f64 * 0.002)).collect();
        let (params, _) = moderate(
            Regime::Extreme,
            10,
            &series,
            &m,
            &m,
            &initial_weights(),
            1.0,
        );
        assert!(params.weight_speed >= WEIGHT_SPEED_FLOOR);
        // Extreme regime, drawdown, stress: 0.01 * 0.5 * 0.7 = 0.0035 floors
        // at 0.005.
        assert!((params.drift_cap - DRIFT_CAP_FLOOR).abs() < f64::EPSILON);
    }

    #[test]
    fn overconcentration_requests_diversify() {
        let m = CorrelationMatrix::defaults();
        let mut weights = MetalMap::splat(0.0);
        weights[Metal::Xau] = 0.99;
        weights[Metal::Xag] = 0.01;
        let (params, signals) = moderate(Regime::Low, 10, &[], &m, &m, &weights, 0.0);
        assert!(signals.overconcentration);
        assert_eq!(params.rebalance_bias, RebalanceBias::Diversify);
    }

    #[test]
    fn regime_lock_blocks_change_permission() {
        let m = CorrelationMatrix::defaults();
        let (params, signals) = moderate(
            Regime::Low,
            MIN_REGIME_DURATION - 1,
            &[],
            &m,
            &m,
            &initial_weights(),
            0.0,
        );
        assert!(signals.regime_locked);
        assert!(!params.allow_regime_change);

        let (params, _) = moderate(
            Regime::Low,
            MIN_REGIME_DURATION,
            &[],
            &m,
            &m,
            &initial_weights(),
            0.0,
        );
        assert!(params.allow_regime_change);
    }
}
