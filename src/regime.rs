// =============================================================================
// Regime Classifier — aggregate volatility mapped to operating limits
// =============================================================================
//
// Classifies the market into one of four regimes from a weighted aggregate of
// per-metal volatility rescaled to a daily horizon. Each regime carries the
// conservative operating limits (drift caps, per-update change cap, update
// frequency multiplier) consumed downstream by the risk moderator.
//
// Thresholds on the daily-scale aggregate (inclusive lower, exclusive upper):
//
//   < 0.01          -> LOW
//   [0.01, 0.03)    -> MEDIUM
//   [0.03, 0.06)    -> HIGH
//   >= 0.06         -> EXTREME
//
// Regime changes are rate-limited by a minimum dwell time: the tracker must
// sit in a regime for MIN_REGIME_DURATION ticks before any candidate can
// replace it.
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::metal::{Metal, MetalMap};

/// Ticks a regime must persist before a change is accepted.
pub const MIN_REGIME_DURATION: u32 = 6;

/// Trading days per year, used to rescale annualized volatility to daily.
const TRADING_DAYS_PER_YEAR: f64 = 252.0;

// =============================================================================
// Types
// =============================================================================

/// Market regime over aggregate daily volatility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Regime {
    Low,
    Medium,
    High,
    Extreme,
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Extreme => write!(f, "EXTREME"),
        }
    }
}

/// Operating limits attached to a regime. Drift caps are fractional units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegimeParams {
    /// Upper bound on daily fractional drift of the published index.
    pub daily_drift_cap: f64,
    /// Upper bound on weekly fractional drift. Carried for completeness; the
    /// risk moderator does not currently consume it.
    pub weekly_drift_cap: f64,
    /// Maximum fractional price change accepted per oracle update.
    pub max_change_per_update: f64,
    /// Multiplier on the publication frequency.
    pub frequency_multiplier: f64,
}

impl Regime {
    /// Per-regime operating limits.
    pub const fn params(self) -> RegimeParams {
        match self {
            Self::Low => RegimeParams {
                daily_drift_cap: 0.03,
                weekly_drift_cap: 0.08,
                max_change_per_update: 0.05,
                frequency_multiplier: 1.0,
            },
            Self::Medium => RegimeParams {
                daily_drift_cap: 0.02,
                weekly_drift_cap: 0.05,
                max_change_per_update: 0.03,
                frequency_multiplier: 1.0,
            },
            Self::High => RegimeParams {
                daily_drift_cap: 0.015,
                weekly_drift_cap: 0.04,
                max_change_per_update: 0.02,
                frequency_multiplier: 0.5,
            },
            Self::Extreme => RegimeParams {
                daily_drift_cap: 0.01,
                weekly_drift_cap: 0.025,
                max_change_per_update: 0.01,
                frequency_multiplier: 0.25,
            },
        }
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Weighted aggregate of per-metal annualized volatility, rescaled to a
/// daily horizon. Gold dominates the blend the way it dominates the index.
pub fn aggregate_daily_volatility(sigma: &MetalMap<f64>) -> f64 {
    let weighted = 0.5 * sigma[Metal::Xau]
        + 0.2 * sigma[Metal::Xag]
        + 0.2 * sigma[Metal::Xpt]
        + 0.1 * sigma[Metal::Xpd];
    weighted / TRADING_DAYS_PER_YEAR.sqrt()
}

/// Map aggregate daily volatility to a candidate regime.
pub fn classify(daily_volatility: f64) -> Regime {
    if daily_volatility < 0.01 {
        Regime::Low
    } else if daily_volatility < 0.03 {
        Regime::Medium
    } else if daily_volatility < 0.06 {
        Regime::High
    } else {
        Regime::Extreme
    }
}

// =============================================================================
// RegimeTracker
// =============================================================================

/// Tracks the active regime and its dwell time across ticks.
#[derive(Debug, Clone, Serialize)]
pub struct RegimeTracker {
    current: Regime,
    /// Ticks since the last accepted regime change.
    duration: u32,
}

impl RegimeTracker {
    /// Fresh tracker: LOW regime, dwell counter at zero (locked).
    pub fn new() -> Self {
        Self {
            current: Regime::Low,
            duration: 0,
        }
    }

    #[cfg(test)]
    pub fn with_state(current: Regime, duration: u32) -> Self {
        Self { current, duration }
    }

    pub fn current(&self) -> Regime {
        self.current
    }

    pub fn duration(&self) -> u32 {
        self.duration
    }

    /// Whether the dwell-time rule currently forbids a regime change.
    pub fn locked(&self) -> bool {
        self.duration < MIN_REGIME_DURATION
    }

    /// Apply one tick's candidate under the permission computed by the risk
    /// moderator. Returns whether a change was accepted.
    ///
    /// The dwell counter increments on every tick that does not change the
    /// regime, including locked ticks; it resets to zero on an accepted
    /// change.
    pub fn advance(&mut self, candidate: Regime, allow_change: bool) -> bool {
        if allow_change && candidate != self.current {
            info!(
                from = %self.current,
                to = %candidate,
                dwell_ticks = self.duration,
                "regime change accepted"
            );
            self.current = candidate;
            self.duration = 0;
            return true;
        }

        if candidate != self.current {
            debug!(
                current = %self.current,
                candidate = %candidate,
                duration = self.duration,
                "regime change suppressed"
            );
        }
        self.duration += 1;
        false
    }
}

impl Default for RegimeTracker {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_thresholds_inclusive_lower_exclusive_upper() {
        assert_eq!(classify(0.0), Regime::Low);
        assert_eq!(classify(0.0099), Regime::Low);
        assert_eq!(classify(0.01), Regime::Medium);
        assert_eq!(classify(0.0299), Regime::Medium);
        assert_eq!(classify(0.03), Regime::High);
        assert_eq!(classify(0.0599), Regime::High);
        assert_eq!(classify(0.06), Regime::Extreme);
        assert_eq!(classify(0.50), Regime::Extreme);
    }

    #[test]
    fn aggregate_blends_and_rescales() {
        let sigma = MetalMap::from_fn(|m| m.default_volatility());
        // 0.5*0.12 + 0.2*0.22 + 0.2*0.18 + 0.1*0.30 = 0.17, daily-scaled.
        let expected = 0.17 / 252.0f64.sqrt();
        assert!((aggregate_daily_volatility(&sigma) - expected).abs() < 1e-12);
    }

    #[test]
    fn params_tighten_with_regime() {
        let low = Regime::Low.params();
        let extreme = Regime::Extreme.params();
        assert!((low.daily_drift_cap - 0.03).abs() < f64::EPSILON);
        assert!((low.weekly_drift_cap - 0.08).abs() < f64::EPSILON);
        assert!((extreme.daily_drift_cap - 0.01).abs() < f64::EPSILON);
        assert!((extreme.frequency_multiplier - 0.25).abs() < f64::EPSILON);
        assert!(low.daily_drift_cap > Regime::Medium.params().daily_drift_cap);
        assert!(Regime::Medium.params().daily_drift_cap > Regime::High.params().daily_drift_cap);
        assert!(Regime::High.params().daily_drift_cap > extreme.daily_drift_cap);
    }

    #[test]
    fn fresh_tracker_is_locked_in_low() {
        let tracker = RegimeTracker::new();
        assert_eq!(tracker.current(), Regime::Low);
        assert!(tracker.locked());
    }

    #[test]
    fn locked_tracker_retains_regime_and_keeps_counting() {
        let mut tracker = RegimeTracker::with_state(Regime::Low, 2);
        // Candidate EXTREME while locked: regime held, counter advances.
        for expected_duration in 3..=MIN_REGIME_DURATION {
            let changed = tracker.advance(Regime::Extreme, !tracker.locked());
            assert!(!changed);
            assert_eq!(tracker.current(), Regime::Low);
            assert_eq!(tracker.duration(), expected_duration);
        }
        // Dwell satisfied: the next tick accepts the change and resets.
        assert!(!tracker.locked());
        let changed = tracker.advance(Regime::Extreme, !tracker.locked());
        assert!(changed);
        assert_eq!(tracker.current(), Regime::Extreme);
        assert_eq!(tracker.duration(), 0);
    }

    #[test]
    fn unlocked_same_candidate_increments_duration() {
        let mut tracker = RegimeTracker::with_state(Regime::Medium, 10);
        let changed = tracker.advance(Regime::Medium, true);
        assert!(!changed);
        assert_eq!(tracker.current(), Regime::Medium);
        assert_eq!(tracker.duration(), 11);
    }

    #[test]
    fn change_denied_without_permission() {
        let mut tracker = RegimeTracker::with_state(Regime::Low, 20);
        let changed = tracker.advance(Regime::High, false);
        assert!(!changed);
        assert_eq!(tracker.current(), Regime::Low);
        assert_eq!(tracker.duration(), 21);
    }

    #[test]
    fn display_labels() {
        assert_eq!(format!("{}", Regime::Low), "LOW");
        assert_eq!(format!("{}", Regime::Extreme), "EXTREME");
    }
}
