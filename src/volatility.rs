// =============================================================================
// Volatility Estimator — log-return statistics over sparse history
// =============================================================================
//
// Annualized volatility per metal and pairwise Pearson correlations, with
// domain-default fallbacks while the history rings warm up. All statistics
// use the population divisor (n, not n-1).
//
// Volatility pipeline per metal:
//   1. < 12 price points          -> per-metal domain default
//   2. < 5 usable log returns    -> flat fallback 0.15
//   3. population std of returns, annualized by sqrt(105120), clamped to
//      [0.05, 0.80]
// =============================================================================

use serde::Serialize;

use crate::metal::{Metal, MetalMap};

/// Minimum price points before a sample volatility is trusted.
pub const MIN_POINTS_FOR_VOLATILITY: usize = 12;

/// Minimum usable log returns before the sample std is trusted.
const MIN_RETURNS: usize = 5;

/// Volatility reported when history exists but returns are too sparse.
const SPARSE_RETURNS_VOLATILITY: f64 = 0.15;

/// 5-minute periods per year (365.25 days / 5 min ~ 105 120).
const PERIODS_PER_YEAR: f64 = 105_120.0;

/// Clamp band for the final annualized estimate.
const VOLATILITY_FLOOR: f64 = 0.05;
const VOLATILITY_CEIL: f64 = 0.80;

/// Minimum price points (per side) before a sample correlation is trusted.
pub const MIN_POINTS_FOR_CORRELATION: usize = 20;

/// Most recent points considered when correlating two series.
const CORRELATION_WINDOW: usize = 100;

// =============================================================================
// Log returns
// =============================================================================

/// Continuously compounded returns `ln(p_i / p_{i-1})`.
///
/// Any consecutive pair containing a non-positive price is skipped, so the
/// output may be shorter than `prices.len() - 1`.
pub fn log_returns(prices: &[f64]) -> Vec<f64> {
    let mut returns = Vec::with_capacity(prices.len().saturating_sub(1));
    for pair in prices.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if prev > 0.0 && next > 0.0 {
            let r = (next / prev).ln();
            if r.is_finite() {
                returns.push(r);
            }
        }
    }
    returns
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

// =============================================================================
// Annualized volatility
// =============================================================================

/// Annualized volatility for one metal's price series (oldest first).
///
/// Total: always returns a usable value, falling back to domain defaults when
/// the series is too sparse for a sample estimate.
pub fn annualized_volatility(prices: &[f64], metal: Metal) -> f64 {
    if prices.len() < MIN_POINTS_FOR_VOLATILITY {
        return metal.default_volatility();
    }

    let returns = log_returns(prices);
    if returns.len() < MIN_RETURNS {
        return SPARSE_RETURNS_VOLATILITY;
    }

    let mu = mean(&returns);
    let variance =
        returns.iter().map(|r| (r - mu) * (r - mu)).sum::<f64>() / returns.len() as f64;
    let sigma = variance.sqrt() * PERIODS_PER_YEAR.sqrt();

    if !sigma.is_finite() {
        return metal.default_volatility();
    }
    sigma.clamp(VOLATILITY_FLOOR, VOLATILITY_CEIL)
}

// =============================================================================
// Pairwise correlation
// =============================================================================

/// Pearson correlation of log returns between two metals' price series.
///
/// Falls back to the seeded domain correlation while either series has fewer
/// than [`MIN_POINTS_FOR_CORRELATION`] points. A zero denominator (e.g. a
/// constant series) yields 0.
pub fn pairwise_correlation(a: &[f64], b: &[f64], metal_a: Metal, metal_b: Metal) -> f64 {
    if a.len() < MIN_POINTS_FOR_CORRELATION || b.len() < MIN_POINTS_FOR_CORRELATION {
        return Metal::default_correlation(metal_a, metal_b);
    }

    let window = a.len().min(b.len()).min(CORRELATION_WINDOW);
    let ra = log_returns(&a[a.len() - window..]);
    let rb = log_returns(&b[b.len() - window..]);

    // Skipped non-positive pairs can leave the two return series with
    // different lengths; keep the most recent overlap.
    let n = ra.len().min(rb.len());
    if n < 2 {
        return 0.0;
    }
    let ra = &ra[ra.len() - n..];
    let rb = &rb[rb.len() - n..];

    let mean_a = mean(ra);
    let mean_b = mean(rb);

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let da = ra[i] - mean_a;
        let db = rb[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    let denom = (var_a * var_b).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    (cov / denom).clamp(-1.0, 1.0)
}

// =============================================================================
// Correlation matrix
// =============================================================================

/// 4x4 symmetric correlation matrix over [`Metal::ALL`], diagonal 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    cells: [[f64; Metal::COUNT]; Metal::COUNT],
}

impl CorrelationMatrix {
    /// Matrix seeded with the domain-default correlations.
    pub fn defaults() -> Self {
        let mut cells = [[1.0; Metal::COUNT]; Metal::COUNT];
        for a in Metal::ALL {
            for b in Metal::ALL {
                cells[a.index()][b.index()] = Metal::default_correlation(a, b);
            }
        }
        Self { cells }
    }

    /// Compute the sample matrix from per-metal price series (oldest first).
    pub fn from_prices(prices: &MetalMap<Vec<f64>>) -> Self {
        let mut cells = [[1.0; Metal::COUNT]; Metal::COUNT];
        for (i, a) in Metal::ALL.iter().copied().enumerate() {
            for b in Metal::ALL.iter().copied().skip(i + 1) {
                let rho = pairwise_correlation(&prices[a], &prices[b], a, b);
                cells[a.index()][b.index()] = rho;
                cells[b.index()][a.index()] = rho;
            }
        }
        Self { cells }
    }

    pub fn get(&self, a: Metal, b: Metal) -> f64 {
        self.cells[a.index()][b.index()]
    }

    /// Mean absolute difference over the six upper-triangle off-diagonal
    /// entries. The correlation-stability signal is derived from this.
    pub fn mean_upper_abs_diff(&self, other: &Self) -> f64 {
        let mut total = 0.0;
        let mut count = 0usize;
        for (i, a) in Metal::ALL.iter().copied().enumerate() {
            for b in Metal::ALL.iter().copied().skip(i + 1) {
                total += (self.get(a, b) - other.get(a, b)).abs();
                count += 1;
            }
        }
        total / count as f64
    }
}

// =============================================================================
// Liquidity stress
// =============================================================================

/// Aggregate liquidity-stress score in [0, 1].
///
/// Each metal contributes `0.5 * (sigma / sigma_default - 1.5)` once its
/// volatility runs more than 1.5x its domain default; the sum is halved and
/// clamped.
pub fn liquidity_stress(sigma: &MetalMap<f64>) -> f64 {
    let mut total = 0.0;
    for (metal, &s) in sigma.iter() {
        let ratio = s / metal.default_volatility();
        if ratio > 1.5 {
            total += 0.5 * (ratio - 1.5);
        }
    }
    (total / 2.0).clamp(0.0, 1.0)
}
