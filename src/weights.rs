// =============================================================================
// Weight Solver & Index Composer — inverse-volatility targets under bounds
// =============================================================================
//
// Target weights are proportional to inverse volatility, clamped into each
// metal's hard band and renormalized to unit sum. The live weight vector
// moves toward the target by exponential smoothing at the risk-moderated
// rate, then passes a clamp + renormalize projection so every externally
// observable vector sums to one with each entry inside its band.
//
// Renormalizing after a single clamp can push an entry marginally past its
// band; that overshoot is accepted for the *target*. The post-smoothing pass
// instead iterates clamp + renormalize to a fixpoint, so the live vector
// satisfies both constraints at once.
// =============================================================================

use crate::metal::{Metal, MetalMap};
use crate::risk::RebalanceBias;

/// Grams per troy ounce; quotes arrive per ounce, the index is per gram.
pub const OUNCE_TO_GRAM: f64 = 31.1035;

/// Blend ratio for the diversification bias: keep 70% of the solved target,
/// pull 30% toward band centers.
const DIVERSIFY_KEEP: f64 = 0.7;
const DIVERSIFY_PULL: f64 = 0.3;

/// Iteration budget and band tolerance for the fixpoint projection. The
/// violation shrinks geometrically, so a handful of rounds is plenty.
const MAX_PROJECTION_ITERS: usize = 32;
const BAND_TOLERANCE: f64 = 1e-9;

/// Convert a per-troy-ounce USD quote to per gram.
pub fn per_gram(price_per_ounce: f64) -> f64 {
    price_per_ounce / OUNCE_TO_GRAM
}

/// Weight vector at engine startup.
pub fn initial_weights() -> MetalMap<f64> {
    MetalMap::from_fn(|m| m.initial_weight())
}

fn renormalize(weights: &mut MetalMap<f64>) {
    let total = weights.sum();
    if total > 0.0 && total.is_finite() {
        for metal in Metal::ALL {
            weights[metal] /= total;
        }
    }
}

fn clamp_to_bands(weights: &mut MetalMap<f64>) {
    for metal in Metal::ALL {
        let (lo, hi) = metal.weight_band();
        weights[metal] = weights[metal].clamp(lo, hi);
    }
}

fn within_bands(weights: &MetalMap<f64>, tolerance: f64) -> bool {
    Metal::ALL.iter().all(|&m| {
        let (lo, hi) = m.weight_band();
        weights[m] >= lo - tolerance && weights[m] <= hi + tolerance
    })
}

/// Project onto the intersection of the per-metal bands and the unit
/// simplex by repeating clamp + renormalize until both hold. The bands
/// admit a unit sum (min-sum 0.65, max-sum 1.25) so a fixpoint exists.
fn project_to_bands(weights: &mut MetalMap<f64>) {
    for _ in 0..MAX_PROJECTION_ITERS {
        clamp_to_bands(weights);
        renormalize(weights);
        if within_bands(weights, BAND_TOLERANCE) {
            break;
        }
    }
}

/// Unbounded inverse-volatility allocation, normalized to unit sum.
pub fn raw_targets(sigma: &MetalMap<f64>) -> MetalMap<f64> {
    let mut weights = MetalMap::from_fn(|m| 1.0 / sigma[m].max(1e-12));
    renormalize(&mut weights);
    weights
}

/// Solve the target weight vector for the given volatilities and bias.
///
/// Steps: inverse-volatility allocation, clamp to bands, renormalize, then
/// optionally pull toward band centers when the moderator asks for
/// diversification. The single renormalization may leave an entry
/// marginally past its band; the smoothing pass corrects that.
pub fn target_weights(sigma: &MetalMap<f64>, bias: RebalanceBias) -> MetalMap<f64> {
    let mut target = raw_targets(sigma);
    clamp_to_bands(&mut target);
    renormalize(&mut target);

    match bias {
        RebalanceBias::Diversify => {
            for metal in Metal::ALL {
                target[metal] =
                    DIVERSIFY_KEEP * target[metal] + DIVERSIFY_PULL * metal.band_center();
            }
            renormalize(&mut target);
        }
        RebalanceBias::Neutral | RebalanceBias::Concentrate => {}
    }
    target
}

/// One exponential-smoothing step from `current` toward `target` at rate
/// `speed`, followed by the band projection.
pub fn smooth_weights(
    current: &MetalMap<f64>,
    target: &MetalMap<f64>,
    speed: f64,
) -> MetalMap<f64> {
    let mut next = MetalMap::from_fn(|m| (1.0 - speed) * current[m] + speed * target[m]);
    project_to_bands(&mut next);
    next
}

/// Composite index value in USD per gram.
pub fn composite_index(weights: &MetalMap<f64>, prices_per_gram: &MetalMap<f64>) -> f64 {
    Metal::ALL
        .iter()
        .map(|&m| weights[m] * prices_per_gram[m])
        .sum()
}
