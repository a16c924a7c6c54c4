// =============================================================================
// Metal identity and per-metal constants
// =============================================================================
//
// The index tracks exactly four precious metals. Everything "per metal" in
// the engine iterates `Metal::ALL` in this fixed order so that weight
// vectors, volatility maps and the correlation matrix always line up.
// =============================================================================

use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// The four metals composing the index, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metal {
    /// Gold.
    Xau,
    /// Silver.
    Xag,
    /// Platinum.
    Xpt,
    /// Palladium.
    Xpd,
}

impl Metal {
    /// All metals in canonical order. Iteration order is a contract: weight
    /// vectors and the correlation matrix are indexed by position in this
    /// array.
    pub const ALL: [Metal; 4] = [Metal::Xau, Metal::Xag, Metal::Xpt, Metal::Xpd];

    pub const COUNT: usize = 4;

    /// Position in [`Metal::ALL`].
    pub fn index(self) -> usize {
        match self {
            Self::Xau => 0,
            Self::Xag => 1,
            Self::Xpt => 2,
            Self::Xpd => 3,
        }
    }

    /// ISO 4217 metal code, as used by the quote API path.
    pub fn code(self) -> &'static str {
        match self {
            Self::Xau => "XAU",
            Self::Xag => "XAG",
            Self::Xpt => "XPT",
            Self::Xpd => "XPD",
        }
    }

    /// Human-readable name for logs and the status API.
    pub fn name(self) -> &'static str {
        match self {
            Self::Xau => "gold",
            Self::Xag => "silver",
            Self::Xpt => "platinum",
            Self::Xpd => "palladium",
        }
    }

    /// Fallback annualized volatility used until enough price history has
    /// accumulated for a real estimate.
    pub fn default_volatility(self) -> f64 {
        match self {
            Self::Xau => 0.12,
            Self::Xag => 0.22,
            Self::Xpt => 0.18,
            Self::Xpd => 0.30,
        }
    }

    /// Hard `(min, max)` band for this metal's index weight.
    pub fn weight_band(self) -> (f64, f64) {
        match self {
            Self::Xau => (0.35, 0.55),
            Self::Xag => (0.15, 0.30),
            Self::Xpt => (0.10, 0.25),
            Self::Xpd => (0.05, 0.15),
        }
    }

    /// Midpoint of the weight band; the diversification bias pulls targets
    /// toward this point.
    pub fn band_center(self) -> f64 {
        let (lo, hi) = self.weight_band();
        (lo + hi) / 2.0
    }

    /// Weight assigned at engine startup, before any smoothing has run.
    pub fn initial_weight(self) -> f64 {
        match self {
            Self::Xau => 0.45,
            Self::Xag => 0.22,
            Self::Xpt => 0.18,
            Self::Xpd => 0.15,
        }
    }

    /// Seed correlation between two metals, used until both price histories
    /// are deep enough for a sample estimate.
    pub fn default_correlation(a: Metal, b: Metal) -> f64 {
        if a == b {
            return 1.0;
        }
        let (lo, hi) = if a.index() <= b.index() { (a, b) } else { (b, a) };
        match (lo, hi) {
            (Metal::Xau, Metal::Xag) => 0.7,
            (Metal::Xau, Metal::Xpt) => 0.6,
            (Metal::Xau, Metal::Xpd) => 0.5,
            (Metal::Xag, Metal::Xpt) => 0.5,
            (Metal::Xag, Metal::Xpd) => 0.4,
            (Metal::Xpt, Metal::Xpd) => 0.6,
            _ => 1.0,
        }
    }
}

impl std::fmt::Display for Metal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

// =============================================================================
// MetalMap
// =============================================================================

/// Dense map from [`Metal`] to a value, laid out in canonical metal order.
///
/// Used for weight vectors, volatility estimates and per-metal prices so
/// that "for each metal" code never allocates or hashes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetalMap<T> {
    values: [T; Metal::COUNT],
}

impl<T> MetalMap<T> {
    /// Build a map by evaluating `f` for each metal in canonical order.
    pub fn from_fn(f: impl FnMut(Metal) -> T) -> Self {
        Self {
            values: Metal::ALL.map(f),
        }
    }

    /// Iterate `(metal, value)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Metal, &T)> {
        Metal::ALL.iter().copied().zip(self.values.iter())
    }
}

impl<T: Copy> MetalMap<T> {
    /// Build a map holding the same value for every metal.
    pub fn splat(value: T) -> Self {
        Self {
            values: [value; Metal::COUNT],
        }
    }
}

impl MetalMap<f64> {
    /// Sum of all four entries.
    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }
}

impl<T> Index<Metal> for MetalMap<T> {
    type Output = T;

    fn index(&self, metal: Metal) -> &T {
        &self.values[metal.index()]
    }
}

impl<T> IndexMut<Metal> for MetalMap<T> {
    fn index_mut(&mut self, metal: Metal) -> &mut T {
        &mut self.values[metal.index()]
    }
}

impl<T: Default> Default for MetalMap<T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}
