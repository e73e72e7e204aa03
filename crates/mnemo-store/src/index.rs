//! Index strategy selection.
//!
//! The approximate-nearest-neighbor index family has a dimensionality cap;
//! beyond it the store must fall back to an exact scan rather than fail
//! silently at query time. The decision is made exactly once, at process
//! start, from the configured dimensionality, and holds for the process
//! lifetime.

use tracing::info;

/// Largest dimensionality the ANN index supports.
pub const ANN_DIMENSION_CAP: usize = 2000;

/// How k-NN queries are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStrategy {
    /// ANN index via the engine's vector virtual table.
    Ann,
    /// Exact cosine scan over the owner's rows.
    ExactScan,
}

impl IndexStrategy {
    /// Decide the strategy for a given embedding dimensionality.
    pub fn for_dimensions(dims: usize) -> Self {
        if dims <= ANN_DIMENSION_CAP {
            Self::Ann
        } else {
            Self::ExactScan
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ann => "ann",
            Self::ExactScan => "exact_scan",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ann" => Some(Self::Ann),
            "exact_scan" => Some(Self::ExactScan),
            _ => None,
        }
    }

    /// Log the startup decision. This is an observable process invariant.
    pub fn log_decision(&self, dims: usize) {
        info!(
            strategy = self.as_str(),
            dims,
            cap = ANN_DIMENSION_CAP,
            "vector index strategy selected"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_at_boundaries() {
        assert_eq!(IndexStrategy::for_dimensions(384), IndexStrategy::Ann);
        assert_eq!(IndexStrategy::for_dimensions(2000), IndexStrategy::Ann);
        assert_eq!(
            IndexStrategy::for_dimensions(2001),
            IndexStrategy::ExactScan
        );
        assert_eq!(
            IndexStrategy::for_dimensions(4096),
            IndexStrategy::ExactScan
        );
    }

    #[test]
    fn test_strategy_round_trip() {
        for strategy in [IndexStrategy::Ann, IndexStrategy::ExactScan] {
            assert_eq!(IndexStrategy::parse(strategy.as_str()), Some(strategy));
        }
        assert_eq!(IndexStrategy::parse("hnsw"), None);
    }
}
