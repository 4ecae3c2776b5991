use serde::Serialize;
use thiserror::Error;

use crate::consts::FLOAT_COMPARISON_EPSILON;

#[derive(Error, Debug, PartialEq)]
pub enum AllocationError {
    #[error("An allocation needs at least one weight.")]
    Empty,
    #[error("Weight {value} at index {index} is negative or non-finite.")]
    InvalidWeight { index: usize, value: f64 },
    #[error("Weights must sum to 1.0, got {sum}.")]
    NotNormalized { sum: f64 },
}

/// A normalized weight vector over the selected asset universe.
///
/// Invariant: every weight is finite and non-negative, and the weights sum
/// to 1.0 within `FLOAT_COMPARISON_EPSILON`. Allocations are value objects:
/// every operator builds a fresh one instead of mutating in place, so
/// population members never alias each other.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Allocation {
    weights: Vec<f64>,
}

impl Allocation {
    pub fn new(weights: Vec<f64>) -> Result<Self, AllocationError> {
        if weights.is_empty() {
            return Err(AllocationError::Empty);
        }
        for (index, &value) in weights.iter().enumerate() {
            if !value.is_finite() || value < 0.0 {
                return Err(AllocationError::InvalidWeight { index, value });
            }
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > FLOAT_COMPARISON_EPSILON {
            return Err(AllocationError::NotNormalized { sum });
        }
        Ok(Allocation { weights })
    }

    /// The benchmark allocation: 1/N on each of the N assets.
    pub fn equal_weight(asset_count: usize) -> Result<Self, AllocationError> {
        if asset_count == 0 {
            return Err(AllocationError::Empty);
        }
        Ok(Allocation {
            weights: vec![1.0 / asset_count as f64; asset_count],
        })
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Herfindahl-Hirschman Index, the sum of squared weights.
    /// 1.0 for a fully concentrated allocation, 1/N for equal weighting.
    pub fn hhi(&self) -> f64 {
        self.weights.iter().map(|w| w * w).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_weight_vector() {
        assert_eq!(Allocation::new(vec![]), Err(AllocationError::Empty));
    }

    #[test]
    fn rejects_negative_and_non_finite_weights() {
        assert_eq!(
            Allocation::new(vec![0.5, -0.1, 0.6]),
            Err(AllocationError::InvalidWeight {
                index: 1,
                value: -0.1
            })
        );
        assert!(matches!(
            Allocation::new(vec![f64::NAN, 1.0]),
            Err(AllocationError::InvalidWeight { index: 0, .. })
        ));
    }

    #[test]
    fn rejects_non_normalized_weights() {
        assert!(matches!(
            Allocation::new(vec![0.5, 0.6]),
            Err(AllocationError::NotNormalized { .. })
        ));
    }

    #[test]
    fn accepts_weights_within_tolerance() {
        let allocation = Allocation::new(vec![0.5, 0.5 + 1e-8]).unwrap();
        assert_eq!(allocation.len(), 2);
    }

    #[test]
    fn equal_weight_is_normalized_and_hhi_is_one_over_n() {
        let allocation = Allocation::equal_weight(4).unwrap();
        let sum: f64 = allocation.weights().iter().sum();
        assert!((sum - 1.0).abs() < FLOAT_COMPARISON_EPSILON);
        assert!(
            (allocation.hhi() - 0.25).abs() < FLOAT_COMPARISON_EPSILON,
            "HHI of equal weighting over 4 assets should be 1/4, got {}",
            allocation.hhi()
        );
        assert_eq!(Allocation::equal_weight(0), Err(AllocationError::Empty));
    }

    #[test]
    fn hhi_of_full_concentration_is_one() {
        let allocation = Allocation::new(vec![1.0, 0.0, 0.0]).unwrap();
        assert!((allocation.hhi() - 1.0).abs() < FLOAT_COMPARISON_EPSILON);
    }
}
