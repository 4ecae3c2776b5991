use itertools::izip;
use nalgebra::DVector;
use thiserror::Error;
use tracing::warn;

use crate::allocation::Allocation;
use crate::consts::{
    DEGENERATE_SHARPE_SCORE, SHARPE_LOWER_BOUND, SHARPE_UPPER_BOUND,
};
use crate::market::MarketStatistics;

use super::ObjectiveWeights;

#[derive(Error, Debug, PartialEq)]
pub enum FitnessError {
    #[error("Allocation has {actual} weights but the universe has {expected} assets.")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Maps one allocation to one scalar fitness, higher is better.
///
/// Fitness is a weighted blend of three [0, 1]-scaled components: the
/// clipped-and-rescaled Sharpe ratio, the normalized fundamental score, and
/// a diversification score derived from the HHI. Degenerate statistics
/// (zero/negative variance, NaN from the matrix product) are absorbed as a
/// penalty score so a single bad candidate cannot crash a run.
pub struct FitnessEvaluator<'a> {
    market: &'a MarketStatistics,
    objective_weights: ObjectiveWeights,
    risk_free_rate: f64,
    max_fundamental_score: f64,
}

impl<'a> FitnessEvaluator<'a> {
    pub fn new(
        market: &'a MarketStatistics,
        objective_weights: ObjectiveWeights,
        risk_free_rate: f64,
    ) -> Self {
        let max_fundamental_score = market
            .fundamental_scores()
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        FitnessEvaluator {
            market,
            objective_weights,
            risk_free_rate,
            max_fundamental_score,
        }
    }

    fn check_shape(&self, allocation: &Allocation) -> Result<(), FitnessError> {
        let expected = self.market.asset_count();
        if allocation.len() != expected {
            return Err(FitnessError::LengthMismatch {
                expected,
                actual: allocation.len(),
            });
        }
        Ok(())
    }

    /// Raw Sharpe ratio: (w·μ − rf) / sqrt(wᵗΣw).
    ///
    /// Returns `None` when the portfolio variance is degenerate (zero,
    /// negative from a non-PSD input matrix, or non-finite), so the caller
    /// decides between a penalty score and a 0.0 display value.
    pub fn sharpe_ratio(&self, allocation: &Allocation) -> Result<Option<f64>, FitnessError> {
        self.check_shape(allocation)?;
        let w = DVector::from_column_slice(allocation.weights());
        let expected_return = w.dot(self.market.mean_returns());
        let variance = w.dot(&(self.market.correlation() * &w));
        if !variance.is_finite() || variance <= 0.0 {
            return Ok(None);
        }
        let sharpe = (expected_return - self.risk_free_rate) / variance.sqrt();
        if sharpe.is_finite() {
            Ok(Some(sharpe))
        } else {
            Ok(None)
        }
    }

    /// Sharpe clipped to the configured range and rescaled to [0, 1].
    /// Degenerate variance scores the penalty value instead of erroring,
    /// which keeps the generation loop total.
    fn normalized_sharpe(&self, allocation: &Allocation) -> Result<f64, FitnessError> {
        match self.sharpe_ratio(allocation)? {
            Some(sharpe) => {
                let clipped = sharpe.clamp(SHARPE_LOWER_BOUND, SHARPE_UPPER_BOUND);
                Ok((clipped - SHARPE_LOWER_BOUND) / (SHARPE_UPPER_BOUND - SHARPE_LOWER_BOUND))
            }
            None => {
                warn!("degenerate portfolio variance, assigning the penalty Sharpe score");
                Ok(DEGENERATE_SHARPE_SCORE)
            }
        }
    }

    /// Weighted fundamental score, normalized against the maximum attainable
    /// score (all weight on the best-scored asset) so it lives in [0, 1].
    pub fn fundamental_component(&self, allocation: &Allocation) -> Result<f64, FitnessError> {
        self.check_shape(allocation)?;
        if self.max_fundamental_score <= 0.0 {
            return Ok(0.0);
        }
        let weighted_score: f64 = izip!(allocation.weights(), self.market.fundamental_scores())
            .map(|(weight, score)| weight * score)
            .sum();
        Ok((weighted_score / self.max_fundamental_score).clamp(0.0, 1.0))
    }

    /// 1 − HHI, rescaled so full concentration scores 0 and equal weighting
    /// scores 1. A single-asset universe has no diversification to reward.
    pub fn diversification_component(&self, allocation: &Allocation) -> Result<f64, FitnessError> {
        self.check_shape(allocation)?;
        let n = allocation.len();
        if n == 1 {
            return Ok(0.0);
        }
        let hhi = allocation.hhi();
        Ok(((1.0 - hhi) / (1.0 - 1.0 / n as f64)).clamp(0.0, 1.0))
    }

    /// The blended objective the genetic algorithm maximizes. Always finite
    /// for a shape-correct allocation.
    pub fn fitness(&self, allocation: &Allocation) -> Result<f64, FitnessError> {
        let sharpe_score = self.normalized_sharpe(allocation)?;
        let fundamental = self.fundamental_component(allocation)?;
        let diversification = self.diversification_component(allocation)?;
        let weights = &self.objective_weights;
        Ok(weights.sharpe * sharpe_score
            + weights.fundamental * fundamental
            + weights.diversification * diversification)
    }
}
