use serde::Serialize;

use crate::allocation::Allocation;
use crate::market::MarketStatistics;

use super::fitness::FitnessEvaluator;
use super::{EvolutionConfig, EvolutionError};

/// Fitness and Sharpe of the equal-weight allocation, for display next to
/// the optimized result.
#[derive(Serialize, Debug, Clone)]
pub struct BenchmarkReport {
    pub allocation: Allocation,
    pub fitness: f64,
    pub sharpe_ratio: f64,
}

/// Evaluates the 1/N allocation with the same evaluator the optimizer uses,
/// so the comparison is consistent with the objective that was maximized.
pub fn benchmark_allocation(
    market: &MarketStatistics,
    config: &EvolutionConfig,
) -> Result<BenchmarkReport, EvolutionError> {
    config.validate()?;
    let evaluator = FitnessEvaluator::new(market, config.objective_weights, config.risk_free_rate);
    let allocation = Allocation::equal_weight(market.asset_count())?;
    let fitness = evaluator.fitness(&allocation)?;
    let sharpe_ratio = evaluator.sharpe_ratio(&allocation)?.unwrap_or(0.0);
    Ok(BenchmarkReport {
        allocation,
        fitness,
        sharpe_ratio,
    })
}
