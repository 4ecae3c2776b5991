pub mod allocation;
pub mod consts;
pub mod evolution;
pub mod market;

pub use allocation::{Allocation, AllocationError};
pub use evolution::{
    benchmark_allocation, evolve, BenchmarkReport, EvolutionConfig, EvolutionError,
    EvolutionReport, FitnessError, FitnessEvaluator, ObjectiveWeights,
};
pub use market::{MarketDataError, MarketStatistics};
