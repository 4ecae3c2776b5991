use rand::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::allocation::{Allocation, AllocationError};
use crate::consts::FLOAT_COMPARISON_EPSILON;
use crate::market::{MarketDataError, MarketStatistics};

pub mod benchmark;
pub mod fitness;
pub mod operators;

pub use benchmark::{benchmark_allocation, BenchmarkReport};
pub use fitness::{FitnessError, FitnessEvaluator};

#[derive(Error, Debug)]
pub enum EvolutionError {
    #[error("Invalid population parameters were passed: {0}")]
    BadPopulationParameter(String),
    #[error("Objective weights must be non-negative, finite, and sum to 1.0: {0}")]
    BadObjectiveWeights(String),
    #[error("Mutation rate must lie in [0, 1], got {0}")]
    BadMutationRate(f64),
    #[error("Failed to build the evaluation thread pool: {0}")]
    ThreadPool(String),
    #[error(transparent)]
    Market(#[from] MarketDataError),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    Fitness(#[from] FitnessError),
}

fn default_max_concurrency() -> usize {
    num_cpus::get()
}

fn default_population_size() -> usize {
    500
}

fn default_generations() -> usize {
    40
}

fn default_mutation_rate() -> f64 {
    0.1
}

fn default_risk_free_rate() -> f64 {
    0.012
}

/// The three named weights of the composite objective. Supplied once per
/// run and validated once before the loop starts; the fitness formula is
/// linear in them, so an off-by-a-bit sum would only rescale magnitudes,
/// but we reject it anyway to surface caller mistakes early.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct ObjectiveWeights {
    pub sharpe: f64,
    pub fundamental: f64,
    pub diversification: f64,
}

impl ObjectiveWeights {
    pub fn validate(&self) -> Result<(), EvolutionError> {
        let components = [
            ("sharpe", self.sharpe),
            ("fundamental", self.fundamental),
            ("diversification", self.diversification),
        ];
        for (name, value) in components {
            if !value.is_finite() || value < 0.0 {
                return Err(EvolutionError::BadObjectiveWeights(format!(
                    "{name} weight is {value}"
                )));
            }
        }
        let sum = self.sharpe + self.fundamental + self.diversification;
        if (sum - 1.0).abs() > FLOAT_COMPARISON_EPSILON {
            return Err(EvolutionError::BadObjectiveWeights(format!(
                "weights sum to {sum}"
            )));
        }
        Ok(())
    }
}

/// Immutable parameters of one optimization run.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EvolutionConfig {
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    #[serde(default = "default_generations")]
    pub generations: usize,
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
    pub objective_weights: ObjectiveWeights,
    /// Seed for the run's random source; `None` seeds from entropy.
    #[serde(default)]
    pub global_seed: Option<u64>,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl EvolutionConfig {
    pub fn validate(&self) -> Result<(), EvolutionError> {
        if self.population_size == 0 {
            return Err(EvolutionError::BadPopulationParameter(
                "Population size cannot be zero".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) || !self.mutation_rate.is_finite() {
            return Err(EvolutionError::BadMutationRate(self.mutation_rate));
        }
        self.objective_weights.validate()
    }
}

/// Outcome of one run: the best allocation observed across all generations
/// (not necessarily from the final one), its fitness and Sharpe ratio, and
/// per-generation fitness series for reporting.
#[derive(Serialize, Debug, Clone)]
pub struct EvolutionReport {
    pub best_allocation: Allocation,
    pub best_fitness: f64,
    /// Raw Sharpe of the best allocation, computed with the same formula
    /// the evaluator uses internally, so displayed numbers match what the
    /// optimizer maximized. 0.0 when the variance is degenerate.
    pub best_sharpe_ratio: f64,
    pub best_fitness_per_generation: Vec<f64>,
    pub average_fitness_per_generation: Vec<f64>,
}

/// Runs the genetic algorithm: initialize, then per generation evaluate,
/// select, crossover, and mutate, carrying the global best forward so the
/// result never regresses. The final population is evaluated once more
/// after the loop so its members can still claim the best spot.
pub fn evolve(
    market: &MarketStatistics,
    config: &EvolutionConfig,
) -> Result<EvolutionReport, EvolutionError> {
    config.validate()?;
    let asset_count = market.asset_count();
    let evaluator = FitnessEvaluator::new(market, config.objective_weights, config.risk_free_rate);

    // A one-asset universe admits exactly one valid allocation; no search,
    // no crossover, no mutation.
    if asset_count == 1 {
        let allocation = Allocation::equal_weight(1)?;
        let best_fitness = evaluator.fitness(&allocation)?;
        let best_sharpe_ratio = evaluator.sharpe_ratio(&allocation)?.unwrap_or(0.0);
        info!("single-asset universe, returning the trivial allocation");
        return Ok(EvolutionReport {
            best_allocation: allocation,
            best_fitness,
            best_sharpe_ratio,
            best_fitness_per_generation: Vec::new(),
            average_fitness_per_generation: Vec::new(),
        });
    }

    let mut rng: StdRng = match config.global_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.max_concurrency)
        .build()
        .map_err(|e| EvolutionError::ThreadPool(e.to_string()))?;

    let mut population =
        operators::initialize_population(config.population_size, asset_count, &mut rng)?;

    let mut best: Option<(Allocation, f64)> = None;
    let mut best_fitness_per_generation = Vec::with_capacity(config.generations);
    let mut average_fitness_per_generation = Vec::with_capacity(config.generations);

    for generation in 0..config.generations {
        let fitness_values = evaluate_population(&pool, &evaluator, &population)?;
        track_best(&mut best, &population, &fitness_values);

        let generation_best = fitness_values
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        let generation_average =
            fitness_values.iter().sum::<f64>() / fitness_values.len() as f64;
        best_fitness_per_generation.push(generation_best);
        average_fitness_per_generation.push(generation_average);
        debug!(
            generation,
            best = generation_best,
            average = generation_average,
            "generation evaluated"
        );

        let breeding_pool = operators::select_breeding_pool(&population, &fitness_values, &mut rng);
        let mut next_generation = Vec::with_capacity(config.population_size);
        while next_generation.len() < config.population_size {
            let parent_1 = &breeding_pool[rng.gen_range(0..breeding_pool.len())];
            let parent_2 = &breeding_pool[rng.gen_range(0..breeding_pool.len())];
            let child = operators::crossover(parent_1, parent_2, &mut rng)?;
            let child = operators::mutate(&child, config.mutation_rate, &mut rng)?;
            next_generation.push(child);
        }
        population = next_generation;
    }

    // The population produced by the last generation has not been scored yet.
    let final_fitness = evaluate_population(&pool, &evaluator, &population)?;
    track_best(&mut best, &population, &final_fitness);

    let (best_allocation, best_fitness) = best.ok_or_else(|| {
        EvolutionError::BadPopulationParameter("No candidate was ever evaluated".into())
    })?;
    let best_sharpe_ratio = evaluator.sharpe_ratio(&best_allocation)?.unwrap_or(0.0);
    info!(best_fitness, best_sharpe_ratio, "evolution finished");

    Ok(EvolutionReport {
        best_allocation,
        best_fitness,
        best_sharpe_ratio,
        best_fitness_per_generation,
        average_fitness_per_generation,
    })
}

/// Order-independent parallel map over the population. Shape errors
/// propagate (caller contract violation); numeric edge cases never reach
/// here because the evaluator absorbs them into the score.
fn evaluate_population(
    pool: &rayon::ThreadPool,
    evaluator: &FitnessEvaluator<'_>,
    population: &[Allocation],
) -> Result<Vec<f64>, EvolutionError> {
    let fitness_values = pool.install(|| {
        population
            .par_iter()
            .map(|allocation| evaluator.fitness(allocation))
            .collect::<Result<Vec<_>, _>>()
    })?;
    Ok(fitness_values)
}

fn track_best(
    best: &mut Option<(Allocation, f64)>,
    population: &[Allocation],
    fitness_values: &[f64],
) {
    for (allocation, &fitness) in population.iter().zip(fitness_values) {
        let improved = best
            .as_ref()
            .map_or(true, |(_, current)| fitness > *current);
        if improved {
            *best = Some((allocation.clone(), fitness));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_asset_market() -> MarketStatistics {
        MarketStatistics::new(
            vec!["AAA".into(), "BBB".into()],
            vec![0.01, 0.02],
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            vec![0.5, 0.9],
        )
        .unwrap()
    }

    fn config(weights: ObjectiveWeights, seed: u64) -> EvolutionConfig {
        EvolutionConfig {
            population_size: 50,
            generations: 20,
            mutation_rate: 0.1,
            risk_free_rate: 0.0,
            objective_weights: weights,
            global_seed: Some(seed),
            max_concurrency: 2,
        }
    }

    fn blended_weights() -> ObjectiveWeights {
        ObjectiveWeights {
            sharpe: 0.6,
            fundamental: 0.2,
            diversification: 0.2,
        }
    }

    #[test]
    fn rejects_invalid_objective_weights() {
        let market = two_asset_market();
        let mut cfg = config(blended_weights(), 1);
        cfg.objective_weights.sharpe = 0.9; // sum now 1.3
        assert!(matches!(
            evolve(&market, &cfg),
            Err(EvolutionError::BadObjectiveWeights(_))
        ));
        cfg.objective_weights = ObjectiveWeights {
            sharpe: -0.2,
            fundamental: 0.6,
            diversification: 0.6,
        };
        assert!(matches!(
            evolve(&market, &cfg),
            Err(EvolutionError::BadObjectiveWeights(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_mutation_rate_and_zero_population() {
        let market = two_asset_market();
        let mut cfg = config(blended_weights(), 1);
        cfg.mutation_rate = 1.5;
        assert!(matches!(
            evolve(&market, &cfg),
            Err(EvolutionError::BadMutationRate(_))
        ));
        let mut cfg = config(blended_weights(), 1);
        cfg.population_size = 0;
        assert!(matches!(
            evolve(&market, &cfg),
            Err(EvolutionError::BadPopulationParameter(_))
        ));
    }

    #[test]
    fn fixed_seed_runs_are_identical() {
        let market = two_asset_market();
        let cfg = config(blended_weights(), 42);
        let first = evolve(&market, &cfg).unwrap();
        let second = evolve(&market, &cfg).unwrap();
        assert_eq!(first.best_allocation, second.best_allocation);
        assert_eq!(first.best_fitness, second.best_fitness);
        assert_eq!(
            first.best_fitness_per_generation,
            second.best_fitness_per_generation
        );
    }

    #[test]
    fn best_never_regresses_below_the_initial_population() {
        let market = two_asset_market();
        let cfg = config(blended_weights(), 7);

        // The driver seeds its RNG from global_seed and draws the initial
        // population first, so the same seed reproduces it exactly.
        let mut rng = StdRng::seed_from_u64(7);
        let initial =
            operators::initialize_population(cfg.population_size, market.asset_count(), &mut rng)
                .unwrap();
        let evaluator =
            FitnessEvaluator::new(&market, cfg.objective_weights, cfg.risk_free_rate);
        let initial_best = initial
            .iter()
            .map(|a| evaluator.fitness(a).unwrap())
            .fold(f64::NEG_INFINITY, f64::max);

        let report = evolve(&market, &cfg).unwrap();
        assert!(
            report.best_fitness >= initial_best,
            "Elitism of the global best must dominate the initial population \
             ({} < {})",
            report.best_fitness,
            initial_best
        );
    }

    #[test]
    fn blended_run_tilts_toward_the_stronger_asset_without_full_concentration() {
        let market = two_asset_market();
        let report = evolve(&market, &config(blended_weights(), 99)).unwrap();
        let weights = report.best_allocation.weights();
        assert!(
            weights[1] > weights[0],
            "Asset 2 has the higher return and fundamental score, expected \
             more weight there; got {:?}",
            weights
        );
        assert!(
            report.best_allocation.hhi() < 1.0 - FLOAT_COMPARISON_EPSILON,
            "The diversification term should prevent full concentration"
        );
    }

    #[test]
    fn single_asset_universe_short_circuits() {
        let market = MarketStatistics::new(
            vec!["AAA".into()],
            vec![0.01],
            vec![vec![1.0]],
            vec![0.5],
        )
        .unwrap();
        let report = evolve(&market, &config(blended_weights(), 5)).unwrap();
        assert_eq!(report.best_allocation.weights(), &[1.0]);
        assert!(report.best_fitness_per_generation.is_empty());
    }

    #[test]
    fn pure_sharpe_run_beats_the_equal_weight_benchmark() {
        let market = two_asset_market();
        let weights = ObjectiveWeights {
            sharpe: 1.0,
            fundamental: 0.0,
            diversification: 0.0,
        };
        let cfg = config(weights, 3);
        let report = evolve(&market, &cfg).unwrap();
        let benchmark = benchmark_allocation(&market, &cfg).unwrap();
        assert!(
            report.best_sharpe_ratio >= benchmark.sharpe_ratio,
            "Optimized Sharpe {} should not trail the equal-weight benchmark {}",
            report.best_sharpe_ratio,
            benchmark.sharpe_ratio
        );
    }

    #[test]
    fn zero_generations_still_evaluates_the_initial_population() {
        let market = two_asset_market();
        let mut cfg = config(blended_weights(), 21);
        cfg.generations = 0;
        let report = evolve(&market, &cfg).unwrap();
        assert!(report.best_fitness.is_finite());
        assert!(report.best_fitness_per_generation.is_empty());
    }
}
