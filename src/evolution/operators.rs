use rand::distributions::{Uniform, WeightedIndex};
use rand::prelude::*;

use crate::allocation::Allocation;
use crate::consts::{FLOAT_COMPARISON_EPSILON, PERTURBATION};

use super::EvolutionError;

/// Produces `population_size` random allocations over `asset_count` assets.
///
/// Each allocation is drawn as uniform values normalized by their sum, which
/// avoids the boundary bias a naive random-partition scheme would introduce.
pub fn initialize_population(
    population_size: usize,
    asset_count: usize,
    rng: &mut impl Rng,
) -> Result<Vec<Allocation>, EvolutionError> {
    if population_size == 0 {
        return Err(EvolutionError::BadPopulationParameter(
            "Population size cannot be zero".into(),
        ));
    }
    if asset_count == 0 {
        return Err(EvolutionError::BadPopulationParameter(
            "Asset count cannot be zero".into(),
        ));
    }

    let uniform = Uniform::new(0.0, 1.0);
    (0..population_size)
        .map(|_| {
            let weights = loop {
                let mut draws: Vec<f64> =
                    (0..asset_count).map(|_| rng.sample(uniform)).collect();
                let magnitude: f64 = draws.iter().sum();
                // A near-zero sum would blow up the normalization; redraw.
                if magnitude > FLOAT_COMPARISON_EPSILON {
                    draws.iter_mut().for_each(|w| *w /= magnitude);
                    break draws;
                }
            };
            Allocation::new(weights).map_err(EvolutionError::from)
        })
        .collect()
}

/// Fitness-proportionate (roulette-wheel) selection, sampling with
/// replacement into a breeding pool the same size as the population.
///
/// Negative fitness values are shifted to be non-negative before being used
/// as selection weights. When every shifted weight is zero (all-equal
/// fitness at or below zero) the wheel degenerates and selection falls back
/// to uniform sampling.
pub fn select_breeding_pool(
    population: &[Allocation],
    fitness_values: &[f64],
    rng: &mut impl Rng,
) -> Vec<Allocation> {
    debug_assert_eq!(population.len(), fitness_values.len());
    if population.is_empty() {
        return Vec::new();
    }

    let min_fitness = fitness_values.iter().cloned().fold(f64::INFINITY, f64::min);
    let selection_weights: Vec<f64> = if min_fitness < 0.0 {
        fitness_values.iter().map(|f| f - min_fitness).collect()
    } else {
        fitness_values.to_vec()
    };

    match WeightedIndex::new(&selection_weights) {
        Ok(wheel) => (0..population.len())
            .map(|_| population[wheel.sample(rng)].clone())
            .collect(),
        Err(_) => (0..population.len())
            .map(|_| population[rng.gen_range(0..population.len())].clone())
            .collect(),
    }
}

/// Arithmetic (blend) crossover with a single mixing coefficient per pair.
///
/// Both parents sum to 1 and the combination is convex, so the offspring
/// sums to 1 by construction; the constructor re-checks for float drift.
pub fn crossover(
    parent_1: &Allocation,
    parent_2: &Allocation,
    rng: &mut impl Rng,
) -> Result<Allocation, EvolutionError> {
    let alpha: f64 = rng.gen_range(0.0..=1.0);
    let child: Vec<f64> = parent_1
        .weights()
        .iter()
        .zip(parent_2.weights())
        .map(|(&w1, &w2)| alpha * w1 + (1.0 - alpha) * w2)
        .collect();
    Allocation::new(child).map_err(EvolutionError::from)
}

/// With probability `mutation_rate`, perturbs every weight with bounded
/// uniform noise, clips negatives to zero, and renormalizes. If clipping
/// zeroes out the whole vector the noise is resampled, so mutation can
/// never emit an all-zero allocation.
pub fn mutate(
    allocation: &Allocation,
    mutation_rate: f64,
    rng: &mut impl Rng,
) -> Result<Allocation, EvolutionError> {
    if !rng.gen_bool(mutation_rate) {
        return Ok(allocation.clone());
    }

    let noise = Uniform::new_inclusive(-PERTURBATION, PERTURBATION);
    loop {
        let mut perturbed: Vec<f64> = allocation
            .weights()
            .iter()
            .map(|w| (w + rng.sample(noise)).max(0.0))
            .collect();
        let total: f64 = perturbed.iter().sum();
        if total > FLOAT_COMPARISON_EPSILON {
            perturbed.iter_mut().for_each(|w| *w /= total);
            return Allocation::new(perturbed).map_err(EvolutionError::from);
        }
    }
}
