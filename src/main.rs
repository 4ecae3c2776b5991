use std::fs;

use anyhow::{bail, Context};
use itertools::izip;
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use allokate::{benchmark_allocation, evolve, EvolutionConfig, MarketStatistics};

/// One optimization run, as handed over by the data-retrieval side:
/// the selected universe, its precomputed statistics, and the GA knobs.
#[derive(Deserialize, Debug)]
struct RunRequest {
    symbols: Vec<String>,
    mean_returns: Vec<f64>,
    correlation_matrix: Vec<Vec<f64>>,
    fundamental_scores: Vec<f64>,
    config: EvolutionConfig,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = match std::env::args().nth(1) {
        Some(path) => path,
        None => bail!("usage: allokate <run-request.json>"),
    };
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read run request from {path}"))?;
    let request: RunRequest =
        serde_json::from_str(&raw).context("run request is not valid JSON")?;

    let market = MarketStatistics::new(
        request.symbols,
        request.mean_returns,
        request.correlation_matrix,
        request.fundamental_scores,
    )?;

    info!(
        assets = market.asset_count(),
        population = request.config.population_size,
        generations = request.config.generations,
        "starting evolution"
    );
    let report = evolve(&market, &request.config)?;
    let benchmark = benchmark_allocation(&market, &request.config)?;

    println!("Optimized allocation:");
    for (symbol, weight) in izip!(market.symbols(), report.best_allocation.weights()) {
        println!("  {symbol:<12} {:>7.2}%", weight * 100.0);
    }
    println!();
    println!(
        "Optimized Sharpe ratio:    {:>8.4}  (fitness {:.4})",
        report.best_sharpe_ratio, report.best_fitness
    );
    println!(
        "Equal-weight Sharpe ratio: {:>8.4}  (fitness {:.4})",
        benchmark.sharpe_ratio, benchmark.fitness
    );

    Ok(())
}
