use nalgebra::{DMatrix, DVector};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum MarketDataError {
    #[error("The asset universe is empty.")]
    EmptyUniverse,
    #[error("Expected {expected} mean returns, got {actual}.")]
    MeanReturnLengthMismatch { expected: usize, actual: usize },
    #[error("Correlation matrix has {actual} rows, expected {expected}.")]
    CorrelationShapeMismatch { expected: usize, actual: usize },
    #[error("Correlation matrix row {row} has {actual} entries, expected {expected}.")]
    RaggedCorrelationRow {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Expected {expected} fundamental scores, got {actual}.")]
    FundamentalScoreLengthMismatch { expected: usize, actual: usize },
    #[error("Non-finite value {value} in {field}.")]
    NonFiniteInput { field: &'static str, value: f64 },
}

/// Precomputed per-run market inputs: mean monthly returns, the pairwise
/// correlation/covariance matrix, and one fundamental quality score per
/// symbol. Produced by the data-retrieval collaborators; immutable for the
/// duration of an optimization run.
#[derive(Debug, Clone)]
pub struct MarketStatistics {
    symbols: Vec<String>,
    mean_returns: DVector<f64>,
    correlation: DMatrix<f64>,
    fundamental_scores: Vec<f64>,
}

impl MarketStatistics {
    pub fn new(
        symbols: Vec<String>,
        mean_returns: Vec<f64>,
        correlation_rows: Vec<Vec<f64>>,
        fundamental_scores: Vec<f64>,
    ) -> Result<Self, MarketDataError> {
        let asset_count = symbols.len();
        if asset_count == 0 {
            return Err(MarketDataError::EmptyUniverse);
        }
        if mean_returns.len() != asset_count {
            return Err(MarketDataError::MeanReturnLengthMismatch {
                expected: asset_count,
                actual: mean_returns.len(),
            });
        }
        if correlation_rows.len() != asset_count {
            return Err(MarketDataError::CorrelationShapeMismatch {
                expected: asset_count,
                actual: correlation_rows.len(),
            });
        }
        for (row, entries) in correlation_rows.iter().enumerate() {
            if entries.len() != asset_count {
                return Err(MarketDataError::RaggedCorrelationRow {
                    row,
                    expected: asset_count,
                    actual: entries.len(),
                });
            }
        }
        if fundamental_scores.len() != asset_count {
            return Err(MarketDataError::FundamentalScoreLengthMismatch {
                expected: asset_count,
                actual: fundamental_scores.len(),
            });
        }

        for &value in &mean_returns {
            if !value.is_finite() {
                return Err(MarketDataError::NonFiniteInput {
                    field: "mean_returns",
                    value,
                });
            }
        }
        for &value in correlation_rows.iter().flatten() {
            if !value.is_finite() {
                return Err(MarketDataError::NonFiniteInput {
                    field: "correlation_matrix",
                    value,
                });
            }
        }
        for &value in &fundamental_scores {
            if !value.is_finite() {
                return Err(MarketDataError::NonFiniteInput {
                    field: "fundamental_scores",
                    value,
                });
            }
        }

        let correlation = DMatrix::from_row_iterator(
            asset_count,
            asset_count,
            correlation_rows.into_iter().flatten(),
        );
        Ok(MarketStatistics {
            symbols,
            mean_returns: DVector::from_vec(mean_returns),
            correlation,
            fundamental_scores,
        })
    }

    pub fn asset_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn mean_returns(&self) -> &DVector<f64> {
        &self.mean_returns
    }

    pub fn correlation(&self) -> &DMatrix<f64> {
        &self.correlation
    }

    pub fn fundamental_scores(&self) -> &[f64] {
        &self.fundamental_scores
    }
}
