/// Tolerance used when checking that a weight vector sums to 1.0.
pub const FLOAT_COMPARISON_EPSILON: f64 = 1e-6;

/// Bound on the uniform noise added to each weight during mutation.
pub const PERTURBATION: f64 = 0.1;

/// Raw Sharpe ratios are clipped to [SHARPE_LOWER_BOUND, SHARPE_UPPER_BOUND]
/// and rescaled to [0, 1] before blending, so the Sharpe term is on the same
/// scale as the fundamental and diversification terms.
pub const SHARPE_LOWER_BOUND: f64 = -1.0;
pub const SHARPE_UPPER_BOUND: f64 = 3.0;

/// Score assigned to the Sharpe component when the portfolio variance is
/// degenerate (zero, negative, or non-finite). Sits at the floor of the
/// normalized range so such candidates rank below any well-formed one.
pub const DEGENERATE_SHARPE_SCORE: f64 = 0.0;
