//! # Error
//!
//! $$
//! \mathcal E = \{\text{InvalidInput},\ \text{DegenerateVolatility},\ \text{OptimizationFailed}\}
//! $$
//!
use thiserror::Error;

/// Errors raised while preparing price data or solving for weights.
#[derive(Debug, Error)]
pub enum OptimiserError {
  /// Bad or insufficient price data, or an inconsistent constraint description.
  #[error("invalid input: {0}")]
  InvalidInput(String),

  /// Portfolio volatility is zero or numerically indistinguishable from zero.
  #[error("degenerate volatility: {volatility:e} is indistinguishable from zero")]
  DegenerateVolatility { volatility: f64 },

  /// The solver did not converge or the constraints admit no solution.
  #[error("optimization failed: {0}")]
  OptimizationFailed(String),
}

impl OptimiserError {
  pub(crate) fn invalid(reason: impl Into<String>) -> Self {
    Self::InvalidInput(reason.into())
  }

  pub(crate) fn failed(reason: impl Into<String>) -> Self {
    Self::OptimizationFailed(reason.into())
  }
}

impl From<argmin::core::Error> for OptimiserError {
  fn from(e: argmin::core::Error) -> Self {
    Self::OptimizationFailed(e.to_string())
  }
}

pub type Result<T> = std::result::Result<T, OptimiserError>;
