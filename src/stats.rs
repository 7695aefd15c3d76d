//! # Stats
//!
//! $$
//! \hat\mu = k\,\bar r,\qquad \hat\Sigma = k\,\frac{1}{T-1}\sum_{t=1}^{T}(r_t-\bar r)(r_t-\bar r)^\top
//! $$
//!
//! Annualised mean and covariance of log returns, scaled by a single
//! periods-per-year factor `k` so Sharpe ratios stay unit-consistent.

pub mod asset;

pub use asset::asset_statistics;
pub use asset::cagr;
pub use asset::AssetStatistics;

use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use ndarray::Axis;
use ndarray_stats::CorrelationExt;

use crate::error::OptimiserError;
use crate::error::Result;
use crate::portfolio::objective::evaluate;
use crate::portfolio::types::Performance;
use crate::series::ReturnSeries;

/// Trading days per year for daily data.
pub const DEFAULT_PERIODS_PER_YEAR: f64 = 252.0;

/// Volatilities below this are treated as zero.
pub(crate) const MIN_VOLATILITY: f64 = 1e-12;

/// Annualised mean return vector and covariance matrix.
#[derive(Clone, Debug)]
pub struct AnnualizedStatistics {
  mean: Array1<f64>,
  covariance: Array2<f64>,
  periods_per_year: f64,
}

impl AnnualizedStatistics {
  pub fn from_returns(returns: &ReturnSeries, periods_per_year: f64) -> Result<Self> {
    validate_periods_per_year(periods_per_year)?;

    if returns.n_periods() == 0 {
      return Err(OptimiserError::invalid(
        "no return period has a defined value for every asset",
      ));
    }

    let values = returns.values();
    let mean = values
      .mean_axis(Axis(0))
      .ok_or_else(|| OptimiserError::invalid("return series is empty"))?
      * periods_per_year;
    // a single period carries no dispersion information
    let covariance = if returns.n_periods() == 1 {
      Array2::zeros((returns.n_assets(), returns.n_assets()))
    } else {
      // cov treats rows as variables and columns as observations
      values
        .t()
        .cov(1.0)
        .map_err(|_| OptimiserError::invalid("return series is empty"))?
        * periods_per_year
    };

    if mean.iter().chain(covariance.iter()).any(|v| !v.is_finite()) {
      return Err(OptimiserError::invalid(
        "annualised statistics are not finite",
      ));
    }

    Ok(Self {
      mean,
      covariance,
      periods_per_year,
    })
  }

  pub fn mean(&self) -> ArrayView1<'_, f64> {
    self.mean.view()
  }

  pub fn covariance(&self) -> ArrayView2<'_, f64> {
    self.covariance.view()
  }

  pub fn periods_per_year(&self) -> f64 {
    self.periods_per_year
  }

  pub fn n_assets(&self) -> usize {
    self.mean.len()
  }

  /// Per-asset annualised volatilities (square roots of the covariance diagonal).
  pub fn volatilities(&self) -> Array1<f64> {
    self.covariance.diag().mapv(|v| v.max(0.0).sqrt())
  }

  /// Return, volatility and Sharpe ratio of `weights`.
  pub fn performance(&self, weights: &[f64], risk_free_rate: f64) -> Result<Performance> {
    if weights.len() != self.n_assets() {
      return Err(OptimiserError::invalid(format!(
        "{} weights supplied for {} assets",
        weights.len(),
        self.n_assets()
      )));
    }
    evaluate(
      self.mean.view(),
      self.covariance.view(),
      weights,
      risk_free_rate,
    )
  }
}

pub(crate) fn validate_periods_per_year(periods_per_year: f64) -> Result<()> {
  if periods_per_year.is_finite() && periods_per_year > 0.0 {
    Ok(())
  } else {
    Err(OptimiserError::invalid(format!(
      "periods per year must be positive and finite, got {periods_per_year}"
    )))
  }
}
