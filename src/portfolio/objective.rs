//! # Sharpe Objective
//!
//! $$
//! f(\mathbf w)=-\frac{\boldsymbol\mu^\top\mathbf w-r_f}{\sigma(\mathbf w)},\qquad
//! \nabla f=-\left(\frac{\boldsymbol\mu}{\sigma}-\frac{(\boldsymbol\mu^\top\mathbf w-r_f)\,\Sigma\mathbf w}{\sigma^3}\right)
//! $$
//!
use argmin::core::CostFunction;
use argmin::core::Error;
use argmin::core::Gradient;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;

use super::types::Performance;
use crate::error::OptimiserError;
use crate::error::Result;
use crate::stats::AnnualizedStatistics;
use crate::stats::MIN_VOLATILITY;

/// Return, volatility and Sharpe ratio of `weights`; the caller checks lengths.
pub(crate) fn evaluate(
  mean: ArrayView1<'_, f64>,
  covariance: ArrayView2<'_, f64>,
  weights: &[f64],
  risk_free_rate: f64,
) -> Result<Performance> {
  let w = ArrayView1::from(weights);
  let expected_return = w.dot(&mean);
  let variance = w.dot(&covariance.dot(&w));
  let volatility = variance.max(0.0).sqrt();

  // also catches NaN
  if !(volatility >= MIN_VOLATILITY) {
    return Err(OptimiserError::DegenerateVolatility { volatility });
  }

  Ok(Performance {
    expected_return,
    volatility,
    sharpe: (expected_return - risk_free_rate) / volatility,
  })
}

/// Negative Sharpe ratio as an `argmin` problem.
#[derive(Clone, Debug)]
pub struct SharpeObjective {
  mean: Array1<f64>,
  covariance: Array2<f64>,
  risk_free_rate: f64,
}

impl SharpeObjective {
  pub fn new(statistics: &AnnualizedStatistics, risk_free_rate: f64) -> Self {
    Self {
      mean: statistics.mean().to_owned(),
      covariance: statistics.covariance().to_owned(),
      risk_free_rate,
    }
  }

  pub fn n_assets(&self) -> usize {
    self.mean.len()
  }

  pub fn performance(&self, weights: &[f64]) -> Result<Performance> {
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
      self.risk_free_rate,
    )
  }

  /// `(-sharpe, gradient)` at `weights`.
  pub fn value_and_gradient(&self, weights: &[f64]) -> Result<(f64, Vec<f64>)> {
    let performance = self.performance(weights)?;
    let sigma_w = self.covariance.dot(&ArrayView1::from(weights));
    let excess = performance.expected_return - self.risk_free_rate;
    let vol = performance.volatility;
    let vol3 = vol * vol * vol;

    let gradient = self
      .mean
      .iter()
      .zip(sigma_w.iter())
      .map(|(&mu, &sw)| -(mu / vol - excess * sw / vol3))
      .collect();

    Ok((-performance.sharpe, gradient))
  }
}

impl CostFunction for SharpeObjective {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, weights: &Self::Param) -> std::result::Result<Self::Output, Error> {
    // degenerate points are rejected by the line search rather than raised
    Ok(match self.performance(weights) {
      Ok(performance) => -performance.sharpe,
      Err(OptimiserError::DegenerateVolatility { .. }) => f64::INFINITY,
      Err(e) => return Err(e.into()),
    })
  }
}

impl Gradient for SharpeObjective {
  type Param = Vec<f64>;
  type Gradient = Vec<f64>;

  fn gradient(&self, weights: &Self::Param) -> std::result::Result<Self::Gradient, Error> {
    Ok(self.value_and_gradient(weights)?.1)
  }
}
