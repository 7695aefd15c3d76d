//! # Portfolio Optimiser
//!
//! $$
//! \max_{\mathbf w\in\mathcal W}\ \frac{\boldsymbol\mu^\top\mathbf w-r_f}{\sqrt{\mathbf w^\top\Sigma\mathbf w}}
//! $$
//!
//! Statistics are computed once at construction; every call to
//! [`PortfolioOptimiser::optimise`] is an independent solve over them.

use tracing::debug;
use tracing::info;
use tracing::warn;

use super::config::AssetClassLimits;
use super::config::AssetClassMembership;
use super::config::OptimiserConfig;
use super::config::SolverSettings;
use super::constraints::ConstraintSet;
use super::constraints::FEASIBILITY_TOLERANCE;
use super::objective::SharpeObjective;
use super::solver::ProjectedGradient;
use super::types::Allocation;
use super::types::Performance;
use crate::error::OptimiserError;
use crate::error::Result;
use crate::series::PriceSeries;
use crate::series::ReturnSeries;
use crate::stats::AnnualizedStatistics;
use crate::stats::DEFAULT_PERIODS_PER_YEAR;

/// Sharpe-ratio optimiser over a fixed price history.
#[derive(Clone, Debug)]
pub struct PortfolioOptimiser {
  series: PriceSeries,
  returns: ReturnSeries,
  statistics: AnnualizedStatistics,
  risk_free_rate: f64,
  solver: SolverSettings,
}

impl PortfolioOptimiser {
  /// Daily data, 252 periods per year.
  pub fn new(series: PriceSeries, risk_free_rate: f64) -> Result<Self> {
    Self::with_periods_per_year(series, risk_free_rate, DEFAULT_PERIODS_PER_YEAR)
  }

  pub fn with_periods_per_year(
    series: PriceSeries,
    risk_free_rate: f64,
    periods_per_year: f64,
  ) -> Result<Self> {
    Self::build(
      series,
      risk_free_rate,
      periods_per_year,
      SolverSettings::default(),
    )
  }

  /// Takes the risk-free rate, periods per year and solver settings from `config`.
  pub fn from_config(series: PriceSeries, config: &OptimiserConfig) -> Result<Self> {
    Self::build(
      series,
      config.risk_free_rate,
      config.periods_per_year,
      config.solver.clone(),
    )
  }

  fn build(
    series: PriceSeries,
    risk_free_rate: f64,
    periods_per_year: f64,
    solver: SolverSettings,
  ) -> Result<Self> {
    if !risk_free_rate.is_finite() {
      return Err(OptimiserError::invalid(format!(
        "risk-free rate must be finite, got {risk_free_rate}"
      )));
    }
    solver.validate()?;

    let returns = series.log_returns();
    if returns.dropped() > 0 {
      debug!(
        dropped = returns.dropped(),
        "skipped return periods with missing or non-positive prices"
      );
    }
    let statistics = AnnualizedStatistics::from_returns(&returns, periods_per_year)?;

    info!(
      assets = series.n_assets(),
      periods = returns.n_periods(),
      periods_per_year,
      "annualised statistics ready"
    );

    Ok(Self {
      series,
      returns,
      statistics,
      risk_free_rate,
      solver,
    })
  }

  pub fn series(&self) -> &PriceSeries {
    &self.series
  }

  pub fn returns(&self) -> &ReturnSeries {
    &self.returns
  }

  pub fn statistics(&self) -> &AnnualizedStatistics {
    &self.statistics
  }

  pub fn risk_free_rate(&self) -> f64 {
    self.risk_free_rate
  }

  pub fn n_assets(&self) -> usize {
    self.series.n_assets()
  }

  /// Return, volatility and Sharpe ratio of an arbitrary weight vector.
  pub fn portfolio_performance(&self, weights: &[f64]) -> Result<Performance> {
    self.statistics.performance(weights, self.risk_free_rate)
  }

  /// Sharpe-maximising weights in column order.
  pub fn optimise(
    &self,
    asset_class_limits: &AssetClassLimits,
    asset_class_membership: &AssetClassMembership,
    per_asset_cap: f64,
    bounds: Option<&[(f64, f64)]>,
  ) -> Result<Vec<f64>> {
    self
      .optimise_detailed(
        asset_class_limits,
        asset_class_membership,
        per_asset_cap,
        bounds,
      )
      .map(|allocation| allocation.weights)
  }

  /// As [`optimise`](Self::optimise), with labels, performance and iteration count.
  pub fn optimise_detailed(
    &self,
    asset_class_limits: &AssetClassLimits,
    asset_class_membership: &AssetClassMembership,
    per_asset_cap: f64,
    bounds: Option<&[(f64, f64)]>,
  ) -> Result<Allocation> {
    let n = self.n_assets();
    let constraints = ConstraintSet::new(
      n,
      asset_class_limits,
      asset_class_membership,
      per_asset_cap,
      bounds,
    )?;

    if let Err(e) = constraints.check_feasible() {
      warn!(error = %e, "constraints admit no portfolio");
      return Err(e);
    }

    let objective = SharpeObjective::new(&self.statistics, self.risk_free_rate);
    let start = vec![1.0 / n as f64; n];

    let report = match ProjectedGradient::new(&constraints, &self.solver).minimize(&objective, &start) {
      Ok(report) => report,
      Err(e) => {
        warn!(error = %e, "optimisation failed");
        return Err(e);
      }
    };

    let violation = constraints.max_violation(&report.weights);
    if violation > FEASIBILITY_TOLERANCE {
      warn!(violation, "solution breaches the constraints");
      return Err(OptimiserError::failed(format!(
        "solution violates the constraints by {violation:.3e}"
      )));
    }

    let performance = match objective.performance(&report.weights) {
      Ok(performance) => Some(performance),
      Err(OptimiserError::DegenerateVolatility { .. }) => None,
      Err(e) => return Err(e),
    };

    info!(
      iterations = report.iterations,
      convergence = ?report.convergence,
      sharpe = ?performance.map(|p| p.sharpe),
      "optimisation converged"
    );

    Ok(Allocation {
      labels: self.series.labels().to_vec(),
      weights: report.weights,
      performance,
      iterations: report.iterations,
    })
  }

  /// Runs [`optimise_detailed`](Self::optimise_detailed) with the constraint fields of `config`.
  pub fn allocate(&self, config: &OptimiserConfig) -> Result<Allocation> {
    self.optimise_detailed(
      &config.asset_class_limits,
      &config.asset_class_membership,
      config.per_asset_cap,
      config.bounds.as_deref(),
    )
  }
}
