//! # Optimiser Config
//!
//! $$
//! \mathcal C = (r_f,\ k,\ u,\ \{L_g\},\ \{g\},\ [l_i,u_i],\ \text{solver})
//! $$
//!
use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::error::OptimiserError;
use crate::error::Result;
use crate::stats::DEFAULT_PERIODS_PER_YEAR;

/// Asset class -> maximum combined weight.
pub type AssetClassLimits = BTreeMap<String, f64>;

/// Asset class -> column indices of its members.
pub type AssetClassMembership = BTreeMap<String, Vec<usize>>;

/// Stopping rules of the projected gradient solver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
  /// Outer iteration cap.
  pub max_iters: u64,
  /// Backtracking steps allowed per line search.
  pub line_search_iters: u64,
  /// Relative objective improvement below which the run stops.
  pub ftol: f64,
  /// Infinity norm of the projected gradient below which the run stops.
  pub gtol: f64,
}

impl Default for SolverSettings {
  fn default() -> Self {
    Self {
      max_iters: 1000,
      line_search_iters: 50,
      ftol: 1e-12,
      gtol: 1e-9,
    }
  }
}

impl SolverSettings {
  pub fn validate(&self) -> Result<()> {
    if self.max_iters == 0 || self.line_search_iters == 0 {
      return Err(OptimiserError::invalid(
        "solver iteration limits must be at least 1",
      ));
    }
    if !(self.ftol >= 0.0 && self.ftol.is_finite()) {
      return Err(OptimiserError::invalid(format!(
        "ftol must be non-negative and finite, got {}",
        self.ftol
      )));
    }
    if !(self.gtol > 0.0 && self.gtol.is_finite()) {
      return Err(OptimiserError::invalid(format!(
        "gtol must be positive and finite, got {}",
        self.gtol
      )));
    }
    Ok(())
  }
}

/// Everything needed to build an optimiser and run one allocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimiserConfig {
  pub risk_free_rate: f64,
  pub periods_per_year: f64,
  /// Uniform upper bound per asset, ignored when `bounds` is set.
  pub per_asset_cap: f64,
  pub asset_class_limits: AssetClassLimits,
  pub asset_class_membership: AssetClassMembership,
  /// Explicit `(lower, upper)` per asset.
  pub bounds: Option<Vec<(f64, f64)>>,
  pub solver: SolverSettings,
}

impl Default for OptimiserConfig {
  fn default() -> Self {
    Self {
      risk_free_rate: 0.039,
      periods_per_year: DEFAULT_PERIODS_PER_YEAR,
      per_asset_cap: 0.20,
      asset_class_limits: AssetClassLimits::new(),
      asset_class_membership: AssetClassMembership::new(),
      bounds: None,
      solver: SolverSettings::default(),
    }
  }
}
