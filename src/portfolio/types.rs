//! # Portfolio Types
//!
//! $$
//! S=\frac{\mathbb E[R_p]-r_f}{\sigma_p}
//! $$
//!
//! Result containers shared by the optimiser and its callers.

use serde::Deserialize;
use serde::Serialize;

/// Annualised return, volatility and Sharpe ratio of a weight vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Performance {
  /// `w · mu`.
  pub expected_return: f64,
  /// `sqrt(w' Σ w)`.
  pub volatility: f64,
  /// `(expected_return - risk_free) / volatility`.
  pub sharpe: f64,
}

/// Output of a successful optimisation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
  /// Asset labels in weight order.
  pub labels: Vec<String>,
  pub weights: Vec<f64>,
  /// `None` only when the returned portfolio has zero volatility.
  pub performance: Option<Performance>,
  /// Solver iterations performed.
  pub iterations: u64,
}

impl Allocation {
  /// Weight held in the asset labelled `label`.
  pub fn weight(&self, label: &str) -> Option<f64> {
    let label = label.trim();
    self
      .labels
      .iter()
      .position(|l| l == label)
      .map(|i| self.weights[i])
  }

  /// `(label, weight)` pairs in column order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
    self
      .labels
      .iter()
      .map(String::as_str)
      .zip(self.weights.iter().copied())
  }
}
