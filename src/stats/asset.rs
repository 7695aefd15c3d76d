//! # Asset Statistics
//!
//! $$
//! \text{CAGR}=\left(\frac{P_{\text{end}}}{P_{\text{start}}}\right)^{1/Y}-1
//! $$
//!
//! Descriptive statistics of a single price column.

use ndarray::Array1;
use ndarray::Axis;

use super::validate_periods_per_year;
use super::MIN_VOLATILITY;
use crate::error::OptimiserError;
use crate::error::Result;
use crate::series::log_return;
use crate::series::PriceSeries;

/// Summary of one asset's price history.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetStatistics {
  pub label: String,
  /// Number of valid prices used.
  pub observations: usize,
  /// Mean per-period log return.
  pub mean_return: f64,
  /// Sample standard deviation of per-period log returns.
  pub std_dev: f64,
  pub annualized_return: f64,
  pub annualized_volatility: f64,
  /// `None` when the volatility is indistinguishable from zero.
  pub sharpe: Option<f64>,
  pub cagr: f64,
  /// Length of the history in years, `(observations - 1) / periods_per_year`.
  pub years: f64,
}

/// Compound annual growth rate between two prices `years` apart.
pub fn cagr(start: f64, end: f64, years: f64) -> Result<f64> {
  if !(start > 0.0 && end > 0.0 && start.is_finite() && end.is_finite()) {
    return Err(OptimiserError::invalid(format!(
      "CAGR needs positive prices, got start={start} end={end}"
    )));
  }
  if !(years > 0.0 && years.is_finite()) {
    return Err(OptimiserError::invalid(format!(
      "CAGR needs a positive horizon, got {years} years"
    )));
  }
  Ok((end / start).powf(1.0 / years) - 1.0)
}

/// Per-column statistics; each column uses its own valid prices, gaps are skipped.
pub fn asset_statistics(
  series: &PriceSeries,
  risk_free_rate: f64,
  periods_per_year: f64,
) -> Result<Vec<AssetStatistics>> {
  validate_periods_per_year(periods_per_year)?;
  let closes = series.closes();

  series
    .labels()
    .iter()
    .zip(closes.axis_iter(Axis(1)))
    .map(|(label, column)| {
      let prices: Vec<f64> = column.iter().copied().filter(|&p| p > 0.0).collect();
      let returns: Array1<f64> = prices
        .windows(2)
        .map(|pair| log_return(pair[0], pair[1]))
        .collect();

      if returns.is_empty() {
        return Err(OptimiserError::invalid(format!(
          "column '{label}' needs at least 2 valid prices"
        )));
      }

      let mean_return = returns.mean().unwrap_or(0.0);
      let std_dev = if returns.len() > 1 { returns.std(1.0) } else { 0.0 };
      let annualized_return = mean_return * periods_per_year;
      let annualized_volatility = std_dev * periods_per_year.sqrt();
      let sharpe = (annualized_volatility >= MIN_VOLATILITY)
        .then(|| (annualized_return - risk_free_rate) / annualized_volatility);
      // n prices span n - 1 periods
      let years = returns.len() as f64 / periods_per_year;

      Ok(AssetStatistics {
        label: label.clone(),
        observations: prices.len(),
        mean_return,
        std_dev,
        annualized_return,
        annualized_volatility,
        sharpe,
        cagr: cagr(prices[0], prices[prices.len() - 1], years)?,
        years,
      })
    })
    .collect()
}
