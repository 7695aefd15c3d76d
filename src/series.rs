//! # Series
//!
//! $$
//! r_{t,i} = \ln\frac{P_{t,i}}{P_{t-1,i}}
//! $$
//!
//! Date-indexed close prices and the log-return table derived from them.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashSet;

use chrono::NaiveDate;
use ndarray::Array2;
use ndarray::ArrayView2;
use ndarray::Axis;

use crate::error::OptimiserError;
use crate::error::Result;

/// Close prices in currency units, one row per date and one column per asset.
///
/// Rows are chronological and unique. Missing prices are stored as `NaN`;
/// rows with gaps at either end of the history are dropped on construction so
/// every column shares the same date index.
#[derive(Clone, Debug)]
pub struct PriceSeries {
  dates: Vec<NaiveDate>,
  labels: Vec<String>,
  closes: Array2<f64>,
}

impl PriceSeries {
  /// Build a price table from a date index, column labels and a `dates x assets` matrix.
  pub fn new(dates: Vec<NaiveDate>, labels: Vec<String>, closes: Array2<f64>) -> Result<Self> {
    if labels.is_empty() {
      return Err(OptimiserError::invalid(
        "price series needs at least one asset column",
      ));
    }
    if closes.ncols() != labels.len() {
      return Err(OptimiserError::invalid(format!(
        "{} labels supplied for {} price columns",
        labels.len(),
        closes.ncols()
      )));
    }
    if closes.nrows() != dates.len() {
      return Err(OptimiserError::invalid(format!(
        "{} dates supplied for {} price rows",
        dates.len(),
        closes.nrows()
      )));
    }
    if closes.iter().any(|p| p.is_infinite()) {
      return Err(OptimiserError::invalid("price series contains non-numeric values"));
    }

    let labels = normalize_labels(labels)?;

    let mut order: Vec<usize> = (0..dates.len()).collect();
    order.sort_by_key(|&t| dates[t]);
    if let Some(pair) = order.windows(2).find(|pair| dates[pair[0]] == dates[pair[1]]) {
      return Err(OptimiserError::invalid(format!(
        "date {} appears more than once",
        dates[pair[0]]
      )));
    }

    let complete = |t: usize| closes.row(t).iter().all(|p| !p.is_nan());
    let kept: Vec<usize> = match (
      order.iter().position(|&t| complete(t)),
      order.iter().rposition(|&t| complete(t)),
    ) {
      (Some(first), Some(last)) => order[first..=last].to_vec(),
      _ => Vec::new(),
    };

    if kept.len() < 2 {
      return Err(OptimiserError::invalid(format!(
        "at least 2 complete time steps are required, found {}",
        kept.len()
      )));
    }

    let closes = closes.select(Axis(0), &kept);
    let dates: Vec<NaiveDate> = kept.iter().map(|&t| dates[t]).collect();

    for (label, column) in labels.iter().zip(closes.axis_iter(Axis(1))) {
      let positive = column.iter().filter(|&&p| p > 0.0).count();
      if positive < 2 {
        return Err(OptimiserError::invalid(format!(
          "column '{label}' has fewer than 2 positive prices"
        )));
      }
    }

    Ok(Self {
      dates,
      labels,
      closes,
    })
  }

  /// Align independently dated price columns on the union of their dates.
  ///
  /// Cells a column does not cover become missing; leading and trailing gaps
  /// are then trimmed by [`PriceSeries::new`].
  pub fn from_columns(columns: Vec<(String, Vec<(NaiveDate, f64)>)>) -> Result<Self> {
    let mut index = BTreeSet::new();
    let mut labels = Vec::with_capacity(columns.len());
    let mut lookups = Vec::with_capacity(columns.len());

    for (label, observations) in columns {
      let mut lookup = BTreeMap::new();
      for (date, price) in observations {
        if lookup.insert(date, price).is_some() {
          return Err(OptimiserError::invalid(format!(
            "column '{}' repeats date {date}",
            label.trim()
          )));
        }
        index.insert(date);
      }
      labels.push(label);
      lookups.push(lookup);
    }

    let dates: Vec<NaiveDate> = index.into_iter().collect();
    let closes = Array2::from_shape_fn((dates.len(), lookups.len()), |(t, j)| {
      lookups[j].get(&dates[t]).copied().unwrap_or(f64::NAN)
    });

    Self::new(dates, labels, closes)
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  /// Column labels with incidental whitespace removed.
  pub fn labels(&self) -> &[String] {
    &self.labels
  }

  pub fn closes(&self) -> ArrayView2<'_, f64> {
    self.closes.view()
  }

  pub fn n_assets(&self) -> usize {
    self.labels.len()
  }

  /// Number of dates.
  pub fn len(&self) -> usize {
    self.dates.len()
  }

  pub fn is_empty(&self) -> bool {
    self.dates.is_empty()
  }

  /// Position of the column labelled `label` (whitespace-insensitive).
  pub fn column_index(&self, label: &str) -> Option<usize> {
    let label = label.trim();
    self.labels.iter().position(|l| l == label)
  }

  /// Per-period log returns.
  ///
  /// A period where any asset has an undefined return (missing, zero or
  /// negative price on either side) is discarded for every asset.
  pub fn log_returns(&self) -> ReturnSeries {
    let n = self.n_assets();
    let closes = &self.closes;

    let kept: Vec<usize> = (1..self.len())
      .filter(|&t| (0..n).all(|j| log_return(closes[[t - 1, j]], closes[[t, j]]).is_finite()))
      .collect();

    let values = Array2::from_shape_fn((kept.len(), n), |(i, j)| {
      let t = kept[i];
      log_return(closes[[t - 1, j]], closes[[t, j]])
    });

    ReturnSeries {
      dates: kept.iter().map(|&t| self.dates[t]).collect(),
      dropped: self.len() - 1 - kept.len(),
      values,
    }
  }
}

/// Log returns stamped with the date closing each period.
#[derive(Clone, Debug)]
pub struct ReturnSeries {
  dates: Vec<NaiveDate>,
  values: Array2<f64>,
  dropped: usize,
}

impl ReturnSeries {
  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  /// `periods x assets` matrix of log returns.
  pub fn values(&self) -> ArrayView2<'_, f64> {
    self.values.view()
  }

  pub fn n_periods(&self) -> usize {
    self.values.nrows()
  }

  pub fn n_assets(&self) -> usize {
    self.values.ncols()
  }

  /// Periods discarded because at least one return was undefined.
  pub fn dropped(&self) -> usize {
    self.dropped
  }
}

pub(crate) fn log_return(previous: f64, current: f64) -> f64 {
  if previous > 0.0 && current > 0.0 {
    (current / previous).ln()
  } else {
    f64::NAN
  }
}

fn normalize_labels(labels: Vec<String>) -> Result<Vec<String>> {
  let mut seen = HashSet::with_capacity(labels.len());
  let mut out = Vec::with_capacity(labels.len());

  for label in labels {
    let label = label.trim().to_string();
    if label.is_empty() {
      return Err(OptimiserError::invalid("asset labels must not be empty"));
    }
    if !seen.insert(label.clone()) {
      return Err(OptimiserError::invalid(format!(
        "duplicate asset label '{label}'"
      )));
    }
    out.push(label);
  }

  Ok(out)
}
