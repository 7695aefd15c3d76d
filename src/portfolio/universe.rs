//! # Universe
//!
//! $$
//! g \mapsto \{\,i : \text{label}_i \in \text{tickers}(g)\,\}
//! $$
//!
use std::collections::BTreeMap;

use tracing::debug;

use super::config::AssetClassMembership;

/// Maps class -> tickers onto class -> column indices of `labels`.
///
/// Tickers are trimmed before matching. Tickers missing from `labels` are
/// skipped; a class keeps its entry even when none of its tickers match.
pub fn membership_from_tickers<S: AsRef<str>>(
  labels: &[String],
  tickers_by_class: &BTreeMap<String, Vec<S>>,
) -> AssetClassMembership {
  tickers_by_class
    .iter()
    .map(|(class, tickers)| {
      let mut indices: Vec<usize> = tickers
        .iter()
        .filter_map(|ticker| {
          let ticker = ticker.as_ref().trim();
          let index = labels.iter().position(|label| label == ticker);
          if index.is_none() {
            debug!(class = %class, ticker, "ticker not in the price universe");
          }
          index
        })
        .collect();
      indices.sort_unstable();
      indices.dedup();
      (class.clone(), indices)
    })
    .collect()
}
