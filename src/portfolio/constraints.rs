//! # Constraints
//!
//! $$
//! \mathcal W=\Big\{\mathbf w:\ \mathbf 1^\top\mathbf w=1,\ \ l_i\le w_i\le u_i,\ \ \sum_{i\in g}w_i\le L_g\Big\}
//! $$
//!
//! The feasible set is a polytope. Limited classes must not overlap, which
//! makes the Euclidean projection onto it separable: one multiplier for the
//! budget and one per binding class cap, each found with Brent's method.

use roots::find_root_brent;
use roots::SimpleConvergency;
use tracing::debug;

use super::config::AssetClassLimits;
use super::config::AssetClassMembership;
use crate::error::OptimiserError;
use crate::error::Result;

/// Tolerance used when verifying a returned weight vector.
pub const FEASIBILITY_TOLERANCE: f64 = 1e-6;

const BUDGET_TOLERANCE: f64 = 1e-12;
const ROOT_EPS: f64 = 1e-13;
const ROOT_MAX_ITERS: usize = 200;

/// Upper limit on the combined weight of one asset class.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupCap {
  pub class: String,
  /// Sorted, de-duplicated column indices.
  pub indices: Vec<usize>,
  pub limit: f64,
}

impl GroupCap {
  /// Panics if `weights` is shorter than the largest member index.
  pub(crate) fn exposure(&self, weights: &[f64]) -> f64 {
    self.indices.iter().map(|&i| weights[i]).sum()
  }

  /// `limit - exposure`, negative when the cap is breached.
  pub(crate) fn slack(&self, weights: &[f64]) -> f64 {
    self.limit - self.exposure(weights)
  }
}

/// Budget, box bounds and class caps of one optimisation problem.
#[derive(Clone, Debug)]
pub struct ConstraintSet {
  lower: Vec<f64>,
  upper: Vec<f64>,
  groups: Vec<GroupCap>,
  /// Assets outside every limited class.
  free: Vec<usize>,
}

impl ConstraintSet {
  /// Explicit `bounds` replace the uniform `[0, per_asset_cap]` box entirely.
  ///
  /// Limited classes must be disjoint: an asset listed under two classes that
  /// both appear in `limits` is rejected. Classes without a limit may overlap.
  pub fn new(
    n_assets: usize,
    limits: &AssetClassLimits,
    membership: &AssetClassMembership,
    per_asset_cap: f64,
    bounds: Option<&[(f64, f64)]>,
  ) -> Result<Self> {
    if n_assets == 0 {
      return Err(OptimiserError::invalid("universe has no assets"));
    }

    let (lower, upper): (Vec<f64>, Vec<f64>) = match bounds {
      Some(bounds) => {
        if bounds.len() != n_assets {
          return Err(OptimiserError::invalid(format!(
            "{} bounds supplied for {n_assets} assets",
            bounds.len()
          )));
        }
        for (i, &(lo, hi)) in bounds.iter().enumerate() {
          if !(lo.is_finite() && hi.is_finite() && lo <= hi && hi >= 0.0) {
            return Err(OptimiserError::invalid(format!(
              "bounds of asset {i} are inconsistent: ({lo}, {hi})"
            )));
          }
        }
        bounds.iter().copied().unzip()
      }
      None => {
        if !(per_asset_cap.is_finite() && per_asset_cap >= 0.0) {
          return Err(OptimiserError::invalid(format!(
            "per-asset cap must be non-negative and finite, got {per_asset_cap}"
          )));
        }
        (vec![0.0; n_assets], vec![per_asset_cap; n_assets])
      }
    };

    for (class, indices) in membership {
      if let Some(&i) = indices.iter().find(|&&i| i >= n_assets) {
        return Err(OptimiserError::invalid(format!(
          "class '{class}' refers to asset {i} but the universe has {n_assets} assets"
        )));
      }
    }

    let mut owner: Vec<Option<usize>> = vec![None; n_assets];
    let mut groups: Vec<GroupCap> = Vec::with_capacity(limits.len());

    for (class, &limit) in limits {
      if !limit.is_finite() {
        return Err(OptimiserError::invalid(format!(
          "limit of class '{class}' is not finite"
        )));
      }

      let mut indices = membership.get(class).cloned().unwrap_or_default();
      indices.sort_unstable();
      indices.dedup();

      if indices.is_empty() {
        debug!(class = %class, "limited class has no members");
      }

      for &i in &indices {
        if let Some(other) = owner[i] {
          let other = &groups[other];
          return Err(OptimiserError::invalid(format!(
            "asset {i} belongs to both '{}' and '{class}'",
            other.class
          )));
        }
        owner[i] = Some(groups.len());
      }

      groups.push(GroupCap {
        class: class.clone(),
        indices,
        limit,
      });
    }

    let free = (0..n_assets).filter(|&i| owner[i].is_none()).collect();

    Ok(Self {
      lower,
      upper,
      groups,
      free,
    })
  }

  pub fn n_assets(&self) -> usize {
    self.lower.len()
  }

  pub fn lower(&self) -> &[f64] {
    &self.lower
  }

  pub fn upper(&self) -> &[f64] {
    &self.upper
  }

  pub fn groups(&self) -> &[GroupCap] {
    &self.groups
  }

  /// Fails when no weight vector satisfies every constraint.
  pub fn check_feasible(&self) -> Result<()> {
    for group in &self.groups {
      let floor: f64 = group.indices.iter().map(|&i| self.lower[i]).sum();
      if floor > group.limit + BUDGET_TOLERANCE {
        return Err(OptimiserError::failed(format!(
          "infeasible: lower bounds of class '{}' sum to {floor:.6}, above its limit {:.6}",
          group.class, group.limit
        )));
      }
    }

    let floor: f64 = self.lower.iter().sum();
    if floor > 1.0 + BUDGET_TOLERANCE {
      return Err(OptimiserError::failed(format!(
        "infeasible: lower bounds sum to {floor:.6}, above a full investment of 1"
      )));
    }

    let ceiling = self.max_budget();
    if ceiling < 1.0 - BUDGET_TOLERANCE {
      return Err(OptimiserError::failed(format!(
        "infeasible: bounds and class limits allow at most {ceiling:.6} to be invested"
      )));
    }

    Ok(())
  }

  /// Euclidean projection of `point` onto the feasible set.
  ///
  /// Assumes [`check_feasible`](Self::check_feasible) succeeded.
  pub(crate) fn project(&self, point: &[f64]) -> Vec<f64> {
    let (v_min, v_max) = min_max(point);
    let (l_min, _) = min_max(&self.lower);
    let (_, u_max) = min_max(&self.upper);

    // every coordinate sits at its upper bound at `lo` and its lower bound at `hi`
    let lo = v_min - u_max - 1.0;
    let hi = v_max - l_min + 1.0;
    let lambda = solve_multiplier(|lambda| self.budget(point, lambda) - 1.0, lo, hi);

    let mut weights = vec![0.0; point.len()];
    for &i in &self.free {
      weights[i] = self.clip(i, point[i] - lambda);
    }

    for group in &self.groups {
      let shift = if self.group_sum(group, point, lambda) <= group.limit {
        lambda
      } else {
        let g_max = group
          .indices
          .iter()
          .map(|&i| point[i])
          .fold(f64::NEG_INFINITY, f64::max);
        let nu_hi = g_max - lambda - l_min + 1.0;
        let nu = solve_multiplier(
          |nu| self.group_sum(group, point, lambda + nu) - group.limit,
          0.0,
          nu_hi,
        );
        lambda + nu
      };
      for &i in &group.indices {
        weights[i] = self.clip(i, point[i] - shift);
      }
    }

    weights
  }

  /// Largest breach of any constraint, zero for a feasible vector.
  pub(crate) fn max_violation(&self, weights: &[f64]) -> f64 {
    let budget = (weights.iter().sum::<f64>() - 1.0).abs();
    let boxes = weights
      .iter()
      .zip(self.lower.iter().zip(&self.upper))
      .map(|(&w, (&lo, &hi))| (lo - w).max(w - hi))
      .fold(0.0, f64::max);
    let caps = self
      .groups
      .iter()
      .map(|g| -g.slack(weights))
      .fold(0.0, f64::max);

    budget.max(boxes).max(caps)
  }

  pub fn is_satisfied(&self, weights: &[f64], tolerance: f64) -> bool {
    weights.len() == self.n_assets() && self.max_violation(weights) <= tolerance
  }

  /// True when `weights` is the only feasible point, checked by projecting
  /// unit perturbations along every axis.
  pub(crate) fn is_singleton(&self, weights: &[f64]) -> bool {
    (0..weights.len()).all(|i| {
      [1.0, -1.0].iter().all(|&delta| {
        let mut moved = weights.to_vec();
        moved[i] += delta;
        self
          .project(&moved)
          .iter()
          .zip(weights)
          .all(|(p, w)| (p - w).abs() <= FEASIBILITY_TOLERANCE)
      })
    })
  }

  fn clip(&self, i: usize, value: f64) -> f64 {
    value.clamp(self.lower[i], self.upper[i])
  }

  fn group_sum(&self, group: &GroupCap, point: &[f64], shift: f64) -> f64 {
    group
      .indices
      .iter()
      .map(|&i| self.clip(i, point[i] - shift))
      .sum()
  }

  /// Invested weight after shifting by `lambda`, with binding caps applied.
  fn budget(&self, point: &[f64], lambda: f64) -> f64 {
    let free: f64 = self
      .free
      .iter()
      .map(|&i| self.clip(i, point[i] - lambda))
      .sum();
    let capped: f64 = self
      .groups
      .iter()
      .map(|g| g.limit.min(self.group_sum(g, point, lambda)))
      .sum();
    free + capped
  }

  fn max_budget(&self) -> f64 {
    let free: f64 = self.free.iter().map(|&i| self.upper[i]).sum();
    let capped: f64 = self
      .groups
      .iter()
      .map(|g| {
        let room: f64 = g.indices.iter().map(|&i| self.upper[i]).sum();
        g.limit.min(room)
      })
      .sum();
    free + capped
  }
}

/// Root of a non-increasing `f` bracketed by `[lo, hi]`.
fn solve_multiplier(f: impl Fn(f64) -> f64, lo: f64, hi: f64) -> f64 {
  let (f_lo, f_hi) = (f(lo), f(hi));
  if f_lo.abs() <= ROOT_EPS {
    return lo;
  }
  if f_hi.abs() <= ROOT_EPS {
    return hi;
  }

  let mut convergency = SimpleConvergency {
    eps: ROOT_EPS,
    max_iter: ROOT_MAX_ITERS,
  };
  // a bracket only fails for infeasible sets, which the caller rules out
  find_root_brent(lo, hi, &f, &mut convergency).unwrap_or(if f_lo.abs() < f_hi.abs() {
    lo
  } else {
    hi
  })
}

fn min_max(values: &[f64]) -> (f64, f64) {
  values
    .iter()
    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
      (lo.min(v), hi.max(v))
    })
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;

  use super::*;

  fn limits(entries: &[(&str, f64)]) -> AssetClassLimits {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
  }

  fn membership(entries: &[(&str, &[usize])]) -> AssetClassMembership {
    entries
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_vec()))
      .collect()
  }

  fn boxed(n: usize, cap: f64) -> ConstraintSet {
    ConstraintSet::new(n, &limits(&[]), &membership(&[]), cap, None).unwrap()
  }

  #[test]
  fn feasible_points_project_to_themselves() {
    let set = boxed(4, 0.5);
    let point = [0.25, 0.25, 0.3, 0.2];
    let projected = set.project(&point);
    for (p, w) in projected.iter().zip(point) {
      assert_relative_eq!(*p, w, epsilon = 1e-12);
    }
  }

  #[test]
  fn projection_respects_per_asset_cap() {
    let set = boxed(3, 0.5);
    let projected = set.project(&[0.7, 0.2, 0.1]);
    assert_relative_eq!(projected[0], 0.5, epsilon = 1e-12);
    assert_relative_eq!(projected[1], 0.3, epsilon = 1e-12);
    assert_relative_eq!(projected[2], 0.2, epsilon = 1e-12);
  }

  #[test]
  fn projection_moves_weight_out_of_a_breached_class() {
    let set = ConstraintSet::new(
      3,
      &limits(&[("equity", 0.4)]),
      &membership(&[("equity", &[0, 1])]),
      1.0,
      None,
    )
    .unwrap();
    let projected = set.project(&[0.5, 0.4, 0.1]);

    assert_relative_eq!(projected[0], 0.25, epsilon = 1e-12);
    assert_relative_eq!(projected[1], 0.15, epsilon = 1e-12);
    assert_relative_eq!(projected[2], 0.6, epsilon = 1e-12);
    assert!(set.is_satisfied(&projected, 1e-12));
  }

  #[test]
  fn projection_lands_inside_the_polytope() {
    let set = ConstraintSet::new(
      5,
      &limits(&[("equity", 0.5), ("bonds", 0.3)]),
      &membership(&[("equity", &[0, 1, 2]), ("bonds", &[3])]),
      0.45,
      None,
    )
    .unwrap();
    set.check_feasible().unwrap();

    for point in [
      [3.0, -1.0, 0.2, 0.9, 0.0],
      [0.0, 0.0, 0.0, 0.0, 0.0],
      [-5.0, 2.0, 2.0, 2.0, -5.0],
    ] {
      let projected = set.project(&point);
      assert!(set.max_violation(&projected) < 1e-9, "{projected:?}");
    }
  }

  #[test]
  fn cap_too_small_for_full_investment_is_infeasible() {
    let err = boxed(3, 0.2).check_feasible().unwrap_err();
    assert!(matches!(err, OptimiserError::OptimizationFailed(_)));
  }

  #[test]
  fn class_limits_below_one_over_a_partition_are_infeasible() {
    let set = ConstraintSet::new(
      4,
      &limits(&[("equity", 0.5), ("bonds", 0.4)]),
      &membership(&[("equity", &[0, 1]), ("bonds", &[2, 3])]),
      1.0,
      None,
    )
    .unwrap();
    let err = set.check_feasible().unwrap_err();
    assert!(matches!(err, OptimiserError::OptimizationFailed(_)));
  }

  #[test]
  fn lower_bounds_above_a_class_limit_are_infeasible() {
    let bounds = [(0.3, 0.6), (0.3, 0.6), (0.0, 1.0)];
    let set = ConstraintSet::new(
      3,
      &limits(&[("equity", 0.5)]),
      &membership(&[("equity", &[0, 1])]),
      0.2,
      Some(&bounds),
    )
    .unwrap();
    assert!(matches!(
      set.check_feasible(),
      Err(OptimiserError::OptimizationFailed(_))
    ));
  }

  #[test]
  fn explicit_bounds_replace_the_uniform_cap() {
    let bounds = [(0.1, 0.6), (0.0, 0.6), (0.2, 0.3)];
    let set = ConstraintSet::new(3, &limits(&[]), &membership(&[]), 0.01, Some(&bounds)).unwrap();
    set.check_feasible().unwrap();
    assert_eq!(set.lower(), &[0.1, 0.0, 0.2]);
    assert_eq!(set.upper(), &[0.6, 0.6, 0.3]);

    let projected = set.project(&[0.0, 0.0, 1.0]);
    assert!(set.is_satisfied(&projected, 1e-12));
    assert_relative_eq!(projected[2], 0.3, epsilon = 1e-12);
  }

  #[test]
  fn malformed_descriptions_are_invalid_input() {
    let overlap = ConstraintSet::new(
      3,
      &limits(&[("equity", 0.6), ("tech", 0.3)]),
      &membership(&[("equity", &[0, 1]), ("tech", &[1])]),
      1.0,
      None,
    );
    let out_of_range = ConstraintSet::new(
      2,
      &limits(&[]),
      &membership(&[("gold", &[2])]),
      1.0,
      None,
    );
    let short_bounds = ConstraintSet::new(2, &limits(&[]), &membership(&[]), 1.0, Some(&[(0.0, 1.0)]));
    let crossed_bounds = ConstraintSet::new(
      2,
      &limits(&[]),
      &membership(&[]),
      1.0,
      Some(&[(0.6, 0.4), (0.0, 1.0)]),
    );

    for result in [overlap, out_of_range, short_bounds, crossed_bounds] {
      assert!(matches!(result, Err(OptimiserError::InvalidInput(_))));
    }
  }

  #[test]
  fn unlimited_and_empty_classes_are_handled() {
    // "gold" has members but no limit, "cash" has a limit but no members
    let set = ConstraintSet::new(
      2,
      &limits(&[("cash", 0.1)]),
      &membership(&[("gold", &[0, 0, 1])]),
      1.0,
      None,
    )
    .unwrap();

    assert_eq!(set.groups().len(), 1);
    assert!(set.groups()[0].indices.is_empty());
    set.check_feasible().unwrap();
    assert!(set.is_satisfied(&[0.9, 0.1], 1e-12));
  }

  #[test]
  fn duplicate_members_are_collapsed() {
    let set = ConstraintSet::new(
      3,
      &limits(&[("equity", 0.5)]),
      &membership(&[("equity", &[1, 0, 1])]),
      1.0,
      None,
    )
    .unwrap();
    assert_eq!(set.groups()[0].indices, vec![0, 1]);
  }

  #[test]
  fn max_violation_reports_the_worst_breach() {
    let set = ConstraintSet::new(
      3,
      &limits(&[("equity", 0.5)]),
      &membership(&[("equity", &[0, 1])]),
      0.6,
      None,
    )
    .unwrap();

    assert_eq!(set.max_violation(&[0.25, 0.25, 0.5]), 0.0);
    assert_relative_eq!(set.max_violation(&[0.3, 0.4, 0.3]), 0.2, epsilon = 1e-12);
    assert_relative_eq!(set.max_violation(&[0.1, 0.1, 0.7]), 0.1, epsilon = 1e-12);
    assert!(!set.is_satisfied(&[0.5, 0.5], 1e-6));
  }

  #[test]
  fn multiplier_at_the_bracket_edge_is_found() {
    // caps sum to exactly 1, so the budget root sits on the flat end of its bracket
    let set = boxed(2, 0.5);
    let projected = set.project(&[3.0, -1.0]);
    assert_relative_eq!(projected[0], 0.5, epsilon = 1e-12);
    assert_relative_eq!(projected[1], 0.5, epsilon = 1e-12);

    let set = ConstraintSet::new(
      3,
      &limits(&[("equity", 0.25)]),
      &membership(&[("equity", &[0, 1])]),
      1.0,
      Some(&[(0.125, 1.0), (0.125, 1.0), (0.0, 1.0)]),
    )
    .unwrap();
    let projected = set.project(&[2.0, 1.0, 0.0]);
    assert_relative_eq!(projected[0], 0.125, epsilon = 1e-12);
    assert_relative_eq!(projected[1], 0.125, epsilon = 1e-12);
    assert_relative_eq!(projected[2], 0.75, epsilon = 1e-12);
  }

  #[test]
  fn many_assets_project_to_a_full_budget() {
    let set = ConstraintSet::new(
      12,
      &limits(&[("equity", 0.4), ("bonds", 0.35), ("alternatives", 0.25)]),
      &membership(&[
        ("equity", &[0, 1, 2, 3]),
        ("bonds", &[4, 5, 6, 7]),
        ("alternatives", &[8, 9, 10, 11]),
      ]),
      0.15,
      None,
    )
    .unwrap();
    set.check_feasible().unwrap();

    let point: Vec<f64> = (0..12).map(|i| ((i * 7) % 5) as f64 * 0.3 - 0.4).collect();
    let projected = set.project(&point);
    assert!(set.max_violation(&projected) < 1e-10, "{projected:?}");
  }

  #[test]
  fn short_weight_vectors_are_never_satisfied() {
    let set = ConstraintSet::new(
      3,
      &limits(&[("equity", 0.5)]),
      &membership(&[("equity", &[0, 2])]),
      1.0,
      None,
    )
    .unwrap();
    assert!(!set.is_satisfied(&[0.5, 0.5], 1e-6));
    assert!(!set.is_satisfied(&[], 1e-6));
  }

  #[test]
  fn singleton_detection() {
    assert!(boxed(1, 1.0).is_singleton(&[1.0]));
    assert!(boxed(2, 0.5).is_singleton(&[0.5, 0.5]));
    assert!(!boxed(2, 1.0).is_singleton(&[0.5, 0.5]));
  }
}
