//! # Projected Gradient
//!
//! $$
//! \mathbf d_k = P_{\mathcal W}(\mathbf w_k-\alpha_k\nabla f_k)-\mathbf w_k,\qquad
//! \alpha_{k+1}=\frac{\mathbf s_k^\top\mathbf s_k}{\mathbf s_k^\top\mathbf y_k}
//! $$
//!
//! Spectral projected gradient with a Barzilai-Borwein step and an Armijo
//! backtracking line search along the feasible direction `d_k`. Every iterate
//! is feasible because the feasible set is convex.

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::core::State;
use argmin::solver::linesearch::condition::ArmijoCondition;
use argmin::solver::linesearch::BacktrackingLineSearch;
use argmin::solver::linesearch::LineSearch;
use tracing::debug;

use super::config::SolverSettings;
use super::constraints::ConstraintSet;
use super::objective::SharpeObjective;
use crate::error::OptimiserError;
use crate::error::Result;

const ARMIJO_C: f64 = 1e-4;
const BACKTRACK_RHO: f64 = 0.5;
const STEP_MIN: f64 = 1e-10;
const STEP_MAX: f64 = 1e10;

/// Why the solver stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Convergence {
  /// Projected gradient below `gtol`.
  Stationary,
  /// Objective improvement below `ftol`, or no descent left near a stationary point.
  Stalled,
  /// The feasible set holds a single point.
  SinglePoint,
}

#[derive(Clone, Debug)]
pub(crate) struct SolverReport {
  pub weights: Vec<f64>,
  pub iterations: u64,
  pub convergence: Convergence,
}

pub(crate) struct ProjectedGradient<'a> {
  constraints: &'a ConstraintSet,
  settings: &'a SolverSettings,
}

impl<'a> ProjectedGradient<'a> {
  pub fn new(constraints: &'a ConstraintSet, settings: &'a SolverSettings) -> Self {
    Self {
      constraints,
      settings,
    }
  }

  pub fn minimize(&self, objective: &SharpeObjective, start: &[f64]) -> Result<SolverReport> {
    let mut w = self.constraints.project(start);

    let (mut f, mut g) = match objective.value_and_gradient(&w) {
      Ok(value) => value,
      Err(OptimiserError::DegenerateVolatility { volatility }) => {
        if self.constraints.is_singleton(&w) {
          debug!("feasible set is a single point");
          return Ok(SolverReport {
            weights: w,
            iterations: 0,
            convergence: Convergence::SinglePoint,
          });
        }
        return Err(OptimiserError::DegenerateVolatility { volatility });
      }
      Err(e) => return Err(e),
    };

    let mut step = match self.projected_gradient_norm(&w, &g) {
      norm if norm > 0.0 => (1.0 / norm).clamp(STEP_MIN, STEP_MAX),
      _ => 1.0,
    };

    for iteration in 0..self.settings.max_iters {
      let pg_norm = self.projected_gradient_norm(&w, &g);
      if pg_norm <= self.settings.gtol {
        return Ok(report(w, iteration, Convergence::Stationary));
      }

      let target = self.constraints.project(&axpy(&w, -step, &g));
      let direction: Vec<f64> = target.iter().zip(&w).map(|(t, x)| t - x).collect();

      let Some((next, f_next)) = self.line_search(objective, &w, f, &g, direction)? else {
        if pg_norm <= self.settings.gtol.sqrt() {
          return Ok(report(w, iteration, Convergence::Stalled));
        }
        return Err(OptimiserError::failed(format!(
          "line search found no descent at iteration {iteration} (projected gradient {pg_norm:.3e})"
        )));
      };

      let (_, g_next) = objective.value_and_gradient(&next)?;
      let s: Vec<f64> = next.iter().zip(&w).map(|(a, b)| a - b).collect();
      let y: Vec<f64> = g_next.iter().zip(&g).map(|(a, b)| a - b).collect();
      let sty = dot(&s, &y);
      step = if sty > 0.0 {
        (dot(&s, &s) / sty).clamp(STEP_MIN, STEP_MAX)
      } else {
        STEP_MAX
      };

      let improvement = f - f_next;
      debug!(
        iteration,
        sharpe = -f_next,
        improvement,
        step,
        "projected gradient step"
      );

      w = next;
      f = f_next;
      g = g_next;

      if improvement <= self.settings.ftol * (1.0 + f.abs()) {
        return Ok(report(w, iteration + 1, Convergence::Stalled));
      }
    }

    Err(OptimiserError::failed(format!(
      "iteration limit of {} reached",
      self.settings.max_iters
    )))
  }

  /// Backtracks from the full step along `direction`; `None` when nothing beats `f`.
  fn line_search(
    &self,
    objective: &SharpeObjective,
    w: &[f64],
    f: f64,
    g: &[f64],
    direction: Vec<f64>,
  ) -> Result<Option<(Vec<f64>, f64)>> {
    let condition = ArmijoCondition::new(ARMIJO_C)?;
    let mut linesearch: BacktrackingLineSearch<Vec<f64>, Vec<f64>, ArmijoCondition<f64>, f64> =
      BacktrackingLineSearch::new(condition).rho(BACKTRACK_RHO)?;
    linesearch.search_direction(direction);
    linesearch.initial_step_length(1.0)?;

    let res = Executor::new(objective.clone(), linesearch)
      .configure(|state| {
        state
          .param(w.to_vec())
          .gradient(g.to_vec())
          .cost(f)
          .max_iters(self.settings.line_search_iters)
      })
      .run()?;

    let state = res.state();
    let Some(candidate) = state.get_best_param().or_else(|| state.get_param()) else {
      return Ok(None);
    };
    let cost = objective.cost(candidate)?;

    Ok((cost.is_finite() && cost < f).then(|| (candidate.clone(), cost)))
  }

  /// `|P(w - g) - w|_inf`, zero exactly at stationary points.
  fn projected_gradient_norm(&self, w: &[f64], g: &[f64]) -> f64 {
    self
      .constraints
      .project(&axpy(w, -1.0, g))
      .iter()
      .zip(w)
      .map(|(p, x)| (p - x).abs())
      .fold(0.0, f64::max)
  }
}

fn report(weights: Vec<f64>, iterations: u64, convergence: Convergence) -> SolverReport {
  SolverReport {
    weights,
    iterations,
    convergence,
  }
}

/// `x + a * y`
fn axpy(x: &[f64], a: f64, y: &[f64]) -> Vec<f64> {
  x.iter().zip(y).map(|(xi, yi)| xi + a * yi).collect()
}

fn dot(x: &[f64], y: &[f64]) -> f64 {
  x.iter().zip(y).map(|(a, b)| a * b).sum()
}
