//! Budget allocation across categories.
//!
//! Maximizes `Σ_c w_c β_c ln(1 + I_c) − (λ/2) Iᵀ Σ I` over the scaled simplex
//! `{ I ≥ 0, Σ I = B }` (which also enforces `I_c ≤ B`). The objective is
//! concave, so projected gradient ascent with a backtracking line search
//! reaches the constrained optimum; the projection is the sort-based
//! Euclidean projection onto the simplex.
//!
//! The gradient is centered before use. Shifting every component by the
//! same amount leaves the projection unchanged, and removing the common
//! part keeps `x + g` on the scale of `x` when the risk term dominates.

use std::cmp::Ordering;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ensure_finite, McdaError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub max_iterations: usize,
    /// Projected-gradient stationarity tolerance, relative to `max(1, B)`.
    pub tolerance: f64,
    pub max_backtracks: usize,
    pub max_step: f64,
    /// Stationarity accepted once no step strictly improves the objective.
    pub stall_tolerance: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            tolerance: 1e-9,
            max_backtracks: 60,
            max_step: 1e6,
            stall_tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAllocation {
    pub allocation: Vec<f64>,
    /// `expected_return − risk_penalty`.
    pub utility: f64,
    pub expected_return: f64,
    pub risk_penalty: f64,
    pub iterations: usize,
}

struct Objective {
    coeffs: DVector<f64>,
    cov: DMatrix<f64>,
    risk_aversion: f64,
}

impl Objective {
    fn expected_return(&self, x: &DVector<f64>) -> f64 {
        self.coeffs
            .iter()
            .zip(x.iter())
            .map(|(c, xi)| c * xi.ln_1p())
            .sum()
    }

    fn risk_penalty(&self, x: &DVector<f64>) -> f64 {
        0.5 * self.risk_aversion * x.dot(&(&self.cov * x))
    }

    fn value(&self, x: &DVector<f64>) -> f64 {
        self.expected_return(x) - self.risk_penalty(x)
    }

    fn gradient(&self, x: &DVector<f64>) -> DVector<f64> {
        let marginal = DVector::from_fn(x.len(), |i, _| self.coeffs[i] / (1.0 + x[i]));
        marginal - (&self.cov * x) * self.risk_aversion
    }

    /// Gradient with its mean removed, i.e. projected onto `Σ d = 0`.
    fn tangent_gradient(&self, x: &DVector<f64>) -> DVector<f64> {
        let grad = self.gradient(x);
        let mean = grad.mean();
        grad.add_scalar(-mean)
    }

    fn allocation(&self, x: DVector<f64>, iterations: usize) -> BudgetAllocation {
        let expected_return = self.expected_return(&x);
        let risk_penalty = self.risk_penalty(&x);
        BudgetAllocation {
            allocation: x.iter().copied().collect(),
            utility: expected_return - risk_penalty,
            expected_return,
            risk_penalty,
            iterations,
        }
    }
}

/// Euclidean projection onto `{ x ≥ 0, Σ x = total }`.
fn project_onto_simplex(v: &DVector<f64>, total: f64) -> DVector<f64> {
    let mut sorted: Vec<f64> = v.iter().copied().collect();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));

    let mut cumulative = 0.0;
    let mut theta = 0.0;
    for (i, u) in sorted.iter().enumerate() {
        cumulative += u;
        let t = (cumulative - total) / (i + 1) as f64;
        if u - t > 0.0 {
            theta = t;
        }
    }
    v.map(|x| (x - theta).max(0.0))
}

/// `‖P(x + g) − x‖∞`, zero exactly at a constrained stationary point.
fn stationarity(x: &DVector<f64>, grad: &DVector<f64>, total: f64) -> f64 {
    let projected = project_onto_simplex(&(x + grad), total);
    (projected - x).amax()
}

/// Solve the allocation problem, seeded at the equal split.
///
/// Structural problems (shape mismatches, non-finite input, a non-positive
/// budget, negative risk aversion) are errors. Failure to converge is not:
/// it yields `Ok(None)` and callers branch on it.
pub fn optimize_budget(
    cov: &DMatrix<f64>,
    weights: &[f64],
    betas: &[f64],
    total_budget: f64,
    risk_aversion: f64,
    cfg: &OptimizerConfig,
) -> Result<Option<BudgetAllocation>, McdaError> {
    let n = weights.len();
    if n == 0 {
        return Err(McdaError::Empty {
            context: "budget weights",
        });
    }
    if betas.len() != n {
        return Err(McdaError::dimension("betas vs weights", n, betas.len()));
    }
    if cov.nrows() != cov.ncols() {
        return Err(McdaError::NotSquare {
            context: "covariance",
            rows: cov.nrows(),
            cols: cov.ncols(),
        });
    }
    if cov.nrows() != n {
        return Err(McdaError::dimension("covariance vs weights", n, cov.nrows()));
    }
    ensure_finite("budget weights", weights)?;
    ensure_finite("betas", betas)?;
    ensure_finite("covariance", cov.as_slice())?;
    if let Some(value) = weights.iter().copied().find(|w| *w < 0.0) {
        return Err(McdaError::NegativeValue {
            context: "budget weights",
            value,
        });
    }
    if !(total_budget.is_finite() && total_budget > 0.0) {
        return Err(McdaError::InvalidParameter {
            name: "total_budget",
            value: total_budget,
        });
    }
    if !(risk_aversion.is_finite() && risk_aversion >= 0.0) {
        return Err(McdaError::InvalidParameter {
            name: "risk_aversion",
            value: risk_aversion,
        });
    }

    let objective = Objective {
        coeffs: DVector::from_fn(n, |i, _| weights[i] * betas[i]),
        cov: (cov + cov.transpose()) * 0.5,
        risk_aversion,
    };
    let scale = total_budget.max(1.0);

    let mut x = DVector::from_element(n, total_budget / n as f64);
    let mut step = 1.0f64;

    for iteration in 1..=cfg.max_iterations {
        let grad = objective.tangent_gradient(&x);
        let kkt = stationarity(&x, &grad, total_budget);
        if kkt <= cfg.tolerance * scale {
            debug!(iteration, kkt, "Budget optimizer converged");
            return Ok(Some(objective.allocation(x, iteration)));
        }

        // Sufficient increase against the quadratic model with curvature
        // 1/t. Only steps with a strictly positive gain qualify.
        let current = objective.value(&x);
        let mut trial_step = (step * 2.0).min(cfg.max_step);
        let mut accepted = None;
        for _ in 0..cfg.max_backtracks {
            let candidate = project_onto_simplex(&(&x + &grad * trial_step), total_budget);
            let delta = &candidate - &x;
            let gain = objective.value(&candidate) - current;
            let model = grad.dot(&delta) - delta.norm_squared() / (2.0 * trial_step);
            if gain > 0.0 && gain >= model {
                accepted = Some(candidate);
                break;
            }
            trial_step *= 0.5;
        }

        match accepted {
            Some(candidate) => {
                x = candidate;
                step = trial_step;
            }
            None if kkt <= cfg.stall_tolerance * scale => {
                debug!(iteration, kkt, "Budget optimizer stalled at a stationary point");
                return Ok(Some(objective.allocation(x, iteration)));
            }
            None => {
                warn!(iteration, kkt, "Budget optimizer line search failed; no allocation");
                return Ok(None);
            }
        }
    }

    warn!(
        max_iterations = cfg.max_iterations,
        "Budget optimizer hit the iteration cap; no allocation"
    );
    Ok(None)
}
