//! Indicator forecasting: grey model GM(1,1) and a logistic growth curve.
//!
//! The logistic model is fitted with Levenberg–Marquardt. Whenever that fit
//! fails the engine falls back to GM(1,1); the returned [`Forecast`] records
//! which model actually produced the numbers and why the fallback happened.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ensure_finite, ensure_positive, McdaError};

/// Largest exponent passed to `exp` in the logistic curve.
const MAX_EXP_ARG: f64 = 700.0;

/// Damping above which Levenberg–Marquardt is considered stalled.
const MAX_DAMPING: f64 = 1e16;

/// Relative determinant below which the GM(1,1) normal equations are treated
/// as rank deficient.
const SINGULAR_DET_RATIO: f64 = 1e-12;

// ---------------------------------------------------------------------
//  Config and result types
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// `|a|` below this switches GM(1,1) to its linear a → 0 limit.
    pub degenerate_threshold: f64,
    /// Cap on logistic cost evaluations.
    pub logistic_max_evaluations: usize,
    /// Relative cost decrease (or relative step) that counts as converged.
    pub logistic_tolerance: f64,
    /// Initial Levenberg–Marquardt damping.
    pub logistic_initial_damping: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            degenerate_threshold: 1e-9,
            logistic_max_evaluations: 5_000,
            logistic_tolerance: 1e-10,
            logistic_initial_damping: 1e-3,
        }
    }
}

/// Model the caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    Grey,
    Logistic,
}

/// Model that actually produced a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastModel {
    /// GM(1,1) closed form.
    Grey,
    /// GM(1,1) with a vanishing development coefficient, evaluated at its
    /// a → 0 limit (linear cumulative trend).
    GreyLinear,
    Logistic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    /// In-sample fit for the first `history_len` entries, projections after.
    pub values: Vec<f64>,
    pub history_len: usize,
    pub requested: ForecastMethod,
    pub model: ForecastModel,
    /// Why the requested model was abandoned, if it was.
    pub fallback_reason: Option<String>,
}

impl Forecast {
    pub fn fitted(&self) -> &[f64] {
        &self.values[..self.split()]
    }

    pub fn projected(&self) -> &[f64] {
        &self.values[self.split()..]
    }

    /// `history_len` clamped to the stored values.
    fn split(&self) -> usize {
        self.history_len.min(self.values.len())
    }

    pub fn fell_back(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

// ---------------------------------------------------------------------
//  GM(1,1)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GreyModel {
    /// `a` in `dx1/dt + a x1 = b`.
    pub development_coefficient: f64,
    /// `b`, the grey input.
    pub grey_input: f64,
    /// First raw observation; anchors the cumulative curve.
    pub initial: f64,
    pub degenerate: bool,
}

impl GreyModel {
    pub fn fit(history: &[f64], cfg: &ForecastConfig) -> Result<Self, McdaError> {
        if history.len() < 2 {
            return Err(McdaError::InsufficientHistory {
                required: 2,
                got: history.len(),
            });
        }
        ensure_finite("forecast history", history)?;
        ensure_positive("forecast history", history)?;

        let mut cumulative = Vec::with_capacity(history.len());
        let mut acc = 0.0;
        for x in history {
            acc += x;
            cumulative.push(acc);
        }

        // Rows [-z1[k], 1] with background value z1[k] = mean of adjacent
        // cumulative values; targets are the raw series shifted by one.
        let rows = history.len() - 1;
        let b_mat = DMatrix::from_fn(rows, 2, |k, col| {
            if col == 0 {
                -0.5 * (cumulative[k] + cumulative[k + 1])
            } else {
                1.0
            }
        });
        let y = DVector::from_column_slice(&history[1..]);

        let bt = b_mat.transpose();
        let btb = &bt * &b_mat;
        let bty = &bt * &y;
        let coeffs = solve_normal_equations(btb, bty)?;

        let a = coeffs[0];
        let b = coeffs[1];
        if !a.is_finite() || !b.is_finite() {
            return Err(McdaError::SingularSystem {
                context: "grey model normal equations",
            });
        }

        let degenerate = a.abs() < cfg.degenerate_threshold;
        if degenerate {
            warn!(
                development_coefficient = a,
                threshold = cfg.degenerate_threshold,
                "GM(1,1) development coefficient vanished; using the linear limit"
            );
        }

        Ok(Self {
            development_coefficient: a,
            grey_input: b,
            initial: history[0],
            degenerate,
        })
    }

    /// Fitted cumulative value `x1_hat(k)`.
    pub fn cumulative(&self, k: usize) -> f64 {
        let a = self.development_coefficient;
        let b = self.grey_input;
        let k = k as f64;
        if self.degenerate {
            self.initial + b * k
        } else {
            (self.initial - b / a) * (-a * k).exp() + b / a
        }
    }

    /// First differences of the cumulative curve for `k = 0..len`.
    pub fn predict(&self, len: usize) -> Vec<f64> {
        let mut out = Vec::with_capacity(len);
        let mut prev = 0.0;
        for k in 0..len {
            let x1 = self.cumulative(k);
            out.push(x1 - prev);
            prev = x1;
        }
        out
    }

    pub fn model(&self) -> ForecastModel {
        if self.degenerate {
            ForecastModel::GreyLinear
        } else {
            ForecastModel::Grey
        }
    }
}

fn solve_normal_equations(
    btb: DMatrix<f64>,
    bty: DVector<f64>,
) -> Result<DVector<f64>, McdaError> {
    let scale = btb[(0, 0)].abs() * btb[(1, 1)].abs();
    let det = btb.determinant();
    if scale > 0.0 && det.abs() > SINGULAR_DET_RATIO * scale {
        if let Some(x) = btb.clone().lu().solve(&bty) {
            return Ok(x);
        }
    }

    // Rank deficient (e.g. a two-point history): minimum-norm solution.
    let pinv = btb
        .pseudo_inverse(1e-12)
        .map_err(|_| McdaError::SingularSystem {
            context: "grey model normal equations",
        })?;
    Ok(pinv * bty)
}

// ---------------------------------------------------------------------
//  Logistic growth
// ---------------------------------------------------------------------

/// `K / (1 + exp(-r (t - t0)))`, evaluated at `t = 1, 2, …`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticCurve {
    pub capacity: f64,
    pub rate: f64,
    pub midpoint: f64,
}

impl LogisticCurve {
    pub fn value(&self, t: f64) -> f64 {
        self.capacity / (1.0 + bounded_exp(-self.rate * (t - self.midpoint)))
    }

    pub fn predict(&self, len: usize) -> Vec<f64> {
        (1..=len).map(|t| self.value(t as f64)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticFit {
    pub curve: LogisticCurve,
    pub iterations: usize,
    pub evaluations: usize,
    pub rmse: f64,
}

fn bounded_exp(x: f64) -> f64 {
    x.clamp(-MAX_EXP_ARG, MAX_EXP_ARG).exp()
}

fn curve_of(theta: &DVector<f64>) -> LogisticCurve {
    LogisticCurve {
        capacity: theta[0],
        rate: theta[1],
        midpoint: theta[2],
    }
}

fn sum_squares(theta: &DVector<f64>, history: &[f64]) -> f64 {
    let curve = curve_of(theta);
    history
        .iter()
        .enumerate()
        .map(|(i, y)| {
            let r = curve.value((i + 1) as f64) - y;
            r * r
        })
        .sum()
}

/// Jacobian of the curve w.r.t. `(K, r, t0)` and the residual vector.
fn jacobian(theta: &DVector<f64>, history: &[f64]) -> (DMatrix<f64>, DVector<f64>) {
    let (k, r, t0) = (theta[0], theta[1], theta[2]);
    let n = history.len();
    let mut jac = DMatrix::<f64>::zeros(n, 3);
    let mut resid = DVector::<f64>::zeros(n);
    for (i, y) in history.iter().enumerate() {
        let t = (i + 1) as f64;
        let e = bounded_exp(-r * (t - t0));
        let d = 1.0 + e;
        jac[(i, 0)] = 1.0 / d;
        jac[(i, 1)] = k * e * (t - t0) / (d * d);
        jac[(i, 2)] = -k * e * r / (d * d);
        resid[i] = k / d - y;
    }
    (jac, resid)
}

/// Levenberg–Marquardt fit of a logistic growth curve to `history` at
/// `t = 1..=n`, seeded at `K = 1.5·max`, `r = 0.5`, `t0 = n/2`.
///
/// Fails on fewer than three points, on non-convergence within the
/// evaluation cap, and on a fitted curve that does not grow (`K ≤ 0` or
/// `r ≤ 0`).
pub fn fit_logistic(history: &[f64], cfg: &ForecastConfig) -> Result<LogisticFit, McdaError> {
    let n = history.len();
    if n < 3 {
        return Err(McdaError::InsufficientHistory {
            required: 3,
            got: n,
        });
    }
    ensure_finite("forecast history", history)?;
    ensure_positive("forecast history", history)?;

    let max = history.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut theta = DVector::from_vec(vec![1.5 * max, 0.5, n as f64 / 2.0]);
    let mut cost = sum_squares(&theta, history);
    if !cost.is_finite() {
        return Err(McdaError::ConvergenceFailure {
            stage: "logistic fit",
            iterations: 0,
        });
    }

    let tol = cfg.logistic_tolerance;
    let mut lambda = cfg.logistic_initial_damping;
    let mut evaluations = 1usize;
    let mut iterations = 0usize;

    'outer: while evaluations < cfg.logistic_max_evaluations {
        iterations += 1;
        let (jac, resid) = jacobian(&theta, history);
        let jt = jac.transpose();
        let jtj = &jt * &jac;
        let neg_grad = -(&jt * &resid);

        loop {
            if evaluations >= cfg.logistic_max_evaluations {
                break 'outer;
            }
            let mut damped = jtj.clone();
            for i in 0..3 {
                damped[(i, i)] += lambda * jtj[(i, i)].max(f64::EPSILON);
            }

            let Some(step) = damped.lu().solve(&neg_grad) else {
                lambda *= 10.0;
                if lambda > MAX_DAMPING {
                    break 'outer;
                }
                continue;
            };

            let candidate = &theta + &step;
            let candidate_cost = sum_squares(&candidate, history);
            evaluations += 1;

            if candidate_cost.is_finite() && candidate_cost < cost {
                let relative = (cost - candidate_cost) / cost.max(f64::MIN_POSITIVE);
                let step_size = (0..3)
                    .map(|i| step[i].abs() / (theta[i].abs() + 1e-12))
                    .fold(0.0, f64::max);
                theta = candidate;
                cost = candidate_cost;
                lambda = (lambda / 10.0).max(1e-12);

                if relative < tol || step_size < tol || cost < 1e-24 {
                    return finish_logistic(&theta, cost, n, iterations, evaluations);
                }
                break;
            }

            lambda *= 10.0;
            if lambda > MAX_DAMPING {
                break 'outer;
            }
        }
    }

    Err(McdaError::ConvergenceFailure {
        stage: "logistic fit",
        iterations,
    })
}

fn finish_logistic(
    theta: &DVector<f64>,
    cost: f64,
    n: usize,
    iterations: usize,
    evaluations: usize,
) -> Result<LogisticFit, McdaError> {
    let curve = curve_of(theta);
    if !theta.iter().all(|v| v.is_finite()) {
        return Err(McdaError::ConvergenceFailure {
            stage: "logistic fit",
            iterations,
        });
    }
    if curve.capacity <= 0.0 || curve.rate <= 0.0 {
        return Err(McdaError::NonGrowthCurve {
            capacity: curve.capacity,
            rate: curve.rate,
        });
    }
    Ok(LogisticFit {
        curve,
        iterations,
        evaluations,
        rmse: (cost / n as f64).sqrt(),
    })
}

// ---------------------------------------------------------------------
//  Public entry point
// ---------------------------------------------------------------------

/// Project `history` forward by `future_steps`.
///
/// The result has `history.len() + future_steps` values. A failed logistic
/// fit is not an error: GM(1,1) runs instead and the reason is recorded in
/// `fallback_reason`.
pub fn forecast(
    history: &[f64],
    future_steps: usize,
    method: ForecastMethod,
    cfg: &ForecastConfig,
) -> Result<Forecast, McdaError> {
    if history.len() < 2 {
        return Err(McdaError::InsufficientHistory {
            required: 2,
            got: history.len(),
        });
    }
    ensure_finite("forecast history", history)?;
    ensure_positive("forecast history", history)?;
    let len = history.len() + future_steps;

    match method {
        ForecastMethod::Grey => grey_forecast(history, len, method, None, cfg),
        ForecastMethod::Logistic => match fit_logistic(history, cfg) {
            Ok(fit) => {
                debug!(
                    capacity = fit.curve.capacity,
                    rate = fit.curve.rate,
                    midpoint = fit.curve.midpoint,
                    iterations = fit.iterations,
                    "Logistic fit converged"
                );
                Ok(Forecast {
                    values: fit.curve.predict(len),
                    history_len: history.len(),
                    requested: method,
                    model: ForecastModel::Logistic,
                    fallback_reason: None,
                })
            }
            Err(err) => {
                debug!(error = %err, "Logistic fit failed; falling back to GM(1,1)");
                grey_forecast(history, len, method, Some(err.to_string()), cfg)
            }
        },
    }
}

fn grey_forecast(
    history: &[f64],
    len: usize,
    requested: ForecastMethod,
    fallback_reason: Option<String>,
    cfg: &ForecastConfig,
) -> Result<Forecast, McdaError> {
    let model = GreyModel::fit(history, cfg)?;
    Ok(Forecast {
        values: model.predict(len),
        history_len: history.len(),
        requested,
        model: model.model(),
        fallback_reason,
    })
}
