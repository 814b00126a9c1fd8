//! Levenberg–Marquardt fit of the vectorised Lorentzian.

use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use super::guess::guess;
use super::lorentz::{flatten, LinearBackground, Lorentzian, ModelVariant, LORENTZ_PARAMS};
use crate::data::model::Spectrum;
use crate::error::{ResonanceError, Result};

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;

/// Stopping rules for the solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Maximum Jacobian evaluations before giving up.
    pub max_iterations: usize,
    /// Relative reduction of the residual sum of squares that counts as converged.
    pub ftol: f64,
    /// Relative step size that counts as converged.
    pub xtol: f64,
    /// Gradient infinity-norm that counts as converged.
    pub gtol: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ftol: 1.49012e-8,
            xtol: 1.49012e-8,
            gtol: 0.0,
        }
    }
}

/// What to fit and how.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    pub variant: ModelVariant,
    /// Starting phase handed to the initial-guess estimator.
    pub phase_hint: f64,
    pub solver: SolverOptions,
}

impl FitOptions {
    pub fn new(variant: ModelVariant) -> Self {
        Self {
            variant,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// FitResult
// ---------------------------------------------------------------------------

/// Optimal parameters with their covariance.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    /// `[f0, A, γ, φ]`, followed by `[a_re, b_re, a_im, b_im]` for the background variant.
    pub parameters: Vec<f64>,
    /// Square, symmetric, `parameters.len()` on a side.
    pub covariance: DMatrix<f64>,
    pub variant: ModelVariant,
    pub residual_sum_squares: f64,
    pub iterations: usize,
}

impl FitResult {
    pub fn lorentzian(&self) -> Lorentzian {
        Lorentzian::from_params(&self.parameters)
    }

    pub fn background(&self) -> Option<LinearBackground> {
        match self.variant {
            ModelVariant::Plain => None,
            ModelVariant::LinearBackground => Some(LinearBackground::from_params(
                &self.parameters[LORENTZ_PARAMS..],
            )),
        }
    }

    pub fn parameter(&self, index: usize) -> Result<f64> {
        self.parameters
            .get(index)
            .copied()
            .ok_or(ResonanceError::ParameterIndex {
                index,
                len: self.parameters.len(),
            })
    }

    /// Diagonal covariance entry. NaN or negative values mean the fit is
    /// degenerate and are reported as errors.
    pub fn variance(&self, index: usize) -> Result<f64> {
        self.parameter(index)?;
        let variance = self.covariance[(index, index)];
        if variance.is_nan() || variance < 0.0 {
            return Err(ResonanceError::DegenerateCovariance { index, variance });
        }
        Ok(variance)
    }

    /// `sqrt(covariance[i][i])`.
    pub fn standard_error(&self, index: usize) -> Result<f64> {
        self.variance(index).map(f64::sqrt)
    }

    /// Transverse relaxation time `1/γ` in seconds.
    pub fn t2_seconds(&self) -> Result<f64> {
        let gamma = self.lorentzian().gamma;
        if gamma == 0.0 {
            return Err(ResonanceError::DivisionByZero { quantity: "T2" });
        }
        Ok(1.0 / gamma)
    }

    /// `1/(60·γ)`.
    pub fn t2_minutes(&self) -> Result<f64> {
        self.t2_seconds().map(|t2| t2 / 60.0)
    }

    /// Fitted model at `f`.
    pub fn eval(&self, f: f64) -> Complex64 {
        self.variant.eval(f, &self.parameters)
    }
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

/// Fit a [`Spectrum`]. See [`fit`].
pub fn fit_spectrum(
    spectrum: &Spectrum,
    seed: Option<&[f64]>,
    options: &FitOptions,
) -> Result<FitResult> {
    fit(spectrum.frequency(), spectrum.signal(), seed, options)
}

/// Least-squares fit of `options.variant` to a complex spectrum.
///
/// `seed` may hold `[f0, A, γ, φ]` or a full parameter vector; a four-value
/// seed is extended with zero background terms for the background variant.
/// Without a seed the initial guess is estimated from the data.
pub fn fit(
    frequency: &[f64],
    signal: &[Complex64],
    seed: Option<&[f64]>,
    options: &FitOptions,
) -> Result<FitResult> {
    if frequency.len() != signal.len() {
        return Err(ResonanceError::DimensionMismatch {
            context: "fit input",
            expected: frequency.len(),
            actual: signal.len(),
        });
    }
    let variant = options.variant;
    let n_params = variant.param_count();
    if frequency.len() < n_params {
        return Err(ResonanceError::InsufficientData {
            needed: n_params,
            got: frequency.len(),
        });
    }

    let mut start = match seed {
        Some(values) => values.to_vec(),
        None => guess(frequency, signal, options.phase_hint)?
            .to_params()
            .to_vec(),
    };
    if start.len() == LORENTZ_PARAMS {
        start.resize(n_params, 0.0);
    }
    if start.len() != n_params {
        return Err(ResonanceError::DimensionMismatch {
            context: "fit seed",
            expected: n_params,
            actual: start.len(),
        });
    }

    let measured = DVector::from_vec(flatten(signal.iter().copied(), signal.len()));
    let problem = Problem {
        frequency,
        measured: &measured,
        variant,
    };
    let solution = levenberg_marquardt(&problem, DVector::from_vec(start), &options.solver)?;
    let covariance = estimate_covariance(&solution.jacobian, solution.cost);

    debug!(
        "fit converged after {} iterations: params = {:?}, rss = {:e}",
        solution.iterations,
        solution.params.as_slice(),
        solution.cost
    );

    Ok(FitResult {
        parameters: solution.params.as_slice().to_vec(),
        covariance,
        variant,
        residual_sum_squares: solution.cost,
        iterations: solution.iterations,
    })
}

struct Problem<'a> {
    frequency: &'a [f64],
    measured: &'a DVector<f64>,
    variant: ModelVariant,
}

impl Problem<'_> {
    fn residual(&self, params: &DVector<f64>) -> DVector<f64> {
        self.variant.vectorize(self.frequency, params.as_slice()) - self.measured
    }

    fn jacobian(&self, params: &DVector<f64>) -> DMatrix<f64> {
        self.variant.jacobian(self.frequency, params.as_slice())
    }
}

struct Solution {
    params: DVector<f64>,
    jacobian: DMatrix<f64>,
    cost: f64,
    iterations: usize,
}

fn levenberg_marquardt(
    problem: &Problem<'_>,
    mut params: DVector<f64>,
    options: &SolverOptions,
) -> Result<Solution> {
    let diverged = |iterations: usize, reason: &str| ResonanceError::FitDiverged {
        iterations,
        reason: reason.to_string(),
    };

    let mut residual = problem.residual(&params);
    let mut cost = residual.norm_squared();
    if !cost.is_finite() {
        return Err(diverged(0, "model is not finite at the seed"));
    }
    let mut jacobian = problem.jacobian(&params);
    if is_singular(&jacobian) {
        return Err(diverged(0, "Jacobian is singular at the seed"));
    }

    let mut lambda = LAMBDA_INIT;
    for iteration in 1..=options.max_iterations {
        let jt = jacobian.transpose();
        let jtj = &jt * &jacobian;
        let gradient = &jt * &residual;

        if gradient.amax() <= options.gtol {
            return Ok(Solution {
                params,
                jacobian,
                cost,
                iterations: iteration,
            });
        }

        loop {
            let mut damped = jtj.clone();
            for k in 0..damped.nrows() {
                damped[(k, k)] += lambda * jtj[(k, k)].max(f64::EPSILON);
            }
            let Some(step) = damped.cholesky().map(|c| c.solve(&-&gradient)) else {
                lambda *= 10.0;
                if lambda > LAMBDA_MAX {
                    return Err(diverged(iteration, "damped normal equations are singular"));
                }
                continue;
            };

            let small_step =
                step.norm() <= options.xtol * (params.norm() + options.xtol);
            let trial = &params + &step;
            let trial_residual = problem.residual(&trial);
            let trial_cost = trial_residual.norm_squared();

            if trial_cost.is_finite() && trial_cost < cost {
                let reduction = (cost - trial_cost) / cost;
                params = trial;
                residual = trial_residual;
                cost = trial_cost;
                jacobian = problem.jacobian(&params);
                lambda = (lambda / 10.0).max(LAMBDA_MIN);
                debug!("lm iteration {iteration}: rss = {cost:e}, lambda = {lambda:e}");

                if reduction <= options.ftol || small_step {
                    return Ok(Solution {
                        params,
                        jacobian,
                        cost,
                        iterations: iteration,
                    });
                }
                break;
            }

            if small_step {
                return Ok(Solution {
                    params,
                    jacobian,
                    cost,
                    iterations: iteration,
                });
            }
            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                return Err(diverged(iteration, "no downhill step found"));
            }
        }
    }

    Err(diverged(options.max_iterations, "iteration budget exhausted"))
}

fn is_singular(jacobian: &DMatrix<f64>) -> bool {
    let sv = jacobian.singular_values();
    let largest = sv.max();
    let tol = f64::EPSILON * jacobian.nrows().max(jacobian.ncols()) as f64 * largest;
    largest.is_nan() || largest <= 0.0 || sv.min() <= tol
}

/// `(JᵀJ)⁺ · rss / (m − p)` via the SVD of `J`, dropping negligible singular values.
fn estimate_covariance(jacobian: &DMatrix<f64>, cost: f64) -> DMatrix<f64> {
    let (rows, cols) = jacobian.shape();
    let dof = rows.saturating_sub(cols);
    if dof == 0 {
        warn!("no degrees of freedom left ({rows} residuals, {cols} parameters); covariance is unbounded");
        return DMatrix::from_element(cols, cols, f64::INFINITY);
    }

    let svd = jacobian.clone().svd(false, true);
    let Some(v_t) = svd.v_t else {
        return DMatrix::from_element(cols, cols, f64::NAN);
    };
    let largest = svd.singular_values.max();
    let threshold = f64::EPSILON * rows.max(cols) as f64 * largest;

    let mut covariance = DMatrix::zeros(cols, cols);
    for (k, &s) in svd.singular_values.iter().enumerate() {
        if s > threshold {
            let v = v_t.row(k);
            covariance += v.transpose() * v / (s * s);
        }
    }
    covariance * (cost / dof as f64)
}
