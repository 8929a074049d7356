//! Maximum-likelihood logistic regression
//!
//! Binary and multinomial models share one Newton-Raphson driver. Each
//! model supplies its log-likelihood, gradient and Fisher information
//! through [`Objective`]; the driver handles step halving, convergence and
//! covariance estimation. Fits that diverge are returned with a
//! [`FitStatus`] describing why, never as errors.

pub mod binary;
pub mod inference;
pub mod multinomial;

pub use binary::{fit_binary, BinaryLogisticModel};
pub use inference::{pvalue_z, significance_stars, wald_interval, CoefficientEstimate};
pub use multinomial::{fit_multinomial, MultinomialEquation, MultinomialLogisticModel};

use faer::prelude::SolverCore;
use faer::{Mat, Side};
use serde::{Deserialize, Serialize};

/// Name given to the intercept row of coefficient tables
pub const INTERCEPT: &str = "(Intercept)";

/// Fitted probabilities closer than this to 0 or 1 count as boundary fits
pub const BOUNDARY_EPSILON: f64 = 10.0 * f64::EPSILON;

/// Residual deviance below which a fit is considered saturated
const SATURATED_DEVIANCE: f64 = 1e-4;

/// Estimates beyond this magnitude on the log-odds scale are suspect when
/// their standard error dwarfs them
const LARGE_COEFFICIENT: f64 = 10.0;

/// Iteration limits and tolerances for the Newton-Raphson fitter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub max_iterations: usize,
    /// Relative log-likelihood change treated as converged
    pub tolerance: f64,
    pub max_step_halvings: usize,
    /// Confidence level for Wald intervals
    pub confidence_level: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            tolerance: 1e-8,
            max_step_halvings: 10,
            confidence_level: 0.95,
        }
    }
}

/// Why a fit cannot be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NonConvergence {
    /// Coefficients diverging because some rows are perfectly predicted
    QuasiSeparation,
    /// A fitted probability reached 0 or 1
    BoundaryProbability,
    /// The information matrix could not be inverted
    SingularInformation,
    /// Tolerance not met within the iteration budget
    IterationLimit,
}

impl std::fmt::Display for NonConvergence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NonConvergence::QuasiSeparation => write!(f, "quasi-separation"),
            NonConvergence::BoundaryProbability => write!(f, "fitted probability at boundary"),
            NonConvergence::SingularInformation => write!(f, "singular information matrix"),
            NonConvergence::IterationLimit => write!(f, "iteration limit reached"),
        }
    }
}

/// Convergence status of a fitted model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum FitStatus {
    Converged,
    NonConverged(NonConvergence),
}

impl FitStatus {
    pub fn is_converged(&self) -> bool {
        matches!(self, FitStatus::Converged)
    }
}

impl std::fmt::Display for FitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitStatus::Converged => write!(f, "converged"),
            FitStatus::NonConverged(reason) => write!(f, "not converged ({})", reason),
        }
    }
}

/// A concave log-likelihood over a flat parameter vector
pub(crate) trait Objective {
    fn dimension(&self) -> usize;

    fn initial_params(&self) -> Vec<f64>;

    fn log_likelihood(&self, params: &[f64]) -> f64;

    /// Score vector and Fisher information at `params`
    fn gradient_and_information(&self, params: &[f64]) -> (Vec<f64>, Mat<f64>);

    /// Every fitted probability at `params`, used for the boundary check
    fn fitted_probabilities(&self, params: &[f64]) -> Vec<f64>;
}

/// Raw result of the Newton-Raphson driver
#[derive(Debug, Clone)]
pub(crate) struct NewtonOutcome {
    pub params: Vec<f64>,
    pub log_likelihood: f64,
    pub iterations: usize,
    pub reached_tolerance: bool,
    /// Inverse information at the final parameters
    pub covariance: Option<Mat<f64>>,
}

impl NewtonOutcome {
    /// Standard errors from the covariance diagonal; infinite when the
    /// information was singular
    pub fn std_errors(&self) -> Vec<f64> {
        match &self.covariance {
            Some(cov) => (0..self.params.len())
                .map(|i| {
                    let v = cov[(i, i)];
                    if v.is_finite() && v >= 0.0 {
                        v.sqrt()
                    } else {
                        f64::INFINITY
                    }
                })
                .collect(),
            None => vec![f64::INFINITY; self.params.len()],
        }
    }
}

/// Invert a symmetric positive definite matrix through its Cholesky factor
pub(crate) fn invert_information(information: &Mat<f64>) -> Option<Mat<f64>> {
    let n = information.nrows();
    for j in 0..n {
        for i in 0..n {
            if !information[(i, j)].is_finite() {
                return None;
            }
        }
    }
    let inverse = information.cholesky(Side::Lower).ok()?.inverse();
    for i in 0..n {
        if !inverse[(i, i)].is_finite() || inverse[(i, i)] < 0.0 {
            return None;
        }
    }
    Some(inverse)
}

/// Maximize `objective` by Newton-Raphson with step halving.
///
/// A step is halved until the log-likelihood does not decrease. When no
/// halving improves on the current point the iteration stops there.
pub(crate) fn newton_raphson<O: Objective>(objective: &O, config: &FitConfig) -> NewtonOutcome {
    let dim = objective.dimension();
    let mut params = objective.initial_params();
    let mut ll = objective.log_likelihood(&params);
    let mut iterations = 0;
    let mut reached_tolerance = false;

    while iterations < config.max_iterations {
        iterations += 1;

        let (gradient, information) = objective.gradient_and_information(&params);
        let inverse = match invert_information(&information) {
            Some(inv) => inv,
            None => {
                log::debug!("Iteration {}: information matrix not invertible", iterations);
                break;
            }
        };

        let step: Vec<f64> = (0..dim)
            .map(|i| (0..dim).map(|j| inverse[(i, j)] * gradient[j]).sum())
            .collect();

        let mut scale = 1.0;
        let mut halvings = 0;
        let accepted = loop {
            let candidate: Vec<f64> = params
                .iter()
                .zip(step.iter())
                .map(|(p, s)| p + scale * s)
                .collect();
            let candidate_ll = objective.log_likelihood(&candidate);
            if candidate_ll.is_finite() && candidate_ll >= ll {
                break Some((candidate, candidate_ll));
            }
            if halvings >= config.max_step_halvings {
                break None;
            }
            halvings += 1;
            scale *= 0.5;
        };

        let (candidate, candidate_ll) = match accepted {
            Some(found) => found,
            None => {
                log::debug!(
                    "Iteration {}: no improving step after {} halvings",
                    iterations,
                    halvings
                );
                reached_tolerance = true;
                break;
            }
        };

        let change = (candidate_ll - ll).abs() / (ll.abs() + 0.1);
        log::debug!(
            "Iteration {}: log-likelihood {:.8}, relative change {:.3e}, halvings {}",
            iterations,
            candidate_ll,
            change,
            halvings
        );
        params = candidate;
        ll = candidate_ll;

        if change < config.tolerance {
            reached_tolerance = true;
            break;
        }
    }

    let (_, information) = objective.gradient_and_information(&params);
    NewtonOutcome {
        params,
        log_likelihood: ll,
        iterations,
        reached_tolerance,
        covariance: invert_information(&information),
    }
}

/// Whether a coefficient is running off to infinity. Newton-Raphson stops
/// a separated coefficient once the log-likelihood flattens out, typically
/// around |beta| = 15..20, with an information of roughly exp(-|beta|).
pub(crate) fn is_diverging(beta: f64, std_error: f64) -> bool {
    !std_error.is_finite()
        || std_error > 100.0 * beta.abs().max(1.0)
        || (beta.abs() > LARGE_COEFFICIENT && std_error > 10.0 * beta.abs())
}

/// Classify a finished fit. Earlier checks take precedence.
///
/// A diverging coefficient means quasi-separation whenever the covariance
/// could be estimated, or when the fit is saturated (complete separation).
pub(crate) fn assess_fit(
    outcome: &NewtonOutcome,
    std_errors: &[f64],
    fitted_probabilities: &[f64],
    residual_deviance: f64,
) -> FitStatus {
    let diverging = outcome
        .params
        .iter()
        .zip(std_errors.iter())
        .any(|(&beta, &se)| is_diverging(beta, se));
    let saturated = residual_deviance < SATURATED_DEVIANCE;
    if diverging && (saturated || outcome.covariance.is_some()) {
        return FitStatus::NonConverged(NonConvergence::QuasiSeparation);
    }

    let at_boundary = fitted_probabilities
        .iter()
        .any(|&p| p <= BOUNDARY_EPSILON || p >= 1.0 - BOUNDARY_EPSILON);
    if at_boundary {
        return FitStatus::NonConverged(NonConvergence::BoundaryProbability);
    }

    if outcome.covariance.is_none() {
        return FitStatus::NonConverged(NonConvergence::SingularInformation);
    }

    if !outcome.reached_tolerance {
        return FitStatus::NonConverged(NonConvergence::IterationLimit);
    }

    FitStatus::Converged
}

/// Numerically stable log(1 + e^x)
pub(crate) fn softplus(x: f64) -> f64 {
    if x > 0.0 {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}

/// Numerically stable logistic function
pub(crate) fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Linear predictor b0 + x_i . b for row `i` of `x`, reading `beta` as
/// `[intercept, slopes...]`
pub(crate) fn linear_predictor(x: &Mat<f64>, i: usize, beta: &[f64]) -> f64 {
    let mut eta = beta[0];
    for j in 0..x.ncols() {
        eta += x[(i, j)] * beta[j + 1];
    }
    eta
}
