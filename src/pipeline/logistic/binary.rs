//! Binary logistic regression

use faer::Mat;
use serde::Serialize;

use super::{
    assess_fit, linear_predictor, newton_raphson, sigmoid, softplus, CoefficientEstimate,
    FitConfig, FitStatus, Objective, INTERCEPT,
};
use crate::pipeline::error::{PipelineError, PipelineResult};

struct BinaryObjective<'a> {
    x: &'a Mat<f64>,
    y: &'a [f64],
}

impl BinaryObjective<'_> {
    fn etas(&self, params: &[f64]) -> Vec<f64> {
        (0..self.x.nrows())
            .map(|i| linear_predictor(self.x, i, params))
            .collect()
    }
}

impl Objective for BinaryObjective<'_> {
    fn dimension(&self) -> usize {
        self.x.ncols() + 1
    }

    /// Intercept at the logit of the event rate, slopes at zero
    fn initial_params(&self) -> Vec<f64> {
        let mean = self.y.iter().sum::<f64>() / self.y.len() as f64;
        let mut params = vec![0.0; self.dimension()];
        params[0] = (mean / (1.0 - mean)).ln();
        params
    }

    fn log_likelihood(&self, params: &[f64]) -> f64 {
        self.etas(params)
            .iter()
            .zip(self.y.iter())
            .map(|(&eta, &y)| y * eta - softplus(eta))
            .sum()
    }

    fn gradient_and_information(&self, params: &[f64]) -> (Vec<f64>, Mat<f64>) {
        let dim = self.dimension();
        let mut gradient = vec![0.0; dim];
        let mut information = Mat::<f64>::zeros(dim, dim);
        let mut z = vec![1.0; dim];

        for i in 0..self.x.nrows() {
            for j in 0..self.x.ncols() {
                z[j + 1] = self.x[(i, j)];
            }
            let mu = sigmoid(linear_predictor(self.x, i, params));
            let w = mu * (1.0 - mu);
            let r = self.y[i] - mu;
            for a in 0..dim {
                gradient[a] += r * z[a];
                for b in 0..=a {
                    information[(a, b)] += w * z[a] * z[b];
                }
            }
        }
        for a in 0..dim {
            for b in 0..a {
                information[(b, a)] = information[(a, b)];
            }
        }

        (gradient, information)
    }

    fn fitted_probabilities(&self, params: &[f64]) -> Vec<f64> {
        self.etas(params).into_iter().map(sigmoid).collect()
    }
}

/// A fitted binary logistic model. Immutable once returned by
/// [`fit_binary`].
#[derive(Debug, Clone, Serialize)]
pub struct BinaryLogisticModel {
    feature_names: Vec<String>,
    coefficients: Vec<CoefficientEstimate>,
    status: FitStatus,
    iterations: usize,
    n_obs: usize,
    log_likelihood: f64,
    null_deviance: f64,
    residual_deviance: f64,
    aic: f64,
}

impl BinaryLogisticModel {
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Intercept first, then one row per feature
    pub fn coefficients(&self) -> &[CoefficientEstimate] {
        &self.coefficients
    }

    pub fn status(&self) -> FitStatus {
        self.status
    }

    pub fn non_converged(&self) -> bool {
        !self.status.is_converged()
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn n_obs(&self) -> usize {
        self.n_obs
    }

    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    pub fn null_deviance(&self) -> f64 {
        self.null_deviance
    }

    pub fn residual_deviance(&self) -> f64 {
        self.residual_deviance
    }

    pub fn aic(&self) -> f64 {
        self.aic
    }

    /// Estimates in parameter order: intercept, then features
    pub fn estimates(&self) -> Vec<f64> {
        self.coefficients.iter().map(|c| c.estimate).collect()
    }

    pub fn std_errors(&self) -> Vec<f64> {
        self.coefficients.iter().map(|c| c.std_error).collect()
    }

    /// Probability of the event for each row of `x`
    pub fn predict_proba(&self, x: &Mat<f64>) -> PipelineResult<Vec<f64>> {
        if x.ncols() != self.feature_names.len() {
            return Err(PipelineError::DimensionMismatch(format!(
                "model has {} features but design has {} columns",
                self.feature_names.len(),
                x.ncols()
            )));
        }
        let beta = self.estimates();
        Ok((0..x.nrows())
            .map(|i| sigmoid(linear_predictor(x, i, &beta)))
            .collect())
    }

    /// `true` where the event probability is at least `threshold`
    pub fn predict_labels(&self, x: &Mat<f64>, threshold: f64) -> PipelineResult<Vec<bool>> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| p >= threshold)
            .collect())
    }
}

/// Fit `P(y = 1) = sigmoid(b0 + x . b)` by maximum likelihood.
///
/// # Arguments
/// * `x` - n x p design matrix without an intercept column
/// * `y` - 0/1 response of length n
/// * `feature_names` - one name per column of `x`
/// * `config` - iteration limits, tolerance and interval level
///
/// Fits that fail to converge are returned with a non-converged status.
pub fn fit_binary(
    x: &Mat<f64>,
    y: &[f64],
    feature_names: &[String],
    config: &FitConfig,
) -> PipelineResult<BinaryLogisticModel> {
    let n = x.nrows();
    if n == 0 {
        return Err(PipelineError::EmptyDataset);
    }
    if y.len() != n {
        return Err(PipelineError::DimensionMismatch(format!(
            "design has {} rows but response has {}",
            n,
            y.len()
        )));
    }
    if feature_names.len() != x.ncols() {
        return Err(PipelineError::DimensionMismatch(format!(
            "design has {} columns but {} feature names were given",
            x.ncols(),
            feature_names.len()
        )));
    }
    if let Some(bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
        return Err(PipelineError::InvalidResponse(format!(
            "binary response must be 0 or 1, found {}",
            bad
        )));
    }
    let events = y.iter().filter(|&&v| v == 1.0).count();
    if events == 0 || events == n {
        return Err(PipelineError::DegenerateResponse(1));
    }

    let objective = BinaryObjective { x, y };
    let outcome = newton_raphson(&objective, config);
    let std_errors = outcome.std_errors();
    let residual_deviance = -2.0 * outcome.log_likelihood;
    let status = assess_fit(
        &outcome,
        &std_errors,
        &objective.fitted_probabilities(&outcome.params),
        residual_deviance,
    );
    if !status.is_converged() {
        log::warn!("Binary fit did not converge: {}", status);
    }

    let p_bar = events as f64 / n as f64;
    let null_ll = events as f64 * p_bar.ln() + (n - events) as f64 * (1.0 - p_bar).ln();

    let terms = std::iter::once(INTERCEPT.to_string()).chain(feature_names.iter().cloned());
    let coefficients = terms
        .zip(outcome.params.iter().zip(std_errors.iter()))
        .map(|(term, (&beta, &se))| CoefficientEstimate::new(term, beta, se, config.confidence_level))
        .collect();

    Ok(BinaryLogisticModel {
        feature_names: feature_names.to_vec(),
        coefficients,
        status,
        iterations: outcome.iterations,
        n_obs: n,
        log_likelihood: outcome.log_likelihood,
        null_deviance: -2.0 * null_ll,
        residual_deviance,
        aic: 2.0 * (x.ncols() + 1) as f64 - 2.0 * outcome.log_likelihood,
    })
}
