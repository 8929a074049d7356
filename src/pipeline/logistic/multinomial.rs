//! Multinomial (baseline-category) logistic regression
//!
//! One equation `log(P(k) / P(reference)) = b0_k + x . b_k` per
//! non-reference category, fit jointly. Parameters are laid out as K-1
//! consecutive blocks of `p + 1` values, one block per equation.

use faer::Mat;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::{
    assess_fit, newton_raphson, CoefficientEstimate, FitConfig, FitStatus, Objective, INTERCEPT,
};
use crate::pipeline::error::{PipelineError, PipelineResult};

struct MultinomialObjective<'a> {
    x: &'a Mat<f64>,
    /// Equation index of each row; `None` for the reference category
    targets: Vec<Option<usize>>,
    /// Row counts per equation, then the reference count
    equation_counts: Vec<usize>,
    reference_count: usize,
}

impl MultinomialObjective<'_> {
    fn n_equations(&self) -> usize {
        self.equation_counts.len()
    }

    fn block(&self) -> usize {
        self.x.ncols() + 1
    }

    /// Linear predictors of every equation for row `i`
    fn etas(&self, params: &[f64], i: usize) -> Vec<f64> {
        equation_etas(self.x, i, params, self.n_equations())
    }
}

fn equation_etas(x: &Mat<f64>, i: usize, params: &[f64], n_equations: usize) -> Vec<f64> {
    let block = x.ncols() + 1;
    (0..n_equations)
        .map(|k| {
            let beta = &params[k * block..(k + 1) * block];
            let mut eta = beta[0];
            for j in 0..x.ncols() {
                eta += x[(i, j)] * beta[j + 1];
            }
            eta
        })
        .collect()
}

/// log(1 + sum exp(eta_k)) without overflow
fn log_normalizer(etas: &[f64]) -> f64 {
    let max = etas.iter().copied().fold(0.0f64, f64::max);
    let sum: f64 = (-max).exp() + etas.iter().map(|e| (e - max).exp()).sum::<f64>();
    max + sum.ln()
}

/// Probabilities of the non-reference categories; the reference gets the
/// remainder
fn equation_probabilities(etas: &[f64]) -> Vec<f64> {
    let lse = log_normalizer(etas);
    etas.iter().map(|e| (e - lse).exp()).collect()
}

impl Objective for MultinomialObjective<'_> {
    fn dimension(&self) -> usize {
        self.n_equations() * self.block()
    }

    /// Intercepts at the observed log-odds against the reference
    fn initial_params(&self) -> Vec<f64> {
        let block = self.block();
        let mut params = vec![0.0; self.dimension()];
        for (k, &count) in self.equation_counts.iter().enumerate() {
            params[k * block] = (count as f64 / self.reference_count as f64).ln();
        }
        params
    }

    fn log_likelihood(&self, params: &[f64]) -> f64 {
        (0..self.x.nrows())
            .map(|i| {
                let etas = self.etas(params, i);
                let own = self.targets[i].map_or(0.0, |k| etas[k]);
                own - log_normalizer(&etas)
            })
            .sum()
    }

    fn gradient_and_information(&self, params: &[f64]) -> (Vec<f64>, Mat<f64>) {
        let block = self.block();
        let n_eq = self.n_equations();
        let dim = self.dimension();
        let mut gradient = vec![0.0; dim];
        let mut information = Mat::<f64>::zeros(dim, dim);
        let mut z = vec![1.0; block];

        for i in 0..self.x.nrows() {
            for j in 0..self.x.ncols() {
                z[j + 1] = self.x[(i, j)];
            }
            let probs = equation_probabilities(&self.etas(params, i));

            for k in 0..n_eq {
                let indicator = if self.targets[i] == Some(k) { 1.0 } else { 0.0 };
                let r = indicator - probs[k];
                for a in 0..block {
                    gradient[k * block + a] += r * z[a];
                }

                for l in 0..=k {
                    let delta = if k == l { 1.0 } else { 0.0 };
                    let w = probs[k] * (delta - probs[l]);
                    for a in 0..block {
                        for b in 0..block {
                            information[(k * block + a, l * block + b)] += w * z[a] * z[b];
                        }
                    }
                }
            }
        }

        for k in 0..n_eq {
            for l in 0..k {
                for a in 0..block {
                    for b in 0..block {
                        information[(l * block + b, k * block + a)] =
                            information[(k * block + a, l * block + b)];
                    }
                }
            }
        }

        (gradient, information)
    }

    fn fitted_probabilities(&self, params: &[f64]) -> Vec<f64> {
        (0..self.x.nrows())
            .flat_map(|i| {
                let etas = self.etas(params, i);
                let reference = (-log_normalizer(&etas)).exp();
                equation_probabilities(&etas)
                    .into_iter()
                    .chain(std::iter::once(reference))
            })
            .collect()
    }
}

/// Coefficients of one non-reference category
#[derive(Debug, Clone, Serialize)]
pub struct MultinomialEquation {
    pub category: String,
    /// Intercept first; odds ratios here are relative-risk ratios against
    /// the reference category
    pub coefficients: Vec<CoefficientEstimate>,
}

/// A fitted multinomial logistic model
#[derive(Debug, Clone, Serialize)]
pub struct MultinomialLogisticModel {
    feature_names: Vec<String>,
    /// All categories, sorted
    classes: Vec<String>,
    reference: String,
    equations: Vec<MultinomialEquation>,
    status: FitStatus,
    iterations: usize,
    n_obs: usize,
    log_likelihood: f64,
    null_deviance: f64,
    residual_deviance: f64,
    aic: f64,
}

impl MultinomialLogisticModel {
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn equations(&self) -> &[MultinomialEquation] {
        &self.equations
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

    fn flat_params(&self) -> Vec<f64> {
        self.equations
            .iter()
            .flat_map(|eq| eq.coefficients.iter().map(|c| c.estimate))
            .collect()
    }

    /// Class probabilities per row, columns in [`Self::classes`] order
    pub fn predict_proba(&self, x: &Mat<f64>) -> PipelineResult<Vec<Vec<f64>>> {
        if x.ncols() != self.feature_names.len() {
            return Err(PipelineError::DimensionMismatch(format!(
                "model has {} features but design has {} columns",
                self.feature_names.len(),
                x.ncols()
            )));
        }
        let params = self.flat_params();
        let rows = (0..x.nrows())
            .map(|i| {
                let etas = equation_etas(x, i, &params, self.equations.len());
                let probs = equation_probabilities(&etas);
                let reference = (-log_normalizer(&etas)).exp();
                let by_class: BTreeMap<&str, f64> = self
                    .equations
                    .iter()
                    .map(|eq| eq.category.as_str())
                    .zip(probs.iter().copied())
                    .chain(std::iter::once((self.reference.as_str(), reference)))
                    .collect();
                self.classes
                    .iter()
                    .map(|c| by_class.get(c.as_str()).copied().unwrap_or(0.0))
                    .collect()
            })
            .collect();
        Ok(rows)
    }

    /// Most probable class per row; ties go to the first class in sorted
    /// order
    pub fn predict(&self, x: &Mat<f64>) -> PipelineResult<Vec<String>> {
        Ok(self
            .predict_proba(x)?
            .iter()
            .map(|probs| {
                let mut best = 0;
                for (k, &p) in probs.iter().enumerate() {
                    if p > probs[best] {
                        best = k;
                    }
                }
                self.classes[best].clone()
            })
            .collect())
    }
}

/// Fit a baseline-category logistic model against `reference`.
///
/// Categories are taken from `labels` and sorted; one equation is fit per
/// category other than the reference.
pub fn fit_multinomial(
    x: &Mat<f64>,
    labels: &[String],
    reference: &str,
    feature_names: &[String],
    config: &FitConfig,
) -> PipelineResult<MultinomialLogisticModel> {
    let n = x.nrows();
    if n == 0 {
        return Err(PipelineError::EmptyDataset);
    }
    if labels.len() != n {
        return Err(PipelineError::DimensionMismatch(format!(
            "design has {} rows but response has {}",
            n,
            labels.len()
        )));
    }
    if feature_names.len() != x.ncols() {
        return Err(PipelineError::DimensionMismatch(format!(
            "design has {} columns but {} feature names were given",
            x.ncols(),
            feature_names.len()
        )));
    }

    let classes: Vec<String> = labels
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if classes.len() < 2 {
        return Err(PipelineError::DegenerateResponse(classes.len()));
    }
    if !classes.iter().any(|c| c == reference) {
        return Err(PipelineError::UnknownReference {
            attribute: "species".to_string(),
            level: reference.to_string(),
        });
    }

    let categories: Vec<String> = classes.iter().filter(|c| *c != reference).cloned().collect();
    let equation_of: BTreeMap<&str, usize> = categories
        .iter()
        .enumerate()
        .map(|(k, c)| (c.as_str(), k))
        .collect();
    let targets: Vec<Option<usize>> = labels
        .iter()
        .map(|l| equation_of.get(l.as_str()).copied())
        .collect();
    let mut equation_counts = vec![0usize; categories.len()];
    for k in targets.iter().flatten() {
        equation_counts[*k] += 1;
    }
    let reference_count = n - equation_counts.iter().sum::<usize>();

    let objective = MultinomialObjective {
        x,
        targets,
        equation_counts,
        reference_count,
    };
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
        log::warn!("Multinomial fit did not converge: {}", status);
    }

    let null_ll: f64 = objective
        .equation_counts
        .iter()
        .chain(std::iter::once(&objective.reference_count))
        .filter(|&&c| c > 0)
        .map(|&c| c as f64 * (c as f64 / n as f64).ln())
        .sum();

    let block = x.ncols() + 1;
    let equations = categories
        .iter()
        .enumerate()
        .map(|(k, category)| {
            let terms = std::iter::once(INTERCEPT.to_string()).chain(feature_names.iter().cloned());
            let coefficients = terms
                .enumerate()
                .map(|(a, term)| {
                    CoefficientEstimate::new(
                        term,
                        outcome.params[k * block + a],
                        std_errors[k * block + a],
                        config.confidence_level,
                    )
                })
                .collect();
            MultinomialEquation {
                category: category.clone(),
                coefficients,
            }
        })
        .collect();

    let n_params = categories.len() * block;
    Ok(MultinomialLogisticModel {
        feature_names: feature_names.to_vec(),
        classes,
        reference: reference.to_string(),
        equations,
        status,
        iterations: outcome.iterations,
        n_obs: n,
        log_likelihood: outcome.log_likelihood,
        null_deviance: -2.0 * null_ll,
        residual_deviance,
        aic: 2.0 * n_params as f64 - 2.0 * outcome.log_likelihood,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_intercept_only_recovers_class_log_odds() {
        let y = labels(&["a", "a", "a", "a", "b", "b", "c", "c", "c", "c", "c", "c"]);
        let x = Mat::<f64>::zeros(y.len(), 0);
        let model = fit_multinomial(&x, &y, "a", &[], &FitConfig::default()).unwrap();

        assert!(!model.non_converged());
        assert_eq!(model.classes(), &["a", "b", "c"]);
        assert_eq!(model.equations()[0].category, "b");
        assert_abs_diff_eq!(
            model.equations()[0].coefficients[0].estimate,
            (2.0f64 / 4.0).ln(),
            epsilon = 1e-8
        );
        assert_abs_diff_eq!(
            model.equations()[1].coefficients[0].estimate,
            (6.0f64 / 4.0).ln(),
            epsilon = 1e-8
        );
        assert_abs_diff_eq!(model.null_deviance(), model.residual_deviance(), epsilon = 1e-8);
        assert_abs_diff_eq!(model.aic(), 4.0 + model.residual_deviance(), epsilon = 1e-8);

        let probs = model.predict_proba(&Mat::<f64>::zeros(1, 0)).unwrap();
        assert_abs_diff_eq!(probs[0][0], 4.0 / 12.0, epsilon = 1e-8);
        assert_abs_diff_eq!(probs[0].iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_eq!(model.predict(&Mat::<f64>::zeros(1, 0)).unwrap(), vec!["c"]);
    }

    #[test]
    fn test_two_classes_match_binary_fit() {
        let xs = [-2.0, -1.5, -1.0, -0.5, 0.0, 0.5, 1.0, 1.5, 2.0, 2.5];
        let y01 = [0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
        let x = Mat::from_fn(xs.len(), 1, |i, _| xs[i]);
        let names = ["x".to_string()];
        let y: Vec<String> = y01
            .iter()
            .map(|&v| if v == 1.0 { "yes" } else { "no" }.to_string())
            .collect();

        let multi = fit_multinomial(&x, &y, "no", &names, &FitConfig::default()).unwrap();
        let binary = super::super::fit_binary(&x, &y01, &names, &FitConfig::default()).unwrap();

        for (m, b) in multi.equations()[0].coefficients.iter().zip(binary.coefficients()) {
            assert_abs_diff_eq!(m.estimate, b.estimate, epsilon = 1e-6);
            assert_abs_diff_eq!(m.std_error, b.std_error, epsilon = 1e-6);
        }
        assert_abs_diff_eq!(multi.log_likelihood(), binary.log_likelihood(), epsilon = 1e-8);
    }

    #[test]
    fn test_unknown_reference() {
        let y = labels(&["a", "b"]);
        let x = Mat::<f64>::zeros(2, 0);
        assert!(matches!(
            fit_multinomial(&x, &y, "z", &[], &FitConfig::default()),
            Err(PipelineError::UnknownReference { .. })
        ));
    }

    #[test]
    fn test_single_class_is_degenerate() {
        let y = labels(&["a", "a"]);
        let x = Mat::<f64>::zeros(2, 0);
        assert_eq!(
            fit_multinomial(&x, &y, "a", &[], &FitConfig::default()).unwrap_err(),
            PipelineError::DegenerateResponse(1)
        );
    }
}
