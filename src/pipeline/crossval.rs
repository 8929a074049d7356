//! K-fold cross-validation
//!
//! Folds are evaluated in parallel with rayon. Each fold reads the shared
//! training dataset and encoding and returns its own metrics; results are
//! collected in fold order, so the summary is identical to a sequential
//! run.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;

use super::dataset::Dataset;
use super::encoding::Encoding;
use super::error::{PipelineError, PipelineResult};
use super::evaluation::{confusion_from_indicators, multinomial_accuracy};
use super::logistic::{fit_binary, fit_multinomial, FitConfig, FitStatus};
use super::roc::roc_curve;
use super::target::response_indicator;

/// Shuffle `0..n` with a seeded generator and cut it into `k` folds whose
/// sizes differ by at most one. Each fold is sorted ascending.
pub fn k_fold_indices(n: usize, k: usize, seed: u64) -> PipelineResult<Vec<Vec<usize>>> {
    if k < 2 || k > n {
        return Err(PipelineError::InvalidFoldCount { folds: k, rows: n });
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));

    let base = n / k;
    let extra = n % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let size = base + usize::from(fold < extra);
        let mut rows = order[start..start + size].to_vec();
        rows.sort_unstable();
        folds.push(rows);
        start += size;
    }
    Ok(folds)
}

/// K disjoint folds covering every row of `dataset` exactly once
pub fn k_fold_partition(dataset: &Dataset, k: usize, seed: u64) -> PipelineResult<Vec<Vec<usize>>> {
    k_fold_indices(dataset.len(), k, seed)
}

/// Rows outside `fold`, in ascending order
fn complement(n: usize, fold: &[usize]) -> Vec<usize> {
    let mut in_fold = vec![false; n];
    for &i in fold {
        in_fold[i] = true;
    }
    (0..n).filter(|&i| !in_fold[i]).collect()
}

/// Mean and sample standard deviation over the folds where a metric is
/// defined
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSummary {
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub defined_folds: usize,
}

impl MetricSummary {
    pub fn from_values(values: impl IntoIterator<Item = Option<f64>>) -> Self {
        let defined: Vec<f64> = values.into_iter().flatten().collect();
        let n = defined.len();
        if n == 0 {
            return Self {
                mean: None,
                std_dev: None,
                defined_folds: 0,
            };
        }
        let mean = defined.iter().sum::<f64>() / n as f64;
        let std_dev = if n > 1 {
            let ss: f64 = defined.iter().map(|v| (v - mean).powi(2)).sum();
            Some((ss / (n - 1) as f64).sqrt())
        } else {
            None
        };
        Self {
            mean: Some(mean),
            std_dev,
            defined_folds: n,
        }
    }
}

/// Held-out metrics of one binary fold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinaryFoldMetrics {
    pub fold: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub status: FitStatus,
    pub accuracy: Option<f64>,
    pub sensitivity: Option<f64>,
    pub specificity: Option<f64>,
    pub auc: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinaryCvSummary {
    pub k: usize,
    pub folds: Vec<BinaryFoldMetrics>,
    pub accuracy: MetricSummary,
    pub sensitivity: MetricSummary,
    pub specificity: MetricSummary,
    pub auc: MetricSummary,
    pub non_converged_folds: usize,
}

/// Cross-validate the binary model on `dataset`.
///
/// # Arguments
/// * `dataset` - training rows with the response still holding category names
/// * `encoding` - schema built on the full training set, reused by every fold
/// * `positive_class` - category treated as the event
/// * `k`, `seed` - fold count and shuffle seed
/// * `threshold` - probability cut-off for predicted labels
pub fn cross_validate_binary(
    dataset: &Dataset,
    encoding: &Encoding,
    positive_class: &str,
    k: usize,
    seed: u64,
    threshold: f64,
    config: &FitConfig,
) -> PipelineResult<BinaryCvSummary> {
    let folds = k_fold_partition(dataset, k, seed)?;
    let feature_names = encoding.feature_names();

    let metrics = folds
        .par_iter()
        .enumerate()
        .map(|(fold, test_rows)| -> PipelineResult<BinaryFoldMetrics> {
            let train = dataset.subset(&complement(dataset.len(), test_rows));
            let test = dataset.subset(test_rows);

            let train_x = encoding.encode(&train)?;
            let test_x = encoding.encode(&test)?;
            let model = fit_binary(
                &train_x.design,
                &response_indicator(&train, positive_class),
                &feature_names,
                config,
            )?;

            let probabilities = model.predict_proba(&test_x.design)?;
            let predicted: Vec<bool> = probabilities.iter().map(|&p| p >= threshold).collect();
            let actual: Vec<bool> = test.iter().map(|o| o.species == positive_class).collect();
            let rates = confusion_from_indicators(&predicted, &actual)?.rates();
            let roc = roc_curve(&probabilities, &actual)?;

            Ok(BinaryFoldMetrics {
                fold: fold + 1,
                n_train: train.len(),
                n_test: test.len(),
                status: model.status(),
                accuracy: rates.accuracy,
                sensitivity: rates.sensitivity,
                specificity: rates.specificity,
                auc: roc.auc,
            })
        })
        .collect::<PipelineResult<Vec<_>>>()?;

    let non_converged_folds = metrics.iter().filter(|m| !m.status.is_converged()).count();
    if non_converged_folds > 0 {
        log::warn!("{} of {} folds did not converge", non_converged_folds, k);
    }

    Ok(BinaryCvSummary {
        k,
        accuracy: MetricSummary::from_values(metrics.iter().map(|m| m.accuracy)),
        sensitivity: MetricSummary::from_values(metrics.iter().map(|m| m.sensitivity)),
        specificity: MetricSummary::from_values(metrics.iter().map(|m| m.specificity)),
        auc: MetricSummary::from_values(metrics.iter().map(|m| m.auc)),
        non_converged_folds,
        folds: metrics,
    })
}

/// Held-out accuracy of one multinomial fold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultinomialFoldMetrics {
    pub fold: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub status: FitStatus,
    pub accuracy: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultinomialCvSummary {
    pub k: usize,
    pub folds: Vec<MultinomialFoldMetrics>,
    pub accuracy: MetricSummary,
    pub non_converged_folds: usize,
}

/// Cross-validate the multinomial model against `reference`
pub fn cross_validate_multinomial(
    dataset: &Dataset,
    encoding: &Encoding,
    reference: &str,
    k: usize,
    seed: u64,
    config: &FitConfig,
) -> PipelineResult<MultinomialCvSummary> {
    let folds = k_fold_partition(dataset, k, seed)?;
    let feature_names = encoding.feature_names();

    let metrics = folds
        .par_iter()
        .enumerate()
        .map(|(fold, test_rows)| -> PipelineResult<MultinomialFoldMetrics> {
            let train = dataset.subset(&complement(dataset.len(), test_rows));
            let test = dataset.subset(test_rows);

            let train_x = encoding.encode(&train)?;
            let test_x = encoding.encode(&test)?;
            let model = fit_multinomial(
                &train_x.design,
                &train_x.labels,
                reference,
                &feature_names,
                config,
            )?;
            let predicted = model.predict(&test_x.design)?;

            Ok(MultinomialFoldMetrics {
                fold: fold + 1,
                n_train: train.len(),
                n_test: test.len(),
                status: model.status(),
                accuracy: multinomial_accuracy(&predicted, &test_x.labels)?,
            })
        })
        .collect::<PipelineResult<Vec<_>>>()?;

    let non_converged_folds = metrics.iter().filter(|m| !m.status.is_converged()).count();
    if non_converged_folds > 0 {
        log::warn!("{} of {} folds did not converge", non_converged_folds, k);
    }

    Ok(MultinomialCvSummary {
        k,
        accuracy: MetricSummary::from_values(metrics.iter().map(|m| m.accuracy)),
        non_converged_folds,
        folds: metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_folds_partition_rows() {
        for (n, k) in [(10, 2), (11, 3), (7, 7), (100, 10)] {
            let folds = k_fold_indices(n, k, 42).unwrap();
            assert_eq!(folds.len(), k);
            let mut all: Vec<usize> = folds.iter().flatten().copied().collect();
            all.sort_unstable();
            assert_eq!(all, (0..n).collect::<Vec<_>>());
            let sizes: Vec<usize> = folds.iter().map(Vec::len).collect();
            assert!(sizes.iter().max().unwrap() - sizes.iter().min().unwrap() <= 1);
        }
    }

    #[test]
    fn test_invalid_fold_counts() {
        assert!(matches!(
            k_fold_indices(10, 1, 0),
            Err(PipelineError::InvalidFoldCount { folds: 1, rows: 10 })
        ));
        assert!(matches!(
            k_fold_indices(3, 4, 0),
            Err(PipelineError::InvalidFoldCount { folds: 4, rows: 3 })
        ));
    }

    #[test]
    fn test_complement() {
        assert_eq!(complement(5, &[1, 3]), vec![0, 2, 4]);
    }

    #[test]
    fn test_metric_summary_skips_undefined() {
        let summary = MetricSummary::from_values([Some(0.8), None, Some(1.0)]);
        assert_eq!(summary.defined_folds, 2);
        assert_abs_diff_eq!(summary.mean.unwrap(), 0.9, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.std_dev.unwrap(), 0.02f64.sqrt(), epsilon = 1e-12);

        let empty = MetricSummary::from_values([None, None]);
        assert_eq!(empty.mean, None);
    }
}
