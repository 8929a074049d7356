//! End-to-end pipeline: records and configuration in, fitted models and
//! held-out metrics out

use serde::Serialize;
use std::collections::BTreeMap;

use super::config::PipelineConfig;
use super::crossval::{
    cross_validate_binary, cross_validate_multinomial, BinaryCvSummary, MultinomialCvSummary,
};
use super::dataset::{CategoricalAttr, Dataset, Feature, RawObservation};
use super::diagnostics::{detect_quasi_separation, separation_scan, AttributeDiagnostic};
use super::encoding::Encoding;
use super::error::{PipelineError, PipelineResult};
use super::evaluation::{
    confusion_from_indicators, multinomial_accuracy, BinaryConfusion, BinaryRates,
    MulticlassConfusion,
};
use super::logistic::{
    fit_binary, fit_multinomial, BinaryLogisticModel, FitConfig, FitStatus,
    MultinomialLogisticModel, NonConvergence,
};
use super::missing::{load_and_clean, missing_profile, FieldMissing};
use super::roc::{roc_curve, RocCurve};
use super::split::stratified_split;
use super::target::{derive_binary_response, response_indicator};

/// One fit tried by the refit policy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitAttempt {
    pub features: Vec<Feature>,
    pub status: FitStatus,
}

/// Result of a fit with fallback: the chosen model, the encoding it was
/// fit with, and every attempt in order
#[derive(Debug, Clone, Serialize)]
pub struct FallbackFit<M> {
    pub model: M,
    pub encoding: Encoding,
    pub attempts: Vec<FitAttempt>,
}

/// Encoded categorical attributes with at least one level whose `train`
/// rows all share one response value
pub fn separating_attributes(encoding: &Encoding, train: &Dataset) -> PipelineResult<Vec<CategoricalAttr>> {
    let response = train.species();
    let mut separating = Vec::new();
    for factor in encoding.factors() {
        let levels = train.levels_of(factor.attribute);
        if !detect_quasi_separation(&levels, &response)?.is_empty() {
            separating.push(factor.attribute);
        }
    }
    Ok(separating)
}

/// Candidate feature sets, most complete first: every encoded feature,
/// then without categoricals that have separating levels in `train`, then
/// numeric features only. Duplicates are skipped.
pub fn candidate_feature_sets(encoding: &Encoding, train: &Dataset) -> PipelineResult<Vec<Vec<Feature>>> {
    let full: Vec<Feature> = encoding.features().to_vec();
    let separating = separating_attributes(encoding, train)?;
    let without_separating: Vec<Feature> = full
        .iter()
        .copied()
        .filter(|f| match f {
            Feature::Categorical(attr) => !separating.contains(attr),
            Feature::Numeric(_) => true,
        })
        .collect();
    let numeric_only: Vec<Feature> = full.iter().copied().filter(|f| !f.is_categorical()).collect();

    let mut candidates: Vec<Vec<Feature>> = Vec::new();
    for set in [full, without_separating, numeric_only] {
        if !candidates.contains(&set) {
            candidates.push(set);
        }
    }
    Ok(candidates)
}

fn fit_with_fallback<M>(
    train: &Dataset,
    encoding: &Encoding,
    fit: impl Fn(&Encoding) -> PipelineResult<M>,
    status: impl Fn(&M) -> FitStatus,
) -> PipelineResult<FallbackFit<M>> {
    let candidates = candidate_feature_sets(encoding, train)?;
    let separating = separating_attributes(encoding, train)?;
    let mut attempts = Vec::new();
    let mut last = None;

    for features in candidates {
        let restricted = encoding.restricted_to(&features);
        let model = fit(&restricted)?;
        let keeps_separating = features
            .iter()
            .any(|f| matches!(f, Feature::Categorical(attr) if separating.contains(attr)));
        // Coefficients of a separating level diverge even when the iterations
        // stop early enough to look converged
        let model_status = match status(&model) {
            FitStatus::Converged if keeps_separating => {
                FitStatus::NonConverged(NonConvergence::QuasiSeparation)
            }
            other => other,
        };
        attempts.push(FitAttempt {
            features,
            status: model_status,
        });
        if model_status.is_converged() {
            return Ok(FallbackFit {
                model,
                encoding: restricted,
                attempts,
            });
        }
        log::warn!(
            "Fit with {} features did not converge ({}); refitting with fewer",
            restricted.features().len(),
            model_status
        );
        last = Some((model, restricted));
    }

    match last {
        Some((model, encoding)) => Ok(FallbackFit {
            model,
            encoding,
            attempts,
        }),
        None => Err(PipelineError::InvalidConfig(
            "no candidate feature set to fit".to_string(),
        )),
    }
}

/// Fit the binary model, dropping features until a fit converges.
///
/// `train` must carry the binary response (`positive_class` or "other").
pub fn fit_binary_with_fallback(
    train: &Dataset,
    encoding: &Encoding,
    positive_class: &str,
    config: &FitConfig,
) -> PipelineResult<FallbackFit<BinaryLogisticModel>> {
    let y = response_indicator(train, positive_class);
    fit_with_fallback(
        train,
        encoding,
        |enc| {
            let encoded = enc.encode(train)?;
            fit_binary(&encoded.design, &y, &encoded.feature_names, config)
        },
        BinaryLogisticModel::status,
    )
}

/// Fit the multinomial model, dropping features until a fit converges
pub fn fit_multinomial_with_fallback(
    train: &Dataset,
    encoding: &Encoding,
    reference: &str,
    config: &FitConfig,
) -> PipelineResult<FallbackFit<MultinomialLogisticModel>> {
    fit_with_fallback(
        train,
        encoding,
        |enc| {
            let encoded = enc.encode(train)?;
            fit_multinomial(
                &encoded.design,
                &encoded.labels,
                reference,
                &encoded.feature_names,
                config,
            )
        },
        MultinomialLogisticModel::status,
    )
}

/// Binary model results
#[derive(Debug, Clone, Serialize)]
pub struct BinaryOutcome {
    pub positive_class: String,
    pub fit: FallbackFit<BinaryLogisticModel>,
    pub cross_validation: BinaryCvSummary,
    pub test_confusion: BinaryConfusion,
    pub test_rates: BinaryRates,
    pub roc: RocCurve,
}

/// Multinomial model results
#[derive(Debug, Clone, Serialize)]
pub struct MultinomialOutcome {
    pub fit: FallbackFit<MultinomialLogisticModel>,
    pub cross_validation: MultinomialCvSummary,
    pub test_accuracy: Option<f64>,
    pub test_confusion: MulticlassConfusion,
}

/// Everything a run produces
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub config: PipelineConfig,
    pub rows_read: usize,
    pub dropped_rows: usize,
    pub missing_profile: Vec<FieldMissing>,
    pub species_counts: BTreeMap<String, usize>,
    /// Categorical attributes against the three-valued species
    pub diagnostics: Vec<AttributeDiagnostic>,
    /// Categorical attributes against the binary response
    pub binary_diagnostics: Vec<AttributeDiagnostic>,
    pub n_train: usize,
    pub n_test: usize,
    pub binary: BinaryOutcome,
    pub multinomial: MultinomialOutcome,
}

/// Run the whole analysis.
///
/// Deterministic: the same records and configuration always give the same
/// outcome.
pub fn run_pipeline(raw: &[RawObservation], config: &PipelineConfig) -> PipelineResult<PipelineOutcome> {
    config.validate()?;

    let profile = missing_profile(raw);
    let cleaned = load_and_clean(raw);
    let dataset = cleaned.dataset;
    if dataset.is_empty() {
        return Err(PipelineError::EmptyDataset);
    }
    let binary_dataset = derive_binary_response(&dataset, &config.positive_class)?;

    let diagnostics = separation_scan(&dataset, &CategoricalAttr::ALL)?;
    let binary_diagnostics = separation_scan(&binary_dataset, &CategoricalAttr::ALL)?;

    let split = stratified_split(&dataset, config.train_fraction, config.seed)?;
    if config.folds > split.train.len() {
        return Err(PipelineError::InvalidFoldCount {
            folds: config.folds,
            rows: split.train.len(),
        });
    }
    log::info!(
        "Split {} rows into {} train / {} test",
        dataset.len(),
        split.train.len(),
        split.test.len()
    );

    let binary = run_binary(&binary_dataset, &split.train, &split.test, config)?;
    let multinomial = run_multinomial(&dataset, &split.train, &split.test, config)?;

    Ok(PipelineOutcome {
        config: config.clone(),
        rows_read: raw.len(),
        dropped_rows: cleaned.dropped_rows,
        missing_profile: profile,
        species_counts: dataset.species_counts(),
        diagnostics,
        binary_diagnostics,
        n_train: split.train.len(),
        n_test: split.test.len(),
        binary,
        multinomial,
    })
}

fn run_binary(
    dataset: &Dataset,
    train_rows: &[usize],
    test_rows: &[usize],
    config: &PipelineConfig,
) -> PipelineResult<BinaryOutcome> {
    let positive = config.positive_class.as_str();
    let train = dataset.subset(train_rows);
    let test = dataset.subset(test_rows);
    let encoding = Encoding::build_from_training(
        dataset,
        &train,
        &config.features,
        &config.reference_levels,
        config.reference_policy,
    )?;

    let fit = fit_binary_with_fallback(&train, &encoding, positive, &config.fit)?;
    let cross_validation = cross_validate_binary(
        &train,
        &fit.encoding,
        positive,
        config.folds,
        config.seed,
        config.threshold,
        &config.fit,
    )?;

    let test_x = fit.encoding.encode(&test)?;
    let probabilities = fit.model.predict_proba(&test_x.design)?;
    let predicted: Vec<bool> = probabilities.iter().map(|&p| p >= config.threshold).collect();
    let actual: Vec<bool> = test.iter().map(|o| o.species == positive).collect();
    let test_confusion = confusion_from_indicators(&predicted, &actual)?;
    let roc = roc_curve(&probabilities, &actual)?;

    Ok(BinaryOutcome {
        positive_class: positive.to_string(),
        test_rates: test_confusion.rates(),
        test_confusion,
        roc,
        cross_validation,
        fit,
    })
}

fn run_multinomial(
    dataset: &Dataset,
    train_rows: &[usize],
    test_rows: &[usize],
    config: &PipelineConfig,
) -> PipelineResult<MultinomialOutcome> {
    let reference = config.multinomial_reference.as_str();
    let train = dataset.subset(train_rows);
    let test = dataset.subset(test_rows);
    let encoding = Encoding::build_from_training(
        dataset,
        &train,
        &config.features,
        &config.reference_levels,
        config.reference_policy,
    )?;

    let fit = fit_multinomial_with_fallback(&train, &encoding, reference, &config.fit)?;
    let cross_validation = cross_validate_multinomial(
        &train,
        &fit.encoding,
        reference,
        config.folds,
        config.seed,
        &config.fit,
    )?;

    let test_x = fit.encoding.encode(&test)?;
    let predicted = fit.model.predict(&test_x.design)?;

    Ok(MultinomialOutcome {
        test_accuracy: multinomial_accuracy(&predicted, &test_x.labels)?,
        test_confusion: MulticlassConfusion::new(&predicted, &test_x.labels)?,
        cross_validation,
        fit,
    })
}
