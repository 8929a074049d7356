//! Model report export (JSON and coefficient CSV)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use crate::pipeline::{CoefficientEstimate, FitStatus, PipelineOutcome};

/// Metadata about the run
#[derive(Serialize)]
pub struct ReportMetadata {
    /// Timestamp of the run (ISO 8601 format)
    pub timestamp: String,
    pub penglm_version: String,
    pub input_file: String,
}

/// Headline numbers of both models
#[derive(Serialize)]
pub struct ReportSummary {
    pub rows_read: usize,
    pub dropped_rows: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub binary_status: FitStatus,
    pub binary_features: usize,
    pub binary_test_accuracy: Option<f64>,
    pub binary_test_auc: Option<f64>,
    pub binary_cv_accuracy: Option<f64>,
    pub binary_cv_auc: Option<f64>,
    pub multinomial_status: FitStatus,
    pub multinomial_features: usize,
    pub multinomial_test_accuracy: Option<f64>,
    pub multinomial_cv_accuracy: Option<f64>,
}

/// Complete report: metadata, summary and the full outcome
#[derive(Serialize)]
pub struct ModelReport<'a> {
    pub metadata: ReportMetadata,
    pub summary: ReportSummary,
    pub results: &'a PipelineOutcome,
}

impl<'a> ModelReport<'a> {
    pub fn new(outcome: &'a PipelineOutcome, input_file: &str) -> Self {
        let binary = &outcome.binary;
        let multinomial = &outcome.multinomial;
        Self {
            metadata: ReportMetadata {
                timestamp: Utc::now().to_rfc3339(),
                penglm_version: env!("CARGO_PKG_VERSION").to_string(),
                input_file: input_file.to_string(),
            },
            summary: ReportSummary {
                rows_read: outcome.rows_read,
                dropped_rows: outcome.dropped_rows,
                n_train: outcome.n_train,
                n_test: outcome.n_test,
                binary_status: binary.fit.model.status(),
                binary_features: binary.fit.model.feature_names().len(),
                binary_test_accuracy: binary.test_rates.accuracy,
                binary_test_auc: binary.roc.auc,
                binary_cv_accuracy: binary.cross_validation.accuracy.mean,
                binary_cv_auc: binary.cross_validation.auc.mean,
                multinomial_status: multinomial.fit.model.status(),
                multinomial_features: multinomial.fit.model.feature_names().len(),
                multinomial_test_accuracy: multinomial.test_accuracy,
                multinomial_cv_accuracy: multinomial.cross_validation.accuracy.mean,
            },
            results: outcome,
        }
    }
}

/// Default report location: next to the input with a
/// '_model_report.json' suffix
pub fn default_report_path(input: &Path) -> PathBuf {
    let parent = input.parent().unwrap_or_else(|| Path::new("."));
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("penguins");
    parent.join(format!("{}_model_report.json", stem))
}

/// Export the model report to a JSON file
pub fn export_model_report(report: &ModelReport, output_path: &Path) -> Result<()> {
    let json =
        serde_json::to_string_pretty(report).context("Failed to serialize model report to JSON")?;

    std::fs::write(output_path, json)
        .with_context(|| format!("Failed to write model report to {}", output_path.display()))?;

    Ok(())
}

/// Export every coefficient of both models as CSV, one row per term.
///
/// The `model` column is "binary" or the multinomial category the
/// equation belongs to.
pub fn export_coefficients_csv(outcome: &PipelineOutcome, output_path: &Path) -> Result<()> {
    use std::io::Write;

    let mut file = std::fs::File::create(output_path)
        .with_context(|| format!("Failed to create CSV file: {}", output_path.display()))?;

    writeln!(
        file,
        "model,term,estimate,std_error,z_value,p_value,odds_ratio,ci_lower,ci_upper"
    )?;

    let binary = outcome.binary.fit.model.coefficients().iter().map(|c| ("binary", c));
    let multinomial = outcome
        .multinomial
        .fit
        .model
        .equations()
        .iter()
        .flat_map(|eq| eq.coefficients.iter().map(move |c| (eq.category.as_str(), c)));

    for (model, coef) in binary.chain(multinomial) {
        writeln!(file, "{},{}", escape_csv_field(model), coefficient_fields(coef))?;
    }

    Ok(())
}

fn coefficient_fields(c: &CoefficientEstimate) -> String {
    format!(
        "{},{},{},{},{},{},{},{}",
        escape_csv_field(&c.term),
        c.estimate,
        c.std_error,
        c.z_value,
        c.p_value,
        c.odds_ratio,
        c.ci_lower,
        c.ci_upper
    )
}

/// Escape a field for CSV (handle commas and quotes)
fn escape_csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
