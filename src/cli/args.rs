//! Command-line argument definitions using clap

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::pipeline::{CategoricalAttr, Feature, FitConfig, PipelineConfig, ReferencePolicy};
use crate::report::default_report_path;

/// penglm - Fit and evaluate logistic regression models for penguin species
#[derive(Parser, Debug)]
#[command(name = "penglm")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Input file path (CSV or Parquet)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// JSON configuration file. When given, model options are read from the
    /// file instead of the flags below; missing fields take their defaults.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Species treated as the event by the binary model
    #[arg(short, long, default_value = "Adelie")]
    pub positive_class: String,

    /// Features to model (comma-separated column names).
    /// Default: all of bill_length_mm, bill_depth_mm, flipper_length_mm,
    /// body_mass_g, island, sex, year
    #[arg(short, long, value_delimiter = ',')]
    pub features: Vec<Feature>,

    /// Pin the reference level of a categorical attribute (repeatable).
    /// Example: --reference island=Dream --reference sex=male
    #[arg(long = "reference", value_parser = parse_reference)]
    pub references: Vec<(CategoricalAttr, String)>,

    /// Reference rule for attributes without a pinned level.
    /// Options: "separation-aware" (default) or "last"
    #[arg(long, default_value = "separation-aware")]
    pub reference_policy: ReferencePolicy,

    /// Baseline category of the multinomial model
    #[arg(long, default_value = "Adelie")]
    pub multinomial_reference: String,

    /// Fraction of each species assigned to the training set (0 to 1, exclusive)
    #[arg(long, default_value = "0.8", value_parser = validate_open_unit)]
    pub train_fraction: f64,

    /// Random seed for the split and the cross-validation folds
    #[arg(long, default_value = "123")]
    pub seed: u64,

    /// Number of cross-validation folds (at least 2)
    #[arg(long, default_value = "10", value_parser = validate_folds)]
    pub folds: usize,

    /// Probability cut-off for predicting the positive class
    #[arg(long, default_value = "0.5", value_parser = validate_open_unit)]
    pub threshold: f64,

    /// Confidence level of the Wald intervals
    #[arg(long, default_value = "0.95", value_parser = validate_open_unit)]
    pub confidence_level: f64,

    /// Maximum Newton-Raphson iterations per fit
    #[arg(long, default_value = "25")]
    pub max_iterations: usize,

    /// Relative log-likelihood change treated as converged
    #[arg(long, default_value = "1e-8")]
    pub tolerance: f64,

    /// JSON report path.
    /// Defaults to input directory with '_model_report.json' suffix.
    #[arg(short, long)]
    pub report: Option<PathBuf>,

    /// Also write every coefficient to this CSV file
    #[arg(long)]
    pub coefficients_csv: Option<PathBuf>,

    /// Skip writing the JSON report
    #[arg(long, default_value = "false")]
    pub no_report: bool,

    /// Number of rows to use for schema inference (CSV only).
    /// Use 0 for full table scan.
    #[arg(long, default_value = "10000")]
    pub infer_schema_length: usize,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the missing value profile and separation diagnostics only
    Diagnose {
        /// Input file path (CSV or Parquet)
        input: PathBuf,

        /// Number of rows to use for schema inference (CSV only)
        #[arg(long, default_value = "10000")]
        infer_schema_length: usize,
    },
}

impl Cli {
    pub fn input(&self) -> Option<&PathBuf> {
        self.input.as_ref()
    }

    /// Get the report path, deriving from input if not explicitly provided
    pub fn report_path(&self) -> Option<PathBuf> {
        if self.no_report {
            return None;
        }
        let input = self.input.as_ref()?;
        Some(
            self.report
                .clone()
                .unwrap_or_else(|| default_report_path(input)),
        )
    }

    /// Build the pipeline configuration from the config file or the flags
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        if let Some(path) = &self.config {
            return PipelineConfig::from_json_file(path);
        }

        let features = if self.features.is_empty() {
            Feature::all()
        } else {
            self.features.clone()
        };
        let reference_levels: BTreeMap<CategoricalAttr, String> =
            self.references.iter().cloned().collect();

        Ok(PipelineConfig {
            positive_class: self.positive_class.clone(),
            features,
            reference_levels,
            reference_policy: self.reference_policy,
            multinomial_reference: self.multinomial_reference.clone(),
            train_fraction: self.train_fraction,
            seed: self.seed,
            folds: self.folds,
            threshold: self.threshold,
            fit: FitConfig {
                max_iterations: self.max_iterations,
                tolerance: self.tolerance,
                confidence_level: self.confidence_level,
                ..FitConfig::default()
            },
        })
    }
}

/// Parser for `attribute=level` reference pins
fn parse_reference(s: &str) -> Result<(CategoricalAttr, String), String> {
    let (attr, level) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ATTRIBUTE=LEVEL, got '{}'", s))?;
    let level = level.trim();
    if level.is_empty() {
        return Err(format!("missing level in '{}'", s));
    }
    Ok((attr.parse::<CategoricalAttr>()?, level.to_string()))
}

/// Validator for values that must lie strictly between 0 and 1
fn validate_open_unit(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;

    if value > 0.0 && value < 1.0 {
        Ok(value)
    } else {
        Err(format!("value must lie strictly between 0 and 1, got {}", value))
    }
}

/// Validator for the fold count
fn validate_folds(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid fold count", s))?;

    if value < 2 {
        Err(format!("folds must be at least 2, got {}", value))
    } else {
        Ok(value)
    }
}
