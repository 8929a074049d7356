//! Pipeline configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::dataset::{CategoricalAttr, Feature};
use super::encoding::ReferencePolicy;
use super::error::{PipelineError, PipelineResult};
use super::logistic::FitConfig;

/// Everything `run_pipeline` needs besides the data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Species treated as the event by the binary model
    pub positive_class: String,
    /// Features entering both models, in design order
    pub features: Vec<Feature>,
    /// Reference levels pinned by the caller
    pub reference_levels: BTreeMap<CategoricalAttr, String>,
    /// Rule for attributes without a pinned reference level
    pub reference_policy: ReferencePolicy,
    /// Baseline category of the multinomial model
    pub multinomial_reference: String,
    pub train_fraction: f64,
    pub seed: u64,
    pub folds: usize,
    /// Probability cut-off for binary labels
    pub threshold: f64,
    pub fit: FitConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            positive_class: "Adelie".to_string(),
            features: Feature::all(),
            reference_levels: BTreeMap::new(),
            reference_policy: ReferencePolicy::SeparationAware,
            multinomial_reference: "Adelie".to_string(),
            train_fraction: 0.8,
            seed: 123,
            folds: 10,
            threshold: 0.5,
            fit: FitConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file; absent fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: PipelineConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Reject settings that can never produce a valid run
    pub fn validate(&self) -> PipelineResult<()> {
        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            return Err(PipelineError::InvalidSplitProportion(self.train_fraction));
        }
        if self.folds < 2 {
            return Err(PipelineError::InvalidFoldCount {
                folds: self.folds,
                rows: 0,
            });
        }
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "threshold must lie strictly between 0 and 1, got {}",
                self.threshold
            )));
        }
        let confidence = self.fit.confidence_level;
        if !(confidence > 0.0 && confidence < 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "confidence level must lie strictly between 0 and 1, got {}",
                confidence
            )));
        }
        if self.fit.max_iterations == 0 {
            return Err(PipelineError::InvalidConfig(
                "max iterations must be at least 1".to_string(),
            ));
        }
        if !(self.fit.tolerance > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "tolerance must be positive, got {}",
                self.fit.tolerance
            )));
        }
        if self.features.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "at least one feature is required".to_string(),
            ));
        }
        if self.positive_class.trim().is_empty() || self.multinomial_reference.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "positive class and multinomial reference must be non-empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.features.len(), 7);
        assert_eq!(config.seed, 123);
    }

    #[test]
    fn test_validate_fails_fast() {
        let config = PipelineConfig {
            train_fraction: 1.0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(PipelineError::InvalidSplitProportion(1.0))
        );

        let config = PipelineConfig {
            folds: 1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidFoldCount { folds: 1, .. })
        ));

        let config = PipelineConfig {
            threshold: 0.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "positive_class": "Gentoo",
                "features": [{{"numeric": "bill_length"}}, {{"categorical": "island"}}],
                "reference_levels": {{"island": "Dream"}},
                "reference_policy": "last",
                "fit": {{"max_iterations": 50}}
            }}"#
        )
        .unwrap();

        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.positive_class, "Gentoo");
        assert_eq!(config.features.len(), 2);
        assert_eq!(config.reference_levels[&CategoricalAttr::Island], "Dream");
        assert_eq!(config.reference_policy, ReferencePolicy::Last);
        assert_eq!(config.fit.max_iterations, 50);
        assert_eq!(config.fit.tolerance, 1e-8);
        assert_eq!(config.folds, 10);
    }
}
