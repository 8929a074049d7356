//! Response mapping
//!
//! Collapses the three-valued species response to a binary
//! `{positive, "other"}` response for the binary logistic model.

use serde::{Deserialize, Serialize};

use super::dataset::{Dataset, Observation};
use super::error::{PipelineError, PipelineResult};

/// Label given to every category other than the positive one
pub const OTHER_LABEL: &str = "other";

/// Mapping configuration for converting species to a binary response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetMapping {
    /// Value that maps to 1 (event)
    pub event_value: String,
    /// Value that maps to 0 (non-event)
    pub non_event_value: String,
}

impl TargetMapping {
    /// One-vs-rest mapping with the non-event labelled "other"
    pub fn one_vs_rest(event_value: impl Into<String>) -> Self {
        Self {
            event_value: event_value.into(),
            non_event_value: OTHER_LABEL.to_string(),
        }
    }

    pub fn label(&self, species: &str) -> &str {
        if species == self.event_value {
            &self.event_value
        } else {
            &self.non_event_value
        }
    }
}

/// Map the response to `{positive_category, "other"}`, preserving row order.
///
/// The positive category must occur in the dataset.
pub fn derive_binary_response(dataset: &Dataset, positive_category: &str) -> PipelineResult<Dataset> {
    ensure_category_present(dataset, positive_category)?;
    let mapping = TargetMapping::one_vs_rest(positive_category);

    Ok(dataset
        .iter()
        .map(|obs| Observation {
            species: mapping.label(&obs.species).to_string(),
            ..obs.clone()
        })
        .collect())
}

/// 0/1 response vector with 1 for the positive category
pub fn response_indicator(dataset: &Dataset, positive_category: &str) -> Vec<f64> {
    dataset
        .iter()
        .map(|obs| if obs.species == positive_category { 1.0 } else { 0.0 })
        .collect()
}

/// Count (events, non-events) under a mapping
pub fn count_mapped_records(dataset: &Dataset, mapping: &TargetMapping) -> (usize, usize) {
    let events = dataset
        .iter()
        .filter(|obs| obs.species == mapping.event_value)
        .count();
    (events, dataset.len() - events)
}

fn ensure_category_present(dataset: &Dataset, category: &str) -> PipelineResult<()> {
    if dataset.is_empty() {
        return Err(PipelineError::EmptyDataset);
    }
    if !dataset.iter().any(|obs| obs.species == category) {
        return Err(PipelineError::UnknownLevel {
            attribute: "species".to_string(),
            level: category.to_string(),
        });
    }
    Ok(())
}
