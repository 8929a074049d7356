//! Missing value profiling and complete-case filtering

use serde::Serialize;

use super::dataset::{Dataset, RawObservation};

/// Result of complete-case filtering. Dropping rows is informational,
/// never an error.
#[derive(Debug, Clone, Serialize)]
pub struct CleanedDataset {
    pub dataset: Dataset,
    /// Number of input rows excluded because at least one field was missing
    pub dropped_rows: usize,
}

/// Missing value count for a single field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMissing {
    pub field: String,
    pub missing: usize,
    pub ratio: f64,
}

/// Remove every row with a missing field. Row order is preserved and no
/// value is imputed.
pub fn load_and_clean(raw: &[RawObservation]) -> CleanedDataset {
    let dataset: Dataset = raw.iter().filter_map(RawObservation::complete).collect();
    let dropped_rows = raw.len() - dataset.len();

    if dropped_rows > 0 {
        log::info!(
            "Dropped {} of {} rows with missing values",
            dropped_rows,
            raw.len()
        );
    }

    CleanedDataset {
        dataset,
        dropped_rows,
    }
}

/// Count missing values per field, sorted by missing ratio descending.
pub fn missing_profile(raw: &[RawObservation]) -> Vec<FieldMissing> {
    if raw.is_empty() {
        return Vec::new();
    }

    let checks: [(&str, fn(&RawObservation) -> bool); 8] = [
        ("species", |r| r.species.is_none()),
        ("island", |r| r.island.is_none()),
        ("bill_length_mm", |r| r.bill_length_mm.is_none()),
        ("bill_depth_mm", |r| r.bill_depth_mm.is_none()),
        ("flipper_length_mm", |r| r.flipper_length_mm.is_none()),
        ("body_mass_g", |r| r.body_mass_g.is_none()),
        ("sex", |r| r.sex.is_none()),
        ("year", |r| r.year.is_none()),
    ];

    let total = raw.len() as f64;
    let mut profile: Vec<FieldMissing> = checks
        .iter()
        .map(|(field, is_missing)| {
            let missing = raw.iter().filter(|r| is_missing(r)).count();
            FieldMissing {
                field: field.to_string(),
                missing,
                ratio: missing as f64 / total,
            }
        })
        .collect();

    // Stable sort keeps column order among ties
    profile.sort_by(|a, b| b.ratio.partial_cmp(&a.ratio).unwrap_or(std::cmp::Ordering::Equal));
    profile
}
