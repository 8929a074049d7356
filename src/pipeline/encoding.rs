//! Categorical encoding with explicit reference levels
//!
//! Each categorical attribute with k levels becomes k-1 indicator columns;
//! the reference level is the all-zero pattern and is folded into the
//! intercept. Numeric attributes pass through unchanged. The `Encoding`
//! is built once and applied identically to every partition.

use faer::Mat;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::dataset::{CategoricalAttr, Dataset, Feature, NumericAttr};
use super::diagnostics::detect_quasi_separation;
use super::error::{PipelineError, PipelineResult};

/// How to choose the reference level of an attribute the caller did not
/// pin explicitly
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferencePolicy {
    /// Alphabetically last level
    Last,
    /// Alphabetically last level that does not separate the response.
    /// If every level separates, the attribute is dropped.
    #[default]
    SeparationAware,
}

impl std::fmt::Display for ReferencePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferencePolicy::Last => write!(f, "last"),
            ReferencePolicy::SeparationAware => write!(f, "separation-aware"),
        }
    }
}

impl std::str::FromStr for ReferencePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "last" => Ok(ReferencePolicy::Last),
            "separation-aware" => Ok(ReferencePolicy::SeparationAware),
            _ => Err(format!(
                "Unknown reference policy: '{}'. Use 'last' or 'separation-aware'.",
                s
            )),
        }
    }
}

/// Level set and reference level of one categorical attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorEncoding {
    pub attribute: CategoricalAttr,
    /// Sorted distinct levels
    pub levels: Vec<String>,
    pub reference: String,
}

impl FactorEncoding {
    /// Levels that get an indicator column, in sorted order
    pub fn indicator_levels(&self) -> impl Iterator<Item = &String> {
        self.levels.iter().filter(move |l| **l != self.reference)
    }

    pub fn indicator_names(&self) -> Vec<String> {
        self.indicator_levels()
            .map(|l| format!("{}_{}", self.attribute, l))
            .collect()
    }
}

/// One encoded column: a numeric attribute or an indicator of one level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum Column {
    Numeric(NumericAttr),
    Indicator { attribute: CategoricalAttr, level: String },
}

/// Encoding schema shared by train, test and cross-validation folds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encoding {
    features: Vec<Feature>,
    factors: Vec<FactorEncoding>,
    /// Attributes removed because every level separates the response
    dropped: Vec<CategoricalAttr>,
}

impl Encoding {
    /// Build an encoding from the levels observed in `dataset`.
    ///
    /// `explicit` pins reference levels per attribute; other attributes use
    /// `policy`, evaluated against the dataset's response column.
    pub fn build(
        dataset: &Dataset,
        features: &[Feature],
        explicit: &BTreeMap<CategoricalAttr, String>,
        policy: ReferencePolicy,
    ) -> PipelineResult<Self> {
        Self::build_from_training(dataset, dataset, features, explicit, policy)
    }

    /// Build an encoding whose level sets cover every row of `dataset` but
    /// whose reference choice only looks at the `train` rows.
    ///
    /// Under [`ReferencePolicy::SeparationAware`] the reference is the last
    /// level that occurs in `train` without separating its response, so
    /// held-out labels never influence the schema.
    pub fn build_from_training(
        dataset: &Dataset,
        train: &Dataset,
        features: &[Feature],
        explicit: &BTreeMap<CategoricalAttr, String>,
        policy: ReferencePolicy,
    ) -> PipelineResult<Self> {
        if dataset.is_empty() || train.is_empty() {
            return Err(PipelineError::EmptyDataset);
        }

        let response = train.species();
        let mut kept = Vec::new();
        let mut factors = Vec::new();
        let mut dropped = Vec::new();
        let mut seen = BTreeSet::new();

        for &feature in features {
            if !seen.insert(feature) {
                continue;
            }
            let attribute = match feature {
                Feature::Numeric(_) => {
                    kept.push(feature);
                    continue;
                }
                Feature::Categorical(attribute) => attribute,
            };

            let levels: Vec<String> = dataset
                .levels_of(attribute)
                .into_iter()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let values = train.levels_of(attribute);

            let reference = match explicit.get(&attribute) {
                Some(level) => {
                    if !levels.contains(level) {
                        return Err(PipelineError::UnknownReference {
                            attribute: attribute.to_string(),
                            level: level.clone(),
                        });
                    }
                    Some(level.clone())
                }
                None => choose_reference(&levels, &values, &response, policy)?,
            };

            match reference {
                Some(reference) => {
                    log::info!("Reference level for '{}': {}", attribute, reference);
                    kept.push(feature);
                    factors.push(FactorEncoding {
                        attribute,
                        levels,
                        reference,
                    });
                }
                None => {
                    log::warn!(
                        "Dropping '{}': every level separates the response",
                        attribute
                    );
                    dropped.push(attribute);
                }
            }
        }

        Ok(Self {
            features: kept,
            factors,
            dropped,
        })
    }

    /// Features that remain in the design, in encoding order
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn factors(&self) -> &[FactorEncoding] {
        &self.factors
    }

    pub fn dropped(&self) -> &[CategoricalAttr] {
        &self.dropped
    }

    pub fn factor(&self, attribute: CategoricalAttr) -> Option<&FactorEncoding> {
        self.factors.iter().find(|f| f.attribute == attribute)
    }

    /// Same schema restricted to the given features; level sets and
    /// reference choices are kept as they are.
    pub fn restricted_to(&self, features: &[Feature]) -> Encoding {
        let keep: BTreeSet<Feature> = features.iter().copied().collect();
        Encoding {
            features: self
                .features
                .iter()
                .copied()
                .filter(|f| keep.contains(f))
                .collect(),
            factors: self
                .factors
                .iter()
                .filter(|f| keep.contains(&Feature::Categorical(f.attribute)))
                .cloned()
                .collect(),
            dropped: self.dropped.clone(),
        }
    }

    fn columns(&self) -> Vec<Column> {
        let mut columns = Vec::new();
        for feature in &self.features {
            match feature {
                Feature::Numeric(attr) => columns.push(Column::Numeric(*attr)),
                Feature::Categorical(attr) => {
                    if let Some(factor) = self.factor(*attr) {
                        columns.extend(factor.indicator_levels().map(|level| Column::Indicator {
                            attribute: *attr,
                            level: level.clone(),
                        }));
                    }
                }
            }
        }
        columns
    }

    /// Names of the encoded columns, in design-matrix order
    pub fn feature_names(&self) -> Vec<String> {
        self.columns()
            .iter()
            .map(|c| match c {
                Column::Numeric(attr) => attr.to_string(),
                Column::Indicator { attribute, level } => format!("{}_{}", attribute, level),
            })
            .collect()
    }

    /// Number of encoded columns (excluding the intercept)
    pub fn width(&self) -> usize {
        self.columns().len()
    }

    /// Encode a dataset. Levels not seen when the encoding was built are
    /// rejected.
    pub fn encode(&self, dataset: &Dataset) -> PipelineResult<EncodedDataset> {
        let columns = self.columns();
        let n = dataset.len();
        let mut design = Mat::<f64>::zeros(n, columns.len());

        for (row, obs) in dataset.iter().enumerate() {
            for factor in &self.factors {
                let level = obs.level(factor.attribute);
                if !factor.levels.contains(&level) {
                    return Err(PipelineError::UnknownLevel {
                        attribute: factor.attribute.to_string(),
                        level,
                    });
                }
            }

            for (col, column) in columns.iter().enumerate() {
                design[(row, col)] = match column {
                    Column::Numeric(attr) => obs.value(*attr),
                    Column::Indicator { attribute, level } => {
                        if obs.level(*attribute) == *level {
                            1.0
                        } else {
                            0.0
                        }
                    }
                };
            }
        }

        Ok(EncodedDataset {
            feature_names: self.feature_names(),
            design,
            labels: dataset.species(),
        })
    }
}

/// Pick a reference level under a policy. `None` means the attribute should
/// be dropped.
fn choose_reference(
    levels: &[String],
    values: &[String],
    response: &[String],
    policy: ReferencePolicy,
) -> PipelineResult<Option<String>> {
    match policy {
        ReferencePolicy::Last => Ok(levels.last().cloned()),
        ReferencePolicy::SeparationAware => {
            let separated = detect_quasi_separation(values, response)?;
            Ok(levels
                .iter()
                .rev()
                .find(|l| values.contains(*l) && !separated.contains(*l))
                .cloned())
        }
    }
}

/// Design matrix (no intercept column) plus response labels
#[derive(Debug, Clone)]
pub struct EncodedDataset {
    pub feature_names: Vec<String>,
    pub design: Mat<f64>,
    pub labels: Vec<String>,
}

impl EncodedDataset {
    pub fn n_rows(&self) -> usize {
        self.design.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.design.ncols()
    }

    /// Feature values of one row
    pub fn row(&self, i: usize) -> Vec<f64> {
        (0..self.design.ncols()).map(|j| self.design[(i, j)]).collect()
    }
}

/// Encode every listed categorical attribute against its given reference
/// level, followed by the numeric attributes unchanged.
pub fn encode_categoricals(
    dataset: &Dataset,
    reference_levels: &BTreeMap<CategoricalAttr, String>,
) -> PipelineResult<EncodedDataset> {
    let features: Vec<Feature> = reference_levels
        .keys()
        .map(|&attr| Feature::Categorical(attr))
        .chain(NumericAttr::ALL.iter().map(|&n| Feature::Numeric(n)))
        .collect();
    let encoding = Encoding::build(dataset, &features, reference_levels, ReferencePolicy::Last)?;
    encoding.encode(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::dataset::Observation;

    fn obs(species: &str, island: &str, sex: &str) -> Observation {
        Observation {
            species: species.to_string(),
            island: island.to_string(),
            bill_length_mm: 40.0,
            bill_depth_mm: 18.0,
            flipper_length_mm: 190.0,
            body_mass_g: 3700.0,
            sex: sex.to_string(),
            year: 2008,
        }
    }

    fn penguins() -> Dataset {
        vec![
            obs("Adelie", "Torgersen", "male"),
            obs("Adelie", "Torgersen", "female"),
            obs("Adelie", "Dream", "male"),
            obs("Chinstrap", "Dream", "female"),
            obs("Gentoo", "Biscoe", "male"),
            obs("Adelie", "Biscoe", "female"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_k_minus_one_indicators() {
        let ds = penguins();
        let encoding = Encoding::build(
            &ds,
            &[Feature::Categorical(CategoricalAttr::Island)],
            &BTreeMap::new(),
            ReferencePolicy::Last,
        )
        .unwrap();
        assert_eq!(encoding.width(), 2);
        assert_eq!(encoding.feature_names(), vec!["island_Biscoe", "island_Dream"]);

        let encoded = encoding.encode(&ds).unwrap();
        // Torgersen is the reference: all-zero row
        assert_eq!(encoded.row(0), vec![0.0, 0.0]);
        assert_eq!(encoded.row(2), vec![0.0, 1.0]);
        assert_eq!(encoded.row(4), vec![1.0, 0.0]);
    }

    #[test]
    fn test_explicit_reference() {
        let ds = penguins();
        let explicit = BTreeMap::from([(CategoricalAttr::Island, "Dream".to_string())]);
        let encoding = Encoding::build(
            &ds,
            &[Feature::Categorical(CategoricalAttr::Island)],
            &explicit,
            ReferencePolicy::Last,
        )
        .unwrap();
        assert_eq!(encoding.feature_names(), vec!["island_Biscoe", "island_Torgersen"]);
    }

    #[test]
    fn test_unknown_explicit_reference() {
        let explicit = BTreeMap::from([(CategoricalAttr::Island, "Anvers".to_string())]);
        let err = Encoding::build(
            &penguins(),
            &[Feature::Categorical(CategoricalAttr::Island)],
            &explicit,
            ReferencePolicy::Last,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownReference { .. }));
    }

    #[test]
    fn test_separation_aware_skips_separating_levels() {
        // Torgersen (all Adelie) separates; Dream is the last non-separating level
        let encoding = Encoding::build(
            &penguins(),
            &[Feature::Categorical(CategoricalAttr::Island)],
            &BTreeMap::new(),
            ReferencePolicy::SeparationAware,
        )
        .unwrap();
        assert_eq!(
            encoding.factor(CategoricalAttr::Island).unwrap().reference,
            "Dream"
        );
    }

    #[test]
    fn test_separation_aware_drops_fully_separating_attribute() {
        let ds: Dataset = vec![
            obs("Adelie", "Torgersen", "male"),
            obs("Gentoo", "Biscoe", "male"),
            obs("Chinstrap", "Dream", "female"),
        ]
        .into_iter()
        .collect();
        let encoding = Encoding::build(
            &ds,
            &[
                Feature::Categorical(CategoricalAttr::Island),
                Feature::Numeric(NumericAttr::BillLength),
            ],
            &BTreeMap::new(),
            ReferencePolicy::SeparationAware,
        )
        .unwrap();
        assert_eq!(encoding.dropped(), &[CategoricalAttr::Island]);
        assert_eq!(encoding.feature_names(), vec!["bill_length_mm"]);
    }

    #[test]
    fn test_reference_chosen_from_training_rows() {
        // Torgersen is mixed across all rows but all-Adelie in the training rows
        let mut rows: Vec<Observation> = penguins().observations().to_vec();
        rows.push(obs("Gentoo", "Torgersen", "male"));
        let all: Dataset = rows.into_iter().collect();
        let train = all.subset(&[0, 1, 2, 3, 4, 5]);
        let features = [Feature::Categorical(CategoricalAttr::Island)];

        let from_all =
            Encoding::build(&all, &features, &BTreeMap::new(), ReferencePolicy::SeparationAware)
                .unwrap();
        assert_eq!(from_all.factor(CategoricalAttr::Island).unwrap().reference, "Torgersen");

        let from_train = Encoding::build_from_training(
            &all,
            &train,
            &features,
            &BTreeMap::new(),
            ReferencePolicy::SeparationAware,
        )
        .unwrap();
        assert_eq!(from_train.factor(CategoricalAttr::Island).unwrap().reference, "Dream");
        assert!(from_train.encode(&all).is_ok());
    }

    #[test]
    fn test_level_missing_from_training_is_not_reference() {
        let all: Dataset = vec![
            obs("Adelie", "Biscoe", "male"),
            obs("Gentoo", "Biscoe", "female"),
            obs("Adelie", "Dream", "male"),
            obs("Chinstrap", "Dream", "female"),
            obs("Adelie", "Torgersen", "female"),
        ]
        .into_iter()
        .collect();
        let train = all.subset(&[0, 1, 2, 3]);

        let encoding = Encoding::build_from_training(
            &all,
            &train,
            &[Feature::Categorical(CategoricalAttr::Island)],
            &BTreeMap::new(),
            ReferencePolicy::SeparationAware,
        )
        .unwrap();
        let island = encoding.factor(CategoricalAttr::Island).unwrap();
        assert_eq!(island.reference, "Dream");
        assert_eq!(island.levels, vec!["Biscoe", "Dream", "Torgersen"]);
    }

    #[test]
    fn test_unseen_level_rejected() {
        let encoding = Encoding::build(
            &penguins(),
            &[Feature::Categorical(CategoricalAttr::Island)],
            &BTreeMap::new(),
            ReferencePolicy::Last,
        )
        .unwrap();
        let other: Dataset = vec![obs("Adelie", "Anvers", "male")].into_iter().collect();
        assert!(matches!(
            encoding.encode(&other),
            Err(PipelineError::UnknownLevel { .. })
        ));
    }

    #[test]
    fn test_encode_categoricals_appends_numeric() {
        let refs = BTreeMap::from([(CategoricalAttr::Sex, "male".to_string())]);
        let encoded = encode_categoricals(&penguins(), &refs).unwrap();
        assert_eq!(
            encoded.feature_names,
            vec![
                "sex_female",
                "bill_length_mm",
                "bill_depth_mm",
                "flipper_length_mm",
                "body_mass_g"
            ]
        );
        assert_eq!(encoded.row(1)[0], 1.0);
        assert_eq!(encoded.row(1)[1], 40.0);
    }

    #[test]
    fn test_restricted_to_keeps_reference() {
        let encoding = Encoding::build(
            &penguins(),
            &Feature::all(),
            &BTreeMap::new(),
            ReferencePolicy::Last,
        )
        .unwrap();
        let numeric_and_island: Vec<Feature> = encoding
            .features()
            .iter()
            .copied()
            .filter(|f| !matches!(f, Feature::Categorical(CategoricalAttr::Sex)))
            .collect();
        let restricted = encoding.restricted_to(&numeric_and_island);
        assert!(restricted.factor(CategoricalAttr::Sex).is_none());
        assert_eq!(
            restricted.factor(CategoricalAttr::Island),
            encoding.factor(CategoricalAttr::Island)
        );
    }
}
