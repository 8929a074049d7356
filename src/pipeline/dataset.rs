//! Penguin observations, attributes and the in-memory dataset

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Categorical attributes of an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalAttr {
    Island,
    Sex,
    Year,
}

impl CategoricalAttr {
    pub const ALL: [CategoricalAttr; 3] =
        [CategoricalAttr::Island, CategoricalAttr::Sex, CategoricalAttr::Year];

    /// Column name in the source table
    pub fn column(&self) -> &'static str {
        match self {
            CategoricalAttr::Island => "island",
            CategoricalAttr::Sex => "sex",
            CategoricalAttr::Year => "year",
        }
    }
}

impl std::fmt::Display for CategoricalAttr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.column())
    }
}

/// Continuous attributes of an observation (millimeters and grams)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericAttr {
    BillLength,
    BillDepth,
    FlipperLength,
    BodyMass,
}

impl NumericAttr {
    pub const ALL: [NumericAttr; 4] = [
        NumericAttr::BillLength,
        NumericAttr::BillDepth,
        NumericAttr::FlipperLength,
        NumericAttr::BodyMass,
    ];

    /// Column name in the source table
    pub fn column(&self) -> &'static str {
        match self {
            NumericAttr::BillLength => "bill_length_mm",
            NumericAttr::BillDepth => "bill_depth_mm",
            NumericAttr::FlipperLength => "flipper_length_mm",
            NumericAttr::BodyMass => "body_mass_g",
        }
    }
}

impl std::fmt::Display for NumericAttr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.column())
    }
}

/// A model feature identifier. Replaces formula strings such as
/// `species ~ island + bill_length_mm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Categorical(CategoricalAttr),
    Numeric(NumericAttr),
}

impl Feature {
    /// Every feature, numeric attributes first
    pub fn all() -> Vec<Feature> {
        NumericAttr::ALL
            .iter()
            .map(|&n| Feature::Numeric(n))
            .chain(CategoricalAttr::ALL.iter().map(|&c| Feature::Categorical(c)))
            .collect()
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, Feature::Categorical(_))
    }

    pub fn column(&self) -> &'static str {
        match self {
            Feature::Categorical(c) => c.column(),
            Feature::Numeric(n) => n.column(),
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.column())
    }
}

impl std::str::FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        CategoricalAttr::ALL
            .iter()
            .map(|&c| Feature::Categorical(c))
            .chain(NumericAttr::ALL.iter().map(|&n| Feature::Numeric(n)))
            .find(|f| f.column() == name)
            .ok_or_else(|| {
                format!(
                    "Unknown feature: '{}'. Use one of: {}",
                    s,
                    Feature::all()
                        .iter()
                        .map(|f| f.column())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}

impl std::str::FromStr for CategoricalAttr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<Feature>()? {
            Feature::Categorical(c) => Ok(c),
            Feature::Numeric(n) => Err(format!("'{}' is numeric, not categorical", n)),
        }
    }
}

/// One row as read from the source table; any field may be missing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawObservation {
    pub species: Option<String>,
    pub island: Option<String>,
    pub bill_length_mm: Option<f64>,
    pub bill_depth_mm: Option<f64>,
    pub flipper_length_mm: Option<f64>,
    pub body_mass_g: Option<f64>,
    pub sex: Option<String>,
    pub year: Option<i64>,
}

impl RawObservation {
    /// Convert to a complete observation, or `None` if any field is missing
    pub fn complete(&self) -> Option<Observation> {
        Some(Observation {
            species: self.species.clone()?,
            island: self.island.clone()?,
            bill_length_mm: self.bill_length_mm?,
            bill_depth_mm: self.bill_depth_mm?,
            flipper_length_mm: self.flipper_length_mm?,
            body_mass_g: self.body_mass_g?,
            sex: self.sex.clone()?,
            year: self.year?,
        })
    }
}

/// A complete penguin record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub species: String,
    pub island: String,
    pub bill_length_mm: f64,
    pub bill_depth_mm: f64,
    pub flipper_length_mm: f64,
    pub body_mass_g: f64,
    pub sex: String,
    pub year: i64,
}

impl Observation {
    /// Level of a categorical attribute. Years are treated as levels.
    pub fn level(&self, attr: CategoricalAttr) -> String {
        match attr {
            CategoricalAttr::Island => self.island.clone(),
            CategoricalAttr::Sex => self.sex.clone(),
            CategoricalAttr::Year => self.year.to_string(),
        }
    }

    pub fn value(&self, attr: NumericAttr) -> f64 {
        match attr {
            NumericAttr::BillLength => self.bill_length_mm,
            NumericAttr::BillDepth => self.bill_depth_mm,
            NumericAttr::FlipperLength => self.flipper_length_mm,
            NumericAttr::BodyMass => self.body_mass_g,
        }
    }
}

/// Ordered collection of complete observations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    observations: Vec<Observation>,
}

impl Dataset {
    pub fn new(observations: Vec<Observation>) -> Self {
        Self { observations }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Observation> {
        self.observations.iter()
    }

    /// Response labels in row order
    pub fn species(&self) -> Vec<String> {
        self.observations.iter().map(|o| o.species.clone()).collect()
    }

    /// Levels of one categorical attribute in row order
    pub fn levels_of(&self, attr: CategoricalAttr) -> Vec<String> {
        self.observations.iter().map(|o| o.level(attr)).collect()
    }

    /// New dataset holding the given rows, in the given order
    pub fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset::new(
            indices
                .iter()
                .map(|&i| self.observations[i].clone())
                .collect(),
        )
    }

    /// Row count per response category, sorted by category
    pub fn species_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for obs in &self.observations {
            *counts.entry(obs.species.clone()).or_insert(0) += 1;
        }
        counts
    }
}

impl FromIterator<Observation> for Dataset {
    fn from_iter<I: IntoIterator<Item = Observation>>(iter: I) -> Self {
        Dataset::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(species: &str, year: i64) -> Observation {
        Observation {
            species: species.to_string(),
            island: "Dream".to_string(),
            bill_length_mm: 40.0,
            bill_depth_mm: 18.0,
            flipper_length_mm: 190.0,
            body_mass_g: 3700.0,
            sex: "female".to_string(),
            year,
        }
    }

    #[test]
    fn test_feature_from_str() {
        assert_eq!(
            "island".parse::<Feature>().unwrap(),
            Feature::Categorical(CategoricalAttr::Island)
        );
        assert_eq!(
            " Body_Mass_G ".parse::<Feature>().unwrap(),
            Feature::Numeric(NumericAttr::BodyMass)
        );
        assert!("beak".parse::<Feature>().is_err());
        assert!("bill_depth_mm".parse::<CategoricalAttr>().is_err());
    }

    #[test]
    fn test_all_features_listed_once() {
        let all = Feature::all();
        assert_eq!(all.len(), 7);
        assert_eq!(all.iter().filter(|f| f.is_categorical()).count(), 3);
    }

    #[test]
    fn test_raw_observation_complete() {
        let raw = RawObservation {
            species: Some("Adelie".into()),
            island: Some("Torgersen".into()),
            bill_length_mm: Some(39.1),
            bill_depth_mm: Some(18.7),
            flipper_length_mm: Some(181.0),
            body_mass_g: Some(3750.0),
            sex: Some("male".into()),
            year: Some(2007),
        };
        assert!(raw.complete().is_some());

        let incomplete = RawObservation {
            sex: None,
            ..raw
        };
        assert!(incomplete.complete().is_none());
    }

    #[test]
    fn test_year_is_a_level() {
        assert_eq!(sample("Adelie", 2008).level(CategoricalAttr::Year), "2008");
    }

    #[test]
    fn test_subset_and_counts() {
        let ds: Dataset = vec![sample("Adelie", 2007), sample("Gentoo", 2008), sample("Adelie", 2009)]
            .into_iter()
            .collect();
        let sub = ds.subset(&[2, 0]);
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.observations()[0].year, 2009);
        assert_eq!(ds.species_counts().get("Adelie"), Some(&2));
    }
}
