//! Tests for reference-level encoding of categorical attributes

use penglm::pipeline::{
    derive_binary_response, encode_categoricals, CategoricalAttr, Dataset, Encoding, Feature,
    NumericAttr, PipelineError, ReferencePolicy,
};
use std::collections::BTreeMap;

#[path = "common/mod.rs"]
mod common;

fn island_only() -> Vec<Feature> {
    vec![Feature::Categorical(CategoricalAttr::Island)]
}

#[test]
fn test_last_policy_uses_last_level() {
    let dataset = common::synthetic_dataset(6, 1);
    let encoding =
        Encoding::build(&dataset, &island_only(), &BTreeMap::new(), ReferencePolicy::Last)
            .unwrap();

    let factor = encoding.factor(CategoricalAttr::Island).unwrap();
    assert_eq!(factor.levels, vec!["Biscoe", "Dream", "Torgersen"]);
    assert_eq!(factor.reference, "Torgersen");
    assert_eq!(encoding.feature_names(), vec!["island_Biscoe", "island_Dream"]);
}

#[test]
fn test_separation_aware_skips_separating_level() {
    let dataset = common::synthetic_dataset(6, 1);
    let encoding = Encoding::build(
        &dataset,
        &island_only(),
        &BTreeMap::new(),
        ReferencePolicy::SeparationAware,
    )
    .unwrap();

    let factor = encoding.factor(CategoricalAttr::Island).unwrap();
    assert_eq!(factor.reference, "Dream", "Torgersen separates the species");
    assert_eq!(
        encoding.feature_names(),
        vec!["island_Biscoe", "island_Torgersen"]
    );
}

#[test]
fn test_attribute_dropped_when_every_level_separates() {
    let dataset = common::synthetic_dataset(6, 1);
    let binary = derive_binary_response(&dataset, "Gentoo").unwrap();
    let features = vec![
        Feature::Numeric(NumericAttr::BillDepth),
        Feature::Categorical(CategoricalAttr::Island),
    ];

    // Against Gentoo/other, Dream and Torgersen separate and Biscoe does not
    let encoding = Encoding::build(
        &binary,
        &features,
        &BTreeMap::new(),
        ReferencePolicy::SeparationAware,
    )
    .unwrap();
    assert_eq!(encoding.factor(CategoricalAttr::Island).unwrap().reference, "Biscoe");

    // Restricted to Gentoo rows every level is trivially separating
    let gentoo: Dataset = binary.iter().filter(|o| o.species == "Gentoo").cloned().collect();
    let encoding = Encoding::build(
        &gentoo,
        &features,
        &BTreeMap::new(),
        ReferencePolicy::SeparationAware,
    )
    .unwrap();
    assert_eq!(encoding.dropped(), &[CategoricalAttr::Island]);
    assert_eq!(encoding.features(), &[Feature::Numeric(NumericAttr::BillDepth)]);
    assert_eq!(encoding.width(), 1);
}

#[test]
fn test_explicit_reference_wins() {
    let dataset = common::synthetic_dataset(6, 1);
    let explicit = BTreeMap::from([(CategoricalAttr::Island, "Torgersen".to_string())]);
    let encoding = Encoding::build(
        &dataset,
        &island_only(),
        &explicit,
        ReferencePolicy::SeparationAware,
    )
    .unwrap();

    assert_eq!(encoding.factor(CategoricalAttr::Island).unwrap().reference, "Torgersen");
}

#[test]
fn test_unknown_reference_is_rejected() {
    let dataset = common::synthetic_dataset(6, 1);
    let explicit = BTreeMap::from([(CategoricalAttr::Island, "Anvers".to_string())]);
    let err = Encoding::build(&dataset, &island_only(), &explicit, ReferencePolicy::Last)
        .unwrap_err();

    assert_eq!(
        err,
        PipelineError::UnknownReference {
            attribute: "island".to_string(),
            level: "Anvers".to_string(),
        }
    );
}

#[test]
fn test_design_matrix_values() {
    let dataset: Dataset = vec![
        common::observation("Adelie", "Torgersen", "male", 2007, [39.1, 18.7, 181.0, 3750.0]),
        common::observation("Gentoo", "Biscoe", "female", 2008, [46.1, 13.2, 211.0, 4500.0]),
        common::observation("Chinstrap", "Dream", "female", 2009, [46.5, 17.9, 192.0, 3500.0]),
    ]
    .into_iter()
    .collect();
    let features = vec![
        Feature::Numeric(NumericAttr::FlipperLength),
        Feature::Categorical(CategoricalAttr::Island),
        Feature::Categorical(CategoricalAttr::Sex),
    ];
    let encoding =
        Encoding::build(&dataset, &features, &BTreeMap::new(), ReferencePolicy::Last).unwrap();

    let encoded = encoding.encode(&dataset).unwrap();
    assert_eq!(
        encoded.feature_names,
        vec!["flipper_length_mm", "island_Biscoe", "island_Dream", "sex_female"]
    );
    assert_eq!(encoded.n_rows(), 3);
    assert_eq!(encoded.row(0), vec![181.0, 0.0, 0.0, 0.0]);
    assert_eq!(encoded.row(1), vec![211.0, 1.0, 0.0, 1.0]);
    assert_eq!(encoded.row(2), vec![192.0, 0.0, 1.0, 1.0]);
    assert_eq!(encoded.labels, vec!["Adelie", "Gentoo", "Chinstrap"]);
}

#[test]
fn test_unseen_level_is_rejected() {
    let train: Dataset = common::synthetic_dataset(3, 2)
        .iter()
        .filter(|o| o.island != "Torgersen")
        .cloned()
        .collect();
    let encoding = Encoding::build(&train, &island_only(), &BTreeMap::new(), ReferencePolicy::Last)
        .unwrap();

    let test: Dataset = vec![common::observation(
        "Adelie",
        "Torgersen",
        "male",
        2007,
        [39.0, 18.0, 185.0, 3600.0],
    )]
    .into_iter()
    .collect();
    let err = encoding.encode(&test).unwrap_err();
    assert!(matches!(err, PipelineError::UnknownLevel { .. }));
}

#[test]
fn test_same_schema_for_every_partition() {
    let dataset = common::synthetic_dataset(10, 4);
    let encoding = Encoding::build(
        &dataset,
        &Feature::all(),
        &BTreeMap::new(),
        ReferencePolicy::SeparationAware,
    )
    .unwrap();

    // A partition holding only Biscoe birds still gets every island column
    let biscoe: Dataset = dataset.iter().filter(|o| o.island == "Biscoe").cloned().collect();
    let full = encoding.encode(&dataset).unwrap();
    let part = encoding.encode(&biscoe).unwrap();
    assert_eq!(full.feature_names, part.feature_names);
    assert_eq!(part.n_features(), encoding.width());
}

#[test]
fn test_encode_categoricals_with_given_references() {
    let dataset = common::synthetic_dataset(4, 3);
    let references = BTreeMap::from([
        (CategoricalAttr::Island, "Biscoe".to_string()),
        (CategoricalAttr::Year, "2007".to_string()),
    ]);

    let encoded = encode_categoricals(&dataset, &references).unwrap();
    assert_eq!(
        encoded.feature_names,
        vec![
            "island_Dream",
            "island_Torgersen",
            "year_2008",
            "year_2009",
            "bill_length_mm",
            "bill_depth_mm",
            "flipper_length_mm",
            "body_mass_g",
        ]
    );
    assert_eq!(encoded.n_rows(), dataset.len());
}
