//! Tests for collapsing species to a binary response

use penglm::pipeline::{
    count_mapped_records, derive_binary_response, response_indicator, PipelineError,
    TargetMapping, OTHER_LABEL,
};

#[path = "common/mod.rs"]
mod common;

#[test]
fn test_binary_response_on_synthetic_penguins() {
    let dataset = common::synthetic_dataset(20, 2);
    let binary = derive_binary_response(&dataset, "Adelie").unwrap();

    assert_eq!(binary.len(), dataset.len(), "Mapping must not drop rows");
    let counts = binary.species_counts();
    assert_eq!(counts.len(), 2);
    assert_eq!(counts["Adelie"], 20);
    assert_eq!(counts[OTHER_LABEL], 40);

    for (original, mapped) in dataset.iter().zip(binary.iter()) {
        assert_eq!(original.island, mapped.island);
        assert_eq!(original.bill_length_mm, mapped.bill_length_mm);
    }
}

#[test]
fn test_any_species_can_be_positive() {
    let dataset = common::synthetic_dataset(5, 2);
    let binary = derive_binary_response(&dataset, "Gentoo").unwrap();
    let indicator = response_indicator(&dataset, "Gentoo");

    assert_eq!(indicator.iter().sum::<f64>(), 5.0);
    for (obs, y) in binary.iter().zip(indicator.iter()) {
        assert_eq!(obs.species == "Gentoo", *y == 1.0);
    }
}

#[test]
fn test_count_mapped_records() {
    let dataset = common::synthetic_dataset(7, 4);
    let mapping = TargetMapping::one_vs_rest("Chinstrap");

    assert_eq!(count_mapped_records(&dataset, &mapping), (7, 14));
    assert_eq!(mapping.label("Gentoo"), OTHER_LABEL);
    assert_eq!(mapping.label("Chinstrap"), "Chinstrap");
}

#[test]
fn test_absent_positive_species() {
    let dataset = common::synthetic_dataset(3, 4);
    let err = derive_binary_response(&dataset, "Emperor").unwrap_err();

    assert_eq!(
        err,
        PipelineError::UnknownLevel {
            attribute: "species".to_string(),
            level: "Emperor".to_string(),
        }
    );
}
