//! Tests for complete-case filtering and the missing value profile

use approx::assert_abs_diff_eq;
use penglm::pipeline::{load_and_clean, missing_profile, RawObservation};

#[path = "common/mod.rs"]
mod common;

#[test]
fn test_incomplete_rows_are_dropped() {
    let raw = common::synthetic_penguins_with_missing(10, 3);
    let cleaned = load_and_clean(&raw);

    assert_eq!(cleaned.dropped_rows, 2);
    assert_eq!(cleaned.dataset.len(), 28);
    assert_eq!(cleaned.dataset.len() + cleaned.dropped_rows, raw.len());
}

#[test]
fn test_row_order_is_preserved() {
    let raw = common::synthetic_penguins_with_missing(3, 5);
    let cleaned = load_and_clean(&raw);

    let expected: Vec<String> = raw
        .iter()
        .filter_map(RawObservation::complete)
        .map(|o| o.species)
        .collect();
    assert_eq!(cleaned.dataset.species(), expected);
    // Row 0 lost its sex, so row 1 moves to the front
    assert_eq!(cleaned.dataset.observations()[0].species, "Chinstrap");
}

#[test]
fn test_complete_input_is_untouched() {
    let raw = common::synthetic_penguins(4, 9);
    let cleaned = load_and_clean(&raw);

    assert_eq!(cleaned.dropped_rows, 0);
    assert_eq!(cleaned.dataset.len(), raw.len());
}

#[test]
fn test_everything_missing_gives_empty_dataset() {
    let raw = vec![RawObservation::default(); 3];
    let cleaned = load_and_clean(&raw);

    assert!(cleaned.dataset.is_empty());
    assert_eq!(cleaned.dropped_rows, 3);
}

#[test]
fn test_missing_profile_counts_per_field() {
    let raw = common::synthetic_penguins_with_missing(10, 3);
    let profile = missing_profile(&raw);

    assert_eq!(profile.len(), 8, "One entry per source column");

    let sex = profile.iter().find(|f| f.field == "sex").unwrap();
    assert_eq!(sex.missing, 1);
    assert_abs_diff_eq!(sex.ratio, 1.0 / 30.0, epsilon = 1e-12);

    let species = profile.iter().find(|f| f.field == "species").unwrap();
    assert_eq!(species.missing, 0);

    // Sorted by ratio, highest first
    assert!(profile.windows(2).all(|w| w[0].ratio >= w[1].ratio));
}

#[test]
fn test_missing_profile_of_nothing() {
    assert!(missing_profile(&[]).is_empty());
}
