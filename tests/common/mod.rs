//! Shared test utilities and fixture generators

#![allow(dead_code)]

use faer::Mat;
use penglm::pipeline::{Dataset, Observation, RawObservation};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::path::PathBuf;
use tempfile::TempDir;

/// Per-species means and standard deviations of bill length, bill depth,
/// flipper length and body mass, close to the Palmer Station measurements
const SPECIES_PROFILES: [(&str, [(f64, f64); 4]); 3] = [
    ("Adelie", [(38.8, 2.7), (18.3, 1.2), (190.0, 6.5), (3700.0, 460.0)]),
    ("Chinstrap", [(48.8, 3.3), (18.4, 1.1), (196.0, 7.0), (3733.0, 384.0)]),
    ("Gentoo", [(47.5, 3.1), (15.0, 1.0), (217.0, 6.5), (5076.0, 504.0)]),
];

fn island_for(species: &str, i: usize) -> &'static str {
    match species {
        // Torgersen only ever holds Adelie penguins
        "Adelie" => ["Torgersen", "Biscoe", "Dream"][i % 3],
        "Chinstrap" => "Dream",
        _ => "Biscoe",
    }
}

/// Complete synthetic penguin records, `per_species` rows of each species,
/// interleaved so no species occupies a contiguous block
pub fn synthetic_penguins(per_species: usize, seed: u64) -> Vec<RawObservation> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(per_species * SPECIES_PROFILES.len());

    for i in 0..per_species {
        for (species, profile) in SPECIES_PROFILES.iter() {
            let draw = |rng: &mut StdRng, k: usize| {
                let (mean, sd) = profile[k];
                mean + sd * rng.sample::<f64, _>(StandardNormal)
            };
            rows.push(RawObservation {
                species: Some(species.to_string()),
                island: Some(island_for(species, i).to_string()),
                bill_length_mm: Some(draw(&mut rng, 0)),
                bill_depth_mm: Some(draw(&mut rng, 1)),
                flipper_length_mm: Some(draw(&mut rng, 2).round()),
                body_mass_g: Some((draw(&mut rng, 3) / 25.0).round() * 25.0),
                sex: Some(if i % 2 == 0 { "female" } else { "male" }.to_string()),
                year: Some(2007 + (i % 3) as i64),
            });
        }
    }
    rows
}

/// Synthetic records with a few incomplete rows mixed in: the first row
/// misses `sex`, the fifth misses every measurement
pub fn synthetic_penguins_with_missing(per_species: usize, seed: u64) -> Vec<RawObservation> {
    let mut rows = synthetic_penguins(per_species, seed);
    rows[0].sex = None;
    rows[4].bill_length_mm = None;
    rows[4].bill_depth_mm = None;
    rows[4].flipper_length_mm = None;
    rows[4].body_mass_g = None;
    rows
}

/// Complete synthetic dataset
pub fn synthetic_dataset(per_species: usize, seed: u64) -> Dataset {
    synthetic_penguins(per_species, seed)
        .iter()
        .filter_map(RawObservation::complete)
        .collect()
}

/// A single complete observation
pub fn observation(
    species: &str,
    island: &str,
    sex: &str,
    year: i64,
    measurements: [f64; 4],
) -> Observation {
    Observation {
        species: species.to_string(),
        island: island.to_string(),
        bill_length_mm: measurements[0],
        bill_depth_mm: measurements[1],
        flipper_length_mm: measurements[2],
        body_mass_g: measurements[3],
        sex: sex.to_string(),
        year,
    }
}

/// Build a penguin table with the source column layout
pub fn penguin_frame(rows: &[RawObservation]) -> DataFrame {
    let species: Vec<Option<String>> = rows.iter().map(|r| r.species.clone()).collect();
    let island: Vec<Option<String>> = rows.iter().map(|r| r.island.clone()).collect();
    let sex: Vec<Option<String>> = rows.iter().map(|r| r.sex.clone()).collect();
    let bill_length: Vec<Option<f64>> = rows.iter().map(|r| r.bill_length_mm).collect();
    let bill_depth: Vec<Option<f64>> = rows.iter().map(|r| r.bill_depth_mm).collect();
    let flipper_length: Vec<Option<f64>> = rows.iter().map(|r| r.flipper_length_mm).collect();
    let body_mass: Vec<Option<f64>> = rows.iter().map(|r| r.body_mass_g).collect();
    let year: Vec<Option<i64>> = rows.iter().map(|r| r.year).collect();

    DataFrame::new(vec![
        Column::new("species".into(), species),
        Column::new("island".into(), island),
        Column::new("bill_length_mm".into(), bill_length),
        Column::new("bill_depth_mm".into(), bill_depth),
        Column::new("flipper_length_mm".into(), flipper_length),
        Column::new("body_mass_g".into(), body_mass),
        Column::new("sex".into(), sex),
        Column::new("year".into(), year),
    ])
    .unwrap()
}

/// Create a temporary directory with a test CSV file, missing values
/// written as "NA"
pub fn create_temp_csv(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("penguins.csv");

    let mut file = std::fs::File::create(&csv_path).unwrap();
    CsvWriter::new(&mut file)
        .with_null_value("NA".to_string())
        .finish(df)
        .unwrap();

    (temp_dir, csv_path)
}

/// Create a temporary directory with a test Parquet file
pub fn create_temp_parquet(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let parquet_path = temp_dir.path().join("penguins.parquet");

    let file = std::fs::File::create(&parquet_path).unwrap();
    ParquetWriter::new(file).finish(df).unwrap();

    (temp_dir, parquet_path)
}

/// Simulate a binary logistic model: an intercept-free design of
/// standard normal columns and 0/1 responses drawn from
/// sigmoid(beta0 + x * beta[1..])
pub fn simulate_logistic(n: usize, beta: &[f64], seed: u64) -> (Mat<f64>, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let p = beta.len() - 1;
    let draws: Vec<f64> = (0..n * p).map(|_| rng.sample(StandardNormal)).collect();
    let x = Mat::from_fn(n, p, |i, j| draws[i * p + j]);
    let y = (0..n)
        .map(|i| {
            let eta = beta[0] + (0..p).map(|j| x[(i, j)] * beta[j + 1]).sum::<f64>();
            let prob = 1.0 / (1.0 + (-eta).exp());
            if rng.gen::<f64>() < prob {
                1.0
            } else {
                0.0
            }
        })
        .collect();
    (x, y)
}

/// Feature names x1..xp
pub fn feature_names(p: usize) -> Vec<String> {
    (1..=p).map(|j| format!("x{}", j)).collect()
}
