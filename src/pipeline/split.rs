//! Stratified train/test split

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::BTreeMap;

use super::dataset::Dataset;
use super::error::{PipelineError, PipelineResult};

/// Row indices of the training and test partitions, each sorted ascending
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl Split {
    /// Materialize the two partitions, keeping source row order
    pub fn datasets(&self, dataset: &Dataset) -> (Dataset, Dataset) {
        (dataset.subset(&self.train), dataset.subset(&self.test))
    }
}

/// Partition rows so that each response category contributes
/// `round(train_fraction * n_category)` rows to the training set.
///
/// Categories are visited in sorted order and shuffled with a single
/// generator seeded from `seed`, so the same inputs always give the same
/// partition.
pub fn stratified_split(dataset: &Dataset, train_fraction: f64, seed: u64) -> PipelineResult<Split> {
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(PipelineError::InvalidSplitProportion(train_fraction));
    }
    if dataset.is_empty() {
        return Err(PipelineError::EmptyDataset);
    }

    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, obs) in dataset.iter().enumerate() {
        groups.entry(obs.species.as_str()).or_default().push(i);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(dataset.len());
    let mut test = Vec::new();

    for (category, mut indices) in groups {
        indices.shuffle(&mut rng);
        let n_train = ((indices.len() as f64) * train_fraction).round() as usize;
        log::debug!(
            "Category '{}': {} train / {} test",
            category,
            n_train,
            indices.len() - n_train
        );
        train.extend_from_slice(&indices[..n_train]);
        test.extend_from_slice(&indices[n_train..]);
    }

    train.sort_unstable();
    test.sort_unstable();

    Ok(Split { train, test })
}
