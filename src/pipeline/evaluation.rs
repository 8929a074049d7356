//! Confusion matrices and derived rates
//!
//! Rates with a zero denominator are `None` ("undefined"), never zero.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::error::{PipelineError, PipelineResult};

/// Counts of a binary classification against one positive label
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BinaryConfusion {
    pub true_positives: usize,
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

/// The six rates derived from a binary confusion matrix
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BinaryRates {
    pub accuracy: Option<f64>,
    pub sensitivity: Option<f64>,
    pub specificity: Option<f64>,
    pub false_positive_rate: Option<f64>,
    pub false_negative_rate: Option<f64>,
    pub precision: Option<f64>,
}

fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64)
    }
}

impl BinaryConfusion {
    pub fn total(&self) -> usize {
        self.true_positives + self.true_negatives + self.false_positives + self.false_negatives
    }

    pub fn rates(&self) -> BinaryRates {
        let sensitivity = ratio(self.true_positives, self.true_positives + self.false_negatives);
        let specificity = ratio(self.true_negatives, self.true_negatives + self.false_positives);
        BinaryRates {
            accuracy: ratio(self.true_positives + self.true_negatives, self.total()),
            sensitivity,
            specificity,
            false_positive_rate: specificity.map(|s| 1.0 - s),
            false_negative_rate: sensitivity.map(|s| 1.0 - s),
            precision: ratio(self.true_positives, self.true_positives + self.false_positives),
        }
    }
}

fn check_lengths(predicted: usize, actual: usize) -> PipelineResult<()> {
    if predicted != actual {
        return Err(PipelineError::DimensionMismatch(format!(
            "{} predictions but {} actual labels",
            predicted, actual
        )));
    }
    Ok(())
}

/// Tally predictions against actual labels; every label other than
/// `positive_label` counts as negative.
pub fn confusion_matrix(
    predicted: &[String],
    actual: &[String],
    positive_label: &str,
) -> PipelineResult<BinaryConfusion> {
    check_lengths(predicted.len(), actual.len())?;
    let predicted: Vec<bool> = predicted.iter().map(|p| p == positive_label).collect();
    let actual: Vec<bool> = actual.iter().map(|a| a == positive_label).collect();
    confusion_from_indicators(&predicted, &actual)
}

/// Same as [`confusion_matrix`] on boolean event indicators
pub fn confusion_from_indicators(
    predicted: &[bool],
    actual: &[bool],
) -> PipelineResult<BinaryConfusion> {
    check_lengths(predicted.len(), actual.len())?;
    let mut confusion = BinaryConfusion::default();
    for (&p, &a) in predicted.iter().zip(actual.iter()) {
        match (p, a) {
            (true, true) => confusion.true_positives += 1,
            (false, false) => confusion.true_negatives += 1,
            (true, false) => confusion.false_positives += 1,
            (false, true) => confusion.false_negatives += 1,
        }
    }
    Ok(confusion)
}

/// K x K table over the sorted union of labels. Rows are actual classes,
/// columns are predicted classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MulticlassConfusion {
    pub labels: Vec<String>,
    pub counts: Vec<Vec<usize>>,
}

impl MulticlassConfusion {
    pub fn new(predicted: &[String], actual: &[String]) -> PipelineResult<Self> {
        check_lengths(predicted.len(), actual.len())?;
        let labels: Vec<String> = predicted
            .iter()
            .chain(actual.iter())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let index: BTreeMap<&str, usize> = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.as_str(), i))
            .collect();

        let mut counts = vec![vec![0usize; labels.len()]; labels.len()];
        for (p, a) in predicted.iter().zip(actual.iter()) {
            counts[index[a.as_str()]][index[p.as_str()]] += 1;
        }
        Ok(Self { labels, counts })
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        (0..self.labels.len()).map(|i| self.counts[i][i]).sum()
    }

    pub fn accuracy(&self) -> Option<f64> {
        ratio(self.correct(), self.total())
    }

    /// Share of each actual class predicted correctly
    pub fn per_class_recall(&self) -> Vec<(String, Option<f64>)> {
        self.labels
            .iter()
            .enumerate()
            .map(|(i, label)| (label.clone(), ratio(self.counts[i][i], self.counts[i].iter().sum())))
            .collect()
    }
}

/// Fraction of rows whose predicted class equals the actual class
pub fn multinomial_accuracy(predicted: &[String], actual: &[String]) -> PipelineResult<Option<f64>> {
    check_lengths(predicted.len(), actual.len())?;
    let correct = predicted.iter().zip(actual.iter()).filter(|(p, a)| p == a).count();
    Ok(ratio(correct, predicted.len()))
}
