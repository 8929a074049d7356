//! Separation diagnostics
//!
//! Pearson's chi-squared test of independence between a categorical
//! predictor and the response, and structural detection of levels whose
//! rows all share a single response value (quasi/complete separation).

use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};
use std::collections::{BTreeMap, BTreeSet};

use super::dataset::{CategoricalAttr, Dataset};
use super::error::{PipelineError, PipelineResult};

/// Co-occurrence counts of two categorical variables.
///
/// Rows and columns are the sorted distinct levels of the first and
/// second variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContingencyTable {
    pub row_levels: Vec<String>,
    pub col_levels: Vec<String>,
    pub counts: Vec<Vec<usize>>,
}

impl ContingencyTable {
    pub fn from_pairs(a: &[String], b: &[String]) -> PipelineResult<Self> {
        if a.len() != b.len() {
            return Err(PipelineError::DimensionMismatch(format!(
                "first variable has {} values but second has {}",
                a.len(),
                b.len()
            )));
        }
        if a.is_empty() {
            return Err(PipelineError::EmptyDataset);
        }

        let row_levels: Vec<String> = a.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();
        let col_levels: Vec<String> = b.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();
        let row_index: BTreeMap<&str, usize> = row_levels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.as_str(), i))
            .collect();
        let col_index: BTreeMap<&str, usize> = col_levels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.as_str(), i))
            .collect();

        let mut counts = vec![vec![0usize; col_levels.len()]; row_levels.len()];
        for (x, y) in a.iter().zip(b.iter()) {
            counts[row_index[x.as_str()]][col_index[y.as_str()]] += 1;
        }

        Ok(Self {
            row_levels,
            col_levels,
            counts,
        })
    }

    pub fn grand_total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn row_totals(&self) -> Vec<usize> {
        self.counts.iter().map(|row| row.iter().sum()).collect()
    }

    pub fn col_totals(&self) -> Vec<usize> {
        (0..self.col_levels.len())
            .map(|j| self.counts.iter().map(|row| row[j]).sum())
            .collect()
    }

    /// Expected counts under independence: row_total * col_total / grand_total
    pub fn expected(&self) -> Vec<Vec<f64>> {
        let total = self.grand_total() as f64;
        let col_totals = self.col_totals();
        self.row_totals()
            .iter()
            .map(|&r| {
                col_totals
                    .iter()
                    .map(|&c| r as f64 * c as f64 / total)
                    .collect()
            })
            .collect()
    }
}

/// Result of a chi-squared independence test
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChiSquaredTest {
    pub statistic: f64,
    pub degrees_of_freedom: usize,
    /// Upper-tail probability; NaN when the table has a single row or column
    pub p_value: f64,
}

/// Pearson's chi-squared test of independence between two categorical
/// variables observed on the same rows.
pub fn chi_squared_independence(a: &[String], b: &[String]) -> PipelineResult<ChiSquaredTest> {
    let table = ContingencyTable::from_pairs(a, b)?;
    Ok(chi_squared_from_table(&table))
}

/// Chi-squared test on an already built contingency table
pub fn chi_squared_from_table(table: &ContingencyTable) -> ChiSquaredTest {
    let expected = table.expected();
    let statistic: f64 = table
        .counts
        .iter()
        .zip(expected.iter())
        .flat_map(|(obs_row, exp_row)| obs_row.iter().zip(exp_row.iter()))
        .filter(|(_, e)| **e > 0.0)
        .map(|(&o, &e)| {
            let diff = o as f64 - e;
            diff * diff / e
        })
        .sum();

    let degrees_of_freedom =
        table.row_levels.len().saturating_sub(1) * table.col_levels.len().saturating_sub(1);

    let p_value = if degrees_of_freedom == 0 {
        f64::NAN
    } else {
        match ChiSquared::new(degrees_of_freedom as f64) {
            Ok(dist) => dist.sf(statistic),
            Err(_) => f64::NAN,
        }
    };

    ChiSquaredTest {
        statistic,
        degrees_of_freedom,
        p_value,
    }
}

/// Levels of `categorical` within which the response is constant.
///
/// Such levels perfectly predict the response and make maximum-likelihood
/// coefficients diverge.
pub fn detect_quasi_separation(
    categorical: &[String],
    response: &[String],
) -> PipelineResult<BTreeSet<String>> {
    if categorical.len() != response.len() {
        return Err(PipelineError::DimensionMismatch(format!(
            "categorical has {} values but response has {}",
            categorical.len(),
            response.len()
        )));
    }

    let mut seen: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for (level, y) in categorical.iter().zip(response.iter()) {
        seen.entry(level.as_str()).or_default().insert(y.as_str());
    }

    Ok(seen
        .into_iter()
        .filter(|(_, responses)| responses.len() == 1)
        .map(|(level, _)| level.to_string())
        .collect())
}

/// Diagnostics for one categorical attribute against the response
#[derive(Debug, Clone, Serialize)]
pub struct AttributeDiagnostic {
    pub attribute: CategoricalAttr,
    pub table: ContingencyTable,
    pub chi_squared: ChiSquaredTest,
    pub separated_levels: BTreeSet<String>,
}

impl AttributeDiagnostic {
    pub fn has_separation(&self) -> bool {
        !self.separated_levels.is_empty()
    }
}

/// Run the chi-squared test and separation detection for each attribute
/// against the dataset's response column.
pub fn separation_scan(
    dataset: &Dataset,
    attributes: &[CategoricalAttr],
) -> PipelineResult<Vec<AttributeDiagnostic>> {
    let response = dataset.species();
    attributes
        .iter()
        .map(|&attribute| {
            let levels = dataset.levels_of(attribute);
            let table = ContingencyTable::from_pairs(&levels, &response)?;
            let chi_squared = chi_squared_from_table(&table);
            let separated_levels = detect_quasi_separation(&levels, &response)?;
            if !separated_levels.is_empty() {
                log::info!(
                    "Levels {:?} of '{}' separate the response",
                    separated_levels,
                    attribute
                );
            }
            Ok(AttributeDiagnostic {
                attribute,
                table,
                chi_squared,
                separated_levels,
            })
        })
        .collect()
}
