//! ROC curve and trapezoidal AUC

use serde::Serialize;

use super::error::{PipelineError, PipelineResult};

/// One operating point: classify as positive when score >= threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RocPoint {
    pub threshold: f64,
    pub false_positive_rate: f64,
    pub true_positive_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RocCurve {
    /// From (0, 0) at an infinite threshold to (1, 1)
    pub points: Vec<RocPoint>,
    /// Undefined when either class is absent
    pub auc: Option<f64>,
}

/// Build the ROC curve by walking scores in descending order.
///
/// Rows with equal scores enter the curve together, so a block of ties
/// becomes a single diagonal segment.
pub fn roc_curve(scores: &[f64], actual: &[bool]) -> PipelineResult<RocCurve> {
    if scores.len() != actual.len() {
        return Err(PipelineError::DimensionMismatch(format!(
            "{} scores but {} labels",
            scores.len(),
            actual.len()
        )));
    }
    if let Some(bad) = scores.iter().find(|s| !s.is_finite()) {
        return Err(PipelineError::InvalidResponse(format!(
            "score {} is not finite",
            bad
        )));
    }

    let positives = actual.iter().filter(|&&a| a).count();
    let negatives = actual.len() - positives;
    if positives == 0 || negatives == 0 {
        return Ok(RocCurve {
            points: Vec::new(),
            auc: None,
        });
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut points = vec![RocPoint {
        threshold: f64::INFINITY,
        false_positive_rate: 0.0,
        true_positive_rate: 0.0,
    }];
    let (mut tp, mut fp) = (0usize, 0usize);
    let mut i = 0;
    while i < order.len() {
        let threshold = scores[order[i]];
        while i < order.len() && scores[order[i]] == threshold {
            if actual[order[i]] {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        points.push(RocPoint {
            threshold,
            false_positive_rate: fp as f64 / negatives as f64,
            true_positive_rate: tp as f64 / positives as f64,
        });
    }

    let auc = points
        .windows(2)
        .map(|w| {
            (w[1].false_positive_rate - w[0].false_positive_rate)
                * (w[0].true_positive_rate + w[1].true_positive_rate)
                / 2.0
        })
        .sum();

    Ok(RocCurve {
        points,
        auc: Some(auc),
    })
}
