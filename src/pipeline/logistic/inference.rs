//! Wald inference for fitted coefficients

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};

/// One row of a coefficient table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoefficientEstimate {
    pub term: String,
    /// Estimate on the log-odds scale
    pub estimate: f64,
    pub std_error: f64,
    pub z_value: f64,
    pub p_value: f64,
    /// exp(estimate)
    pub odds_ratio: f64,
    /// Wald interval exponentiated to the odds-ratio scale
    pub ci_lower: f64,
    pub ci_upper: f64,
}

impl CoefficientEstimate {
    pub fn new(term: impl Into<String>, estimate: f64, std_error: f64, confidence: f64) -> Self {
        let z_value = if std_error.is_finite() && std_error > 0.0 {
            estimate / std_error
        } else {
            f64::NAN
        };
        let (lower, upper) = wald_interval(estimate, std_error, confidence);
        Self {
            term: term.into(),
            estimate,
            std_error,
            z_value,
            p_value: pvalue_z(z_value),
            odds_ratio: estimate.exp(),
            ci_lower: lower.exp(),
            ci_upper: upper.exp(),
        }
    }
}

/// Two-sided p-value of a z-statistic under the standard normal
pub fn pvalue_z(z: f64) -> f64 {
    if !z.is_finite() {
        return f64::NAN;
    }
    match Normal::new(0.0, 1.0) {
        Ok(normal) => 2.0 * normal.sf(z.abs()),
        Err(_) => f64::NAN,
    }
}

/// Wald interval on the log-odds scale: estimate +/- z_{1-alpha/2} * SE
pub fn wald_interval(estimate: f64, std_error: f64, confidence: f64) -> (f64, f64) {
    if !estimate.is_finite() || !std_error.is_finite() || std_error <= 0.0 {
        return (f64::NAN, f64::NAN);
    }
    if !(confidence > 0.0 && confidence < 1.0) {
        return (f64::NAN, f64::NAN);
    }
    let z_critical = match Normal::new(0.0, 1.0) {
        Ok(normal) => normal.inverse_cdf(1.0 - (1.0 - confidence) / 2.0),
        Err(_) => return (f64::NAN, f64::NAN),
    };
    (
        estimate - z_critical * std_error,
        estimate + z_critical * std_error,
    )
}

/// R-style significance codes
pub fn significance_stars(p_value: f64) -> &'static str {
    if p_value.is_nan() {
        ""
    } else if p_value < 0.001 {
        "***"
    } else if p_value < 0.01 {
        "**"
    } else if p_value < 0.05 {
        "*"
    } else if p_value < 0.1 {
        "."
    } else {
        ""
    }
}
