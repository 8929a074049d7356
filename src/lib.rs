//! penglm: Logistic Regression for Penguin Species
//!
//! A library for classifying penguin species with binary and multinomial
//! logistic regression: complete-case filtering, reference-level encoding,
//! separation diagnostics, stratified splits, k-fold cross-validation and
//! held-out evaluation (confusion matrix, rates, ROC/AUC).

pub mod cli;
pub mod pipeline;
pub mod report;
pub mod utils;
