//! Pipeline module - preparation, diagnostics, fitting and evaluation

pub mod config;
pub mod crossval;
pub mod dataset;
pub mod diagnostics;
pub mod encoding;
pub mod error;
pub mod evaluation;
pub mod loader;
pub mod logistic;
pub mod missing;
pub mod roc;
pub mod runner;
pub mod split;
pub mod target;

pub use config::PipelineConfig;
pub use crossval::*;
pub use dataset::*;
pub use diagnostics::*;
pub use encoding::*;
pub use error::{PipelineError, PipelineResult};
pub use evaluation::*;
pub use loader::*;
pub use logistic::{
    fit_binary, fit_multinomial, BinaryLogisticModel, CoefficientEstimate, FitConfig, FitStatus,
    MultinomialEquation, MultinomialLogisticModel, NonConvergence,
};
pub use missing::*;
pub use roc::*;
pub use runner::*;
pub use split::*;
pub use target::*;
