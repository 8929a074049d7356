//! Report module - terminal tables and file exports

pub mod model_report;
pub mod summary;

pub use model_report::*;
pub use summary::*;
