//! Rank profile configuration: which features a query ranks with, what is
//! written to summaries, and how the document loop runs.
//!
//! - [`spec`]: JSON profile and runtime types
//! - [`validation`]: Rule engine collecting every profile problem
//! - [`errors`]: Diagnostic error type

pub mod errors;
pub mod spec;
pub mod validation;

pub use errors::ProfileSpecError;
pub use spec::{RankProfileSpec, RuntimeSpec};
pub use validation::{Severity, ValidationDiagnostic, ValidationEngine, ValidationReport, ValidationRule};
