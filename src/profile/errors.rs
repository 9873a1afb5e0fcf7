//! Diagnostics for rank profile documents.
//!
//! A [`ProfileSpecError`] carries a stable [`ErrorCode`] for programmatic
//! matching, a JSON pointer `path` locating the problem in the profile, a
//! human-readable `message`, and an optional `hint` suggesting a fix.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error_code::ErrorCode;
use crate::errors::RankError;

/// A problem found in a rank profile before any query is set up.
///
/// # Display format
///
/// ```text
/// [missing_features] /features: the profile lists no features
/// ```
///
/// # JSON format
///
/// ```json
/// {
///   "code": "missing_features",
///   "path": "/features",
///   "message": "the profile lists no features",
///   "hint": "Add at least one feature name to 'features'"
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("[{code}] {path}: {message}")]
pub struct ProfileSpecError {
    /// Stable error code for programmatic matching.
    pub code: ErrorCode,

    /// JSON pointer into the profile, e.g. `"/features/2"` or `""` (root).
    pub path: String,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ProfileSpecError {
    pub fn new(code: ErrorCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            path: path.into(),
            message: message.into(),
            hint: None,
        }
    }

    /// Attach a hint suggesting how to fix the problem.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ProfileSpecError> for RankError {
    fn from(err: ProfileSpecError) -> Self {
        RankError::invalid_config(err.path.clone(), err.to_string())
    }
}
