//! Stable error codes shared by setup, build, evaluation and profile
//! validation errors.
//!
//! Codes serialize as `snake_case` strings and are safe to match on from
//! callers; messages are not.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// A feature name is not registered in the catalog.
    UnknownFeature,
    /// Bad parameters, a malformed feature name, or a missing schema element.
    InvalidConfiguration,
    /// Declared dependencies form a cycle.
    CyclicDependency,
    /// A blueprint failed to create its executor after a successful setup.
    ExecutorCreation,
    /// A runtime invariant was broken; indicates a bug, not bad input.
    InternalInvariant,
    /// JSON encoding or decoding failed.
    Serialization,
    /// A value in a rank profile spec is out of range.
    InvalidValue,
    /// A rank profile spec lists no features at all.
    MissingFeatures,
    /// A rank profile spec carries a field the schema does not know.
    UnknownField,
    /// The rank profile spec version is not supported.
    UnsupportedVersion,
    /// The same feature is listed more than once.
    DuplicateFeature,
}

impl ErrorCode {
    /// Returns the serialized form of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownFeature => "unknown_feature",
            Self::InvalidConfiguration => "invalid_configuration",
            Self::CyclicDependency => "cyclic_dependency",
            Self::ExecutorCreation => "executor_creation",
            Self::InternalInvariant => "internal_invariant",
            Self::Serialization => "serialization",
            Self::InvalidValue => "invalid_value",
            Self::MissingFeatures => "missing_features",
            Self::UnknownField => "unknown_field",
            Self::UnsupportedVersion => "unsupported_version",
            Self::DuplicateFeature => "duplicate_feature",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
