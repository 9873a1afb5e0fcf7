//! Error types for rapid_rankfeatures
//!
//! Setup and build errors (`UnknownFeature`, `InvalidConfiguration`,
//! `CyclicDependency`, `ExecutorCreation`) always surface before the first
//! document is evaluated. `InternalInvariantViolation` is the only error the
//! per-document path produces; it means the engine or an executor has a bug
//! and the query should be aborted.

use thiserror::Error;

use crate::error_code::ErrorCode;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, RankError>;

/// Main error type for rapid_rankfeatures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RankError {
    /// The feature base name is not registered in the catalog
    #[error("Unknown feature: '{name}'")]
    UnknownFeature { name: String },

    /// Blueprint setup rejected its parameters, or the feature name is malformed
    #[error("Invalid configuration for '{feature}': {message}")]
    InvalidConfiguration { feature: String, message: String },

    /// Declared dependencies form a cycle; `path` lists the cycle in order
    #[error("Cyclic dependency: {}", path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    /// Executor instantiation failed after a successful setup
    #[error("Failed to create executor for '{feature}': {message}")]
    ExecutorCreation { feature: String, message: String },

    /// Internal error (should not occur in normal usage)
    #[error("Internal invariant violated: {message}")]
    InternalInvariantViolation { message: String },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl RankError {
    /// Create an unknown feature error
    pub fn unknown_feature(name: impl Into<String>) -> Self {
        Self::UnknownFeature { name: name.into() }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(feature: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            feature: feature.into(),
            message: message.into(),
        }
    }

    /// Create a cyclic dependency error from the offending path
    pub fn cyclic(path: Vec<String>) -> Self {
        Self::CyclicDependency { path }
    }

    /// Create an executor creation error
    pub fn executor_creation(feature: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExecutorCreation {
            feature: feature.into(),
            message: message.into(),
        }
    }

    /// Create an internal invariant violation
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalInvariantViolation {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Stable code for programmatic matching
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownFeature { .. } => ErrorCode::UnknownFeature,
            Self::InvalidConfiguration { .. } => ErrorCode::InvalidConfiguration,
            Self::CyclicDependency { .. } => ErrorCode::CyclicDependency,
            Self::ExecutorCreation { .. } => ErrorCode::ExecutorCreation,
            Self::InternalInvariantViolation { .. } => ErrorCode::InternalInvariant,
            Self::Serialization { .. } => ErrorCode::Serialization,
        }
    }

    /// Check if this error must abort the whole query rather than the
    /// current setup attempt
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InternalInvariantViolation { .. })
    }
}

impl From<serde_json::Error> for RankError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
