//! Core types for rapid_rankfeatures
//!
//! This module contains the fundamental data structures shared by the
//! resolver, the executor pipeline and the match data store.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::{RankError, Result};
use crate::profile::spec::RuntimeSpec;

/// Document identifier as produced by match generation.
pub type DocId = u32;

/// Sentinel doc id used for raw slots that have not been filled yet.
pub const INVALID_DOC_ID: DocId = u32::MAX;

// ============================================================================
// Handle
// ============================================================================

/// Index of one slot in the per-document match data store.
///
/// Feature output handles are assigned contiguously from 0 in topological
/// order by the resolver. Raw (term/field match) handles are appended after
/// the last feature handle when the pipeline is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle(pub u32);

impl Handle {
    /// Position of this handle in a dense slot array
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// FeatureValue
// ============================================================================

/// The value stored in one feature slot.
///
/// Structured values are reference counted so that reading a slot is a
/// cheap clone regardless of its shape.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    /// A plain rank score
    Number(f64),
    /// A structured value, e.g. a dense vector of scores
    Object(Arc<[f64]>),
}

impl FeatureValue {
    /// Create a structured value from any list of numbers
    pub fn object(values: impl Into<Arc<[f64]>>) -> Self {
        Self::Object(values.into())
    }

    /// The numeric value, if this is a number
    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Object(_) => None,
        }
    }

    /// The structured payload, if this is an object
    pub fn as_object(&self) -> Option<&[f64]> {
        match self {
            Self::Number(_) => None,
            Self::Object(values) => Some(values),
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }
}

impl From<f64> for FeatureValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

// ============================================================================
// RankConfig
// ============================================================================

/// Setup-time configuration for resolving and running rank features
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankConfig {
    /// Maximum dependency nesting before resolution gives up
    pub max_dependency_depth: usize,
    /// Threading and timeout controls for the document loop
    #[serde(default)]
    pub runtime: RuntimeSpec,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            max_dependency_depth: Self::DEFAULT_MAX_DEPENDENCY_DEPTH,
            runtime: RuntimeSpec::default(),
        }
    }
}

impl RankConfig {
    pub const DEFAULT_MAX_DEPENDENCY_DEPTH: usize = 256;

    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_dependency_depth == 0 {
            return Err(RankError::invalid_config(
                "rank_config",
                "max_dependency_depth must be > 0",
            ));
        }

        if self.runtime.max_threads == Some(0) {
            return Err(RankError::invalid_config(
                "rank_config",
                "runtime.max_threads must be > 0",
            ));
        }

        if self.runtime.query_timeout_ms == Some(0) {
            return Err(RankError::invalid_config(
                "rank_config",
                "runtime.query_timeout_ms must be > 0",
            ));
        }

        Ok(())
    }

    /// Builder method: set maximum dependency depth
    pub fn with_max_dependency_depth(mut self, depth: usize) -> Self {
        self.max_dependency_depth = depth;
        self
    }

    /// Builder method: set the runtime section
    pub fn with_runtime(mut self, runtime: RuntimeSpec) -> Self {
        self.runtime = runtime;
        self
    }

    /// Builder method: set the query-wide timeout in milliseconds
    pub fn with_query_timeout_ms(mut self, ms: u64) -> Self {
        self.runtime.query_timeout_ms = Some(ms);
        self
    }

    /// Builder method: limit the number of evaluation threads
    pub fn with_max_threads(mut self, threads: usize) -> Self {
        self.runtime.max_threads = Some(threads);
        self
    }
}
