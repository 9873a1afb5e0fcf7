//! # rapid_rankfeatures
//!
//! A rank-feature framework: named, parameterized features are resolved into
//! a dependency graph, compiled into a pipeline of executors, and evaluated
//! lazily per document.
//!
//! ## Overview
//!
//! - **Blueprints** describe a feature type and declare what they consume
//!   and produce ([`blueprint`]).
//! - **Resolution** turns requested names into a deduplicated, topologically
//!   ordered graph with cycle detection ([`graph`]).
//! - **Pipelines** hold one executor per node and compute each one at most
//!   once per document on demand ([`pipeline`]).
//! - **Profiles** are JSON rank-profile documents with validation
//!   diagnostics ([`profile`]).
//!
//! ```
//! use rapid_rankfeatures::{BlueprintCatalog, NoMatches, RankConfig, RankProgram};
//! use rapid_rankfeatures::{SimpleIndexEnvironment, SimpleQueryEnvironment};
//!
//! let catalog = BlueprintCatalog::with_builtins();
//! let program = RankProgram::compile(
//!     &catalog,
//!     &SimpleIndexEnvironment::new(),
//!     &SimpleQueryEnvironment::new(),
//!     &["double(sum(value(1),value(2)))"],
//!     &RankConfig::default(),
//! )
//! .unwrap();
//!
//! let mut match_data = program.new_match_data();
//! let features = program.evaluate(&mut match_data, 1, &NoMatches).unwrap();
//! assert_eq!(features.number("double(sum(value(1),value(2)))"), Some(6.0));
//! ```

pub mod blueprint;
pub mod env;
pub mod error_code;
pub mod errors;
pub mod executor;
pub mod feature_name;
pub mod features;
pub mod graph;
pub mod match_data;
pub mod pipeline;
pub mod profile;
pub mod summary;
pub mod types;

// Re-export commonly used types
pub use errors::{RankError, Result};
pub use error_code::ErrorCode;
pub use types::{DocId, FeatureValue, Handle, RankConfig, INVALID_DOC_ID};

pub use blueprint::{Blueprint, BlueprintCatalog, SetupContext};
pub use env::{
    AttributeVector, FieldInfo, FieldKind, IndexEnvironment, MapAttribute, QueryEnvironment,
    QueryTerm, SimpleIndexEnvironment, SimpleQueryEnvironment,
};
pub use executor::{ExecutionContext, FeatureExecutor};
pub use feature_name::FeatureName;
pub use graph::{DependencyNode, GraphResolver, ResolvedGraph};
pub use match_data::{MatchData, MatchDataLayout, TermFieldMatchData};
pub use pipeline::{
    EvaluationOutcome, FeatureSet, NoMatches, NoopObserver, Pipeline, PipelineBuilder,
    PipelineObserver, QueryContext, RankProgram, RawMatchFeed, RawMatchWriter, StageReport,
    StageTimingObserver, StaticMatchFeed,
};
pub use profile::{RankProfileSpec, RuntimeSpec, ValidationEngine, ValidationReport};
pub use summary::SummaryFeaturesWriter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
