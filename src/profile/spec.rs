//! Rank profile document types.
//!
//! A [`RankProfileSpec`] names the features a query ranks with, the
//! features written to document summaries, the features dumped for
//! debugging, and the runtime limits of the document loop. These types are
//! the input to the [`super::validation::ValidationEngine`].
//!
//! # JSON shape
//!
//! ```json
//! {
//!   "v": 1,
//!   "features": ["sum(matchCount(title),attribute(year))"],
//!   "summary_features": ["matchCount(title)"],
//!   "runtime": { "max_threads": 4, "query_timeout_ms": 50 },
//!   "strict": false
//! }
//! ```

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::Result;
use crate::types::RankConfig;

/// Top-level rank profile document (v1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankProfileSpec {
    /// Spec version (currently `1`).
    pub v: u32,

    /// Features evaluated for every candidate document.
    #[serde(default)]
    pub features: Vec<String>,

    /// Features written to the document summary after ranking.
    #[serde(default)]
    pub summary_features: Vec<String>,

    /// Extra features computed only for debugging dumps.
    #[serde(default)]
    pub dump_features: Vec<String>,

    /// Override for [`RankConfig::max_dependency_depth`].
    #[serde(default)]
    pub max_dependency_depth: Option<usize>,

    /// Document loop limits.
    #[serde(default)]
    pub runtime: RuntimeSpec,

    /// If `true`, unrecognized fields are errors; if `false`, warnings.
    #[serde(default)]
    pub strict: bool,

    /// Captures any fields not recognized by the schema.
    /// Used by the strict-mode validation rule.
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

impl RankProfileSpec {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(features: Vec<String>) -> Self {
        Self {
            v: Self::CURRENT_VERSION,
            features,
            summary_features: Vec::new(),
            dump_features: Vec::new(),
            max_dependency_depth: None,
            runtime: RuntimeSpec::default(),
            strict: false,
            unknown_fields: HashMap::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Every feature the profile needs resolved, in listing order with
    /// exact duplicates removed.
    pub fn requested_features(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let all = self
            .features
            .iter()
            .chain(&self.summary_features)
            .chain(&self.dump_features);
        for name in all {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        out
    }

    /// The setup configuration this profile asks for.
    pub fn to_config(&self) -> RankConfig {
        let mut config = RankConfig::default().with_runtime(self.runtime.clone());
        if let Some(depth) = self.max_dependency_depth {
            config = config.with_max_dependency_depth(depth);
        }
        config
    }
}

// ─── Runtime spec ─────────────────────────────────────────────────────────

/// Threading and timeout controls of the document loop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeSpec {
    /// Maximum number of Rayon threads for parallel evaluation.
    /// `None` uses Rayon's default (all logical cores).
    #[serde(default)]
    pub max_threads: Option<usize>,

    /// Disable parallelism entirely (equivalent to `max_threads: 1`).
    /// When `true`, overrides `max_threads`.
    #[serde(default)]
    pub single_thread: bool,

    /// Query-wide budget for the document loop, checked between documents.
    #[serde(default)]
    pub query_timeout_ms: Option<u64>,

    /// Captures any fields not recognized by the schema.
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

impl RuntimeSpec {
    /// Resolve the effective thread count.
    ///
    /// - `single_thread == true` → `Some(1)`
    /// - `max_threads == Some(n)` → `Some(n)`
    /// - otherwise → `None` (use Rayon default)
    pub fn effective_threads(&self) -> Option<usize> {
        if self.single_thread {
            Some(1)
        } else {
            self.max_threads
        }
    }

    /// Build a scoped Rayon thread pool matching this config.
    ///
    /// Returns `None` when no thread limit is set, or when the pool cannot be
    /// created (the global pool is used instead).
    pub fn build_thread_pool(&self) -> Option<rayon::ThreadPool> {
        let threads = self.effective_threads()?;
        match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => Some(pool),
            Err(err) => {
                warn!(threads, error = %err, "falling back to the global thread pool");
                None
            }
        }
    }

    /// Execute `f` within a scoped Rayon thread pool matching this config.
    ///
    /// If no thread limit is set, `f` runs directly (using the global pool).
    /// Otherwise, a custom pool is created and `f` runs inside
    /// [`rayon::ThreadPool::install`], so any `par_iter()` within `f`
    /// uses the scoped pool.
    pub fn scoped<R: Send>(&self, f: impl FnOnce() -> R + Send) -> R {
        match self.build_thread_pool() {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }

    /// The query timeout, if one is set.
    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_spec() {
        let spec = RankProfileSpec::from_json(r#"{ "v": 1 }"#).unwrap();
        assert_eq!(spec.v, 1);
        assert!(spec.features.is_empty());
        assert!(!spec.strict);
    }

    #[test]
    fn test_deserialize_full_spec() {
        let json = r#"{
            "v": 1,
            "features": ["sum(value(1),value(2))"],
            "summary_features": ["value(1)"],
            "dump_features": ["value(2)"],
            "max_dependency_depth": 32,
            "runtime": { "max_threads": 2, "query_timeout_ms": 20 },
            "strict": true
        }"#;
        let spec = RankProfileSpec::from_json(json).unwrap();
        assert_eq!(spec.summary_features, vec!["value(1)"]);
        assert_eq!(spec.runtime.max_threads, Some(2));
        assert!(spec.strict);

        let config = spec.to_config();
        assert_eq!(config.max_dependency_depth, 32);
        assert_eq!(config.runtime.query_timeout(), Some(Duration::from_millis(20)));
    }

    #[test]
    fn test_unknown_fields_captured() {
        let json = r#"{
            "v": 1,
            "bogus_top_level": 42,
            "runtime": { "max_tokens": 10 }
        }"#;
        let spec = RankProfileSpec::from_json(json).unwrap();
        assert!(spec.unknown_fields.contains_key("bogus_top_level"));
        assert!(spec.runtime.unknown_fields.contains_key("max_tokens"));
    }

    #[test]
    fn test_malformed_json_is_serialization_error() {
        let err = RankProfileSpec::from_json("{ v: 1").unwrap_err();
        assert_eq!(err.code(), crate::error_code::ErrorCode::Serialization);
    }

    #[test]
    fn test_requested_features_dedup_in_order() {
        let mut spec = RankProfileSpec::new(vec!["a".into(), "b".into()]);
        spec.summary_features = vec!["b".into(), "c".into()];
        spec.dump_features = vec!["a".into(), "d".into()];
        assert_eq!(spec.requested_features(), vec!["a", "b", "c", "d"]);
    }

    // ─── RuntimeSpec threading ──────────────────────────────────────

    #[test]
    fn test_effective_threads_default() {
        let rt = RuntimeSpec::default();
        assert_eq!(rt.effective_threads(), None);
        assert_eq!(rt.query_timeout(), None);
    }

    #[test]
    fn test_effective_threads_single_thread_overrides() {
        let rt = RuntimeSpec {
            max_threads: Some(8),
            single_thread: true,
            ..Default::default()
        };
        assert_eq!(rt.effective_threads(), Some(1));
    }

    #[test]
    fn test_build_thread_pool_some_when_configured() {
        let rt = RuntimeSpec {
            max_threads: Some(2),
            ..Default::default()
        };
        let pool = rt.build_thread_pool();
        assert!(pool.is_some());
        assert_eq!(pool.unwrap().current_num_threads(), 2);
    }

    #[test]
    fn test_scoped_runs_in_pool() {
        let rt = RuntimeSpec {
            max_threads: Some(2),
            ..Default::default()
        };
        let thread_count = rt.scoped(rayon::current_num_threads);
        assert_eq!(thread_count, 2);
    }

    #[test]
    fn test_scoped_default_uses_global() {
        let rt = RuntimeSpec::default();
        assert_eq!(rt.scoped(|| 42), 42);
    }
}
