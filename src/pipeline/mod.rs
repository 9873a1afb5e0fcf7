//! Per-query executor pipelines and the document loop.
//!
//! ## Submodules
//!
//! - [`builder`]: Instantiates executors from a resolved graph
//! - [`runner`]: Evaluates a pipeline over candidate documents
//! - [`observer`]: Stage timing and logging hooks

pub mod builder;
pub mod observer;
pub mod runner;

use rustc_hash::FxHashMap;

use crate::env::{AttributeVector, QueryEnvironment, QueryTerm};
use crate::errors::{RankError, Result};
use crate::executor::{self, FeatureExecutor};
use crate::graph::lookup_handle;
use crate::match_data::{MatchData, MatchDataLayout};
use crate::types::{FeatureValue, Handle};

pub use builder::PipelineBuilder;
pub use observer::{NoopObserver, PipelineObserver, StageReport, StageTimingObserver};
pub use runner::{
    EvaluationOutcome, FeatureSet, NoMatches, RankProgram, RawMatchFeed, RawMatchWriter,
    StaticMatchFeed,
};

// ============================================================================
// QueryContext
// ============================================================================

/// What a blueprint sees when it creates its executor.
#[derive(Clone, Copy)]
pub struct QueryContext<'a> {
    env: &'a dyn QueryEnvironment,
    layout: &'a MatchDataLayout,
}

impl<'a> QueryContext<'a> {
    pub fn new(env: &'a dyn QueryEnvironment, layout: &'a MatchDataLayout) -> Self {
        Self { env, layout }
    }

    pub fn env(&self) -> &'a dyn QueryEnvironment {
        self.env
    }

    pub fn terms(&self) -> &'a [QueryTerm] {
        self.env.terms()
    }

    pub fn property(&self, key: &str) -> Option<&'a str> {
        self.env.property(key)
    }

    pub fn attribute(&self, name: &str) -> Option<std::sync::Arc<dyn AttributeVector>> {
        self.env.attribute(name)
    }

    pub fn layout(&self) -> &'a MatchDataLayout {
        self.layout
    }

    /// Raw handle of query term `term` in field `field`.
    pub fn raw_handle(&self, term: u32, field: u32) -> Option<Handle> {
        self.layout.raw_handle(term, field)
    }

    /// Raw handles of every query term searched in `field`.
    pub fn raw_handles_for_field(&self, field: u32) -> Vec<(u32, Handle)> {
        self.layout.raw_handles_for_field(field)
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// One executor and the handles it is wired to.
pub(crate) struct ExecutorSlot {
    pub(crate) name: String,
    pub(crate) executor: Box<dyn FeatureExecutor>,
    pub(crate) inputs: Vec<Handle>,
    pub(crate) outputs: Vec<Handle>,
}

/// The executors of one query, ready to evaluate documents.
///
/// A pipeline is read-only once built. Any number of threads may evaluate
/// documents against it at the same time, each with its own [`MatchData`].
pub struct Pipeline {
    slots: Vec<ExecutorSlot>,
    /// Producing executor of every feature handle
    producers: Vec<u32>,
    layout: MatchDataLayout,
    handles: FxHashMap<String, Handle>,
    roots: Vec<(String, Handle)>,
}

impl Pipeline {
    pub(crate) fn new(
        slots: Vec<ExecutorSlot>,
        layout: MatchDataLayout,
        handles: FxHashMap<String, Handle>,
        roots: Vec<(String, Handle)>,
    ) -> Result<Self> {
        let mut producers = vec![u32::MAX; layout.feature_handles() as usize];
        for (idx, slot) in slots.iter().enumerate() {
            for handle in &slot.outputs {
                let producer = producers.get_mut(handle.index()).ok_or_else(|| {
                    RankError::internal(format!("'{}' writes unknown handle {}", slot.name, handle))
                })?;
                *producer = idx as u32;
            }
        }
        if let Some(h) = producers.iter().position(|&p| p == u32::MAX) {
            return Err(RankError::internal(format!("handle #{} has no producer", h)));
        }
        Ok(Self {
            slots,
            producers,
            layout,
            handles,
            roots,
        })
    }

    /// A store sized for this pipeline.
    pub fn new_match_data(&self) -> MatchData {
        MatchData::new(&self.layout, self.slots.len())
    }

    pub fn layout(&self) -> &MatchDataLayout {
        &self.layout
    }

    pub fn executor_count(&self) -> usize {
        self.slots.len()
    }

    pub fn executor_name(&self, idx: usize) -> &str {
        self.slots.get(idx).map(|s| s.name.as_str()).unwrap_or("<unknown>")
    }

    /// Index of the executor producing `handle`.
    pub fn producer_of(&self, handle: Handle) -> Option<usize> {
        self.producers.get(handle.index()).map(|&p| p as usize)
    }

    /// Requested features in request order.
    pub fn roots(&self) -> &[(String, Handle)] {
        &self.roots
    }

    /// Handle of a feature by any spelling of its name.
    pub fn handle_of(&self, name: &str) -> Option<Handle> {
        lookup_handle(&self.handles, name)
    }

    pub(crate) fn slot(&self, idx: usize) -> &ExecutorSlot {
        &self.slots[idx]
    }

    /// Value of `handle` for the current document, computing it on demand.
    ///
    /// The producing executor runs at most once per document; later reads
    /// return the stored value.
    pub fn get_value(&self, match_data: &mut MatchData, handle: Handle) -> Result<FeatureValue> {
        if let Some(value) = match_data.peek(handle) {
            return Ok(value.clone());
        }
        self.check_match_data(match_data)?;
        if self.layout.is_raw(handle) {
            return Err(RankError::internal(format!(
                "{} holds raw match data, not a feature value",
                handle
            )));
        }
        let producer = self
            .producer_of(handle)
            .ok_or_else(|| RankError::internal(format!("no executor produces {}", handle)))?;
        executor::ensure_computed(self, match_data, producer)?;
        match_data.peek(handle).cloned().ok_or_else(|| {
            RankError::internal(format!(
                "'{}' finished without writing {}",
                self.executor_name(producer),
                handle
            ))
        })
    }

    /// Run executor `idx` for the current document unless it already ran.
    pub fn ensure_computed(&self, match_data: &mut MatchData, idx: usize) -> Result<()> {
        self.check_match_data(match_data)?;
        if idx >= self.slots.len() {
            return Err(RankError::internal(format!(
                "executor {} requested, pipeline has {}",
                idx,
                self.slots.len()
            )));
        }
        executor::ensure_computed(self, match_data, idx)
    }

    /// Fail unless `match_data` was created for this pipeline.
    pub fn check_match_data(&self, match_data: &MatchData) -> Result<()> {
        if match_data.num_executors() != self.slots.len()
            || match_data.feature_handles() != self.layout.feature_handles() as usize
        {
            return Err(RankError::internal(
                "match data was created for a different pipeline",
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field(
                "executors",
                &self.slots.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            )
            .field("handles", &self.layout.num_handles())
            .field("roots", &self.roots)
            .finish()
    }
}
