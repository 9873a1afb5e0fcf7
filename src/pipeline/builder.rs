//! Pipeline builder: resolved graph → executors.
//!
//! Nodes are visited in topological order, so every executor is created
//! after the executors of its inputs. Decorator chains are built innermost
//! first and collapse into one executor under the outermost node's handles.
//! Any failure discards everything built so far.

use tracing::{debug, debug_span};

use super::observer::{NoopObserver, PipelineObserver, StageClock, StageReportBuilder, STAGE_BUILD};
use super::{ExecutorSlot, Pipeline, QueryContext};
use crate::env::QueryEnvironment;
use crate::errors::{RankError, Result};
use crate::executor::FeatureExecutor;
use crate::graph::{DependencyNode, ResolvedGraph};
use crate::match_data::MatchDataLayout;

/// Instantiates the per-query pipeline of a [`ResolvedGraph`].
#[derive(Debug, Clone, Default)]
pub struct PipelineBuilder;

impl PipelineBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the pipeline for one query.
    pub fn build(&self, graph: &ResolvedGraph, query_env: &dyn QueryEnvironment) -> Result<Pipeline> {
        self.build_observed(graph, query_env, &mut NoopObserver)
    }

    /// Like [`build`](Self::build), reporting the stage to `observer`.
    pub fn build_observed(
        &self,
        graph: &ResolvedGraph,
        query_env: &dyn QueryEnvironment,
        observer: &mut impl PipelineObserver,
    ) -> Result<Pipeline> {
        let _span = debug_span!("build", nodes = graph.len()).entered();
        observer.on_stage_start(STAGE_BUILD);
        let clock = StageClock::start();

        let layout = raw_layout(graph.num_handles(), query_env);
        let query = QueryContext::new(query_env, &layout);

        let mut slots = Vec::with_capacity(graph.len());
        for node in graph.nodes() {
            let executor = build_node(node, &query)?;
            slots.push(ExecutorSlot {
                name: node.name.clone(),
                executor,
                inputs: node.inputs.clone(),
                outputs: node.outputs.clone(),
            });
        }

        debug!(
            executors = slots.len(),
            raw_slots = layout.raw_slots().len(),
            "built rank pipeline"
        );
        let num_handles = layout.num_handles() as usize;
        let pipeline = Pipeline::new(slots, layout, graph.handles.clone(), graph.roots.clone())?;

        let report = StageReportBuilder::new(clock.elapsed())
            .nodes(pipeline.executor_count())
            .handles(num_handles)
            .build();
        observer.on_stage_end(STAGE_BUILD, &report);
        Ok(pipeline)
    }
}

/// One raw handle per `(term, field)` pair of the query, after all feature
/// handles.
fn raw_layout(feature_handles: u32, query_env: &dyn QueryEnvironment) -> MatchDataLayout {
    let mut layout = MatchDataLayout::new(feature_handles);
    for (term, qt) in query_env.terms().iter().enumerate() {
        for &field in &qt.fields {
            layout.alloc_raw(term as u32, field);
        }
    }
    layout
}

fn build_node(node: &DependencyNode, query: &QueryContext<'_>) -> Result<Box<dyn FeatureExecutor>> {
    let mut layers = node.layers.iter();
    let innermost = layers
        .next()
        .ok_or_else(|| RankError::internal(format!("'{}' has no blueprint", node.name)))?;

    let mut executor = innermost
        .blueprint
        .create_executor(query)
        .map_err(|err| named(err, &innermost.name))?;
    for layer in layers {
        executor = layer
            .blueprint
            .create_decorator(query, executor)
            .map_err(|err| named(err, &layer.name))?;
    }
    Ok(executor)
}

/// Report creation failures under the full feature name.
fn named(err: RankError, feature: &str) -> RankError {
    match err {
        RankError::ExecutorCreation { message, .. } => RankError::executor_creation(feature, message),
        other => other,
    }
}
