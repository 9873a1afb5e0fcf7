//! Pipeline runner: query setup and the per-document loop.
//!
//! [`RankProgram`] bundles a built [`Pipeline`] with the runtime limits of
//! its query. For every candidate document it resets a [`MatchData`], lets
//! the match generator fill raw term/field slots through a [`RawMatchFeed`],
//! and demands the requested root features.
//!
//! # Timeouts
//!
//! A query timeout is checked between documents only. Documents not reached
//! before the deadline are listed in [`EvaluationOutcome::timed_out`]; the
//! results of documents already evaluated stay valid.

use std::time::Instant;

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use super::builder::PipelineBuilder;
use super::observer::{
    NoopObserver, PipelineObserver, StageClock, StageReportBuilder, STAGE_EVALUATE, STAGE_RESOLVE,
};
use super::Pipeline;
use crate::blueprint::BlueprintCatalog;
use crate::env::{IndexEnvironment, QueryEnvironment};
use crate::errors::Result;
use crate::feature_name::FeatureName;
use crate::graph::GraphResolver;
use crate::match_data::{MatchData, MatchDataLayout, TermFieldMatchData};
use crate::profile::{RankProfileSpec, RuntimeSpec, ValidationEngine};
use crate::summary::SummaryFeaturesWriter;
use crate::types::{DocId, FeatureValue, Handle, RankConfig};

/// Enter a tracing span for one setup or evaluation stage.
macro_rules! trace_stage {
    ($name:expr) => {
        let _span = tracing::info_span!("rank_stage", stage = $name).entered();
    };
}

// ============================================================================
// Raw match feed
// ============================================================================

/// Writable view of the raw term/field slots of one document.
pub struct RawMatchWriter<'a> {
    layout: &'a MatchDataLayout,
    match_data: &'a mut MatchData,
}

impl<'a> RawMatchWriter<'a> {
    pub fn new(layout: &'a MatchDataLayout, match_data: &'a mut MatchData) -> Self {
        Self { layout, match_data }
    }

    pub fn doc_id(&self) -> DocId {
        self.match_data.doc_id()
    }

    /// The slot of query term `term` in field `field`, if the query searches
    /// that field for that term.
    pub fn term_field(&mut self, term: u32, field: u32) -> Option<&mut TermFieldMatchData> {
        let handle = self.layout.raw_handle(term, field)?;
        self.match_data.raw_match_data_mut(handle)
    }

    /// Record a match of `term` in `field`. Returns `false` if the query has
    /// no slot for the pair.
    pub fn record(&mut self, term: u32, field: u32, positions: &[u32], weight: f64) -> bool {
        match self.term_field(term, field) {
            Some(tfmd) => {
                for &pos in positions {
                    tfmd.add_position(pos);
                }
                tfmd.set_weight(weight);
                true
            }
            None => false,
        }
    }
}

/// Supplies raw match data for each candidate document.
///
/// Called once per document, after the match data was reset and before any
/// feature is computed.
pub trait RawMatchFeed: Sync {
    fn fill(&self, doc_id: DocId, writer: &mut RawMatchWriter<'_>);
}

impl<F> RawMatchFeed for F
where
    F: Fn(DocId, &mut RawMatchWriter<'_>) + Sync,
{
    fn fill(&self, doc_id: DocId, writer: &mut RawMatchWriter<'_>) {
        self(doc_id, writer)
    }
}

/// A feed for queries without term matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMatches;

impl RawMatchFeed for NoMatches {
    fn fill(&self, _doc_id: DocId, _writer: &mut RawMatchWriter<'_>) {}
}

#[derive(Debug, Clone)]
struct TermMatch {
    term: u32,
    field: u32,
    positions: Vec<u32>,
    weight: f64,
}

/// In-memory feed of precomputed matches, keyed by document.
#[derive(Debug, Clone, Default)]
pub struct StaticMatchFeed {
    matches: FxHashMap<DocId, Vec<TermMatch>>,
}

impl StaticMatchFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: `term` matched `field` of `doc` at `positions`.
    pub fn with_match(
        mut self,
        doc: DocId,
        term: u32,
        field: u32,
        positions: Vec<u32>,
        weight: f64,
    ) -> Self {
        self.matches.entry(doc).or_default().push(TermMatch {
            term,
            field,
            positions,
            weight,
        });
        self
    }
}

impl RawMatchFeed for StaticMatchFeed {
    fn fill(&self, doc_id: DocId, writer: &mut RawMatchWriter<'_>) {
        let Some(matches) = self.matches.get(&doc_id) else {
            return;
        };
        for m in matches {
            writer.record(m.term, m.field, &m.positions, m.weight);
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// The root feature values of one document, in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    pub doc_id: DocId,
    pub features: Vec<(String, FeatureValue)>,
}

impl FeatureSet {
    /// Value of `name` by any spelling of the name.
    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        if let Some((_, v)) = self.features.iter().find(|(n, _)| n == name) {
            return Some(v);
        }
        let canonical = FeatureName::parse(name).ok()?.full_name();
        self.features
            .iter()
            .find(|(n, _)| *n == canonical)
            .map(|(_, v)| v)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name)?.as_number()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Result of a sequential document loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationOutcome {
    pub results: Vec<FeatureSet>,
    /// Documents skipped because the query timeout expired
    pub timed_out: Vec<DocId>,
}

impl EvaluationOutcome {
    pub fn is_complete(&self) -> bool {
        self.timed_out.is_empty()
    }
}

// ============================================================================
// RankProgram
// ============================================================================

/// A built pipeline plus the features to rank with and the loop limits.
#[derive(Debug)]
pub struct RankProgram {
    pipeline: Pipeline,
    runtime: RuntimeSpec,
    roots: Vec<(String, Handle)>,
    summary: Vec<String>,
    dump: Vec<String>,
}

impl RankProgram {
    /// Rank with every requested root of `pipeline`.
    pub fn new(pipeline: Pipeline, runtime: RuntimeSpec) -> Self {
        let roots = pipeline.roots().to_vec();
        Self {
            pipeline,
            runtime,
            roots,
            summary: Vec::new(),
            dump: Vec::new(),
        }
    }

    /// Resolve `features`, build the pipeline and wrap it.
    pub fn compile<S: AsRef<str>>(
        catalog: &BlueprintCatalog,
        index_env: &dyn IndexEnvironment,
        query_env: &dyn QueryEnvironment,
        features: &[S],
        config: &RankConfig,
    ) -> Result<Self> {
        Self::compile_observed(catalog, index_env, query_env, features, config, &mut NoopObserver)
    }

    /// Like [`compile`](Self::compile), reporting each stage to `observer`.
    pub fn compile_observed<S: AsRef<str>>(
        catalog: &BlueprintCatalog,
        index_env: &dyn IndexEnvironment,
        query_env: &dyn QueryEnvironment,
        features: &[S],
        config: &RankConfig,
        observer: &mut impl PipelineObserver,
    ) -> Result<Self> {
        config.validate()?;

        trace_stage!(STAGE_RESOLVE);
        observer.on_stage_start(STAGE_RESOLVE);
        let clock = StageClock::start();
        let graph = GraphResolver::new(catalog, index_env)
            .with_config(config)
            .resolve(features)?;
        let report = StageReportBuilder::new(clock.elapsed())
            .nodes(graph.len())
            .handles(graph.num_handles() as usize)
            .build();
        observer.on_stage_end(STAGE_RESOLVE, &report);

        let pipeline = PipelineBuilder::new().build_observed(&graph, query_env, observer)?;
        Ok(Self::new(pipeline, config.runtime.clone()))
    }

    /// Validate `profile` and compile everything it lists.
    ///
    /// Only `features` are evaluated per document; summary and dump
    /// features are computed when read.
    pub fn from_profile(
        catalog: &BlueprintCatalog,
        index_env: &dyn IndexEnvironment,
        query_env: &dyn QueryEnvironment,
        profile: &RankProfileSpec,
    ) -> Result<Self> {
        let report = ValidationEngine::for_catalog(catalog).validate(profile);
        for w in report.warnings() {
            warn!(code = %w.code, path = %w.path, "{}", w.message);
        }
        report.into_result()?;

        let mut program = Self::compile(
            catalog,
            index_env,
            query_env,
            &profile.requested_features(),
            &profile.to_config(),
        )?;

        let mut roots: Vec<(String, Handle)> = Vec::with_capacity(profile.features.len());
        for name in &profile.features {
            let full = FeatureName::parse(name)?.full_name();
            if roots.iter().any(|(n, _)| *n == full) {
                continue;
            }
            if let Some(handle) = program.pipeline.handle_of(&full) {
                roots.push((full, handle));
            }
        }
        program.roots = roots;
        program.summary = profile.summary_features.clone();
        program.dump = profile.dump_features.clone();
        Ok(program)
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn runtime(&self) -> &RuntimeSpec {
        &self.runtime
    }

    /// Features computed for every document, in request order.
    pub fn roots(&self) -> &[(String, Handle)] {
        &self.roots
    }

    pub fn new_match_data(&self) -> MatchData {
        self.pipeline.new_match_data()
    }

    /// A summary writer for the profile's summary features.
    pub fn summary_writer(&self) -> SummaryFeaturesWriter {
        SummaryFeaturesWriter::new(&self.pipeline, &self.summary)
    }

    /// A writer for the profile's dump features.
    pub fn dump_writer(&self) -> SummaryFeaturesWriter {
        SummaryFeaturesWriter::new(&self.pipeline, &self.dump)
    }

    /// Evaluate one document into `match_data`.
    ///
    /// The store is reset first, so it can be reused across documents.
    pub fn evaluate<F: RawMatchFeed + ?Sized>(
        &self,
        match_data: &mut MatchData,
        doc_id: DocId,
        feed: &F,
    ) -> Result<FeatureSet> {
        self.pipeline.check_match_data(match_data)?;
        match_data.reset(doc_id);
        feed.fill(doc_id, &mut RawMatchWriter::new(self.pipeline.layout(), match_data));

        let mut features = Vec::with_capacity(self.roots.len());
        for (name, handle) in &self.roots {
            let value = self.pipeline.get_value(match_data, *handle)?;
            features.push((name.clone(), value));
        }
        Ok(FeatureSet { doc_id, features })
    }

    /// Evaluate `docs` in order, stopping at the query timeout.
    pub fn evaluate_all<F: RawMatchFeed + ?Sized>(
        &self,
        docs: &[DocId],
        feed: &F,
    ) -> Result<EvaluationOutcome> {
        self.evaluate_all_observed(docs, feed, &mut NoopObserver)
    }

    pub fn evaluate_all_observed<F: RawMatchFeed + ?Sized>(
        &self,
        docs: &[DocId],
        feed: &F,
        observer: &mut impl PipelineObserver,
    ) -> Result<EvaluationOutcome> {
        let deadline = self.runtime.query_timeout().map(|t| Instant::now() + t);
        self.evaluate_until(docs, feed, deadline, observer)
    }

    /// Evaluate `docs` in order, skipping every document not started before
    /// `deadline`.
    pub fn evaluate_until<F: RawMatchFeed + ?Sized>(
        &self,
        docs: &[DocId],
        feed: &F,
        deadline: Option<Instant>,
        observer: &mut impl PipelineObserver,
    ) -> Result<EvaluationOutcome> {
        trace_stage!(STAGE_EVALUATE);
        observer.on_stage_start(STAGE_EVALUATE);
        let clock = StageClock::start();

        let mut match_data = self.pipeline.new_match_data();
        let mut outcome = EvaluationOutcome::default();
        for (i, &doc) in docs.iter().enumerate() {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                outcome.timed_out = docs[i..].to_vec();
                warn!(
                    evaluated = i,
                    skipped = outcome.timed_out.len(),
                    "query timeout reached, stopping document loop"
                );
                break;
            }
            outcome.results.push(self.evaluate(&mut match_data, doc, feed)?);
        }

        let report = StageReportBuilder::new(clock.elapsed())
            .documents(outcome.results.len())
            .timed_out(outcome.timed_out.len())
            .build();
        observer.on_stage_end(STAGE_EVALUATE, &report);
        Ok(outcome)
    }

    /// Evaluate `docs` on the configured thread pool, one store per worker.
    ///
    /// Results are in `docs` order. The first failing document fails the
    /// whole call.
    pub fn evaluate_parallel<F: RawMatchFeed + ?Sized>(
        &self,
        docs: &[DocId],
        feed: &F,
    ) -> Result<Vec<FeatureSet>> {
        debug!(
            documents = docs.len(),
            threads = ?self.runtime.effective_threads(),
            "parallel document loop"
        );
        self.runtime.scoped(|| {
            docs.par_iter()
                .map_init(
                    || self.pipeline.new_match_data(),
                    |match_data, &doc| self.evaluate(match_data, doc, feed),
                )
                .collect()
        })
    }
}
