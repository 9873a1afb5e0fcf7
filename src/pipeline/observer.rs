//! Stage observation hooks.
//!
//! Query setup and the document loop report each stage boundary to a
//! [`PipelineObserver`]. [`NoopObserver`] compiles away; use
//! [`StageTimingObserver`] to collect per-stage reports.

use std::time::{Duration, Instant};

pub const STAGE_RESOLVE: &str = "resolve";
pub const STAGE_BUILD: &str = "build";
pub const STAGE_EVALUATE: &str = "evaluate";

/// Receives callbacks at every stage boundary.
pub trait PipelineObserver {
    fn on_stage_start(&mut self, _stage: &'static str) {}

    fn on_stage_end(&mut self, _stage: &'static str, _report: &StageReport) {}
}

/// Observer that ignores every callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Wall clock for one stage.
#[derive(Debug, Clone, Copy)]
pub struct StageClock(Instant);

impl StageClock {
    pub fn start() -> Self {
        Self(Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }
}

/// Metrics of one finished stage. Counts a stage does not produce are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageReport {
    elapsed: Duration,
    nodes: Option<usize>,
    handles: Option<usize>,
    documents: Option<usize>,
    timed_out: Option<usize>,
}

impl StageReport {
    pub fn new(elapsed: Duration) -> Self {
        Self {
            elapsed,
            ..Self::default()
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn elapsed_us(&self) -> u128 {
        self.elapsed.as_micros()
    }

    pub fn nodes(&self) -> Option<usize> {
        self.nodes
    }

    pub fn handles(&self) -> Option<usize> {
        self.handles
    }

    pub fn documents(&self) -> Option<usize> {
        self.documents
    }

    pub fn timed_out(&self) -> Option<usize> {
        self.timed_out
    }
}

/// Builder for reports that carry stage-specific counts.
#[derive(Debug, Clone)]
pub struct StageReportBuilder(StageReport);

impl StageReportBuilder {
    pub fn new(elapsed: Duration) -> Self {
        Self(StageReport::new(elapsed))
    }

    pub fn nodes(mut self, n: usize) -> Self {
        self.0.nodes = Some(n);
        self
    }

    pub fn handles(mut self, n: usize) -> Self {
        self.0.handles = Some(n);
        self
    }

    pub fn documents(mut self, n: usize) -> Self {
        self.0.documents = Some(n);
        self
    }

    pub fn timed_out(mut self, n: usize) -> Self {
        self.0.timed_out = Some(n);
        self
    }

    pub fn build(self) -> StageReport {
        self.0
    }
}

/// Records every finished stage in order.
#[derive(Debug, Clone, Default)]
pub struct StageTimingObserver {
    reports: Vec<(&'static str, StageReport)>,
}

impl StageTimingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> &[(&'static str, StageReport)] {
        &self.reports
    }

    /// Sum of all recorded stage durations.
    pub fn total(&self) -> Duration {
        self.reports.iter().map(|(_, r)| r.elapsed).sum()
    }

    pub fn report(&self, stage: &str) -> Option<&StageReport> {
        self.reports
            .iter()
            .rev()
            .find(|(name, _)| *name == stage)
            .map(|(_, r)| r)
    }
}

impl PipelineObserver for StageTimingObserver {
    fn on_stage_end(&mut self, stage: &'static str, report: &StageReport) {
        self.reports.push((stage, report.clone()));
    }
}
