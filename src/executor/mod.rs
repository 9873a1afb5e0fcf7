//! Executor runtime: the per-document evaluation contract.
//!
//! An executor is created once per query and invoked at most once per
//! document. It pulls its inputs through the [`ExecutionContext`], which
//! evaluates them on demand, and stages one value per declared output.
//! When `execute` returns, the runtime commits the staged values into the
//! match data under the executor's output handles.
//!
//! Per document every executor moves through
//! `Pending → Computing → Computed`. Demanding an executor that is still
//! `Computing` means the graph turned cyclic at runtime, which is reported
//! as [`RankError::InternalInvariantViolation`].

pub mod chain;

use crate::errors::{RankError, Result};
use crate::match_data::{MatchData, SlotState, TermFieldMatchData};
use crate::pipeline::{ExecutorSlot, Pipeline};
use crate::types::{DocId, FeatureValue, Handle};

pub use chain::{ChainExecutor, DocCachedExecutor};

/// Computes the values of one feature for one document.
///
/// Executors are shared by every worker evaluating documents for the same
/// query, so any state kept across documents must synchronize itself.
pub trait FeatureExecutor: Send + Sync {
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<()>;
}

impl<F> FeatureExecutor for F
where
    F: Fn(&mut ExecutionContext<'_>) -> Result<()> + Send + Sync,
{
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        self(ctx)
    }
}

impl std::fmt::Debug for dyn FeatureExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FeatureExecutor")
    }
}

/// What an executor sees while it runs.
pub struct ExecutionContext<'a> {
    pipeline: &'a Pipeline,
    match_data: &'a mut MatchData,
    inputs: &'a [Handle],
    staged: Vec<Option<FeatureValue>>,
}

impl<'a> ExecutionContext<'a> {
    pub(crate) fn new(
        pipeline: &'a Pipeline,
        match_data: &'a mut MatchData,
        inputs: &'a [Handle],
        num_outputs: usize,
    ) -> Self {
        Self {
            pipeline,
            match_data,
            inputs,
            staged: vec![None; num_outputs],
        }
    }

    /// The document being evaluated.
    pub fn doc_id(&self) -> DocId {
        self.match_data.doc_id()
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Value of input `idx`, computing it first if needed.
    pub fn input(&mut self, idx: usize) -> Result<FeatureValue> {
        let handle = *self.inputs.get(idx).ok_or_else(|| {
            RankError::internal(format!(
                "input {} requested, executor has {}",
                idx,
                self.inputs.len()
            ))
        })?;
        self.pipeline.get_value(self.match_data, handle)
    }

    /// Value of input `idx` as a number; objects read as NaN.
    pub fn input_number(&mut self, idx: usize) -> Result<f64> {
        Ok(self.input(idx)?.as_number().unwrap_or(f64::NAN))
    }

    pub fn num_outputs(&self) -> usize {
        self.staged.len()
    }

    /// Stage the value of output `idx`.
    pub fn set_output(&mut self, idx: usize, value: FeatureValue) -> Result<()> {
        let num_outputs = self.staged.len();
        let slot = self.staged.get_mut(idx).ok_or_else(|| {
            RankError::internal(format!("output {} set, executor has {}", idx, num_outputs))
        })?;
        if slot.is_some() {
            return Err(RankError::internal(format!("output {} set twice", idx)));
        }
        *slot = Some(value);
        Ok(())
    }

    pub fn set_number(&mut self, idx: usize, value: f64) -> Result<()> {
        self.set_output(idx, FeatureValue::Number(value))
    }

    /// The value staged for output `idx` so far.
    pub fn staged_output(&self, idx: usize) -> Option<&FeatureValue> {
        self.staged.get(idx)?.as_ref()
    }

    /// Remove and return the value staged for output `idx`.
    ///
    /// Decorators use this to rewrite what their inner executor produced.
    pub fn take_staged(&mut self, idx: usize) -> Result<FeatureValue> {
        self.staged
            .get_mut(idx)
            .and_then(Option::take)
            .ok_or_else(|| RankError::internal(format!("executor left output {} unset", idx)))
    }

    /// Raw match data in `handle` for the current document.
    pub fn raw(&self, handle: Handle) -> Option<&TermFieldMatchData> {
        self.match_data.raw_match_data(handle)
    }

    fn into_staged(self) -> Vec<Option<FeatureValue>> {
        self.staged
    }
}

/// Run executor `idx` for the current document unless it already ran.
pub(crate) fn ensure_computed(
    pipeline: &Pipeline,
    match_data: &mut MatchData,
    idx: usize,
) -> Result<()> {
    match match_data.state(idx) {
        SlotState::Computed => return Ok(()),
        SlotState::Computing => {
            return Err(RankError::internal(format!(
                "'{}' demanded while being computed for document {}",
                pipeline.executor_name(idx),
                match_data.doc_id()
            )))
        }
        SlotState::Pending => {}
    }

    let slot = pipeline.slot(idx);
    match_data.set_state(idx, SlotState::Computing);
    let outcome = run_slot(pipeline, match_data, slot);
    // a failed run leaves nothing committed, so the slot can be demanded again
    let state = if outcome.is_ok() {
        SlotState::Computed
    } else {
        SlotState::Pending
    };
    match_data.set_state(idx, state);
    outcome
}

/// Execute `slot` and commit its outputs once every one of them is staged.
fn run_slot(pipeline: &Pipeline, match_data: &mut MatchData, slot: &ExecutorSlot) -> Result<()> {
    let mut ctx = ExecutionContext::new(pipeline, match_data, &slot.inputs, slot.outputs.len());
    slot.executor.execute(&mut ctx)?;
    let staged = ctx.into_staged();

    let values = slot
        .outputs
        .iter()
        .zip(staged)
        .map(|(&handle, value)| {
            value.ok_or_else(|| {
                RankError::internal(format!(
                    "executor left output unset: '{}' produced nothing for {}",
                    slot.name, handle
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    for (&handle, value) in slot.outputs.iter().zip(values) {
        match_data.set_value(handle, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::blueprint::{params, Blueprint, BlueprintCatalog, SetupContext};
    use crate::env::{SimpleIndexEnvironment, SimpleQueryEnvironment};
    use crate::pipeline::{NoMatches, QueryContext, RankProgram};
    use crate::types::RankConfig;

    /// `scripted(mode)`: `ok` writes 7, `unset` writes nothing, `fail` errors.
    #[derive(Clone)]
    struct ScriptedBlueprint {
        mode: String,
        runs: Arc<AtomicUsize>,
    }

    impl Blueprint for ScriptedBlueprint {
        fn base_name(&self) -> &str {
            "scripted"
        }

        fn create_instance(&self) -> Box<dyn Blueprint> {
            Box::new(self.clone())
        }

        fn setup(&mut self, ctx: &mut SetupContext<'_>, params: &[String]) -> Result<()> {
            params::expect_count(ctx.feature_name(), params, 1)?;
            self.mode = params[0].clone();
            ctx.describe_output("out", "scripted value");
            Ok(())
        }

        fn create_executor(&self, _query: &QueryContext<'_>) -> Result<Box<dyn FeatureExecutor>> {
            let mode = self.mode.clone();
            let runs = Arc::clone(&self.runs);
            Ok(Box::new(move |ctx: &mut ExecutionContext<'_>| {
                runs.fetch_add(1, Ordering::SeqCst);
                match mode.as_str() {
                    "ok" => ctx.set_number(0, 7.0),
                    "unset" => Ok(()),
                    _ => Err(RankError::internal("attribute store offline")),
                }
            }))
        }
    }

    fn program(feature: &str) -> (RankProgram, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut catalog = BlueprintCatalog::with_builtins();
        catalog
            .add_prototype(Box::new(ScriptedBlueprint {
                mode: String::new(),
                runs: Arc::clone(&runs),
            }))
            .unwrap();
        let program = RankProgram::compile(
            &catalog,
            &SimpleIndexEnvironment::new(),
            &SimpleQueryEnvironment::new(),
            &[feature],
            &RankConfig::default(),
        )
        .unwrap();
        (program, runs)
    }

    #[test]
    fn test_staged_output_is_committed() {
        let (program, runs) = program("scripted(ok)");
        let mut md = program.new_match_data();
        let fs = program.evaluate(&mut md, 3, &NoMatches).unwrap();
        assert_eq!(fs.number("scripted(ok)"), Some(7.0));

        let handle = program.roots()[0].1;
        assert_eq!(program.pipeline().get_value(&mut md, handle).unwrap(), FeatureValue::Number(7.0));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unset_output_is_reported() {
        let (program, _) = program("scripted(unset)");
        let mut md = program.new_match_data();
        let err = program.evaluate(&mut md, 1, &NoMatches).unwrap_err();
        assert!(matches!(err, RankError::InternalInvariantViolation { .. }));
        assert!(err.to_string().contains("executor left output unset"), "{err}");
        assert!(!md.is_computed(program.roots()[0].1));
    }

    #[test]
    fn test_demand_while_computing_is_rejected() {
        let (program, runs) = program("scripted(ok)");
        let mut md = program.new_match_data();
        md.reset(5);
        md.set_state(0, SlotState::Computing);

        let err = program.pipeline().ensure_computed(&mut md, 0).unwrap_err();
        assert!(matches!(err, RankError::InternalInvariantViolation { .. }));
        assert!(err.to_string().contains("demanded while being computed for document 5"), "{err}");
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failed_executor_fails_the_same_way_again() {
        let (program, runs) = program("scripted(fail)");
        let mut md = program.new_match_data();
        let handle = program.roots()[0].1;

        let first = program.evaluate(&mut md, 2, &NoMatches).unwrap_err();
        let second = program.pipeline().get_value(&mut md, handle).unwrap_err();
        assert!(first.to_string().contains("attribute store offline"), "{first}");
        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_dependency_does_not_poison_consumer() {
        let (program, runs) = program("sum(scripted(fail),value(1))");
        let mut md = program.new_match_data();
        let handle = program.roots()[0].1;

        let err = program.evaluate(&mut md, 4, &NoMatches).unwrap_err();
        assert!(err.to_string().contains("attribute store offline"), "{err}");
        let err = program.pipeline().get_value(&mut md, handle).unwrap_err();
        assert!(err.to_string().contains("attribute store offline"), "{err}");
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
