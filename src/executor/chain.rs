//! Executors that wrap other executors.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::{ExecutionContext, FeatureExecutor};
use crate::errors::Result;
use crate::types::{DocId, FeatureValue};

/// Runs an inner executor, then maps each of its outputs.
///
/// The transform receives the output index and the inner value. Consumers
/// only ever see the transformed values.
pub struct ChainExecutor<F> {
    inner: Box<dyn FeatureExecutor>,
    transform: F,
}

impl<F> ChainExecutor<F>
where
    F: Fn(usize, FeatureValue) -> FeatureValue + Send + Sync,
{
    pub fn new(inner: Box<dyn FeatureExecutor>, transform: F) -> Self {
        Self { inner, transform }
    }
}

impl<F> FeatureExecutor for ChainExecutor<F>
where
    F: Fn(usize, FeatureValue) -> FeatureValue + Send + Sync,
{
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        self.inner.execute(ctx)?;
        for i in 0..ctx.num_outputs() {
            let value = ctx.take_staged(i)?;
            ctx.set_output(i, (self.transform)(i, value))?;
        }
        Ok(())
    }
}

/// Skips the inner executor when called again for the document it last ran
/// for, replaying the values produced then.
///
/// A repeat call happens when the same document is evaluated a second time
/// after its match data was reset, e.g. a summary pass following first-phase
/// ranking. Only the most recent document is remembered.
pub struct DocCachedExecutor {
    inner: Box<dyn FeatureExecutor>,
    last: Mutex<Option<(DocId, Vec<FeatureValue>)>>,
    hits: AtomicU64,
}

impl DocCachedExecutor {
    pub fn new(inner: Box<dyn FeatureExecutor>) -> Self {
        Self {
            inner,
            last: Mutex::new(None),
            hits: AtomicU64::new(0),
        }
    }

    /// Number of calls answered from the cache.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }
}

impl FeatureExecutor for DocCachedExecutor {
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let doc_id = ctx.doc_id();
        let cached = match self.last.lock().as_ref() {
            Some((doc, values)) if *doc == doc_id && values.len() == ctx.num_outputs() => {
                Some(values.clone())
            }
            _ => None,
        };

        if let Some(values) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            for (i, value) in values.into_iter().enumerate() {
                ctx.set_output(i, value)?;
            }
            return Ok(());
        }

        // lock is not held while the inner executor runs
        self.inner.execute(ctx)?;
        let mut values = Vec::with_capacity(ctx.num_outputs());
        for i in 0..ctx.num_outputs() {
            if let Some(value) = ctx.staged_output(i) {
                values.push(value.clone());
            }
        }
        if values.len() == ctx.num_outputs() {
            *self.last.lock() = Some((doc_id, values));
        }
        Ok(())
    }
}
