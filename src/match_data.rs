//! Per-document match data store.
//!
//! A dense, handle-indexed arena holding every feature value computed for
//! the current document, the evaluation state of every executor, and the raw
//! term/field match data supplied by match generation. Executors never hold
//! references into the store; they address it by [`Handle`] through the
//! execution context passed to every call.
//!
//! # Layout
//!
//! ```text
//! handle:  0 .. feature_handles            feature_handles .. num_handles
//!          [ computed feature values ]     [ raw term/field match data ]
//! ```
//!
//! A feature slot is written at most once per document. Raw slots are
//! stamped with the document they were filled for, so data left behind by
//! an earlier document never reads as a match.

use rustc_hash::FxHashMap;

use crate::errors::{RankError, Result};
use crate::types::{DocId, FeatureValue, Handle, INVALID_DOC_ID};

/// Evaluation state of one executor for the current document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotState {
    #[default]
    Pending,
    Computing,
    Computed,
}

// ============================================================================
// Raw match data
// ============================================================================

/// Positions and weight of one query term matched in one field.
#[derive(Debug, Clone, PartialEq)]
pub struct TermFieldMatchData {
    doc_id: DocId,
    positions: Vec<u32>,
    weight: f64,
}

impl Default for TermFieldMatchData {
    fn default() -> Self {
        Self {
            doc_id: INVALID_DOC_ID,
            positions: Vec::new(),
            weight: 0.0,
        }
    }
}

impl TermFieldMatchData {
    /// Forget earlier data and mark this slot as filled for `doc_id`.
    pub fn reset(&mut self, doc_id: DocId) {
        self.doc_id = doc_id;
        self.positions.clear();
        self.weight = 0.0;
    }

    pub fn doc_id(&self) -> DocId {
        self.doc_id
    }

    /// Whether this slot holds a match for `doc_id`.
    #[inline]
    pub fn is_match(&self, doc_id: DocId) -> bool {
        self.doc_id == doc_id && doc_id != INVALID_DOC_ID
    }

    pub fn add_position(&mut self, position: u32) {
        self.positions.push(position);
    }

    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    pub fn positions(&self) -> &[u32] {
        &self.positions
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Number of occurrences of the term in the field.
    pub fn num_occs(&self) -> usize {
        self.positions.len()
    }
}

// ============================================================================
// MatchDataLayout
// ============================================================================

/// One raw slot: query term index and field id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawSlot {
    pub term: u32,
    pub field: u32,
}

/// Handle assignment for one query: feature handles from the resolved graph,
/// followed by one raw handle per `(term, field)` pair.
#[derive(Debug, Clone, Default)]
pub struct MatchDataLayout {
    feature_handles: u32,
    raw: Vec<RawSlot>,
    raw_index: FxHashMap<RawSlot, Handle>,
}

impl MatchDataLayout {
    pub fn new(feature_handles: u32) -> Self {
        Self {
            feature_handles,
            raw: Vec::new(),
            raw_index: FxHashMap::default(),
        }
    }

    /// Allocate (or look up) the raw handle for `term` in `field`.
    pub fn alloc_raw(&mut self, term: u32, field: u32) -> Handle {
        let slot = RawSlot { term, field };
        if let Some(&h) = self.raw_index.get(&slot) {
            return h;
        }
        let handle = Handle(self.feature_handles + self.raw.len() as u32);
        self.raw.push(slot);
        self.raw_index.insert(slot, handle);
        handle
    }

    pub fn raw_handle(&self, term: u32, field: u32) -> Option<Handle> {
        self.raw_index.get(&RawSlot { term, field }).copied()
    }

    /// Raw handles of every term searched in `field`, in term order.
    pub fn raw_handles_for_field(&self, field: u32) -> Vec<(u32, Handle)> {
        self.raw
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.field == field)
            .map(|(i, slot)| (slot.term, Handle(self.feature_handles + i as u32)))
            .collect()
    }

    pub fn feature_handles(&self) -> u32 {
        self.feature_handles
    }

    pub fn raw_slots(&self) -> &[RawSlot] {
        &self.raw
    }

    pub fn num_handles(&self) -> u32 {
        self.feature_handles + self.raw.len() as u32
    }

    #[inline]
    pub fn is_raw(&self, handle: Handle) -> bool {
        handle.0 >= self.feature_handles && handle.0 < self.num_handles()
    }
}

// ============================================================================
// MatchData
// ============================================================================

/// The value store for one document evaluation.
///
/// Create one per worker with [`Pipeline::new_match_data`] and
/// [`reset`](Self::reset) it before every document.
///
/// [`Pipeline::new_match_data`]: crate::pipeline::Pipeline::new_match_data
#[derive(Debug, Clone)]
pub struct MatchData {
    doc_id: DocId,
    values: Vec<Option<FeatureValue>>,
    states: Vec<SlotState>,
    raw: Vec<TermFieldMatchData>,
}

impl MatchData {
    pub fn new(layout: &MatchDataLayout, num_executors: usize) -> Self {
        Self {
            doc_id: INVALID_DOC_ID,
            values: vec![None; layout.feature_handles() as usize],
            states: vec![SlotState::Pending; num_executors],
            raw: vec![TermFieldMatchData::default(); layout.raw_slots().len()],
        }
    }

    /// Start evaluating `doc_id`: every feature slot becomes uncomputed.
    ///
    /// Raw slots keep their buffers; they no longer match until refilled for
    /// `doc_id`.
    pub fn reset(&mut self, doc_id: DocId) {
        self.doc_id = doc_id;
        self.values.iter_mut().for_each(|v| *v = None);
        self.states.iter_mut().for_each(|s| *s = SlotState::Pending);
    }

    pub fn doc_id(&self) -> DocId {
        self.doc_id
    }

    /// Number of feature slots.
    pub fn feature_handles(&self) -> usize {
        self.values.len()
    }

    pub fn num_executors(&self) -> usize {
        self.states.len()
    }

    /// The value in `handle` if it has been computed for this document.
    ///
    /// Never triggers evaluation; see
    /// [`Pipeline::get_value`](crate::pipeline::Pipeline::get_value).
    pub fn peek(&self, handle: Handle) -> Option<&FeatureValue> {
        self.values.get(handle.index())?.as_ref()
    }

    pub fn is_computed(&self, handle: Handle) -> bool {
        self.peek(handle).is_some()
    }

    /// Raw match data in `handle`, if it was filled for this document.
    pub fn raw_match_data(&self, handle: Handle) -> Option<&TermFieldMatchData> {
        let tfmd = self.raw.get(self.raw_index(handle)?)?;
        tfmd.is_match(self.doc_id).then_some(tfmd)
    }

    /// Writable raw slot, reset for the current document on first access.
    pub fn raw_match_data_mut(&mut self, handle: Handle) -> Option<&mut TermFieldMatchData> {
        let idx = self.raw_index(handle)?;
        let doc_id = self.doc_id;
        let tfmd = self.raw.get_mut(idx)?;
        if tfmd.doc_id() != doc_id {
            tfmd.reset(doc_id);
        }
        Some(tfmd)
    }

    fn raw_index(&self, handle: Handle) -> Option<usize> {
        handle.index().checked_sub(self.values.len())
    }

    pub(crate) fn state(&self, executor: usize) -> SlotState {
        self.states[executor]
    }

    pub(crate) fn set_state(&mut self, executor: usize, state: SlotState) {
        self.states[executor] = state;
    }

    /// Store a computed value; a slot is written at most once per document.
    pub(crate) fn set_value(&mut self, handle: Handle, value: FeatureValue) -> Result<()> {
        let doc_id = self.doc_id;
        let slot = self
            .values
            .get_mut(handle.index())
            .ok_or_else(|| RankError::internal(format!("write to unknown handle {}", handle)))?;
        if slot.is_some() {
            return Err(RankError::internal(format!(
                "handle {} written twice for document {}",
                handle, doc_id
            )));
        }
        *slot = Some(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> MatchDataLayout {
        let mut layout = MatchDataLayout::new(3);
        layout.alloc_raw(0, 0);
        layout.alloc_raw(1, 0);
        layout.alloc_raw(1, 2);
        layout
    }

    #[test]
    fn test_layout_appends_raw_after_features() {
        let mut layout = layout();
        assert_eq!(layout.raw_handle(0, 0), Some(Handle(3)));
        assert_eq!(layout.raw_handle(1, 2), Some(Handle(5)));
        assert_eq!(layout.alloc_raw(1, 0), Handle(4));
        assert_eq!(layout.num_handles(), 6);
        assert!(layout.is_raw(Handle(3)));
        assert!(!layout.is_raw(Handle(2)));
        assert_eq!(
            layout.raw_handles_for_field(0),
            vec![(0, Handle(3)), (1, Handle(4))]
        );
    }

    #[test]
    fn test_write_once() {
        let mut md = MatchData::new(&layout(), 2);
        md.reset(1);
        md.set_value(Handle(0), FeatureValue::Number(1.0)).unwrap();
        assert_eq!(md.peek(Handle(0)), Some(&FeatureValue::Number(1.0)));
        assert!(md.set_value(Handle(0), FeatureValue::Number(2.0)).is_err());
        assert!(md.set_value(Handle(9), FeatureValue::Number(2.0)).is_err());
    }

    #[test]
    fn test_reset_clears_values_and_states() {
        let mut md = MatchData::new(&layout(), 2);
        md.reset(1);
        md.set_value(Handle(1), FeatureValue::Number(4.0)).unwrap();
        md.set_state(0, SlotState::Computed);

        md.reset(2);
        assert!(!md.is_computed(Handle(1)));
        assert_eq!(md.state(0), SlotState::Pending);
        assert_eq!(md.doc_id(), 2);
    }

    #[test]
    fn test_stale_raw_data_is_not_a_match() {
        let mut md = MatchData::new(&layout(), 0);
        md.reset(10);
        {
            let tfmd = md.raw_match_data_mut(Handle(3)).unwrap();
            tfmd.add_position(4);
            tfmd.set_weight(100.0);
        }
        assert_eq!(md.raw_match_data(Handle(3)).map(|t| t.num_occs()), Some(1));
        assert!(md.raw_match_data(Handle(4)).is_none());

        md.reset(11);
        assert!(md.raw_match_data(Handle(3)).is_none());

        let tfmd = md.raw_match_data_mut(Handle(3)).unwrap();
        assert!(tfmd.positions().is_empty());
    }

    #[test]
    fn test_feature_handle_is_not_raw() {
        let md = MatchData::new(&layout(), 0);
        assert!(md.raw_match_data(Handle(0)).is_none());
        assert!(md.raw_match_data(Handle(42)).is_none());
    }
}
