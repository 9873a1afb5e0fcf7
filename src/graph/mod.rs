//! The resolved dependency graph of one query.
//!
//! [`ResolvedGraph`] is purely structural: an ordered list of
//! [`DependencyNode`]s, the handle assignment and a name → handle index.
//! It holds no per-document state and is produced by
//! [`GraphResolver`](resolver::GraphResolver).
//!
//! # Ordering
//!
//! Nodes are stored in topological order: every node appears after all of
//! the nodes it reads from, and independent nodes keep the order in which
//! they were first requested. Output handles follow the same order, so for
//! every node all input handles are smaller than its own output handles.

pub mod resolver;

use rustc_hash::FxHashMap;

use crate::blueprint::{Blueprint, OutputSpec, OutputType};
use crate::feature_name::FeatureName;
use crate::types::Handle;

pub use resolver::GraphResolver;

/// One configured blueprint in a decorator chain.
#[derive(Debug)]
pub struct Layer {
    pub(crate) name: String,
    pub(crate) blueprint: Box<dyn Blueprint>,
}

impl Layer {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn blueprint(&self) -> &dyn Blueprint {
        self.blueprint.as_ref()
    }
}

/// A configured feature with its resolved inputs and assigned outputs.
#[derive(Debug)]
pub struct DependencyNode {
    pub(crate) name: String,
    /// Innermost first; the last layer is this node's own blueprint.
    pub(crate) layers: Vec<Layer>,
    pub(crate) inputs: Vec<Handle>,
    pub(crate) outputs: Vec<Handle>,
    pub(crate) output_specs: Vec<OutputSpec>,
}

impl DependencyNode {
    /// Canonical executor name, e.g. `sum(value(1),value(2))`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handles this node reads, in declared input order.
    pub fn inputs(&self) -> &[Handle] {
        &self.inputs
    }

    /// Handles this node writes, in declared output order.
    pub fn outputs(&self) -> &[Handle] {
        &self.outputs
    }

    pub fn output_specs(&self) -> &[OutputSpec] {
        &self.output_specs
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Whether this node decorates at least one wrapped feature.
    pub fn is_decorated(&self) -> bool {
        self.layers.len() > 1
    }

    /// Pick the output named `output`, or the first one when `None`.
    pub(crate) fn select_output(&self, output: Option<&str>) -> Option<(Handle, OutputType)> {
        let idx = match output {
            None => 0,
            Some(name) => self.output_specs.iter().position(|s| s.name == name)?,
        };
        Some((*self.outputs.get(idx)?, self.output_specs.get(idx)?.kind))
    }
}

/// The acyclic, topologically ordered graph of one query.
#[derive(Debug)]
pub struct ResolvedGraph {
    pub(crate) nodes: Vec<DependencyNode>,
    pub(crate) handles: FxHashMap<String, Handle>,
    pub(crate) roots: Vec<(String, Handle)>,
    pub(crate) num_handles: u32,
}

impl ResolvedGraph {
    pub(crate) fn new(nodes: Vec<DependencyNode>, roots: Vec<(String, Handle)>) -> Self {
        let mut handles = FxHashMap::default();
        let mut num_handles = 0;
        for node in &nodes {
            for (i, (spec, &handle)) in node.output_specs.iter().zip(&node.outputs).enumerate() {
                handles.insert(format!("{}.{}", node.name, spec.name), handle);
                if i == 0 {
                    handles.insert(node.name.clone(), handle);
                }
                num_handles = num_handles.max(handle.0 + 1);
            }
        }
        Self {
            nodes,
            handles,
            roots,
            num_handles,
        }
    }

    /// Nodes in topological order.
    pub fn nodes(&self) -> &[DependencyNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of feature output handles (`0..num_handles`).
    pub fn num_handles(&self) -> u32 {
        self.num_handles
    }

    /// Requested features, deduplicated, in request order.
    pub fn roots(&self) -> &[(String, Handle)] {
        &self.roots
    }

    /// Handle of a feature by any spelling of its name.
    pub fn handle_of(&self, name: &str) -> Option<Handle> {
        lookup_handle(&self.handles, name)
    }

    /// All output handles of the node named `name`.
    pub fn output_handles(&self, name: &str) -> Option<&[Handle]> {
        let key = FeatureName::parse(name).ok()?.executor_name();
        self.nodes
            .iter()
            .find(|n| n.name == key)
            .map(|n| n.outputs.as_slice())
    }

    /// Every canonical feature name with a handle, sorted by handle.
    pub fn feature_names(&self) -> Vec<(&str, Handle)> {
        let mut names: Vec<_> = self
            .handles
            .iter()
            .map(|(name, &handle)| (name.as_str(), handle))
            .collect();
        names.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.len().cmp(&b.0.len())));
        names
    }

    /// The node producing `handle`.
    pub fn node_for(&self, handle: Handle) -> Option<&DependencyNode> {
        self.nodes.iter().find(|n| n.outputs.contains(&handle))
    }
}

/// Resolve `name` against a canonical name index, accepting non-canonical
/// spellings by re-parsing.
pub(crate) fn lookup_handle(handles: &FxHashMap<String, Handle>, name: &str) -> Option<Handle> {
    if let Some(&h) = handles.get(name) {
        return Some(h);
    }
    let parsed = FeatureName::parse(name).ok()?;
    handles.get(&parsed.full_name()).copied()
}
