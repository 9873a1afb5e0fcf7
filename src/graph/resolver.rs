//! Dependency resolution: feature names → [`ResolvedGraph`].
//!
//! Resolution is a depth-first walk over declared dependencies in request
//! order. A node is appended to the graph (and receives its output handles)
//! only after all of its inputs have been appended, which yields a stable
//! topological order in a single pass. Features with the same executor name
//! resolve to the same node.
//!
//! The walk keeps the chain of names currently being set up; meeting one of
//! them again is a [`RankError::CyclicDependency`]. Any error aborts the
//! whole call and nothing partially built escapes.

use rustc_hash::FxHashMap;
use tracing::{debug, debug_span};

use super::{DependencyNode, Layer, ResolvedGraph};
use crate::blueprint::{BlueprintCatalog, InputKind, InputSpec, OutputSpec, OutputType, SetupContext};
use crate::env::IndexEnvironment;
use crate::errors::{RankError, Result};
use crate::feature_name::FeatureName;
use crate::types::{Handle, RankConfig};

/// Resolves requested features against a catalog and an index environment.
pub struct GraphResolver<'a> {
    catalog: &'a BlueprintCatalog,
    index_env: &'a dyn IndexEnvironment,
    max_depth: usize,
}

/// Mutable state of one `resolve` call.
#[derive(Default)]
struct ResolveState {
    nodes: Vec<DependencyNode>,
    done: FxHashMap<String, usize>,
    stack: Vec<String>,
    next_handle: u32,
}

/// A set-up feature, possibly wrapping other set-up features.
struct SetupChain {
    layers: Vec<Layer>,
    inputs: Vec<InputSpec>,
    outputs: Vec<OutputSpec>,
}

impl<'a> GraphResolver<'a> {
    pub fn new(catalog: &'a BlueprintCatalog, index_env: &'a dyn IndexEnvironment) -> Self {
        Self {
            catalog,
            index_env,
            max_depth: RankConfig::DEFAULT_MAX_DEPENDENCY_DEPTH,
        }
    }

    /// Builder method: take limits from `config`
    pub fn with_config(mut self, config: &RankConfig) -> Self {
        self.max_depth = config.max_dependency_depth;
        self
    }

    /// Resolve `features` into a topologically ordered graph.
    pub fn resolve<S: AsRef<str>>(&self, features: &[S]) -> Result<ResolvedGraph> {
        let _span = debug_span!("resolve", requested = features.len()).entered();

        let mut st = ResolveState::default();
        let mut roots: Vec<(String, Handle)> = Vec::with_capacity(features.len());

        for feature in features {
            let name = FeatureName::parse(feature.as_ref())?;
            let idx = self.resolve_node(&mut st, &name)?;
            let (handle, _) = st.nodes[idx].select_output(name.output()).ok_or_else(|| {
                RankError::invalid_config(
                    name.full_name(),
                    format!("no output named '{}'", name.output().unwrap_or_default()),
                )
            })?;
            let full = name.full_name();
            if !roots.iter().any(|(n, _)| *n == full) {
                roots.push((full, handle));
            }
        }

        debug!(
            nodes = st.nodes.len(),
            handles = st.next_handle,
            "resolved feature graph"
        );
        Ok(ResolvedGraph::new(st.nodes, roots))
    }

    fn resolve_node(&self, st: &mut ResolveState, name: &FeatureName) -> Result<usize> {
        let key = name.executor_name();
        if let Some(&idx) = st.done.get(&key) {
            debug!(feature = %key, "reusing resolved feature");
            return Ok(idx);
        }

        self.enter(st, &key)?;
        let chain = self.setup_chain(st, name, &key)?;

        let mut inputs = Vec::with_capacity(chain.inputs.len());
        for input in &chain.inputs {
            let dep = FeatureName::parse(&input.name).map_err(|err| {
                RankError::invalid_config(
                    key.as_str(),
                    format!("bad dependency '{}': {}", input.name, err),
                )
            })?;
            let dep_idx = self.resolve_node(st, &dep)?;
            let (handle, kind) = st.nodes[dep_idx]
                .select_output(dep.output())
                .ok_or_else(|| {
                    RankError::invalid_config(
                        key.as_str(),
                        format!("dependency '{}' has no such output", input.name),
                    )
                })?;
            if input.kind == InputKind::Number && kind == OutputType::Object {
                return Err(RankError::invalid_config(
                    key.as_str(),
                    format!("dependency '{}' is an object, a number is required", input.name),
                ));
            }
            inputs.push(handle);
        }

        let outputs = (0..chain.outputs.len())
            .map(|_| {
                let handle = Handle(st.next_handle);
                st.next_handle += 1;
                handle
            })
            .collect();

        st.stack.pop();
        let idx = st.nodes.len();
        st.nodes.push(DependencyNode {
            name: key.clone(),
            layers: chain.layers,
            inputs,
            outputs,
            output_specs: chain.outputs,
        });
        st.done.insert(key, idx);
        Ok(idx)
    }

    /// Push `key` on the in-progress chain, rejecting cycles and runaway depth.
    fn enter(&self, st: &mut ResolveState, key: &str) -> Result<()> {
        if let Some(pos) = st.stack.iter().position(|n| n == key) {
            let mut path = st.stack[pos..].to_vec();
            path.push(key.to_string());
            return Err(RankError::cyclic(path));
        }
        if st.stack.len() >= self.max_depth {
            return Err(RankError::invalid_config(
                key,
                format!("dependency depth exceeds {}", self.max_depth),
            ));
        }
        st.stack.push(key.to_string());
        Ok(())
    }

    /// Set up `name` and, if it decorates another feature, everything it wraps.
    fn setup_chain(&self, st: &mut ResolveState, name: &FeatureName, key: &str) -> Result<SetupChain> {
        let mut blueprint = self
            .catalog
            .create_blueprint(name.base())
            .map_err(|_| RankError::unknown_feature(key))?;

        let mut ctx = SetupContext::new(self.index_env, key);
        blueprint.setup(&mut ctx, name.params())?;
        let decl = ctx.finish()?;

        let layer = Layer {
            name: key.to_string(),
            blueprint,
        };

        let Some(wrapped) = decl.wrapped else {
            return Ok(SetupChain {
                layers: vec![layer],
                inputs: decl.inputs,
                outputs: decl.outputs,
            });
        };

        let inner = FeatureName::parse(&wrapped).map_err(|err| {
            RankError::invalid_config(key, format!("bad wrapped feature '{}': {}", wrapped, err))
        })?;
        if inner.output().is_some() {
            return Err(RankError::invalid_config(
                key,
                "a decorator wraps a whole feature, not a single output",
            ));
        }
        let inner_key = inner.executor_name();
        self.enter(st, &inner_key)?;
        let mut chain = self.setup_chain(st, &inner, &inner_key)?;
        st.stack.pop();

        if !decl.outputs.is_empty() {
            if decl.outputs.len() != chain.outputs.len() {
                return Err(RankError::invalid_config(
                    key,
                    format!(
                        "decorator describes {} output(s) but '{}' has {}",
                        decl.outputs.len(),
                        inner_key,
                        chain.outputs.len()
                    ),
                ));
            }
            chain.outputs = decl.outputs;
        }
        chain.layers.push(layer);
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{FieldKind, SimpleIndexEnvironment};

    fn env() -> SimpleIndexEnvironment {
        SimpleIndexEnvironment::new()
            .with_field("title", FieldKind::Index)
            .with_field("year", FieldKind::Attribute)
    }

    fn resolve(features: &[&str]) -> Result<ResolvedGraph> {
        let catalog = BlueprintCatalog::with_builtins();
        let env = env();
        GraphResolver::new(&catalog, &env).resolve(features)
    }

    fn assert_topological(graph: &ResolvedGraph) {
        for node in graph.nodes() {
            for input in node.inputs() {
                for output in node.outputs() {
                    assert!(input < output, "{} reads {input} after writing {output}", node.name());
                }
            }
        }
    }

    #[test]
    fn test_single_constant() {
        let graph = resolve(&["value(3)"]).unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.num_handles(), 1);
        assert_eq!(graph.handle_of("value(3)"), Some(Handle(0)));
        assert_eq!(graph.roots(), &[("value(3)".to_string(), Handle(0))]);
    }

    #[test]
    fn test_dependencies_come_first() {
        let graph = resolve(&["sum(value(1),value(2))"]).unwrap();
        let names: Vec<_> = graph.nodes().iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["value(1)", "value(2)", "sum(value(1),value(2))"]);
        assert_eq!(graph.nodes()[2].inputs(), &[Handle(0), Handle(1)]);
        assert_topological(&graph);
    }

    #[test]
    fn test_ties_follow_request_order() {
        let graph = resolve(&["value(5)", "value(4)", "sum(value(4),value(6))"]).unwrap();
        let names: Vec<_> = graph.nodes().iter().map(|n| n.name()).collect();
        assert_eq!(
            names,
            vec!["value(5)", "value(4)", "value(6)", "sum(value(4),value(6))"]
        );
    }

    #[test]
    fn test_same_feature_twice_is_one_node() {
        let graph = resolve(&["value(1)", " value( 1 ) ", "sum(value(1),value(1))"]).unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.num_handles(), 2);
        assert_eq!(graph.roots().len(), 2);
        assert_eq!(graph.nodes()[1].inputs(), &[Handle(0), Handle(0)]);
    }

    #[test]
    fn test_multi_output_selection() {
        let graph = resolve(&["sum(value(1,2).1)"]).unwrap();
        let value = &graph.nodes()[0];
        assert_eq!(value.outputs(), &[Handle(0), Handle(1)]);
        assert_eq!(graph.nodes()[1].inputs(), &[Handle(1)]);
        assert_eq!(graph.handle_of("value(1,2).0"), Some(Handle(0)));
        assert_eq!(graph.handle_of("value(1,2).1"), Some(Handle(1)));
        assert_eq!(graph.handle_of("value(1,2)"), Some(Handle(0)));
        assert_eq!(
            graph.output_handles("value(1,2).1"),
            Some(&[Handle(0), Handle(1)][..])
        );
    }

    #[test]
    fn test_unknown_output_rejected() {
        let err = resolve(&["sum(value(1).7)"]).unwrap_err();
        assert!(matches!(err, RankError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_unknown_feature() {
        let err = resolve(&["nonexistent_feature(1,2)"]).unwrap_err();
        assert_eq!(err, RankError::unknown_feature("nonexistent_feature(1,2)"));

        let err = resolve(&["sum(value(1),nonexistent_feature(1,2))"]).unwrap_err();
        assert!(matches!(err, RankError::UnknownFeature { .. }));
    }

    #[test]
    fn test_basic_chain_resolves() {
        let graph = resolve(&["chain(basic,3,7)"]).unwrap();
        assert_eq!(graph.len(), 5);
        assert_eq!(graph.nodes()[0].name(), "value(7)");
        assert_eq!(graph.nodes()[4].name(), "chain(basic,3,7)");
        assert_topological(&graph);
    }

    #[test]
    fn test_cycle_detected() {
        let err = resolve(&["chain(cycle,4,2)"]).unwrap_err();
        match err {
            RankError::CyclicDependency { path } => {
                assert_eq!(path.first(), path.last());
                assert!(path.len() > 2);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_self_cycle_detected() {
        let err = resolve(&["chain(cycle,1,1)"]).unwrap_err();
        assert_eq!(
            err,
            RankError::cyclic(vec!["chain(cycle,1,1)".into(), "chain(cycle,1,1)".into()])
        );
    }

    #[test]
    fn test_setup_rejects_bad_params() {
        for bad in ["value()", "value(x)", "chain(basic,1)", "chain(loop,1,1)", "sum()"] {
            let err = resolve(&[bad]).unwrap_err();
            assert!(
                matches!(err, RankError::InvalidConfiguration { .. }),
                "{bad}: {err:?}"
            );
        }
    }

    #[test]
    fn test_missing_field_rejected() {
        assert!(resolve(&["matchCount(title)"]).is_ok());
        let err = resolve(&["matchCount(body)"]).unwrap_err();
        assert!(matches!(err, RankError::InvalidConfiguration { .. }));
        let err = resolve(&["attribute(title)"]).unwrap_err();
        assert!(matches!(err, RankError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_depth_limit() {
        let catalog = BlueprintCatalog::with_builtins();
        let env = env();
        let cfg = RankConfig::default().with_max_dependency_depth(3);
        let resolver = GraphResolver::new(&catalog, &env).with_config(&cfg);

        assert!(resolver.resolve(&["chain(basic,1,1)"]).is_ok());
        let err = resolver.resolve(&["chain(basic,5,1)"]).unwrap_err();
        assert!(err.to_string().contains("depth exceeds 3"));
    }

    #[test]
    fn test_decorator_node() {
        let graph = resolve(&["double(sum(value(1),value(2)))"]).unwrap();
        let names: Vec<_> = graph.nodes().iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["value(1)", "value(2)", "double(sum(value(1),value(2)))"]);

        let node = &graph.nodes()[2];
        assert!(node.is_decorated());
        assert_eq!(node.layers()[0].name(), "sum(value(1),value(2))");
        assert_eq!(node.inputs(), &[Handle(0), Handle(1)]);
        // the wrapped feature is private to the decorator
        assert!(graph.handle_of("sum(value(1),value(2))").is_none());
    }

    #[test]
    fn test_nested_decorators() {
        let graph = resolve(&["double(double(value(3)))"]).unwrap();
        assert_eq!(graph.len(), 1);
        let layers: Vec<_> = graph.nodes()[0].layers().iter().map(|l| l.name()).collect();
        assert_eq!(layers, vec!["value(3)", "double(value(3))", "double(double(value(3)))"]);
    }

    #[test]
    fn test_malformed_root() {
        let err = resolve(&["sum(value(1)"]).unwrap_err();
        assert!(matches!(err, RankError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_non_ascii_root_is_an_error() {
        for bad in ["value(1)ü", "sum(value(1),valué(2))"] {
            let err = resolve(&[bad]).unwrap_err();
            assert!(matches!(err, RankError::InvalidConfiguration { .. }), "{bad}: {err:?}");
        }
    }
}
