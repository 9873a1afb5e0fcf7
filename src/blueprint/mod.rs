//! Blueprints: declarative descriptions of feature types.
//!
//! A blueprint prototype is registered once in a
//! [`BlueprintCatalog`](catalog::BlueprintCatalog). For every distinct
//! `(name, parameters)` a query requests, the resolver asks the prototype
//! for a fresh instance and calls [`Blueprint::setup`] on it. Setup
//! validates the parameters against the index environment and declares, via
//! the [`SetupContext`], the features it consumes and the outputs it
//! produces. After setup the instance is never mutated again; the pipeline
//! builder only calls the `&self` factory methods.
//!
//! # Decorators
//!
//! Instead of consuming other features as inputs, a blueprint may
//! [`wrap`](SetupContext::wrap) one feature. The pipeline builder then
//! creates the wrapped feature's executor first and hands it to
//! [`Blueprint::create_decorator`], and the returned executor stands in for
//! both under the decorator's output handles.

pub mod catalog;
pub mod params;

use serde::Serialize;

use crate::env::IndexEnvironment;
use crate::errors::{RankError, Result};
use crate::executor::FeatureExecutor;
use crate::pipeline::QueryContext;

pub use catalog::BlueprintCatalog;

/// Shape of one declared output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputType {
    Number,
    Object,
}

/// One output a blueprint produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputSpec {
    pub name: String,
    pub description: String,
    pub kind: OutputType,
}

/// What a blueprint is willing to accept from an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Only numeric outputs may be bound
    Number,
    /// Numbers and objects are both accepted
    Any,
}

/// One declared, not yet resolved, dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSpec {
    pub name: String,
    pub kind: InputKind,
}

/// Collects the dependencies and outputs a blueprint declares in
/// [`Blueprint::setup`].
pub struct SetupContext<'a> {
    index_env: &'a dyn IndexEnvironment,
    feature: &'a str,
    inputs: Vec<InputSpec>,
    outputs: Vec<OutputSpec>,
    wrapped: Option<String>,
}

impl<'a> SetupContext<'a> {
    pub fn new(index_env: &'a dyn IndexEnvironment, feature: &'a str) -> Self {
        Self {
            index_env,
            feature,
            inputs: Vec::new(),
            outputs: Vec::new(),
            wrapped: None,
        }
    }

    pub fn index_env(&self) -> &'a dyn IndexEnvironment {
        self.index_env
    }

    /// Canonical name of the feature being set up.
    pub fn feature_name(&self) -> &'a str {
        self.feature
    }

    /// Declare a numeric input; returns its input index.
    pub fn define_input(&mut self, name: impl Into<String>) -> usize {
        self.push_input(name.into(), InputKind::Number)
    }

    /// Declare an input that may be a number or an object.
    pub fn define_any_input(&mut self, name: impl Into<String>) -> usize {
        self.push_input(name.into(), InputKind::Any)
    }

    fn push_input(&mut self, name: String, kind: InputKind) -> usize {
        self.inputs.push(InputSpec { name, kind });
        self.inputs.len() - 1
    }

    /// Decorate the executor of feature `name` instead of consuming inputs.
    pub fn wrap(&mut self, name: impl Into<String>) {
        self.wrapped = Some(name.into());
    }

    /// Declare a numeric output; returns its output index.
    pub fn describe_output(&mut self, name: impl Into<String>, description: impl Into<String>) -> usize {
        self.push_output(name.into(), description.into(), OutputType::Number)
    }

    /// Declare a structured output; returns its output index.
    pub fn describe_object_output(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> usize {
        self.push_output(name.into(), description.into(), OutputType::Object)
    }

    fn push_output(&mut self, name: String, description: String, kind: OutputType) -> usize {
        self.outputs.push(OutputSpec {
            name,
            description,
            kind,
        });
        self.outputs.len() - 1
    }

    /// Check the declarations and hand them to the resolver.
    pub(crate) fn finish(self) -> Result<Declarations> {
        if self.wrapped.is_some() && !self.inputs.is_empty() {
            return Err(RankError::invalid_config(
                self.feature,
                "a decorator cannot declare inputs of its own",
            ));
        }
        if self.wrapped.is_none() && self.outputs.is_empty() {
            return Err(RankError::invalid_config(self.feature, "no outputs described"));
        }
        for (i, out) in self.outputs.iter().enumerate() {
            if self.outputs[..i].iter().any(|o| o.name == out.name) {
                return Err(RankError::invalid_config(
                    self.feature,
                    format!("output '{}' described twice", out.name),
                ));
            }
        }
        Ok(Declarations {
            inputs: self.inputs,
            outputs: self.outputs,
            wrapped: self.wrapped,
        })
    }
}

/// What one successful setup declared.
#[derive(Debug, Clone)]
pub(crate) struct Declarations {
    pub inputs: Vec<InputSpec>,
    pub outputs: Vec<OutputSpec>,
    pub wrapped: Option<String>,
}

/// A feature type.
///
/// Implementations must be cheap to instantiate: the catalog keeps one
/// prototype per type and [`create_instance`](Self::create_instance) is
/// called for every distinct parameterization a query uses.
pub trait Blueprint: Send + Sync {
    /// The name this type is registered under, e.g. `"sum"`.
    fn base_name(&self) -> &str;

    /// A fresh, not yet set up instance of this type.
    fn create_instance(&self) -> Box<dyn Blueprint>;

    /// Append the features of this type that should be dumped by default
    /// for the given schema.
    fn visit_dump_features(&self, _index_env: &dyn IndexEnvironment, _out: &mut Vec<String>) {}

    /// Validate `params` and declare inputs and outputs.
    ///
    /// Must fail with [`RankError::InvalidConfiguration`] on bad parameters
    /// or references to fields the schema does not have.
    fn setup(&mut self, ctx: &mut SetupContext<'_>, params: &[String]) -> Result<()>;

    /// Create the per-query executor.
    fn create_executor(&self, _query: &QueryContext<'_>) -> Result<Box<dyn FeatureExecutor>> {
        Err(RankError::executor_creation(
            self.base_name(),
            "blueprint only supports decorating another feature",
        ))
    }

    /// Create an executor that decorates `inner`.
    ///
    /// Only called for blueprints that used [`SetupContext::wrap`].
    fn create_decorator(
        &self,
        _query: &QueryContext<'_>,
        _inner: Box<dyn FeatureExecutor>,
    ) -> Result<Box<dyn FeatureExecutor>> {
        Err(RankError::executor_creation(
            self.base_name(),
            "blueprint does not decorate other features",
        ))
    }
}

impl std::fmt::Debug for dyn Blueprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blueprint")
            .field("base_name", &self.base_name())
            .finish()
    }
}
