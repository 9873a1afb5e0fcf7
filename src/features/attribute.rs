//! `attribute(name)`: per-document value of an attribute field.

use std::sync::Arc;

use crate::blueprint::{params, Blueprint, SetupContext};
use crate::env::{AttributeVector, FieldKind, IndexEnvironment};
use crate::errors::{RankError, Result};
use crate::executor::{ExecutionContext, FeatureExecutor};
use crate::pipeline::QueryContext;

#[derive(Debug, Clone, Default)]
pub struct AttributeBlueprint {
    attribute: String,
}

impl Blueprint for AttributeBlueprint {
    fn base_name(&self) -> &str {
        "attribute"
    }

    fn create_instance(&self) -> Box<dyn Blueprint> {
        Box::new(Self::default())
    }

    fn visit_dump_features(&self, index_env: &dyn IndexEnvironment, out: &mut Vec<String>) {
        for field in index_env.fields() {
            if field.kind == FieldKind::Attribute {
                out.push(format!("attribute({})", field.name));
            }
        }
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>, params: &[String]) -> Result<()> {
        let feature = ctx.feature_name();
        params::expect_count(feature, params, 1)?;
        let field = params::field_of_kind(feature, ctx.index_env(), &params[0], FieldKind::Attribute)?;
        self.attribute = field.name.clone();
        ctx.describe_output("out", "the attribute value, 0 when the document has none");
        Ok(())
    }

    fn create_executor(&self, query: &QueryContext<'_>) -> Result<Box<dyn FeatureExecutor>> {
        let vector = query.attribute(&self.attribute).ok_or_else(|| {
            RankError::executor_creation(
                self.base_name(),
                format!("attribute vector '{}' is not loaded", self.attribute),
            )
        })?;
        Ok(Box::new(AttributeExecutor { vector }))
    }
}

struct AttributeExecutor {
    vector: Arc<dyn AttributeVector>,
}

impl FeatureExecutor for AttributeExecutor {
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let value = self.vector.get(ctx.doc_id()).unwrap_or(0.0);
        ctx.set_number(0, value)
    }
}
