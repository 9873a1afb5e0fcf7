//! `double(f)`: decorates `f`, doubling each of its outputs.

use crate::blueprint::{params, Blueprint, SetupContext};
use crate::errors::Result;
use crate::executor::{ChainExecutor, FeatureExecutor};
use crate::pipeline::QueryContext;
use crate::types::FeatureValue;

#[derive(Debug, Clone, Copy, Default)]
pub struct DoubleBlueprint;

impl Blueprint for DoubleBlueprint {
    fn base_name(&self) -> &str {
        "double"
    }

    fn create_instance(&self) -> Box<dyn Blueprint> {
        Box::new(DoubleBlueprint)
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>, params: &[String]) -> Result<()> {
        params::expect_count(ctx.feature_name(), params, 1)?;
        ctx.wrap(params[0].as_str());
        Ok(())
    }

    fn create_decorator(
        &self,
        _query: &QueryContext<'_>,
        inner: Box<dyn FeatureExecutor>,
    ) -> Result<Box<dyn FeatureExecutor>> {
        Ok(Box::new(ChainExecutor::new(inner, |_, value| double(value))))
    }
}

fn double(value: FeatureValue) -> FeatureValue {
    match value {
        FeatureValue::Number(n) => FeatureValue::Number(n * 2.0),
        FeatureValue::Object(values) => {
            FeatureValue::object(values.iter().map(|v| v * 2.0).collect::<Vec<_>>())
        }
    }
}
