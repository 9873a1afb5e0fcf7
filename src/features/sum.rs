//! `sum(f1,…,fn)`: the sum of its inputs.

use crate::blueprint::{params, Blueprint, SetupContext};
use crate::errors::Result;
use crate::executor::{ExecutionContext, FeatureExecutor};
use crate::pipeline::QueryContext;

#[derive(Debug, Clone, Copy, Default)]
pub struct SumBlueprint;

impl Blueprint for SumBlueprint {
    fn base_name(&self) -> &str {
        "sum"
    }

    fn create_instance(&self) -> Box<dyn Blueprint> {
        Box::new(SumBlueprint)
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>, params: &[String]) -> Result<()> {
        params::expect_at_least(ctx.feature_name(), params, 1)?;
        for p in params {
            ctx.define_input(p.as_str());
        }
        ctx.describe_output("out", "sum of all inputs");
        Ok(())
    }

    fn create_executor(&self, _query: &QueryContext<'_>) -> Result<Box<dyn FeatureExecutor>> {
        Ok(Box::new(SumExecutor))
    }
}

struct SumExecutor;

impl FeatureExecutor for SumExecutor {
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let mut sum = 0.0;
        for i in 0..ctx.num_inputs() {
            sum += ctx.input_number(i)?;
        }
        ctx.set_number(0, sum)
    }
}
