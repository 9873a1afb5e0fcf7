//! `value(v1,…,vn)`: constant outputs `0`..`n-1`.

use crate::blueprint::{params, Blueprint, SetupContext};
use crate::errors::Result;
use crate::executor::{ExecutionContext, FeatureExecutor};
use crate::pipeline::QueryContext;

#[derive(Debug, Clone, Default)]
pub struct ValueBlueprint {
    values: Vec<f64>,
}

impl Blueprint for ValueBlueprint {
    fn base_name(&self) -> &str {
        "value"
    }

    fn create_instance(&self) -> Box<dyn Blueprint> {
        Box::new(Self::default())
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>, params: &[String]) -> Result<()> {
        let feature = ctx.feature_name();
        params::expect_at_least(feature, params, 1)?;
        self.values = (0..params.len())
            .map(|i| params::number(feature, params, i))
            .collect::<Result<_>>()?;
        for i in 0..self.values.len() {
            ctx.describe_output(i.to_string(), "the constant value");
        }
        Ok(())
    }

    fn create_executor(&self, _query: &QueryContext<'_>) -> Result<Box<dyn FeatureExecutor>> {
        Ok(Box::new(ConstantExecutor::new(self.values.clone())))
    }
}

/// Writes the same values for every document.
#[derive(Debug, Clone)]
pub struct ConstantExecutor {
    values: Vec<f64>,
}

impl ConstantExecutor {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }
}

impl FeatureExecutor for ConstantExecutor {
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        for (i, &v) in self.values.iter().enumerate() {
            ctx.set_number(i, v)?;
        }
        Ok(())
    }
}
