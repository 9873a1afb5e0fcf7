//! `query(name)`: a numeric rank property passed with the query.
//!
//! The value is looked up as `query(name)`, then as `$name`. Without either
//! the index property `query(name).default` applies, and 0 after that.

use crate::blueprint::{params, Blueprint, SetupContext};
use crate::errors::{RankError, Result};
use crate::executor::FeatureExecutor;
use crate::features::value::ConstantExecutor;
use crate::pipeline::QueryContext;

#[derive(Debug, Clone, Default)]
pub struct QueryBlueprint {
    name: String,
    default: f64,
}

impl QueryBlueprint {
    fn keys(&self) -> [String; 2] {
        [format!("query({})", self.name), format!("${}", self.name)]
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

impl Blueprint for QueryBlueprint {
    fn base_name(&self) -> &str {
        "query"
    }

    fn create_instance(&self) -> Box<dyn Blueprint> {
        Box::new(Self::default())
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>, params: &[String]) -> Result<()> {
        let feature = ctx.feature_name();
        params::expect_count(feature, params, 1)?;
        self.name = params[0].clone();

        let default_key = format!("query({}).default", self.name);
        self.default = match ctx.index_env().property(&default_key) {
            Some(raw) => parse_number(raw).ok_or_else(|| {
                RankError::invalid_config(
                    feature,
                    format!("property '{}' is not a number: '{}'", default_key, raw),
                )
            })?,
            None => 0.0,
        };
        ctx.describe_output("out", "the query property value");
        Ok(())
    }

    fn create_executor(&self, query: &QueryContext<'_>) -> Result<Box<dyn FeatureExecutor>> {
        let mut value = self.default;
        if let Some((key, raw)) = self
            .keys()
            .into_iter()
            .find_map(|key| query.property(&key).map(|raw| (key, raw)))
        {
            value = parse_number(raw).ok_or_else(|| {
                RankError::executor_creation(
                    self.base_name(),
                    format!("query property '{}' is not a number: '{}'", key, raw),
                )
            })?;
        }
        Ok(Box::new(ConstantExecutor::new(vec![value])))
    }
}
