//! `chain(kind,steps,v)`: generated dependency chains.
//!
//! `chain(basic,n,v)` depends on `chain(basic,n-1,v)` and ends in
//! `value(v)`. `chain(cycle,n,v)` walks down to `chain(cycle,1,v)`, which
//! depends on `chain(cycle,v,v)`, so any `v` in `1..n` closes a cycle.

use crate::blueprint::{params, Blueprint, SetupContext};
use crate::errors::{RankError, Result};
use crate::executor::{ExecutionContext, FeatureExecutor};
use crate::pipeline::QueryContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainKind {
    Basic,
    Cycle,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChainBlueprint;

impl Blueprint for ChainBlueprint {
    fn base_name(&self) -> &str {
        "chain"
    }

    fn create_instance(&self) -> Box<dyn Blueprint> {
        Box::new(ChainBlueprint)
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>, params: &[String]) -> Result<()> {
        let feature = ctx.feature_name();
        params::expect_count(feature, params, 3)?;
        let kind = match params[0].as_str() {
            "basic" => ChainKind::Basic,
            "cycle" => ChainKind::Cycle,
            other => {
                return Err(RankError::invalid_config(
                    feature,
                    format!("unknown chain kind '{}', expected basic or cycle", other),
                ))
            }
        };
        let steps = params::count(feature, params, 1)?;
        let value = &params[2];

        let dependency = match kind {
            ChainKind::Basic if steps > 0 => format!("chain(basic,{},{})", steps - 1, value),
            ChainKind::Basic => format!("value({})", value),
            ChainKind::Cycle if steps > 1 => format!("chain(cycle,{},{})", steps - 1, value),
            ChainKind::Cycle => format!("chain(cycle,{},{})", value, value),
        };
        ctx.define_input(dependency);
        ctx.describe_output("out", "the value at the end of the chain");
        Ok(())
    }

    fn create_executor(&self, _query: &QueryContext<'_>) -> Result<Box<dyn FeatureExecutor>> {
        Ok(Box::new(CopyExecutor))
    }
}

struct CopyExecutor;

impl FeatureExecutor for CopyExecutor {
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let value = ctx.input(0)?;
        ctx.set_output(0, value)
    }
}

#[cfg(test)]
mod tests {
    use crate::env::SimpleQueryEnvironment;
    use crate::errors::RankError;
    use crate::features::testing::{compile, eval};
    use crate::pipeline::NoMatches;

    #[test]
    fn test_basic_chain_copies_the_end_value() {
        let q = SimpleQueryEnvironment::new();
        let fs = eval(&["chain(basic,10,4.5)"], &q, 1, &NoMatches);
        assert_eq!(fs.number("chain(basic,10,4.5)"), Some(4.5));
    }

    #[test]
    fn test_cycle_chain_fails_with_path() {
        let q = SimpleQueryEnvironment::new();
        let err = compile(&["chain(cycle,3,2)"], &q).unwrap_err();
        assert_eq!(
            err,
            RankError::cyclic(vec![
                "chain(cycle,2,2)".into(),
                "chain(cycle,1,2)".into(),
                "chain(cycle,2,2)".into(),
            ])
        );
        assert_eq!(
            err.to_string(),
            "Cyclic dependency: chain(cycle,2,2) -> chain(cycle,1,2) -> chain(cycle,2,2)"
        );
    }
}
