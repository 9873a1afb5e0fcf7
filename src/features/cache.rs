//! `cache(f)`: evaluates `f` at most once per document.

use crate::blueprint::{params, Blueprint, SetupContext};
use crate::errors::Result;
use crate::executor::{DocCachedExecutor, FeatureExecutor};
use crate::pipeline::QueryContext;

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheBlueprint;

impl Blueprint for CacheBlueprint {
    fn base_name(&self) -> &str {
        "cache"
    }

    fn create_instance(&self) -> Box<dyn Blueprint> {
        Box::new(CacheBlueprint)
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
        Ok(Box::new(DocCachedExecutor::new(inner)))
    }
}

#[cfg(test)]
mod tests {
    use crate::env::SimpleQueryEnvironment;
    use crate::features::testing::compile;
    use crate::pipeline::NoMatches;

    #[test]
    fn test_cached_value_matches_uncached() {
        let q = SimpleQueryEnvironment::new();
        let p = compile(&["cache(sum(value(1),value(2)))", "sum(value(1),value(2))"], &q).unwrap();
        let mut md = p.new_match_data();
        for doc in [1, 1, 2] {
            let fs = p.evaluate(&mut md, doc, &NoMatches).unwrap();
            assert_eq!(fs.number("cache(sum(value(1),value(2)))"), Some(3.0));
            assert_eq!(fs.number("sum(value(1),value(2))"), Some(3.0));
        }
    }
}
