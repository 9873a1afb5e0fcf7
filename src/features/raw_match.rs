//! Features over the raw term/field match data of a document.

use crate::blueprint::{params, Blueprint, SetupContext};
use crate::env::{FieldKind, IndexEnvironment};
use crate::errors::Result;
use crate::executor::{ExecutionContext, FeatureExecutor};
use crate::pipeline::QueryContext;
use crate::types::Handle;

fn dump_index_fields(base: &str, index_env: &dyn IndexEnvironment, out: &mut Vec<String>) {
    for field in index_env.fields() {
        if field.kind == FieldKind::Index {
            out.push(format!("{}({})", base, field.name));
        }
    }
}

/// Set up a single-field feature; returns the field id.
fn setup_field(ctx: &mut SetupContext<'_>, params: &[String], description: &str) -> Result<u32> {
    let feature = ctx.feature_name();
    params::expect_count(feature, params, 1)?;
    let field = params::field(feature, ctx.index_env(), &params[0])?.id;
    ctx.describe_output("out", description);
    Ok(field)
}

/// `matchCount(field)`: matched positions of all query terms in `field`.
#[derive(Debug, Clone, Default)]
pub struct MatchCountBlueprint {
    field: u32,
}

impl Blueprint for MatchCountBlueprint {
    fn base_name(&self) -> &str {
        "matchCount"
    }

    fn create_instance(&self) -> Box<dyn Blueprint> {
        Box::new(Self::default())
    }

    fn visit_dump_features(&self, index_env: &dyn IndexEnvironment, out: &mut Vec<String>) {
        dump_index_fields(self.base_name(), index_env, out);
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>, params: &[String]) -> Result<()> {
        self.field = setup_field(ctx, params, "number of matched positions in the field")?;
        Ok(())
    }

    fn create_executor(&self, query: &QueryContext<'_>) -> Result<Box<dyn FeatureExecutor>> {
        let handles = query
            .raw_handles_for_field(self.field)
            .into_iter()
            .map(|(_, h)| h)
            .collect();
        Ok(Box::new(MatchCountExecutor { handles }))
    }
}

struct MatchCountExecutor {
    handles: Vec<Handle>,
}

impl FeatureExecutor for MatchCountExecutor {
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let count: usize = self
            .handles
            .iter()
            .filter_map(|&h| ctx.raw(h))
            .map(|tfmd| tfmd.num_occs())
            .sum();
        ctx.set_number(0, count as f64)
    }
}

/// `termWeight(field)`: summed weight of the query terms matching `field`.
#[derive(Debug, Clone, Default)]
pub struct TermWeightBlueprint {
    field: u32,
}

impl Blueprint for TermWeightBlueprint {
    fn base_name(&self) -> &str {
        "termWeight"
    }

    fn create_instance(&self) -> Box<dyn Blueprint> {
        Box::new(Self::default())
    }

    fn visit_dump_features(&self, index_env: &dyn IndexEnvironment, out: &mut Vec<String>) {
        dump_index_fields(self.base_name(), index_env, out);
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>, params: &[String]) -> Result<()> {
        self.field = setup_field(ctx, params, "weight of matching query terms")?;
        Ok(())
    }

    fn create_executor(&self, query: &QueryContext<'_>) -> Result<Box<dyn FeatureExecutor>> {
        let terms = query.terms();
        let handles = query
            .raw_handles_for_field(self.field)
            .into_iter()
            .filter_map(|(term, h)| terms.get(term as usize).map(|t| (h, t.weight)))
            .collect();
        Ok(Box::new(TermWeightExecutor { handles }))
    }
}

struct TermWeightExecutor {
    handles: Vec<(Handle, f64)>,
}

impl FeatureExecutor for TermWeightExecutor {
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let doc = ctx.doc_id();
        let weight: f64 = self
            .handles
            .iter()
            .filter(|(h, _)| ctx.raw(*h).is_some_and(|tfmd| tfmd.is_match(doc)))
            .map(|(_, w)| w)
            .sum();
        ctx.set_number(0, weight)
    }
}

#[cfg(test)]
mod tests {
    use crate::env::{QueryTerm, SimpleQueryEnvironment};
    use crate::features::testing::{compile, eval};
    use crate::pipeline::{NoMatches, StaticMatchFeed};

    // title = 0, body = 1
    fn query() -> SimpleQueryEnvironment {
        SimpleQueryEnvironment::new()
            .with_term(QueryTerm::new("rust", 100.0, vec![0, 1]))
            .with_term(QueryTerm::new("lang", 40.0, vec![0]))
    }

    #[test]
    fn test_counts_per_field() {
        let feed = StaticMatchFeed::new()
            .with_match(5, 0, 0, vec![0, 3], 1.0)
            .with_match(5, 1, 0, vec![1], 1.0)
            .with_match(5, 0, 1, vec![7], 1.0);
        let fs = eval(
            &["matchCount(title)", "matchCount(body)", "termWeight(title)", "termWeight(body)"],
            &query(),
            5,
            &feed,
        );
        assert_eq!(fs.number("matchCount(title)"), Some(3.0));
        assert_eq!(fs.number("matchCount(body)"), Some(1.0));
        assert_eq!(fs.number("termWeight(title)"), Some(140.0));
        assert_eq!(fs.number("termWeight(body)"), Some(100.0));
    }

    #[test]
    fn test_no_matches_is_zero() {
        let fs = eval(&["matchCount(title)", "termWeight(title)"], &query(), 1, &NoMatches);
        assert_eq!(fs.number("matchCount(title)"), Some(0.0));
        assert_eq!(fs.number("termWeight(title)"), Some(0.0));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(compile(&["matchCount(nope)"], &query()).is_err());
        assert!(compile(&["termWeight()"], &query()).is_err());
    }
}
