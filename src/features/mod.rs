//! Built-in feature blueprints.
//!
//! | Name | Outputs | Value |
//! |------|---------|-------|
//! | `value(v1,…,vn)` | `0`..`n-1` | the constants |
//! | `sum(f1,…,fn)` | `out` | sum of the inputs |
//! | `double(f)` | as `f` | each output of `f` doubled |
//! | `chain(basic\|cycle,steps,v)` | `out` | copies its dependency |
//! | `query(name)` | `out` | rank property of the query |
//! | `attribute(name)` | `out` | per-document attribute value |
//! | `matchCount(field)` | `out` | matched positions in `field` |
//! | `termWeight(field)` | `out` | weight of query terms matching `field` |
//! | `cache(f)` | as `f` | `f`, recomputed only for a new document |

pub mod attribute;
pub mod cache;
pub mod chain;
pub mod double;
pub mod query;
pub mod raw_match;
pub mod sum;
pub mod value;

use tracing::debug;

use crate::blueprint::{Blueprint, BlueprintCatalog};
use crate::errors::Result;

pub use attribute::AttributeBlueprint;
pub use cache::CacheBlueprint;
pub use chain::ChainBlueprint;
pub use double::DoubleBlueprint;
pub use query::QueryBlueprint;
pub use raw_match::{MatchCountBlueprint, TermWeightBlueprint};
pub use sum::SumBlueprint;
pub use value::ValueBlueprint;

/// Every built-in prototype.
pub fn builtins() -> Vec<Box<dyn Blueprint>> {
    vec![
        Box::new(ValueBlueprint::default()),
        Box::new(SumBlueprint),
        Box::new(DoubleBlueprint),
        Box::new(ChainBlueprint),
        Box::new(QueryBlueprint::default()),
        Box::new(AttributeBlueprint::default()),
        Box::new(MatchCountBlueprint::default()),
        Box::new(TermWeightBlueprint::default()),
        Box::new(CacheBlueprint),
    ]
}

/// Register the built-ins into `catalog`.
///
/// Names the catalog already has keep their existing prototype. Two
/// built-ins sharing a name is an error.
pub fn register_builtins(catalog: &mut BlueprintCatalog) -> Result<()> {
    register_all(catalog, builtins())
}

fn register_all(catalog: &mut BlueprintCatalog, prototypes: Vec<Box<dyn Blueprint>>) -> Result<()> {
    let preregistered: Vec<bool> = prototypes
        .iter()
        .map(|p| catalog.contains(p.base_name()))
        .collect();
    for (prototype, keep_existing) in prototypes.into_iter().zip(preregistered) {
        if keep_existing {
            debug!(feature = prototype.base_name(), "keeping registered prototype");
            continue;
        }
        catalog.add_prototype(prototype)?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::blueprint::BlueprintCatalog;
    use crate::env::{FieldKind, SimpleIndexEnvironment, SimpleQueryEnvironment};
    use crate::errors::Result;
    use crate::pipeline::{FeatureSet, RankProgram, RawMatchFeed};
    use crate::types::{DocId, RankConfig};

    pub fn index_env() -> SimpleIndexEnvironment {
        SimpleIndexEnvironment::new()
            .with_field("title", FieldKind::Index)
            .with_field("body", FieldKind::Index)
            .with_field("year", FieldKind::Attribute)
    }

    pub fn compile(features: &[&str], query_env: &SimpleQueryEnvironment) -> Result<RankProgram> {
        let catalog = BlueprintCatalog::with_builtins();
        RankProgram::compile(&catalog, &index_env(), query_env, features, &RankConfig::default())
    }

    pub fn eval(
        features: &[&str],
        query_env: &SimpleQueryEnvironment,
        doc: DocId,
        feed: &impl RawMatchFeed,
    ) -> FeatureSet {
        let program = compile(features, query_env).unwrap();
        let mut md = program.new_match_data();
        program.evaluate(&mut md, doc, feed).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::IndexEnvironment;

    #[test]
    fn test_register_keeps_existing_names() {
        let mut catalog = BlueprintCatalog::new();
        catalog.add_prototype(Box::new(SumBlueprint)).unwrap();
        register_builtins(&mut catalog).unwrap();
        assert_eq!(catalog.len(), builtins().len());
    }

    #[test]
    fn test_duplicate_builtin_names_are_an_error() {
        let mut catalog = BlueprintCatalog::new();
        let err = register_all(&mut catalog, vec![Box::new(SumBlueprint), Box::new(SumBlueprint)])
            .unwrap_err();
        assert!(matches!(err, crate::RankError::InvalidConfiguration { .. }));
        assert!(err.to_string().contains("already registered"), "{err}");
    }

    #[test]
    fn test_builtin_names_are_unique() {
        let mut names: Vec<String> = builtins().iter().map(|b| b.base_name().to_string()).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn test_default_dump_features() {
        let catalog = BlueprintCatalog::with_builtins();
        let env = testing::index_env();
        assert_eq!(env.fields().len(), 3);
        assert_eq!(
            catalog.dump_features(&env),
            vec![
                "attribute(year)",
                "matchCount(title)",
                "matchCount(body)",
                "termWeight(title)",
                "termWeight(body)",
            ]
        );
    }
}
