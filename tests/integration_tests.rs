//! Integration tests for rapid_rankfeatures

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use rapid_rankfeatures::blueprint::params;
use rapid_rankfeatures::*;
use serde_json::json;

static TRACING: Once = Once::new();

/// Route library logs to the test output; filter with `RUST_LOG`.
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// `counted(f)`: passes `f` through and counts its executions.
#[derive(Clone)]
struct CountedBlueprint {
    runs: Arc<AtomicUsize>,
}

impl Blueprint for CountedBlueprint {
    fn base_name(&self) -> &str {
        "counted"
    }

    fn create_instance(&self) -> Box<dyn Blueprint> {
        Box::new(self.clone())
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>, params: &[String]) -> Result<()> {
        params::expect_count(ctx.feature_name(), params, 1)?;
        ctx.define_input(params[0].as_str());
        ctx.describe_output("out", "the input");
        Ok(())
    }

    fn create_executor(&self, _query: &QueryContext<'_>) -> Result<Box<dyn FeatureExecutor>> {
        let runs = Arc::clone(&self.runs);
        Ok(Box::new(move |ctx: &mut ExecutionContext<'_>| {
            runs.fetch_add(1, Ordering::SeqCst);
            let v = ctx.input(0)?;
            ctx.set_output(0, v)
        }))
    }
}

/// `nan`: a feature that is never a number.
struct NanBlueprint;

impl Blueprint for NanBlueprint {
    fn base_name(&self) -> &str {
        "nan"
    }

    fn create_instance(&self) -> Box<dyn Blueprint> {
        Box::new(NanBlueprint)
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>, _params: &[String]) -> Result<()> {
        ctx.describe_output("out", "NaN");
        Ok(())
    }

    fn create_executor(&self, _query: &QueryContext<'_>) -> Result<Box<dyn FeatureExecutor>> {
        Ok(Box::new(|ctx: &mut ExecutionContext<'_>| ctx.set_number(0, f64::NAN)))
    }
}

fn catalog() -> (BlueprintCatalog, Arc<AtomicUsize>) {
    let runs = Arc::new(AtomicUsize::new(0));
    let mut catalog = BlueprintCatalog::new();
    catalog
        .add_prototype(Box::new(CountedBlueprint {
            runs: Arc::clone(&runs),
        }))
        .unwrap();
    catalog.add_prototype(Box::new(NanBlueprint)).unwrap();
    features::register_builtins(&mut catalog).unwrap();
    (catalog, runs)
}

fn index_env() -> SimpleIndexEnvironment {
    SimpleIndexEnvironment::new()
        .with_field("title", FieldKind::Index)
        .with_field("body", FieldKind::Index)
        .with_field("year", FieldKind::Attribute)
}

fn query_env() -> SimpleQueryEnvironment {
    let years: MapAttribute = (0..500u32).map(|doc| (doc, 2000.0 + (doc % 25) as f64)).collect();
    SimpleQueryEnvironment::new()
        .with_term(QueryTerm::new("rust", 100.0, vec![0, 1]))
        .with_term(QueryTerm::new("graph", 60.0, vec![0]))
        .with_property("$boost", "1.5")
        .with_attribute("year", years)
}

fn compile(catalog: &BlueprintCatalog, features: &[&str], config: &RankConfig) -> Result<RankProgram> {
    RankProgram::compile(catalog, &index_env(), &query_env(), features, config)
}

/// Deterministic matches: the title matches on every document divisible by
/// 3, the body on every even one.
fn synthetic_matches(doc: DocId, w: &mut RawMatchWriter<'_>) {
    if doc % 3 == 0 {
        w.record(0, 0, &[0, doc % 7], 100.0);
        w.record(1, 0, &[2], 60.0);
    }
    if doc % 2 == 0 {
        w.record(0, 1, &[doc % 11], 100.0);
    }
}

#[test]
fn test_double_of_sum_over_raw_data() {
    init_tracing();
    let (catalog, _) = catalog();
    let p = compile(&catalog, &["double(sum(matchCount(title)))"], &RankConfig::default()).unwrap();
    let feed = StaticMatchFeed::new().with_match(1, 0, 0, vec![1, 5, 9], 100.0);

    let mut md = p.new_match_data();
    let fs = p.evaluate(&mut md, 1, &feed).unwrap();
    assert_eq!(fs.number("double(sum(matchCount(title)))"), Some(6.0));
}

#[test]
fn test_shared_dependency_runs_once_per_document() {
    let (catalog, runs) = catalog();
    let p = compile(
        &catalog,
        &[
            "counted(value(2))",
            "sum(counted(value(2)),counted( value(2) ))",
            "double(sum(counted(value(2))))",
        ],
        &RankConfig::default(),
    )
    .unwrap();

    let outcome = p.evaluate_all(&[1, 2, 3], &NoMatches).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 3);
    for fs in &outcome.results {
        assert_eq!(fs.number("counted(value(2))"), Some(2.0));
        assert_eq!(fs.number("sum(counted(value(2)),counted( value(2) ))"), Some(4.0));
        assert_eq!(fs.number("double(sum(counted(value(2))))"), Some(4.0));
    }
}

#[test]
fn test_reused_match_data_does_not_leak_between_documents() {
    let (catalog, _) = catalog();
    let p = compile(&catalog, &["matchCount(title)", "termWeight(title)"], &RankConfig::default())
        .unwrap();
    let feed = StaticMatchFeed::new()
        .with_match(1, 0, 0, vec![0, 1], 100.0)
        .with_match(1, 1, 0, vec![4], 60.0);

    let mut md = p.new_match_data();
    let first = p.evaluate(&mut md, 1, &feed).unwrap();
    assert_eq!(first.number("matchCount(title)"), Some(3.0));
    assert_eq!(first.number("termWeight(title)"), Some(160.0));

    let second = p.evaluate(&mut md, 2, &feed).unwrap();
    assert_eq!(second.number("matchCount(title)"), Some(0.0));
    assert_eq!(second.number("termWeight(title)"), Some(0.0));
}

#[test]
fn test_stale_raw_data_is_ignored() {
    let (catalog, _) = catalog();
    let p = compile(&catalog, &["matchCount(title)"], &RankConfig::default()).unwrap();
    let handle = p.pipeline().handle_of("matchCount(title)").unwrap();

    let mut md = p.new_match_data();
    md.reset(1);
    RawMatchWriter::new(p.pipeline().layout(), &mut md).record(0, 0, &[1, 2], 100.0);
    // document 2 starts without a fill, the slot still holds document 1
    md.reset(2);
    assert_eq!(p.pipeline().get_value(&mut md, handle).unwrap(), FeatureValue::Number(0.0));
}

#[test]
fn test_unknown_feature() {
    let (catalog, _) = catalog();
    let err = compile(&catalog, &["nonexistent_feature(1,2)"], &RankConfig::default()).unwrap_err();
    assert_eq!(err, RankError::unknown_feature("nonexistent_feature(1,2)"));
    assert_eq!(err.code(), ErrorCode::UnknownFeature);
}

#[test]
fn test_bad_parameters_are_configuration_errors() {
    let (catalog, _) = catalog();
    for bad in ["value(x)", "sum()", "matchCount(missing)", "attribute(title)", "chain(basic,x,1)"] {
        let err = compile(&catalog, &[bad], &RankConfig::default()).unwrap_err();
        assert!(
            matches!(err, RankError::InvalidConfiguration { .. }),
            "{bad}: {err:?}"
        );
    }
}

#[test]
fn test_cycle_reported_with_path() {
    let (catalog, _) = catalog();
    let err = compile(&catalog, &["chain(cycle,4,2)"], &RankConfig::default()).unwrap_err();
    assert!(matches!(err, RankError::CyclicDependency { .. }));
    assert!(err.to_string().contains("chain(cycle,2,2) -> chain(cycle,1,2) -> chain(cycle,2,2)"));
}

#[test]
fn test_summary_features_from_profile() {
    init_tracing();
    let (catalog, _) = catalog();
    let profile = RankProfileSpec::from_json(
        r#"{
            "v": 1,
            "features": ["sum(query(boost),attribute(year))"],
            "summary_features": ["nan", "query(boost)", "attribute(year)"]
        }"#,
    )
    .unwrap();
    let p = RankProgram::from_profile(&catalog, &index_env(), &query_env(), &profile).unwrap();

    let mut md = p.new_match_data();
    let fs = p.evaluate(&mut md, 4, &NoMatches).unwrap();
    assert_eq!(fs.number("sum(query(boost),attribute(year))"), Some(2005.5));

    let writer = p.summary_writer();
    // nan was never demanded by ranking
    assert_eq!(
        serde_json::Value::Object(writer.write(&md)),
        json!({ "query(boost)": 1.5, "attribute(year)": 2004.0 })
    );
    assert_eq!(
        serde_json::Value::Object(writer.write_computing(p.pipeline(), &mut md).unwrap()),
        json!({ "nan": null, "query(boost)": 1.5, "attribute(year)": 2004.0 })
    );
}

#[test]
fn test_dump_features_from_profile() {
    init_tracing();
    let (catalog, runs) = catalog();
    let profile = RankProfileSpec::from_json(
        r#"{
            "v": 1,
            "features": ["value(1)"],
            "summary_features": ["value(1)"],
            "dump_features": ["counted(value(2))", "sum(query(boost),value(2))"]
        }"#,
    )
    .unwrap();
    let p = RankProgram::from_profile(&catalog, &index_env(), &query_env(), &profile).unwrap();

    let mut md = p.new_match_data();
    let fs = p.evaluate(&mut md, 7, &NoMatches).unwrap();
    assert_eq!(fs.len(), 1);
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    let dump = p.dump_writer();
    assert_eq!(
        dump.names().collect::<Vec<_>>(),
        vec!["counted(value(2))", "sum(query(boost),value(2))"]
    );
    assert!(dump.write(&md).is_empty());

    let text = dump.write_dump(p.pipeline(), &mut md).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(
        parsed,
        json!({ "counted(value(2))": 2.0, "sum(query(boost),value(2))": 3.5 })
    );
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(p.summary_writer().names().collect::<Vec<_>>(), vec!["value(1)"]);
}

#[test]
fn test_dump_writer_empty_without_profile() {
    let (catalog, _) = catalog();
    let p = compile(&catalog, &["value(3)"], &RankConfig::default()).unwrap();
    assert!(p.dump_writer().is_empty());
}

#[test]
fn test_summary_omits_unknown_names() {
    let (catalog, _) = catalog();
    let p = compile(&catalog, &["value(3)"], &RankConfig::default()).unwrap();
    let writer = SummaryFeaturesWriter::new(p.pipeline(), &["value(3)", "value(4)", "nope"]);
    let mut md = p.new_match_data();
    p.evaluate(&mut md, 1, &NoMatches).unwrap();
    assert_eq!(writer.len(), 1);
    assert_eq!(writer.write_string(&md).unwrap(), r#"{"value(3)":3.0}"#);
}

#[test]
fn test_timeout_keeps_partial_results() {
    init_tracing();
    let (catalog, _) = catalog();
    let config = RankConfig::default().with_query_timeout_ms(50);
    let p = compile(&catalog, &["matchCount(title)"], &config).unwrap();

    let slow_feed = |doc: DocId, w: &mut RawMatchWriter<'_>| {
        std::thread::sleep(Duration::from_millis(30));
        w.record(0, 0, &[doc], 100.0);
    };
    let docs: Vec<DocId> = (0..10).collect();
    let outcome = p.evaluate_all(&docs, &slow_feed).unwrap();

    assert!(!outcome.results.is_empty());
    assert!(!outcome.is_complete());
    assert_eq!(outcome.results.len() + outcome.timed_out.len(), docs.len());
    assert_eq!(outcome.timed_out.last(), Some(&9));
    assert!(outcome
        .results
        .iter()
        .all(|fs| fs.number("matchCount(title)") == Some(1.0)));
}

#[test]
fn test_parallel_matches_sequential() {
    let (catalog, _) = catalog();
    let features = [
        "matchCount(title)",
        "termWeight(body)",
        "double(sum(matchCount(title),matchCount(body),attribute(year)))",
        "sum(query(boost),cache(termWeight(title)))",
    ];
    let config = RankConfig::default().with_max_threads(4);
    let p = compile(&catalog, &features, &config).unwrap();
    let docs: Vec<DocId> = (0..300).collect();

    let sequential = p.evaluate_all(&docs, &synthetic_matches).unwrap();
    let parallel = p.evaluate_parallel(&docs, &synthetic_matches).unwrap();
    assert!(sequential.is_complete());
    assert_eq!(parallel, sequential.results);

    let d6 = &parallel[6];
    assert_eq!(d6.number("matchCount(title)"), Some(3.0));
    assert_eq!(d6.number("termWeight(body)"), Some(100.0));
    assert_eq!(
        d6.number("double(sum(matchCount(title),matchCount(body),attribute(year)))"),
        Some(2.0 * (3.0 + 1.0 + 2006.0))
    );
}

#[test]
fn test_cache_skips_repeat_evaluation_of_a_document() {
    let (catalog, runs) = catalog();
    let p = compile(&catalog, &["cache(counted(value(1)))"], &RankConfig::default()).unwrap();
    let mut md = p.new_match_data();

    for doc in [7, 7, 7, 8] {
        let fs = p.evaluate(&mut md, doc, &NoMatches).unwrap();
        assert_eq!(fs.number("cache(counted(value(1)))"), Some(1.0));
    }
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[test]
fn test_dump_features_resolve() {
    let (catalog, _) = catalog();
    let dump = catalog.dump_features(&index_env());
    assert!(dump.contains(&"attribute(year)".to_string()));
    let names: Vec<&str> = dump.iter().map(String::as_str).collect();
    let p = compile(&catalog, &names, &RankConfig::default()).unwrap();
    assert_eq!(p.roots().len(), dump.len());

    let mut md = p.new_match_data();
    let fs = p.evaluate(&mut md, 6, &synthetic_matches).unwrap();
    assert_eq!(fs.number("matchCount(body)"), Some(1.0));
    assert_eq!(fs.number("termWeight(title)"), Some(160.0));
}

#[test]
fn test_match_data_from_another_pipeline_rejected() {
    let (catalog, _) = catalog();
    let small = compile(&catalog, &["value(1)"], &RankConfig::default()).unwrap();
    let large = compile(&catalog, &["sum(value(1),value(2))"], &RankConfig::default()).unwrap();
    let mut md = small.new_match_data();
    let err = large.evaluate(&mut md, 1, &NoMatches).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InternalInvariant);
    assert!(err.is_fatal());
}
