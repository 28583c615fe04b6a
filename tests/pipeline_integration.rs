use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use protest_transition::domain::Value;
use protest_transition::error::PipelineError;
use protest_transition::infra::CsvTableSource;
use protest_transition::pipeline::processing::country::CountryLookup;
use protest_transition::pipeline::processing::join::JoinMode;
use protest_transition::pipeline::steps::PipelineContext;
use protest_transition::pipeline::storage::TableStore;
use protest_transition::pipeline::{PipelineConfig, PipelineOrchestrator};

fn resources() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("resources")
}

fn context(dir: &Path, dpi: PathBuf) -> PipelineContext {
    let paths = HashMap::from([
        ("mass_mobilization".to_string(), resources().join("mass_mobilization.csv")),
        ("polity".to_string(), resources().join("polity.csv")),
        ("dpi".to_string(), dpi),
    ]);
    let lookup = CountryLookup::from_csv(&resources().join("country_lookup.csv")).unwrap();
    let store = TableStore::open(dir.join("pipeline.db")).unwrap();
    PipelineContext::new(
        store,
        Box::new(CsvTableSource::new(paths)),
        lookup,
        dir.join("out"),
    )
}

fn run_full(ctx: &mut PipelineContext) -> Result<(), PipelineError> {
    PipelineOrchestrator::new(PipelineConfig::full())?.run(ctx).map(|_| ())
}

#[test]
fn full_pipeline_produces_reconciled_analysis_table() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = context(dir.path(), resources().join("dpi.csv"));
    let result = PipelineOrchestrator::new(PipelineConfig::full())
        .unwrap()
        .run(&mut ctx)
        .unwrap();
    assert_eq!(result.step_results.len(), 6);

    // The placeholder row without a start date is dropped and the unmapped
    // country is kept under the ignore key.
    let mm = ctx.store.read_table("clean_mass_mobilization").unwrap();
    assert_eq!(mm.len(), 4);
    let unmapped = ctx.store.read_table("unmapped_mass_mobilization").unwrap();
    assert_eq!(unmapped.len(), 1);
    assert_eq!(unmapped.get(0, "raw_key"), Some(&Value::text("Yemen PDR_680")));
    assert_eq!(unmapped.get(0, "rows"), Some(&Value::Int(1)));

    let dpi = ctx.store.read_table("clean_dpi").unwrap();
    let zai = dpi
        .rows
        .iter()
        .position(|r| r[0] == Value::text("2005_ZAI"))
        .expect("DRC resolved to ZAI");
    assert_eq!(dpi.get(zai, "country"), Some(&Value::text("Congo Kinshasa")));

    let joined = ctx.store.read_table("joined").unwrap();
    let keys: Vec<String> = joined.rows.iter().map(|r| r[0].render()).collect();
    assert_eq!(keys, vec!["2005_KEN", "2005_KEN", "2005_ZAI"]);

    let analysis = ctx.store.read_table("analysis").unwrap();
    assert_eq!(analysis.len(), 3);
    let columns: HashSet<&str> = analysis.column_names().into_iter().collect();
    let buckets: HashSet<&str> = ctx.catalog.bucketed_columns().into_iter().collect();
    assert_eq!(columns, buckets);

    assert_eq!(analysis.get(2, "percent"), Some(&Value::Float(0.45)));
    assert_eq!(analysis.get(2, "regime_change"), Some(&Value::Bool(true)));
    assert_eq!(analysis.get(0, "regime_change"), Some(&Value::Bool(false)));
    assert_eq!(analysis.get(0, "stateresponse1"), Some(&Value::text("accommodation")));
    assert_eq!(analysis.get(0, "participants_category"), Some(&Value::Int(3)));
    let duration = analysis.get(2, "duration_log").and_then(|v| v.as_f64()).unwrap();
    assert!((duration - 4f64.ln()).abs() < 1e-12);
    assert!(analysis.get(2, "execrlc").unwrap().is_missing());

    let out = dir.path().join("out");
    let csv = std::fs::read_to_string(out.join("analysis.csv")).unwrap();
    assert_eq!(csv.lines().count(), 4);
    assert!(csv.starts_with("protesterviolence,system,"));
    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("feature_manifest.json")).unwrap())
            .unwrap();
    assert_eq!(manifest["target"], "regime_change");
    assert_eq!(manifest["rows"], 3);

    let entries = ctx.store.manifest().unwrap();
    assert_eq!(entries.len(), 8);
    assert!(entries.iter().all(|e| e.run_id == result.run_id));
}

#[test]
fn rerun_is_deterministic() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let mut a = context(first.path(), resources().join("dpi.csv"));
    let mut b = context(second.path(), resources().join("dpi.csv"));
    run_full(&mut a).unwrap();
    run_full(&mut b).unwrap();

    let fingerprint = |ctx: &PipelineContext| {
        ctx.store
            .manifest()
            .unwrap()
            .into_iter()
            .find(|e| e.name == "analysis")
            .map(|e| e.fingerprint)
            .unwrap()
    };
    assert_eq!(fingerprint(&a), fingerprint(&b));
    assert_ne!(a.store.run_id(), b.store.run_id());
}

#[test]
fn left_outer_join_keeps_every_protest_with_context() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = context(dir.path(), resources().join("dpi.csv"));
    ctx.join_mode = JoinMode::LeftOuter;
    run_full(&mut ctx).unwrap();
    let joined = ctx.store.read_table("joined").unwrap();
    assert_eq!(joined.len(), 3);
}

#[test]
fn duplicate_country_year_is_never_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let original = std::fs::read_to_string(resources().join("dpi.csv")).unwrap();
    let duplicated = original.lines().nth(1).unwrap();
    let dpi = dir.path().join("dpi.csv");
    std::fs::write(&dpi, format!("{}{}\n", original, duplicated)).unwrap();

    let mut ctx = context(dir.path(), dpi);
    match run_full(&mut ctx) {
        Err(PipelineError::DuplicateJoinKey { table, key }) => {
            assert_eq!(table, "clean_dpi");
            assert_eq!(key, "2005_KEN");
        }
        other => panic!("expected DuplicateJoinKey, got {:?}", other),
    }
    assert!(ctx.store.has_table("clean_polity").unwrap());
    assert!(!ctx.store.has_table("clean_dpi").unwrap());
    assert!(!ctx.store.has_table("unmapped_dpi").unwrap());
    assert!(!ctx.store.has_table("joined").unwrap());
    assert!(!ctx.store.has_table("analysis").unwrap());
}

#[test]
fn join_only_reads_previously_cleaned_tables() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut ctx = context(dir.path(), resources().join("dpi.csv"));
        for source in ["mass_mobilization", "polity", "dpi"] {
            PipelineOrchestrator::new(PipelineConfig::clean_only(source))
                .unwrap()
                .run(&mut ctx)
                .unwrap();
        }
    }
    let mut ctx = context(dir.path(), resources().join("dpi.csv"));
    PipelineOrchestrator::new(PipelineConfig::join_only())
        .unwrap()
        .run(&mut ctx)
        .unwrap();
    assert_eq!(ctx.store.read_table("analysis").unwrap().len(), 3);
}
