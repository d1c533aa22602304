use std::io::Write;
use std::path::Path;

use financial_reconciliation::{
    compare_fields, EntityStore, FieldMap, FieldValue, JsonFieldExtractor, FieldExtractor,
    MatchKind, ReconcileError, ReconciliationEngine, Resolution, StoreError, METRICS,
};
use tempfile::NamedTempFile;

const DATASET: &str = "Company Name,Industry,Market Capitalization,Revenue (in millions),\
EBITDA (in millions),Net Income (in millions),Debt (in millions),Equity (in millions),\
Enterprise Value (in millions),P/E Ratio,Revenue Growth Rate (%),EBITDA Margin (%),\
Net Income Margin (%),ROE (Return on Equity) (%),ROA (Return on Assets) (%),Current Ratio,\
Debt to Equity Ratio,Location
ExampleCo,Tech,5000,1500,500,200,300,2000,5200,25,10,33.33,13.33,10,5,2.0,0.15,\"San Francisco, CA\"
HealthInc,Healthcare,3000,1000,250,80,150,666,3150,15,12,40,8,13.33,10,1.5,0.25,\"New York, NY\"
Green Energy Ltd,Energy,1200,400,90,30,500,700,1700,18,6,22.5,7.5,4.29,2.1,,0.71,\"Oslo, NO\"
";

fn dataset_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn loaded_store() -> (EntityStore, NamedTempFile) {
    let file = dataset_file(DATASET);
    let store = EntityStore::with_source(file.path());
    store.load().unwrap();
    (store, file)
}

fn fields(pairs: &[(&str, FieldValue)]) -> FieldMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

// -------------------------------------------------------------------------
// Loading
// -------------------------------------------------------------------------

#[test]
fn load_from_file() {
    let (store, file) = loaded_store();
    let status = store.status();

    assert!(status.loaded);
    let summary = status.summary.unwrap();
    assert_eq!(summary.records, 3);
    assert_eq!(summary.source, file.path().display().to_string());
    assert_eq!(store.source(), Some(file.path()));
}

#[test]
fn blank_current_ratio_defaults_to_zero() {
    let (store, _file) = loaded_store();
    let record = store.exact_lookup("Green Energy Ltd").unwrap().unwrap();
    assert_eq!(record.to_fields()["Current Ratio"], FieldValue::Float(0.0));
    assert_eq!(record.metrics().count(), METRICS.len());
}

#[test]
fn load_missing_source_leaves_store_unloaded() {
    let store = EntityStore::with_source("/no/such/dir/database.csv");

    assert!(matches!(store.load(), Err(StoreError::Io { .. })));
    assert!(!store.is_loaded());
    // Unloaded, never NotFound
    assert_eq!(store.resolve("ExampleCo"), Resolution::Unloaded);
    assert!(matches!(store.exact_lookup("ExampleCo"), Err(StoreError::Unloaded)));
}

#[test]
fn fingerprint_tracks_dataset_content() {
    let (store, _file) = loaded_store();
    let first = store.status().summary.unwrap().fingerprint;

    store.reload().unwrap();
    assert_eq!(store.status().summary.unwrap().fingerprint, first);

    let changed = dataset_file(&DATASET.replace("5000,1500", "5100,1500"));
    store.load_path(changed.path()).unwrap();
    assert_ne!(store.status().summary.unwrap().fingerprint, first);
}

// -------------------------------------------------------------------------
// Resolve
// -------------------------------------------------------------------------

#[test]
fn whitespace_variations_resolve_to_same_record() {
    let (store, _file) = loaded_store();

    for name in ["Green Energy Ltd", "GreenEnergyLtd", "Green  Energy\tLtd", " Green Energy Ltd\n"] {
        match store.resolve(name) {
            Resolution::Found { record, .. } => assert_eq!(record.name, "Green Energy Ltd"),
            other => panic!("{:?} did not resolve: {:?}", name, other),
        }
    }
}

#[test]
fn example_co_scenario() {
    let (store, _file) = loaded_store();

    let record = match store.resolve("Example Co") {
        Resolution::Found { record, kind } => {
            assert_eq!(kind, MatchKind::Normalized);
            record
        }
        other => panic!("expected ExampleCo, got {:?}", other),
    };
    assert_eq!(record.name, "ExampleCo");

    let report = ReconciliationEngine::new().compare(
        &fields(&[("Market Capitalization", FieldValue::Integer(5000))]),
        &record,
    );

    assert_eq!(
        serde_json::to_value(&report).unwrap(),
        serde_json::json!({
            "Market Capitalization": {"extracted": 5000, "stored": 5000, "match": true}
        })
    );
}

// -------------------------------------------------------------------------
// Reconcile end to end
// -------------------------------------------------------------------------

#[test]
fn reconcile_extracted_json_document() {
    let (store, _file) = loaded_store();

    let mut document = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    document
        .write_all(
            br#"{
                "Company Name": "HealthInc",
                "Industry": "Healthcare",
                "Market Capitalization": 3000,
                "Revenue (in millions)": 1000.0,
                "Net Income (in millions)": 85.0,
                "Location": "New York, NY",
                "Auditor": "Someone LLP"
            }"#,
        )
        .unwrap();

    let extracted = JsonFieldExtractor::new().extract(document.path()).unwrap();
    let report = ReconciliationEngine::new().reconcile(&store, extracted).unwrap();

    assert_eq!(report.match_kind, MatchKind::Exact);
    assert_eq!(report.discrepancies.len(), 6);
    assert!(report.discrepancies.get("Auditor").is_none());
    assert_eq!(
        report.discrepancies.mismatches().map(|(f, _)| f).collect::<Vec<_>>(),
        vec!["Net Income (in millions)"]
    );
    assert!(!report.is_clean());
    assert_eq!(report.stored_data["Net Income (in millions)"], FieldValue::Float(80.0));
}

#[test]
fn reconcile_not_found_is_not_a_store_error() {
    let (store, _file) = loaded_store();
    let result = ReconciliationEngine::new().reconcile(
        &store,
        fields(&[("Company Name", FieldValue::from("NonExistentCo"))]),
    );
    assert!(matches!(result, Err(ReconcileError::NotFound(_))));
}

#[test]
fn compare_swap_keeps_match_flags() {
    let (store, _file) = loaded_store();
    let stored = store.exact_lookup("ExampleCo").unwrap().unwrap().to_fields();
    let extracted = fields(&[
        ("Company Name", FieldValue::from("ExampleCo")),
        ("Market Capitalization", FieldValue::Float(5000.0)),
        ("EBITDA (in millions)", FieldValue::Integer(499)),
    ]);

    let forward = compare_fields(&extracted, &stored);
    let backward = compare_fields(&stored, &extracted);

    for (field, entry) in forward.iter() {
        assert_eq!(entry.matched, backward.get(field).unwrap().matched, "{}", field);
    }
    assert_eq!(forward.match_count(), 2);
}

#[test]
fn malformed_dataset_reports_line() {
    let broken = DATASET.replace("HealthInc,Healthcare,3000", "HealthInc,Healthcare,3k");
    let file = dataset_file(&broken);
    let store = EntityStore::new();

    let err = store.load_path(Path::new(file.path())).unwrap_err();
    assert!(err.is_load_failure());
    assert!(err.to_string().contains("line 3"), "{}", err);
    assert!(err.to_string().contains("Market Capitalization"), "{}", err);
    assert!(!store.is_loaded());
}
