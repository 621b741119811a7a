//! Data directory layout and record writers

use fac_collector::output::{CacheType, DataPaths, RecordFormat};
use fac_collector::Record;
use serde_json::json;

fn records() -> Vec<Record> {
    vec![
        json!({"report_id": "R1", "audit_year": 2022, "auditee_name": "Town, of Somewhere"}),
        json!({"report_id": "R2", "is_major": true, "notes": null}),
    ]
    .into_iter()
    .filter_map(|v| v.as_object().cloned())
    .collect()
}

#[test]
fn test_data_paths_layout() {
    let dir = tempfile::tempdir().unwrap();
    let paths = DataPaths::new(dir.path()).unwrap();

    for sub in ["data/cache", "data/raw", "data/processed", "logs"] {
        assert!(dir.path().join(sub).is_dir(), "{sub} missing");
    }
    assert_eq!(
        paths.cache_path("fac_report_ids", &CacheType::Json).unwrap(),
        dir.path().join("data/cache/fac_report_ids_cache.json")
    );
    assert_eq!(
        paths.cache_path("awards", &"sqlite".parse().unwrap()).unwrap(),
        dir.path().join("data/cache/awards_cache.db")
    );
    assert_eq!(
        paths.log_path("sweep").unwrap(),
        dir.path().join("logs/sweep.log")
    );
    assert!(paths.cache_path("../escape", &CacheType::Json).is_err());
}

#[test]
fn test_json_output_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("general.json");

    RecordFormat::Json.write(&path, &records()).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let back: Vec<Record> = serde_json::from_str(&text).unwrap();
    assert_eq!(back, records());
}

#[test]
fn test_csv_output_uses_union_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("general.csv");

    RecordFormat::Csv.write(&path, &records()).unwrap();

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(
        header,
        vec!["audit_year", "auditee_name", "is_major", "notes", "report_id"]
    );
    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][1], "Town, of Somewhere");
    assert_eq!(&rows[1][0], "");
    assert_eq!(&rows[1][2], "true");
}

#[test]
fn test_clear_cache_by_pattern() {
    let dir = tempfile::tempdir().unwrap();
    let paths = DataPaths::new(dir.path()).unwrap();
    for name in ["fac_ids_cache.json", "fac_awards_cache.json", "other_cache.db"] {
        std::fs::write(paths.cache_dir().join(name), "[]").unwrap();
    }

    let deleted = paths.clear_cache(Some("fac_*"), |_| true).unwrap();
    assert_eq!(deleted, 2);

    let remaining: Vec<String> = paths
        .list_cache_files()
        .unwrap()
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    assert_eq!(remaining, vec!["other_cache.db"]);

    // Declined confirmation deletes nothing
    assert_eq!(paths.clear_cache(None, |_| false).unwrap(), 0);
    assert_eq!(paths.list_cache_files().unwrap().len(), 1);
}
