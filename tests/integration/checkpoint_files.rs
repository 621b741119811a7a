//! Checkpoint persistence

use fac_collector::downloader::FailedBatch;
use fac_collector::resume::{BatchCheckpoint, ResumeError};

#[test]
fn test_checkpoint_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/awards.json");

    let mut checkpoint = BatchCheckpoint::new("federal_awards", 250, 10);
    let failed = vec![FailedBatch {
        batch_number: 4,
        report_ids: vec!["R1".into(), "R2".into()],
        error: "request timeout".into(),
    }];
    checkpoint.record_progress(5, 1200, &failed);
    checkpoint.save(&path).unwrap();

    let loaded = BatchCheckpoint::load(&path).unwrap();
    assert_eq!(loaded.endpoint(), "federal_awards");
    assert_eq!(loaded.batch_size(), 250);
    assert_eq!(loaded.completed_batches(), 5);
    assert_eq!(loaded.records_collected(), 1200);
    assert_eq!(loaded.failed_batches(), failed.as_slice());
    assert!(!loaded.is_finished());
}

#[test]
fn test_unknown_schema_version_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cp.json");
    let checkpoint = BatchCheckpoint::new("federal_awards", 250, 1);
    let mut value = serde_json::to_value(&checkpoint).unwrap();
    value["schema_version"] = serde_json::json!("9.9.9");
    std::fs::write(&path, value.to_string()).unwrap();

    let err = BatchCheckpoint::load(&path).unwrap_err();
    assert!(matches!(err, ResumeError::SchemaVersionMismatch { .. }));
}

#[test]
fn test_missing_checkpoint_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = BatchCheckpoint::load(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ResumeError::NotFound(_)));
}
