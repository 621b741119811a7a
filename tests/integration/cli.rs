//! Binary-level behavior

use assert_cmd::Command;

fn fac_collector(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("fac-collector").unwrap();
    cmd.current_dir(dir)
        .env_remove("API_KEY_FAC")
        .env_remove("FAC_BASE_URL")
        .arg("--data-dir")
        .arg(dir);
    cmd
}

#[test]
fn test_missing_api_key_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    fac_collector(dir.path())
        .args(["--min-year", "2016", "--max-year", "2016", "sweep"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_missing_api_key_is_reported_as_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = fac_collector(dir.path())
        .env("RUST_LOG", "fac_collector=error")
        .args(["--min-year", "2016", "--max-year", "2016", "sweep"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("configuration error"), "stderr was: {stderr}");
}

#[test]
fn test_cache_list_needs_no_api_key() {
    let dir = tempfile::tempdir().unwrap();
    fac_collector(dir.path())
        .args(["cache", "list"])
        .assert()
        .success();
    assert!(dir.path().join("data/cache").is_dir());
}

#[test]
fn test_unknown_jurisdiction_rejected() {
    let dir = tempfile::tempdir().unwrap();
    fac_collector(dir.path())
        .env("API_KEY_FAC", "test-key")
        .args(["--jurisdictions", "ZZ", "sweep"])
        .assert()
        .failure();
}
