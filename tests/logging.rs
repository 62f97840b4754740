use std::{fs, thread::sleep, time::Duration};

use serial_test::serial;
use tempfile::tempdir;

#[test]
#[serial]
fn writes_log_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("overlay.log");

    safety_overlay::logging::init(true, Some(path.clone()));
    tracing::info!("overlay test entry");

    sleep(Duration::from_millis(100));

    assert!(path.exists(), "log file was not created");
    let contents = fs::read_to_string(path).unwrap();
    assert!(contents.contains("overlay test entry"));
}

#[test]
#[serial]
fn unusable_log_path_falls_back_to_stderr() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, "").unwrap();

    safety_overlay::logging::init(false, Some(blocker.join("overlay.log")));
    tracing::info!("still logging");

    assert!(!blocker.join("overlay.log").exists());
}
