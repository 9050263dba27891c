use std::{fs, path::PathBuf, process::Command};

fn scratch_directory(name: &str) -> PathBuf {
    let directory =
        std::env::temp_dir().join(format!("fleet-console-cli-{name}-{}", std::process::id()));
    fs::create_dir_all(&directory).expect("scratch directory");
    directory
}

#[test]
fn headless_fixture_run_succeeds() {
    let fixtures = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures/warehouse");

    let output = Command::new(env!("CARGO_BIN_EXE_fleet-console"))
        .arg("--fixtures")
        .arg(&fixtures)
        .args(["--headless", "--duration-secs", "1", "--log-filter", "info"])
        .output()
        .expect("failed to launch fleet-console");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stderr).contains("headless session finished"));
}

#[test]
fn rejected_grid_exits_with_failure() {
    let directory = scratch_directory("rejected-grid");
    fs::write(
        directory.join("grid.json"),
        r#"{"width": 4, "height": 4, "resolution": 0.5, "occupancy": [0, 0, 0]}"#,
    )
    .expect("grid fixture");

    let output = Command::new(env!("CARGO_BIN_EXE_fleet-console"))
        .arg("--fixtures")
        .arg(&directory)
        .args(["--headless", "--duration-secs", "1"])
        .output()
        .expect("failed to launch fleet-console");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("occupancy grid rejected"));

    let _ = fs::remove_dir_all(&directory);
}

#[test]
fn a_feed_must_be_chosen() {
    let output = Command::new(env!("CARGO_BIN_EXE_fleet-console"))
        .args(["--headless", "--duration-secs", "1"])
        .output()
        .expect("failed to launch fleet-console");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--demo"));
}
