//! Integration tests for the devnet CLI

use std::path::Path;
use std::process::{Command, Output};

const COMMIT: &str = "a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4e5f6a1b2";

fn devnet(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_devnet"))
        .arg("--home")
        .arg(home)
        .args(args)
        .env("HOME", home)
        .env_remove("DEVNET_HOME")
        .env_remove("DEVNET_RPC_URL")
        .env_remove("DEVNET_REST_URL")
        .env_remove("DEVNET_NETWORK")
        .env_remove("DEVNET_BINARY")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute devnet")
}

#[test]
fn test_cli_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_devnet"))
        .arg("--version")
        .output()
        .expect("Failed to execute devnet");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("devnet"));
}

#[test]
fn test_cli_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_devnet"))
        .arg("--help")
        .output()
        .expect("Failed to execute devnet");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("upgrade"));
    assert!(stdout.contains("cache"));
    assert!(stdout.contains("migrate"));
}

#[test]
fn test_cli_invalid_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_devnet"))
        .arg("invalid-command")
        .output()
        .expect("Failed to execute devnet");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unrecognized subcommand"));
}

#[test]
fn test_status_without_devnet_is_json() {
    let temp = tempfile::tempdir().unwrap();
    let output = devnet(temp.path(), &["--json", "status"]);

    assert!(output.status.success(), "{output:?}");
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["type"], "Status");
    assert!(value["data"]["devnet"].is_null());
    assert_eq!(value["data"]["cached_binaries"], 0);
    assert!(temp.path().join("bin").is_dir());
}

#[test]
fn test_import_missing_binary_fails() {
    let temp = tempfile::tempdir().unwrap();
    let output = devnet(
        temp.path(),
        &[
            "cache",
            "import",
            temp.path().join("nope").to_str().unwrap(),
            "--commit",
            COMMIT,
        ],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"));
}

#[cfg(unix)]
#[test]
fn test_import_then_list() {
    use std::os::unix::fs::PermissionsExt;

    let temp = tempfile::tempdir().unwrap();
    let binary = temp.path().join("simd-build");
    std::fs::write(&binary, "#!/bin/sh\necho v0.50.10\n").unwrap();
    std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();

    let output = devnet(
        temp.path(),
        &[
            "--json",
            "cache",
            "import",
            binary.to_str().unwrap(),
            "--commit",
            COMMIT,
            "--ref",
            "v0.50.10",
        ],
    );
    assert!(output.status.success(), "{output:?}");
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["type"], "CacheChange");
    assert_eq!(value["data"]["operation"], "import");

    let output = devnet(temp.path(), &["--json", "cache", "list"]);
    assert!(output.status.success(), "{output:?}");
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let binaries = value["data"]["binaries"].as_array().unwrap();
    assert_eq!(binaries.len(), 1);
    assert_eq!(binaries[0]["commit_hash"], COMMIT);
    assert_eq!(binaries[0]["git_ref"], "v0.50.10");
}

#[test]
fn test_upgrade_commit_requires_binary() {
    let temp = tempfile::tempdir().unwrap();
    let output = devnet(
        temp.path(),
        &["upgrade", "--skip-governance", "--commit", COMMIT],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--binary"), "{stderr}");
}

#[cfg(unix)]
#[test]
fn test_sigterm_cancels_running_command() {
    use std::os::unix::fs::PermissionsExt;
    use std::process::Stdio;
    use std::time::Duration;

    let temp = tempfile::tempdir().unwrap();
    let binary = temp.path().join("simd-hangs");
    std::fs::write(&binary, "#!/bin/sh\nsleep 30\n").unwrap();
    std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();
    let imported = devnet(
        temp.path(),
        &["cache", "import", binary.to_str().unwrap(), "--commit", COMMIT],
    );
    assert!(imported.status.success(), "{imported:?}");

    // Validation waits on the hanging binary until its timeout
    let child = Command::new(env!("CARGO_BIN_EXE_devnet"))
        .arg("--home")
        .arg(temp.path())
        .args(["cache", "list", "--validate"])
        .env("HOME", temp.path())
        .env_remove("DEVNET_HOME")
        .env_remove("RUST_LOG")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to execute devnet");
    std::thread::sleep(Duration::from_millis(1500));
    let killed = Command::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(killed.success());

    let output = child.wait_with_output().unwrap();
    // Exited through the handler rather than being killed by the signal
    assert!(output.status.code().is_some(), "{output:?}");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Interrupt received"), "{stderr}");
}
