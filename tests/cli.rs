//! Smoke tests of the command line binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn pack(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("kodegen_bundler_pack").unwrap();
    cmd.current_dir(dir.path());
    for var in [
        "KODEGEN_PACK_ID",
        "KODEGEN_PACK_VERSION",
        "KODEGEN_PACK_DIR",
        "KODEGEN_PACK_OUTPUT",
        "KODEGEN_PACK_CHANNEL",
        "KODEGEN_PACK_RUNTIME",
        "KODEGEN_PACK_DELTA",
        "KODEGEN_PACK_SIGN_TEMPLATE",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn app_dir(dir: &TempDir) {
    let app = dir.path().join("app");
    std::fs::create_dir_all(&app).unwrap();
    std::fs::write(app.join("MyApp"), b"#!/bin/sh\n").unwrap();
}

#[test]
fn missing_arguments_exit_with_configuration_code() {
    let dir = TempDir::new().unwrap();
    pack(&dir)
        .args(["-u", "MyApp"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--pack-version is required"));
}

#[test]
fn invalid_channel_exits_with_configuration_code() {
    let dir = TempDir::new().unwrap();
    app_dir(&dir);
    pack(&dir)
        .args(["-u", "MyApp", "-v", "1.0.0", "-p", "app", "-c", "bad channel"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid channel"));
    assert!(!dir.path().join("Releases").exists());
}

#[cfg(target_os = "linux")]
#[test]
fn packages_application_directory() {
    let dir = TempDir::new().unwrap();
    app_dir(&dir);
    pack(&dir)
        .args(["-u", "MyApp", "-v", "1.0.0", "-p", "app", "-o", "out", "-r", "linux-x64"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Packaged MyApp 1.0.0 (channel: linux)"));

    let out = dir.path().join("out");
    assert!(out.join("MyApp-1.0.0-linux-full.nupkg").is_file());
    assert!(out.join("MyApp-linux-Portable.zip").is_file());
    assert!(out.join("MyApp-linux-Setup.tar.gz").is_file());
    assert!(out.join("releases.linux.json").is_file());
}

#[cfg(target_os = "linux")]
#[test]
fn reads_configuration_file() {
    let dir = TempDir::new().unwrap();
    app_dir(&dir);
    std::fs::write(
        dir.path().join("kodegen-pack.toml"),
        "pack-id = \"MyApp\"\npack-version = \"2.0.0\"\npack-dir = \"app\"\nchannel = \"beta\"\ndelta = \"none\"\n",
    )
    .unwrap();

    pack(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("2.0.0-beta"));

    assert!(
        dir.path()
            .join("Releases/MyApp-2.0.0-beta-linux-full.nupkg")
            .is_file()
    );
}
