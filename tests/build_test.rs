//! Integration tests for `pinenv build`
//!
//! The fixture toolchain's `cargo` is a script that records its
//! environment and writes the artifact, so a full build runs in
//! milliseconds and without a real compiler.

#![cfg(unix)]

mod common;

use common::{describe, json, TestProject, TARGET};
use std::collections::BTreeMap;

fn build_env(project: &TestProject) -> BTreeMap<String, String> {
    project
        .read_file("project/.pinenv/target/build-env.txt")
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_build_publishes_artifact() {
    let project = TestProject::new();
    let output = project.run(&["--json", "build"]);
    assert!(output.status.success(), "{}", describe(&output));

    assert!(project.file_exists("project/result/shellcaster"));
    assert!(project.file_exists(&format!(
        "project/.pinenv/target/{TARGET}/release/shellcaster"
    )));

    let result = json(&output);
    assert_eq!(result["artifact"]["name"], "shellcaster");
    assert_eq!(result["artifact"]["sha256"].as_str().unwrap().len(), 64);

    let check = json(&project.run(&["--json", "check"]));
    assert_eq!(result["fingerprint"], check["fingerprint"]);
}

#[test]
fn test_build_artifact_is_executable() {
    use std::os::unix::fs::PermissionsExt;

    let project = TestProject::new();
    let output = project.run(&["build"]);
    assert!(output.status.success(), "{}", describe(&output));

    let mode = std::fs::metadata(project.project_dir().join("result/shellcaster"))
        .unwrap()
        .permissions()
        .mode();
    assert_ne!(mode & 0o111, 0);
}

#[test]
fn test_build_out_dir() {
    let project = TestProject::new();
    let out = project.path().join("dist-out");
    let output = project.run(&["build", "--out", out.to_str().unwrap()]);
    assert!(output.status.success(), "{}", describe(&output));
    assert!(out.join("shellcaster").is_file());
    assert!(!project.file_exists("project/result/shellcaster"));
}

#[test]
fn test_build_environment_is_isolated() {
    let project = TestProject::new();
    let output = project
        .command()
        .env("PINENV_LEAK_CHECK", "leaked")
        .env("USER", "builder")
        .args(["build", "--jobs", "3"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", describe(&output));

    let env = build_env(&project);
    assert!(!env.contains_key("PINENV_LEAK_CHECK"));
    assert_eq!(env.get("USER").map(String::as_str), Some("builder"));
    assert_eq!(env.get("CARGO_BUILD_JOBS").map(String::as_str), Some("3"));

    let toolchain_bin = project.toolchain_prefix().join("bin");
    let path = env.get("PATH").unwrap();
    assert!(path.starts_with(&toolchain_bin.display().to_string()), "{path}");
    assert!(path.contains("store/pkg-config/bin"), "{path}");

    let libs = env.get("LIBRARY_PATH").unwrap();
    assert!(libs.contains("store/openssl/lib"), "{libs}");
    assert!(libs.contains("store/sqlite/lib"), "{libs}");
    // Build-time only packages never reach the link path
    assert!(!libs.contains("pkg-config"), "{libs}");
}

#[test]
fn test_build_link_failure() {
    let project = TestProject::new();
    project.create_file("project/src-tree/FAIL_LINK", "");

    let output = project.run(&["build"]);
    assert!(!output.status.success(), "{}", describe(&output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Linking failed"), "{}", describe(&output));
    assert!(stderr.contains("undefined reference"), "{}", describe(&output));
    assert!(!project.file_exists("project/result/shellcaster"));
}

#[test]
fn test_build_compile_failure() {
    let project = TestProject::new();
    project.create_file("project/src-tree/FAIL_COMPILE", "");

    let output = project.run(&["build"]);
    assert!(!output.status.success(), "{}", describe(&output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Compilation failed"), "{}", describe(&output));
    assert!(stderr.contains("E0425"), "{}", describe(&output));
}

#[test]
fn test_build_missing_native_library() {
    let project = TestProject::new();
    project.remove_file("project/pkgs/store/openssl/lib/libcrypto.so");

    let output = project.run(&["build"]);
    assert!(!output.status.success(), "{}", describe(&output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Missing native library 'crypto'"),
        "{}",
        describe(&output)
    );
    // Detected before the build tool starts
    assert!(!project.file_exists("project/.pinenv/target/build-env.txt"));
}

#[test]
fn test_build_requires_installed_toolchain() {
    let project = TestProject::new();
    std::fs::remove_dir_all(project.toolchain_prefix()).unwrap();

    let output = project.run(&["build"]);
    assert!(!output.status.success(), "{}", describe(&output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("is not installed"), "{}", describe(&output));

    // check still composes and reports it
    let check = project.run(&["--json", "check"]);
    assert!(check.status.success(), "{}", describe(&check));
    assert_eq!(json(&check)["toolchain_installed"], false);
}

#[test]
fn test_build_keeps_previous_artifact_on_failure() {
    let project = TestProject::new();
    let first = project.run(&["build"]);
    assert!(first.status.success(), "{}", describe(&first));
    let published = project.read_file("project/result/shellcaster");

    project.create_file("project/src-tree/FAIL_COMPILE", "");
    let second = project.run(&["build"]);
    assert!(!second.status.success());
    assert_eq!(project.read_file("project/result/shellcaster"), published);
}
