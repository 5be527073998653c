//! Integration tests for `pinenv shell`
//!
//! Batch sessions only: the fixture's hooks append to `hooks.log` in the
//! project directory so their order can be checked afterwards.

#![cfg(unix)]

mod common;

use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use common::{describe, TestProject};

#[test]
fn test_shell_batch_runs_hooks_in_order() {
    let project = TestProject::new();
    let output = project.run(&["shell", "-c", "echo command >> hooks.log"]);
    assert!(output.status.success(), "{}", describe(&output));

    // The interactive-only banner hook is skipped in batch mode
    assert_eq!(project.read_file("project/hooks.log"), "enter\ncommand\nleave\n");
}

#[test]
fn test_shell_exposes_bindings() {
    let project = TestProject::new();
    let output = project.run(&[
        "develop",
        "--batch",
        "-c",
        r#"printf '%s\n%s\n' "$OPENSSL_DIR" "$SQLITE_LIB""#,
    ]);
    assert!(output.status.success(), "{}", describe(&output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2, "{}", describe(&output));
    assert!(lines[0].ends_with("pkgs/store/openssl"), "{stdout}");
    assert!(lines[1].ends_with("overlays/a/store/sqlite/lib"), "{stdout}");
}

#[test]
fn test_shell_toolchain_on_path() {
    let project = TestProject::new();
    let output = project.run(&["shell", "-c", "rustc --version"]);
    assert!(output.status.success(), "{}", describe(&output));
    assert!(String::from_utf8_lossy(&output.stdout).contains("1.51.0-nightly"));
}

#[test]
fn test_shell_propagates_exit_code_and_tears_down() {
    let project = TestProject::new();
    let output = project.run(&["shell", "-c", "exit 3"]);
    assert_eq!(output.status.code(), Some(3), "{}", describe(&output));
    assert_eq!(project.read_file("project/hooks.log"), "enter\nleave\n");
}

#[test]
fn test_shell_failing_hook_aborts_session() {
    let project = TestProject::new();
    let manifest = format!(
        "{}\n[[shell.hooks]]\nname = \"broken\"\nrun = \"exit 7\"\n",
        common::MANIFEST
    );
    project.create_file("project/pinenv.toml", &manifest);

    let output = project.run(&["shell", "-c", "echo command >> hooks.log"]);
    assert!(!output.status.success(), "{}", describe(&output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Hook 'broken' failed"), "{}", describe(&output));

    // Hooks that already ran are torn down; the command never runs
    assert_eq!(project.read_file("project/hooks.log"), "enter\nleave\n");
}

#[test]
fn test_shell_unknown_binding_package() {
    let project = TestProject::new();
    let manifest = common::MANIFEST.replace(
        r#"SQLITE_LIB = "${pkg:sqlite.lib}""#,
        r#"NCURSES = "${pkg:ncurses}""#,
    );
    project.create_file("project/pinenv.toml", &manifest);

    let output = project.run(&["shell", "-c", "true"]);
    assert!(!output.status.success(), "{}", describe(&output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not in the dependency set"), "{}", describe(&output));
    assert!(!project.file_exists("project/hooks.log"));
}

#[test]
fn test_shell_program_not_found() {
    let project = TestProject::new();
    let manifest = common::MANIFEST.replace(
        r#"program = "/bin/sh""#,
        r#"program = "pinenv-no-such-shell""#,
    );
    project.create_file("project/pinenv.toml", &manifest);

    let output = project.run(&["shell", "-c", "true"]);
    assert!(!output.status.success(), "{}", describe(&output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to start shell 'pinenv-no-such-shell'"), "{}", describe(&output));
    assert!(!project.file_exists("project/hooks.log"));
}

#[test]
fn test_shell_sigterm_runs_teardown() {
    let project = TestProject::new();
    let mut child = project
        .command()
        .args(["shell", "-c", "echo command >> hooks.log; sleep 30"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    // Wait until the session command is running
    let deadline = Instant::now() + Duration::from_secs(20);
    while !(project.file_exists("project/hooks.log")
        && project.read_file("project/hooks.log").contains("command"))
    {
        assert!(Instant::now() < deadline, "session command never started");
        thread::sleep(Duration::from_millis(50));
    }

    let killed = Command::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(killed.success());

    let status = child.wait().unwrap();
    assert_eq!(status.code(), Some(143));
    assert_eq!(project.read_file("project/hooks.log"), "enter\ncommand\nleave\n");
}
