//! Integration tests for `pinenv inputs` and `pinenv pin`

#![cfg(unix)]

mod common;

use common::{describe, json, TestProject};

#[test]
fn test_inputs_lists_pins() {
    let project = TestProject::new();
    let output = project.run(&["inputs"]);
    assert!(output.status.success(), "{}", describe(&output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("source"), "{stdout}");
    assert!(stdout.contains("overlayA"), "{stdout}");
    assert!(stdout.contains("(overlay)"), "{stdout}");
}

#[test]
fn test_inputs_json_marks_unused() {
    let project = TestProject::new();
    let lock = format!(
        "{}\n[inputs.spare]\nkind = \"channel-date\"\nchannel = \"beta\"\ndate = \"2021-02-01\"\n",
        common::LOCK
    );
    project.create_file("project/pinenv.lock", &lock);

    let output = project.run(&["--json", "inputs"]);
    assert!(output.status.success(), "{}", describe(&output));

    let rows = json(&output);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 4);
    let spare = rows.iter().find(|r| r["name"] == "spare").unwrap();
    assert_eq!(spare["kind"], "channel-date");
    assert_eq!(spare["used"], false);
    let overlay = rows.iter().find(|r| r["name"] == "overlayA").unwrap();
    assert_eq!(overlay["overlay"], true);
    assert_eq!(overlay["used"], true);
}

#[test]
fn test_pin_local_path_rewrites_lock() {
    let project = TestProject::new();
    project.create_file("project/src-v2/Cargo.toml", "[package]\nname = \"shellcaster\"\n");

    let output = project.run(&["pin", "source", "--path", "src-v2"]);
    assert!(output.status.success(), "{}", describe(&output));

    let lock = project.read_file("project/pinenv.lock");
    assert!(lock.contains("src-v2"), "{lock}");
    // Other pins survive, including the overlay flag
    assert!(lock.contains("overlays/a"), "{lock}");
    assert!(lock.contains("overlay = true"), "{lock}");

    let check = project.run(&["--json", "check"]);
    assert!(check.status.success(), "{}", describe(&check));
    let source = json(&check)["source"]["path"].as_str().unwrap().to_string();
    assert!(source.ends_with("src-v2"), "{source}");
}

#[test]
fn test_pin_new_overlay() {
    let project = TestProject::new();
    let output = project.run(&["--json", "pin", "overlayB", "--path", "overlays/b", "--overlay"]);
    assert!(output.status.success(), "{}", describe(&output));

    let result = json(&output);
    assert_eq!(result["name"], "overlayB");
    assert_eq!(result["overlay"], true);

    let listed = json(&project.run(&["--json", "inputs"]));
    assert!(listed
        .as_array()
        .unwrap()
        .iter()
        .any(|r| r["name"] == "overlayB" && r["used"] == false));
}

#[test]
fn test_pin_rejects_invalid_date() {
    let project = TestProject::new();
    let before = project.read_file("project/pinenv.lock");

    let output = project.run(&["pin", "rust", "--channel", "nightly", "--date", "2021-13-40"]);
    assert!(!output.status.success(), "{}", describe(&output));
    assert_eq!(project.read_file("project/pinenv.lock"), before);
}

#[test]
fn test_pin_rejects_short_revision() {
    let project = TestProject::new();
    let output = project.run(&[
        "pin",
        "source",
        "--git",
        "https://example.com/shellcaster.git",
        "--rev",
        "abc123",
    ]);
    assert!(!output.status.success(), "{}", describe(&output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid pin"), "{}", describe(&output));
}

#[test]
fn test_inputs_warns_about_unapplied_overlay() {
    let project = TestProject::new();
    let lock = format!(
        "{}\n[inputs.overlayB]\nkind = \"local-path\"\npath = \"overlays/b\"\noverlay = true\n",
        common::LOCK
    );
    project.create_file("project/pinenv.lock", &lock);

    let output = project.run(&["inputs"]);
    assert!(output.status.success(), "{}", describe(&output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Overlay pin 'overlayB' is not applied"), "{}", describe(&output));
    assert!(!stderr.contains("'overlayA' is not applied"), "{}", describe(&output));
}
