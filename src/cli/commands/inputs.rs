//! Inputs command implementation
//!
//! Implements `pinenv inputs` to list the pinned inputs of the lock file.

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeSet;

use super::common;
use crate::cli::GlobalArgs;
use crate::core::pins::{PinReference, PinnedInput};

#[derive(Debug, Serialize)]
struct InputRow<'a> {
    name: &'a str,
    #[serde(flatten)]
    reference: &'a PinReference,
    hash: Option<&'a str>,
    overlay: bool,
    /// Whether the project uses the input
    used: bool,
}

/// Execute the inputs command
pub async fn execute(global: &GlobalArgs) -> Result<i32> {
    let (_, _, project) = common::load(global)?;
    let manifest = &project.manifest;

    let used = |input: &PinnedInput| {
        let name = input.name.as_str();
        manifest.project.source == name
            || manifest.project.packages.as_deref() == Some(name)
            || manifest.project.overlays.iter().any(|o| o == name)
            || manifest.toolchain.input.as_deref() == Some(name)
    };

    let overlays: BTreeSet<&str> = project.pins.overlays().map(|p| p.name.as_str()).collect();
    for name in &overlays {
        if !manifest.project.overlays.iter().any(|o| o == name) {
            tracing::warn!("Overlay pin '{name}' is not applied: add it to [project].overlays");
        }
    }

    let rows: Vec<InputRow<'_>> = project
        .pins
        .iter()
        .map(|input| InputRow {
            name: &input.name,
            reference: &input.reference,
            hash: input.hash.as_deref(),
            overlay: overlays.contains(input.name.as_str()),
            used: used(input),
        })
        .collect();

    if global.output.json {
        global.output.print_json(&rows)?;
        return Ok(0);
    }

    if rows.is_empty() {
        println!("No inputs pinned in {}", project.lock_path().display());
        return Ok(0);
    }

    for row in &rows {
        let mut flags = Vec::new();
        if row.overlay {
            flags.push("overlay");
        }
        if !row.used {
            flags.push("unused");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" ({})", flags.join(", "))
        };
        println!(
            "{:<16} {:<20} {}{flags}",
            row.name,
            row.reference.kind(),
            row.reference
        );
    }
    Ok(0)
}
