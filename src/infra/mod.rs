//! Infrastructure layer
//!
//! Handles all I/O operations: network, filesystem, and external processes.
//! The core reaches these through the `SourceProvider`, `SnapshotIndex` and
//! `HookRunner` traits.

pub mod dirs;
pub mod dist;
pub mod executor;
pub mod filesystem;
pub mod git;
pub mod hooks;
pub mod native;
pub mod publish;
