//! pinenv - pinned, reproducible builds and development shells
//!
//! This library resolves a lock file of pinned inputs, an exact toolchain
//! snapshot and an ordered list of package overlays into one build plan,
//! which is realized either as a build of the application artifact or as a
//! development shell sharing the same dependencies.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Resolution and composition logic (no I/O beyond reading inputs)
//! - [`infra`] - Infrastructure layer (network, git, filesystem, processes)
//! - [`config`] - Configuration and constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;
