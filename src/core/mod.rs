//! Core business logic module
//!
//! This module contains the resolution and composition pipeline.
//! Processes, network and cache writes belong in [`crate::infra`].
//!
//! # Submodules
//!
//! - [`pins`] - Source pinning table (pinenv.lock)
//! - [`dist`] - Toolchain channel snapshots
//! - [`toolchain`] - Toolchain requests and resolution
//! - [`universe`] - Package universe and package index
//! - [`overlay`] - Overlay composition
//! - [`deps`] - Dependency set builder
//! - [`plan`] - Build plan and fingerprint
//! - [`build_env`] - Build environment setup
//! - [`diagnostics`] - Build failure classification
//! - [`bindings`] - Environment variable templates
//! - [`environment`] - Environment descriptor and scoped sessions
//! - [`manifest`] - Project file (pinenv.toml) parsing and validation
//! - [`project`] - End-to-end composition pipeline
//! - [`check`] - Plan summary without building
//! - [`global_config`] - Global configuration management

pub mod bindings;
pub mod build_env;
pub mod check;
pub mod deps;
pub mod diagnostics;
pub mod dist;
pub mod environment;
pub mod global_config;
pub mod manifest;
pub mod overlay;
pub mod pins;
pub mod plan;
pub mod project;
pub mod toolchain;
pub mod universe;
