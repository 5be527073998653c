//! Toolchain distribution URLs

/// Rust toolchain dist server (channel manifests live under `<date>/`)
pub const DIST_SERVER: &str = "https://static.rust-lang.org/dist";
