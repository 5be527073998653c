//! Build environment setup
//!
//! Builds the complete environment of the build invocation from a
//! [`BuildPlan`]: search paths from the dependency set, the toolchain's
//! compiler, the cargo target dir and job count. The ambient environment is
//! not inherited; only allowlisted variables are forwarded.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::defaults::{BUILD_ENV_ALLOWLIST, SYSTEM_PATH};
use crate::core::plan::BuildPlan;

/// Environment of one build invocation
#[derive(Debug, Clone, PartialEq)]
pub struct BuildEnvironment {
    /// Toolchain `bin` dir, first on PATH
    pub toolchain_bin: PathBuf,
    /// Compiler path (RUSTC)
    pub rustc: PathBuf,
    /// Build-time then runtime executable dirs
    pub bin_dirs: Vec<PathBuf>,
    pub lib_dirs: Vec<PathBuf>,
    pub include_dirs: Vec<PathBuf>,
    pub pkgconfig_dirs: Vec<PathBuf>,
    /// Target triple
    pub target: String,
    /// cargo target directory
    pub target_dir: PathBuf,
    /// Number of parallel jobs
    pub jobs: usize,
    /// Additional environment variables
    pub extra_env: BTreeMap<String, String>,
}

impl BuildEnvironment {
    /// Create the environment for a plan
    pub fn for_plan(plan: &BuildPlan, target_dir: PathBuf) -> Self {
        let deps = &plan.dependencies;
        Self {
            toolchain_bin: plan.toolchain.bin_dir(),
            rustc: plan.toolchain.rustc(),
            bin_dirs: deps.bin_dirs(),
            lib_dirs: deps.lib_dirs(),
            include_dirs: deps.include_dirs(),
            pkgconfig_dirs: deps.pkgconfig_dirs(),
            target: plan.toolchain.target.clone(),
            target_dir,
            jobs: num_cpus::get(),
            extra_env: BTreeMap::new(),
        }
    }

    /// Set the number of parallel jobs
    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Add an extra environment variable
    #[must_use]
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.extra_env.insert(key.to_string(), value.to_string());
        self
    }

    /// Forward allowlisted variables from `ambient`
    #[must_use]
    pub fn with_ambient(mut self, ambient: impl IntoIterator<Item = (String, String)>) -> Self {
        for (key, value) in ambient {
            if BUILD_ENV_ALLOWLIST.contains(&key.as_str()) {
                self.extra_env.entry(key).or_insert(value);
            }
        }
        self
    }

    /// Convert to environment variable map for process execution
    pub fn to_env_map(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();

        let mut path: Vec<&Path> = vec![&self.toolchain_bin];
        path.extend(self.bin_dirs.iter().map(PathBuf::as_path));
        env.insert(
            "PATH".to_string(),
            format!("{}:{SYSTEM_PATH}", join_paths(&path)),
        );

        for (key, dirs) in [
            ("LIBRARY_PATH", &self.lib_dirs),
            ("LD_LIBRARY_PATH", &self.lib_dirs),
            ("CPATH", &self.include_dirs),
            ("PKG_CONFIG_PATH", &self.pkgconfig_dirs),
        ] {
            if !dirs.is_empty() {
                let dirs: Vec<&Path> = dirs.iter().map(PathBuf::as_path).collect();
                env.insert(key.to_string(), join_paths(&dirs));
            }
        }

        env.insert("RUSTC".to_string(), self.rustc.display().to_string());
        env.insert(
            "CARGO_TARGET_DIR".to_string(),
            self.target_dir.display().to_string(),
        );
        env.insert("CARGO_BUILD_JOBS".to_string(), self.jobs.to_string());

        for (key, value) in &self.extra_env {
            env.entry(key.clone()).or_insert_with(|| value.clone());
        }

        env
    }
}

/// Join directories into a `:` separated search path
pub fn join_paths(dirs: &[&Path]) -> String {
    dirs.iter()
        .map(|d| d.display().to_string())
        .collect::<Vec<_>>()
        .join(":")
}
