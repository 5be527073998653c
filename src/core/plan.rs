//! Build plan
//!
//! A plan is everything one build invocation needs: the materialized source,
//! the toolchain, the dependency set, the artifact name and the profile. It
//! is built per invocation and consumed immediately. It has no reference to
//! the environment descriptor, so shell configuration cannot influence it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::deps::DependencySet;
use crate::core::pins::PinReference;
use crate::core::toolchain::ToolchainDescription;

/// Cargo build profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Release,
    #[serde(alias = "dev")]
    Debug,
}

impl Profile {
    /// Output directory name under the target dir
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Release => "release",
            Self::Debug => "debug",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// A source input materialized on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceTree {
    /// Logical input name
    pub input: String,
    pub reference: PinReference,
    /// Directory holding the tree
    pub path: PathBuf,
}

/// Everything needed for one build invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildPlan {
    pub artifact: String,
    pub profile: Profile,
    pub source: SourceTree,
    pub toolchain: ToolchainDescription,
    pub dependencies: DependencySet,
}

impl BuildPlan {
    pub fn new(
        artifact: &str,
        profile: Profile,
        source: SourceTree,
        toolchain: ToolchainDescription,
        dependencies: DependencySet,
    ) -> Self {
        Self {
            artifact: artifact.to_string(),
            profile,
            source,
            toolchain,
            dependencies,
        }
    }

    /// Canonical JSON form
    ///
    /// Field order follows the struct definitions and every map in the plan
    /// is ordered, so equal plans always serialize to equal bytes.
    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// SHA-256 of the canonical JSON form
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        let json = self.canonical_json()?;
        Ok(hex::encode(Sha256::digest(json.as_bytes())))
    }

    /// Path of `Cargo.toml` in the source tree
    pub fn manifest_path(&self) -> PathBuf {
        self.source.path.join("Cargo.toml")
    }

    /// Arguments passed to `cargo`
    pub fn cargo_args(&self) -> Vec<String> {
        let mut args = vec!["build".to_string()];
        if self.profile == Profile::Release {
            args.push("--release".to_string());
        }
        args.extend([
            "--target".to_string(),
            self.toolchain.target.clone(),
            "--manifest-path".to_string(),
            self.manifest_path().display().to_string(),
        ]);
        args
    }

    /// Where cargo leaves the artifact inside `target_dir`
    pub fn artifact_path(&self, target_dir: &Path) -> PathBuf {
        target_dir
            .join(&self.toolchain.target)
            .join(self.profile.dir_name())
            .join(&self.artifact)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::deps;
    use crate::core::universe::PackageUniverse;

    pub(crate) fn sample_plan() -> BuildPlan {
        let universe = PackageUniverse::from_index_toml(
            r#"
[packages.pkg-config]
version = "0.29.2"
prefix = "/opt/pkg-config"

[packages.openssl]
version = "1.1.1i"
prefix = "/opt/openssl"
libraries = ["ssl", "crypto"]

[packages.sqlite]
version = "3.34.0"
prefix = "/opt/sqlite"
libraries = ["sqlite3"]
"#,
            Path::new("packages.toml"),
            Path::new("/"),
        )
        .unwrap();
        let dependencies = deps::build(
            &universe,
            &["pkg-config".to_string()],
            &["openssl".to_string(), "sqlite".to_string()],
        )
        .unwrap();

        BuildPlan::new(
            "shellcaster",
            Profile::Release,
            SourceTree {
                input: "source".to_string(),
                reference: PinReference::LocalPath {
                    path: PathBuf::from("src-tree"),
                },
                path: PathBuf::from("/work/src-tree"),
            },
            ToolchainDescription {
                channel: "nightly".to_string(),
                date: Some("2021-01-15".to_string()),
                version: Some("1.51.0-nightly".to_string()),
                components: vec![
                    "rustc".to_string(),
                    "cargo".to_string(),
                    "rust-std".to_string(),
                ],
                extra_targets: Vec::new(),
                target: "x86_64-unknown-linux-gnu".to_string(),
                prefix: PathBuf::from("/toolchains/nightly-2021-01-15-x86_64-unknown-linux-gnu"),
                request: "channel nightly-2021-01-15".to_string(),
            },
            dependencies,
        )
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = sample_plan();
        let b = sample_plan();
        assert_eq!(a.canonical_json().unwrap(), b.canonical_json().unwrap());
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        assert_eq!(a.fingerprint().unwrap().len(), 64);
    }

    #[test]
    fn test_fingerprint_tracks_inputs() {
        let a = sample_plan();
        let mut b = sample_plan();
        b.dependencies.runtime.pop();
        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }

    #[test]
    fn test_cargo_args() {
        let plan = sample_plan();
        assert_eq!(
            plan.cargo_args(),
            vec![
                "build",
                "--release",
                "--target",
                "x86_64-unknown-linux-gnu",
                "--manifest-path",
                "/work/src-tree/Cargo.toml",
            ]
        );

        let mut debug = plan;
        debug.profile = Profile::Debug;
        assert!(!debug.cargo_args().contains(&"--release".to_string()));
    }

    #[test]
    fn test_artifact_path() {
        let plan = sample_plan();
        assert_eq!(
            plan.artifact_path(Path::new("/work/.pinenv/target")),
            PathBuf::from("/work/.pinenv/target/x86_64-unknown-linux-gnu/release/shellcaster")
        );
    }

    #[test]
    fn test_profile_parses_dev_alias() {
        #[derive(Deserialize)]
        struct Wrapper {
            profile: Profile,
        }
        let parsed: Wrapper = toml::from_str("profile = \"dev\"").unwrap();
        assert_eq!(parsed.profile, Profile::Debug);
    }
}
