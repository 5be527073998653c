//! Common test utilities and helpers
//!
//! Builds a complete pinenv project in a temporary directory: a local source
//! tree, a package index with stub native libraries, one overlay, a cached
//! channel manifest and a stub toolchain whose `cargo` is a shell script
//! that "builds" the artifact.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const TARGET: &str = "x86_64-unknown-linux-gnu";
pub const TOOLCHAIN_DIR: &str = "nightly-2021-01-15-x86_64-unknown-linux-gnu";

pub const MANIFEST: &str = r#"
[project]
name = "shellcaster"
source = "source"
packages = "pkgs"
overlays = ["overlayA"]

[toolchain]
channel = "nightly"
date = "2021-01-15"
components = ["rustfmt", "clippy"]
target = "x86_64-unknown-linux-gnu"

[dependencies]
build = ["pkg-config"]
runtime = ["openssl", "sqlite"]

[shell]
program = "/bin/sh"

[shell.env]
OPENSSL_DIR = "${pkg:openssl}"
SQLITE_LIB = "${pkg:sqlite.lib}"

[[shell.hooks]]
name = "log"
run = "echo enter >> hooks.log"
teardown = "echo leave >> hooks.log"

[[shell.hooks]]
name = "banner"
run = "echo banner >> hooks.log"
when = "interactive"
"#;

pub const LOCK: &str = r#"
version = 1

[inputs.source]
kind = "local-path"
path = "src-tree"

[inputs.pkgs]
kind = "local-path"
path = "pkgs"

[inputs.overlayA]
kind = "local-path"
path = "overlays/a"
overlay = true
"#;

const PACKAGES: &str = r#"
[packages.pkg-config]
version = "0.29.2"
prefix = "store/pkg-config"

[packages.openssl]
version = "1.1.1i"
prefix = "store/openssl"
libraries = ["ssl", "crypto"]

[packages.ncurses]
version = "6.2"
prefix = "store/ncurses"
libraries = ["ncursesw"]
"#;

const OVERLAY_A: &str = r#"
[packages.sqlite]
version = "3.34.0"
prefix = "store/sqlite"
libraries = ["sqlite3"]

[packages.openssl]
extends = "openssl"
version = "1.1.1i-patched"
"#;

/// Stub `cargo`: records its environment, honours failure markers in the
/// source tree and writes the artifact where cargo would.
const STUB_CARGO: &str = r#"#!/bin/sh
cmd="$1"
shift
case "$cmd" in
  fmt) echo "stub fmt $*"; exit 0 ;;
  clippy) echo "stub clippy $*"; exit 0 ;;
  build) ;;
  *) echo "unsupported: $cmd" >&2; exit 2 ;;
esac

profile=debug
target=""
manifest=""
while [ $# -gt 0 ]; do
  case "$1" in
    --release) profile=release ;;
    --target) shift; target="$1" ;;
    --manifest-path) shift; manifest="$1" ;;
  esac
  shift
done
src=$(dirname "$manifest")

mkdir -p "$CARGO_TARGET_DIR"
env | sort > "$CARGO_TARGET_DIR/build-env.txt"

if [ -f "$src/FAIL_LINK" ]; then
  echo "error: linking with \`cc\` failed: exit status: 1" >&2
  echo "  = note: main.o: undefined reference to \`initscr'" >&2
  exit 101
fi
if [ -f "$src/FAIL_COMPILE" ]; then
  echo "error[E0425]: cannot find value \`feeds\` in this scope" >&2
  exit 101
fi

out="$CARGO_TARGET_DIR/$target/$profile"
mkdir -p "$out"
printf '#!/bin/sh\necho shellcaster\n' > "$out/shellcaster"
chmod +x "$out/shellcaster"
echo "    Finished release [optimized] target(s)" >&2
"#;

const STUB_RUSTC: &str = "#!/bin/sh\necho \"rustc 1.51.0-nightly (d98d2f57d 2021-01-14)\"\n";

const SNAPSHOT: &str = r#"
manifest-version = "2"
date = "2021-01-15"

[pkg.rustc]
version = "1.51.0-nightly (d98d2f57d 2021-01-14)"
[pkg.rustc.target.x86_64-unknown-linux-gnu]
available = true

[pkg.cargo]
version = "1.51.0-nightly (a73e5b7d5 2021-01-12)"
[pkg.cargo.target.x86_64-unknown-linux-gnu]
available = true

[pkg.rust-std]
version = "1.51.0-nightly (d98d2f57d 2021-01-14)"
[pkg.rust-std.target.x86_64-unknown-linux-gnu]
available = true

[pkg.rustfmt-preview]
version = "1.4.30-nightly (d98d2f57d 2021-01-14)"
[pkg.rustfmt-preview.target.x86_64-unknown-linux-gnu]
available = true

[pkg.clippy-preview]
version = "0.1.51 (d98d2f57d 2021-01-14)"
[pkg.clippy-preview.target.x86_64-unknown-linux-gnu]
available = true

[renames.clippy]
to = "clippy-preview"
[renames.rustfmt]
to = "rustfmt-preview"

[profiles]
minimal = ["rustc", "cargo", "rust-std"]
"#;

/// A complete test project plus isolated pinenv directories
pub struct TestProject {
    /// Temporary directory holding everything
    pub dir: TempDir,
}

impl TestProject {
    /// Project with stub toolchain, cached snapshot and stub libraries
    pub fn new() -> Self {
        let project = Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        };

        project.create_file("project/pinenv.toml", MANIFEST);
        project.create_file("project/pinenv.lock", LOCK);
        project.create_file(
            "project/src-tree/Cargo.toml",
            "[package]\nname = \"shellcaster\"\nversion = \"1.1.0\"\n",
        );
        project.create_file("project/src-tree/src/main.rs", "fn main() {}\n");
        project.create_file("project/pkgs/packages.toml", PACKAGES);
        project.create_file("project/overlays/a/overlay.toml", OVERLAY_A);

        project.create_file("project/pkgs/store/openssl/lib/libssl.so", "");
        project.create_file("project/pkgs/store/openssl/lib/libcrypto.so", "");
        project.create_file("project/overlays/a/store/sqlite/lib/libsqlite3.so", "");
        project.create_executable(
            "project/pkgs/store/pkg-config/bin/pkg-config",
            "#!/bin/sh\nexit 0\n",
        );

        project.create_file("cache/dist/2021-01-15/channel-rust-nightly.toml", SNAPSHOT);

        let bin = format!("toolchains/{TOOLCHAIN_DIR}/bin");
        project.create_executable(&format!("{bin}/cargo"), STUB_CARGO);
        project.create_executable(&format!("{bin}/rustc"), STUB_RUSTC);
        project.create_executable(&format!("{bin}/cargo-fmt"), "#!/bin/sh\nexit 0\n");
        project.create_executable(&format!("{bin}/cargo-clippy"), "#!/bin/sh\nexit 0\n");

        project.create_dir("config");
        project.create_dir("data");
        project
    }

    /// Root of the temporary directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// The pinenv project directory
    pub fn project_dir(&self) -> PathBuf {
        self.dir.path().join("project")
    }

    /// Installed stub toolchain prefix
    pub fn toolchain_prefix(&self) -> PathBuf {
        self.dir.path().join("toolchains").join(TOOLCHAIN_DIR)
    }

    /// Create a file, relative to the temp root
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Create an executable script, relative to the temp root
    pub fn create_executable(&self, name: &str, content: &str) {
        self.create_file(name, content);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let path = self.dir.path().join(name);
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                .expect("Failed to set permissions");
        }
    }

    /// Create a directory, relative to the temp root
    pub fn create_dir(&self, name: &str) {
        std::fs::create_dir_all(self.dir.path().join(name)).expect("Failed to create directory");
    }

    /// Remove a file, relative to the temp root
    pub fn remove_file(&self, name: &str) {
        std::fs::remove_file(self.dir.path().join(name)).expect("Failed to remove file");
    }

    /// Check if a file exists, relative to the temp root
    pub fn file_exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    /// Read a file, relative to the temp root
    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).expect("Failed to read file")
    }

    /// `pinenv` command isolated from the user's directories and network
    pub fn command(&self) -> Command {
        let root = self.dir.path();
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_pinenv"));
        cmd.current_dir(self.project_dir())
            .env("PINENV_CACHE_DIR", root.join("cache"))
            .env("PINENV_CONFIG_DIR", root.join("config"))
            .env("PINENV_DATA_DIR", root.join("data"))
            .env("PINENV_TOOLCHAINS_DIR", root.join("toolchains"))
            .env("PINENV_OFFLINE", "true")
            .env_remove("RUST_LOG");
        cmd
    }

    /// Run `pinenv` with `args`
    pub fn run(&self, args: &[&str]) -> Output {
        self.command()
            .args(args)
            .output()
            .expect("Failed to execute pinenv")
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// stdout and stderr of a run, for assertion messages
pub fn describe(output: &Output) -> String {
    format!(
        "status: {:?}\nstdout:\n{}\nstderr:\n{}",
        output.status.code(),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

/// Parse stdout as JSON
pub fn json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| panic!("invalid JSON ({e}):\n{}", describe(output)))
}

/// Path relative to `root` as a string
pub fn display(root: &Path, relative: &str) -> String {
    root.join(relative).display().to_string()
}
