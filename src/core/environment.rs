//! Environment composition
//!
//! Realizes an [`EnvironmentDescriptor`] as a [`ScopedSession`]: a
//! session-owned variable map (the process environment is never touched)
//! plus the teardown actions of the hooks that ran. Teardowns run in reverse
//! order when the session is released, or when it is dropped without being
//! released.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::bindings::{self, BindingContext};
use crate::core::build_env::join_paths;
use crate::core::deps::DependencySet;
use crate::core::toolchain::ToolchainDescription;
use crate::error::EnvironmentError;

/// Marker variable set inside every session
pub const ACTIVE_VAR: &str = "PINENV_ACTIVE";

/// How the session is used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// A human at a shell prompt
    Interactive,
    /// A single non-interactive command
    Batch,
}

/// Condition evaluated before a hook runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    Always,
    Interactive,
    Batch,
    /// Run only if the variable is set (and non-empty) in the session
    EnvSet(String),
}

impl Guard {
    /// Parse `always`, `interactive`, `batch` or `env-set:VAR`
    pub fn parse(hook: &str, guard: &str) -> Result<Self, EnvironmentError> {
        match guard {
            "always" => Ok(Self::Always),
            "interactive" => Ok(Self::Interactive),
            "batch" => Ok(Self::Batch),
            other => other
                .strip_prefix("env-set:")
                .filter(|var| !var.is_empty())
                .map(|var| Self::EnvSet(var.to_string()))
                .ok_or_else(|| EnvironmentError::InvalidGuard {
                    hook: hook.to_string(),
                    guard: guard.to_string(),
                }),
        }
    }

    /// Whether a hook with this guard runs
    pub fn allows(&self, mode: SessionMode, env: &BTreeMap<String, String>) -> bool {
        match self {
            Self::Always => true,
            Self::Interactive => mode == SessionMode::Interactive,
            Self::Batch => mode == SessionMode::Batch,
            Self::EnvSet(var) => env.get(var).is_some_and(|v| !v.is_empty()),
        }
    }
}

/// A lifecycle hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hook {
    pub name: String,
    /// Command run on entry
    pub run: String,
    pub guard: Guard,
    /// Command run when the session ends
    pub teardown: Option<String>,
}

/// Everything needed to enter a development environment
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentDescriptor {
    /// Project name, exported as `PINENV_ACTIVE`
    pub name: String,
    pub toolchain: ToolchainDescription,
    /// The same set the build plan uses
    pub dependencies: DependencySet,
    /// Variable name -> template
    pub bindings: BTreeMap<String, String>,
    /// Hooks in declared order
    pub hooks: Vec<Hook>,
}

/// Executes hook commands
pub trait HookRunner {
    /// Run `command` for `hook` with exactly `env` as its environment
    fn run(&self, hook: &str, command: &str, env: &BTreeMap<String, String>) -> Result<(), String>;
}

impl<T: HookRunner + ?Sized> HookRunner for &T {
    fn run(&self, hook: &str, command: &str, env: &BTreeMap<String, String>) -> Result<(), String> {
        (**self).run(hook, command, env)
    }
}

/// Variables composed from the dependency set; bindings may not name them
pub const SEARCH_PATHS: [&str; 5] = ["PATH", "LIBRARY_PATH", "LD_LIBRARY_PATH", "CPATH", "PKG_CONFIG_PATH"];

/// Build the session variables on top of `base`
///
/// Search paths are prefixed, keeping whatever `base` already had after the
/// environment's own entries. A binding named after one of [`SEARCH_PATHS`]
/// is rejected.
pub fn session_env(
    descriptor: &EnvironmentDescriptor,
    base: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>, EnvironmentError> {
    if let Some(name) = descriptor.bindings.keys().find(|k| SEARCH_PATHS.contains(&k.as_str())) {
        return Err(EnvironmentError::ReservedBinding { binding: name.clone() });
    }

    let deps = &descriptor.dependencies;
    let mut env = base.clone();

    let mut bin_dirs = vec![descriptor.toolchain.bin_dir()];
    bin_dirs.extend(deps.bin_dirs());

    let [path, library_path, ld_library_path, cpath, pkg_config_path] = SEARCH_PATHS;
    for (key, dirs) in [
        (path, bin_dirs),
        (library_path, deps.lib_dirs()),
        (ld_library_path, deps.lib_dirs()),
        (cpath, deps.include_dirs()),
        (pkg_config_path, deps.pkgconfig_dirs()),
    ] {
        prepend(&mut env, key, &dirs);
    }

    env.insert(
        "RUSTC".to_string(),
        descriptor.toolchain.rustc().display().to_string(),
    );

    let resolved = bindings::resolve(
        &descriptor.bindings,
        BindingContext {
            dependencies: deps,
            toolchain: &descriptor.toolchain,
        },
    )?;
    env.extend(resolved);

    env.insert(ACTIVE_VAR.to_string(), descriptor.name.clone());
    Ok(env)
}

fn prepend(env: &mut BTreeMap<String, String>, key: &str, dirs: &[PathBuf]) {
    if dirs.is_empty() {
        return;
    }
    let dirs: Vec<&Path> = dirs.iter().map(PathBuf::as_path).collect();
    let mut value = join_paths(&dirs);
    if let Some(existing) = env.get(key).filter(|v| !v.is_empty()) {
        value.push(':');
        value.push_str(existing);
    }
    env.insert(key.to_string(), value);
}

/// An entered environment
///
/// Owns the session variables, the pending teardowns and the runner that
/// executes them.
pub struct ScopedSession<R: HookRunner> {
    env: BTreeMap<String, String>,
    teardowns: Vec<(String, String)>,
    runner: R,
    released: bool,
}

impl<R: HookRunner> std::fmt::Debug for ScopedSession<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedSession")
            .field("env", &self.env)
            .field("teardowns", &self.teardowns)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

/// Enter the environment described by `descriptor`
///
/// Hooks run in declared order. If one fails, the teardowns of the hooks
/// that already ran are executed before the error is returned.
pub fn enter<R: HookRunner>(
    descriptor: &EnvironmentDescriptor,
    mode: SessionMode,
    base: &BTreeMap<String, String>,
    runner: R,
) -> Result<ScopedSession<R>, EnvironmentError> {
    let mut session = ScopedSession {
        env: session_env(descriptor, base)?,
        teardowns: Vec::new(),
        runner,
        released: false,
    };

    for hook in &descriptor.hooks {
        if !hook.guard.allows(mode, &session.env) {
            tracing::debug!("Skipping hook '{}' ({:?})", hook.name, hook.guard);
            continue;
        }

        tracing::info!("Running hook '{}'", hook.name);
        if let Err(error) = session.runner.run(&hook.name, &hook.run, &session.env) {
            if let Err(teardown_error) = session.unwind() {
                tracing::warn!("{teardown_error}");
            }
            return Err(EnvironmentError::HookFailed {
                hook: hook.name.clone(),
                error,
            });
        }

        if let Some(teardown) = &hook.teardown {
            session.teardowns.push((hook.name.clone(), teardown.clone()));
        }
    }

    Ok(session)
}

impl<R: HookRunner> ScopedSession<R> {
    /// Session variables
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Run all teardowns (in reverse) and end the session
    ///
    /// Every teardown runs even if an earlier one fails; the first failure
    /// is returned.
    pub fn release(mut self) -> Result<(), EnvironmentError> {
        self.unwind()
    }

    fn unwind(&mut self) -> Result<(), EnvironmentError> {
        self.released = true;
        let mut first_error = None;

        while let Some((hook, command)) = self.teardowns.pop() {
            tracing::info!("Tearing down hook '{hook}'");
            if let Err(error) = self.runner.run(&hook, &command, &self.env) {
                tracing::warn!("Teardown of hook '{hook}' failed: {error}");
                first_error.get_or_insert(EnvironmentError::HookFailed { hook, error });
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

impl<R: HookRunner> Drop for ScopedSession<R> {
    fn drop(&mut self) {
        if !self.released {
            tracing::debug!("Session dropped without release, running teardowns");
            let _ = self.unwind();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::plan::tests::sample_plan;
    use std::cell::RefCell;

    /// Records commands; fails any command listed in `failing`
    #[derive(Default)]
    struct RecordingRunner {
        calls: RefCell<Vec<String>>,
        failing: Vec<String>,
    }

    impl RecordingRunner {
        fn failing(commands: &[&str]) -> Self {
            Self {
                failing: commands.iter().map(|c| (*c).to_string()).collect(),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl HookRunner for RecordingRunner {
        fn run(&self, _hook: &str, command: &str, _env: &BTreeMap<String, String>) -> Result<(), String> {
            self.calls.borrow_mut().push(command.to_string());
            if self.failing.iter().any(|f| f == command) {
                Err(format!("'{command}' exited with status 1"))
            } else {
                Ok(())
            }
        }
    }

    fn hook(name: &str, guard: Guard, teardown: Option<&str>) -> Hook {
        Hook {
            name: name.to_string(),
            run: format!("enter-{name}"),
            guard,
            teardown: teardown.map(str::to_string),
        }
    }

    fn descriptor(hooks: Vec<Hook>) -> EnvironmentDescriptor {
        let plan = sample_plan();
        EnvironmentDescriptor {
            name: "shellcaster".to_string(),
            toolchain: plan.toolchain,
            dependencies: plan.dependencies,
            bindings: BTreeMap::from([(
                "OPENSSL_DIR".to_string(),
                "${pkg:openssl}".to_string(),
            )]),
            hooks,
        }
    }

    fn base_env() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("PATH".to_string(), "/usr/bin".to_string()),
            ("HOME".to_string(), "/home/dev".to_string()),
        ])
    }

    #[test]
    fn test_guard_parse() {
        assert_eq!(Guard::parse("h", "always").unwrap(), Guard::Always);
        assert_eq!(
            Guard::parse("h", "env-set:CI").unwrap(),
            Guard::EnvSet("CI".to_string())
        );
        assert!(matches!(
            Guard::parse("h", "sometimes"),
            Err(EnvironmentError::InvalidGuard { .. })
        ));
        assert!(Guard::parse("h", "env-set:").is_err());
    }

    #[test]
    fn test_session_env_is_additive() {
        let env = session_env(&descriptor(Vec::new()), &base_env()).unwrap();
        assert_eq!(
            env["PATH"],
            "/toolchains/nightly-2021-01-15-x86_64-unknown-linux-gnu/bin:\
             /opt/pkg-config/bin:/opt/openssl/bin:/opt/sqlite/bin:/usr/bin"
        );
        assert_eq!(env["HOME"], "/home/dev");
        assert_eq!(env["OPENSSL_DIR"], "/opt/openssl");
        assert_eq!(env[ACTIVE_VAR], "shellcaster");
    }

    #[test]
    fn test_binding_cannot_replace_search_path() {
        for name in SEARCH_PATHS {
            let mut descriptor = descriptor(Vec::new());
            descriptor
                .bindings
                .insert(name.to_string(), "/opt/extra/bin:${PATH}".to_string());

            let result = session_env(&descriptor, &base_env());
            assert!(
                matches!(result, Err(EnvironmentError::ReservedBinding { ref binding }) if binding == name),
                "{name}: {result:?}"
            );
        }

        // Names that merely contain a search path are ordinary bindings
        let mut descriptor = descriptor(Vec::new());
        descriptor
            .bindings
            .insert("MANPATH".to_string(), "${pkg:openssl}/share/man".to_string());
        let env = session_env(&descriptor, &base_env()).unwrap();
        assert_eq!(env["MANPATH"], "/opt/openssl/share/man");
    }

    #[test]
    fn test_hooks_run_in_order_and_teardown_reversed() {
        let runner = RecordingRunner::default();
        let hooks = vec![
            hook("db", Guard::Always, Some("stop-db")),
            hook("banner", Guard::Interactive, None),
            hook("cache", Guard::Always, Some("stop-cache")),
        ];

        let session = enter(&descriptor(hooks), SessionMode::Interactive, &base_env(), &runner).unwrap();
        assert_eq!(runner.calls(), vec!["enter-db", "enter-banner", "enter-cache"]);

        session.release().unwrap();
        assert_eq!(
            runner.calls(),
            vec!["enter-db", "enter-banner", "enter-cache", "stop-cache", "stop-db"]
        );
    }

    #[test]
    fn test_guards_skip_hooks() {
        let runner = RecordingRunner::default();
        let hooks = vec![
            hook("banner", Guard::Interactive, None),
            hook("ci", Guard::EnvSet("CI".to_string()), None),
            hook("home", Guard::EnvSet("HOME".to_string()), None),
            hook("batch", Guard::Batch, None),
        ];

        let session = enter(&descriptor(hooks), SessionMode::Batch, &base_env(), &runner).unwrap();
        assert_eq!(runner.calls(), vec!["enter-home", "enter-batch"]);
        session.release().unwrap();
    }

    #[test]
    fn test_failed_hook_unwinds_entered_hooks() {
        let runner = RecordingRunner::failing(&["enter-second"]);
        let hooks = vec![
            hook("first", Guard::Always, Some("stop-first")),
            hook("second", Guard::Always, Some("stop-second")),
            hook("third", Guard::Always, Some("stop-third")),
        ];

        let result = enter(&descriptor(hooks), SessionMode::Batch, &base_env(), &runner);
        assert!(matches!(
            result,
            Err(EnvironmentError::HookFailed { ref hook, .. }) if hook == "second"
        ));
        assert_eq!(runner.calls(), vec!["enter-first", "enter-second", "stop-first"]);
    }

    #[test]
    fn test_drop_without_release_runs_teardowns() {
        let runner = RecordingRunner::default();
        let hooks = vec![
            hook("a", Guard::Always, Some("stop-a")),
            hook("b", Guard::Always, Some("stop-b")),
        ];

        {
            let _session = enter(&descriptor(hooks), SessionMode::Batch, &base_env(), &runner).unwrap();
        }
        assert_eq!(runner.calls(), vec!["enter-a", "enter-b", "stop-b", "stop-a"]);
    }

    #[test]
    fn test_release_reports_first_teardown_failure() {
        let runner = RecordingRunner::failing(&["stop-b"]);
        let hooks = vec![
            hook("a", Guard::Always, Some("stop-a")),
            hook("b", Guard::Always, Some("stop-b")),
        ];

        let session = enter(&descriptor(hooks), SessionMode::Batch, &base_env(), &runner).unwrap();
        let result = session.release();
        assert!(matches!(
            result,
            Err(EnvironmentError::HookFailed { ref hook, .. }) if hook == "b"
        ));
        assert_eq!(runner.calls().last().map(String::as_str), Some("stop-a"));
    }

    #[test]
    fn test_process_environment_untouched() {
        let runner = RecordingRunner::default();
        let session = enter(&descriptor(Vec::new()), SessionMode::Batch, &base_env(), &runner).unwrap();
        assert_eq!(session.env()[ACTIVE_VAR], "shellcaster");
        assert!(std::env::var(ACTIVE_VAR).is_err());
        session.release().unwrap();
    }

    #[test]
    fn test_binding_error_fails_entry_before_hooks() {
        let runner = RecordingRunner::default();
        let mut descriptor = descriptor(vec![hook("a", Guard::Always, Some("stop-a"))]);
        descriptor
            .bindings
            .insert("BAD".to_string(), "${pkg:ncurses}".to_string());

        assert!(matches!(
            enter(&descriptor, SessionMode::Batch, &base_env(), &runner),
            Err(EnvironmentError::UnresolvedDependency { .. })
        ));
        assert!(runner.calls().is_empty());
    }
}
