//! Command execution abstraction.
//!
//! The [`CommandExecutor`] trait decouples stage orchestration from process
//! spawning. [`ProcessExecutor`] spawns real processes, or nothing at all in
//! dry-run mode. Tests use scripted executors that record calls and return
//! predetermined exit codes.

use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::error::InstallFailure;

/// Exit code reported for a process terminated by a signal.
pub const SIGNAL_EXIT_CODE: i32 = -1;

/// Abstraction over external command execution.
pub trait CommandExecutor {
    /// Run `argv` in `cwd` and return its exit code.
    ///
    /// A non-zero exit code is not an error here; see [`run_checked`].
    fn run(&self, argv: &[String], cwd: &Path) -> Result<i32>;
}

/// Executor that spawns processes with inherited stdout/stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor {
    dry_run: bool,
}

impl ProcessExecutor {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn live() -> Self {
        Self::new(false)
    }

    /// Executor that performs no I/O and reports success for every command.
    pub fn dry_run() -> Self {
        Self::new(true)
    }
}

impl CommandExecutor for ProcessExecutor {
    #[instrument(skip_all, fields(program = argv.first().map(String::as_str), cwd = %cwd.display()))]
    fn run(&self, argv: &[String], cwd: &Path) -> Result<i32> {
        if self.dry_run {
            debug!("dry-run: command not spawned");
            return Ok(0);
        }
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("empty command"))?;
        debug!(command = %render_command(argv), "spawning command");
        let status = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .status()
            .with_context(|| format!("spawn {}", render_command(argv)))?;
        let code = status.code().unwrap_or(SIGNAL_EXIT_CODE);
        debug!(exit_code = code, "command finished");
        Ok(code)
    }
}

/// Run a command and turn a non-zero exit code into [`InstallFailure::CommandFailed`].
pub fn run_checked<E: CommandExecutor + ?Sized>(
    executor: &E,
    argv: &[String],
    cwd: &Path,
) -> Result<()> {
    let code = executor.run(argv, cwd)?;
    if code != 0 {
        warn!(exit_code = code, command = %render_command(argv), "command failed");
        return Err(InstallFailure::CommandFailed {
            command: render_command(argv),
            code,
        }
        .into());
    }
    Ok(())
}

/// Render argv as a single display string.
pub fn render_command(argv: &[String]) -> String {
    argv.join(" ")
}

/// Split a manifest command string on whitespace.
pub fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedExecutor {
        code: i32,
    }

    impl CommandExecutor for FixedExecutor {
        fn run(&self, _argv: &[String], _cwd: &Path) -> Result<i32> {
            Ok(self.code)
        }
    }

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| part.to_string()).collect()
    }

    #[test]
    fn dry_run_executor_never_spawns() {
        let temp = tempfile::tempdir().expect("tempdir");
        let code = ProcessExecutor::dry_run()
            .run(&argv(&["definitely-not-a-real-binary"]), temp.path())
            .expect("dry-run");
        assert_eq!(code, 0);
    }

    #[cfg(unix)]
    #[test]
    fn live_executor_reports_real_exit_code() {
        let temp = tempfile::tempdir().expect("tempdir");
        let code = ProcessExecutor::live()
            .run(&argv(&["sh", "-c", "exit 3"]), temp.path())
            .expect("run");
        assert_eq!(code, 3);
    }

    #[test]
    fn live_executor_errors_on_empty_command() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = ProcessExecutor::live().run(&[], temp.path()).unwrap_err();
        assert!(err.to_string().contains("empty command"));
    }

    #[test]
    fn run_checked_raises_install_failure_on_nonzero() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = run_checked(
            &FixedExecutor { code: 2 },
            &argv(&["git", "pull"]),
            temp.path(),
        )
        .unwrap_err();
        match err.downcast_ref::<InstallFailure>() {
            Some(InstallFailure::CommandFailed { command, code }) => {
                assert_eq!(command, "git pull");
                assert_eq!(*code, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        run_checked(&FixedExecutor { code: 0 }, &argv(&["true"]), temp.path()).expect("ok");
    }

    #[test]
    fn split_command_collapses_whitespace() {
        assert_eq!(
            split_command("  npm   run  setup "),
            vec!["npm", "run", "setup"]
        );
        assert!(split_command("   ").is_empty());
    }
}
