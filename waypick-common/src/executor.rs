use std::process::{Command, Stdio};

use crate::command_builder::Invocation;
use crate::error::{ProcessError, WaypickError};
use crate::Result;

pub trait CommandRunner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }

    fn command(invocation: &Invocation) -> Command {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        apply_session_env(&mut cmd);
        cmd
    }

    fn spawn_detached(invocation: &Invocation) -> Result<()> {
        let mut cmd = Self::command(invocation);
        cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());

        let mut child = cmd.spawn().map_err(|e| {
            WaypickError::Process(ProcessError::Execution {
                command: invocation.to_string(),
                source: e,
            })
        })?;

        // Reap the child whenever it exits so it never lingers as a zombie.
        let command = invocation.program.clone();
        std::thread::spawn(move || match child.wait() {
            Ok(status) => log::debug!("{} exited with {}", command, status),
            Err(e) => log::debug!("Failed to wait for {}: {}", command, e),
        });

        log::info!("Started {}", invocation);
        Ok(())
    }

    fn run_waited(invocation: &Invocation) -> Result<()> {
        let mut cmd = Self::command(invocation);
        cmd.stdin(Stdio::null());

        log::debug!("Executing command: {}", invocation);

        let output = cmd.output().map_err(|e| {
            WaypickError::Process(ProcessError::Execution {
                command: invocation.to_string(),
                source: e,
            })
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.is_empty() {
            log::debug!("{} stdout: {}", invocation.program, stdout.trim_end());
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WaypickError::Process(ProcessError::NonZeroExit {
                command: invocation.to_string(),
                code: output.status.code().unwrap_or(-1),
                stderr: stderr.to_string(),
            }));
        }

        Ok(())
    }
}

impl CommandRunner for ProcessExecutor {
    fn run(&self, invocation: &Invocation) -> Result<()> {
        if invocation.detach {
            Self::spawn_detached(invocation)
        } else {
            Self::run_waited(invocation)
        }
    }
}

// Pass the graphical session through to backends, with fallbacks for
// environments (systemd units, cron) that lack it.
fn apply_session_env(cmd: &mut Command) {
    if std::env::var_os("XDG_RUNTIME_DIR").is_none() {
        let uid = rustix::process::getuid();
        cmd.env("XDG_RUNTIME_DIR", format!("/run/user/{}", uid.as_raw()));
    }

    let has_wayland = std::env::var_os("WAYLAND_DISPLAY").is_some();
    let has_x11 = std::env::var_os("DISPLAY").is_some();
    if !has_wayland && !has_x11 {
        cmd.env("WAYLAND_DISPLAY", "wayland-0");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_success() {
        let executor = ProcessExecutor::new();
        assert!(executor.run(&Invocation::new("true", Vec::<String>::new())).is_ok());
    }

    #[test]
    fn test_run_non_zero_exit() {
        let executor = ProcessExecutor::new();
        let err = executor
            .run(&Invocation::new("sh", ["-c", "echo boom >&2; exit 3"]))
            .unwrap_err();

        match err {
            WaypickError::Process(ProcessError::NonZeroExit { code, stderr, .. }) => {
                assert_eq!(code, 3);
                assert_eq!(stderr.trim(), "boom");
            }
            other => panic!("Expected NonZeroExit, got {:?}", other),
        }
    }

    #[test]
    fn test_run_missing_program() {
        let executor = ProcessExecutor::new();
        let err = executor
            .run(&Invocation::new("waypick-definitely-missing-binary", ["x"]))
            .unwrap_err();
        assert!(matches!(err, WaypickError::Process(ProcessError::Execution { .. })));
    }

    #[test]
    fn test_detached_returns_immediately() {
        let executor = ProcessExecutor::new();
        let started = std::time::Instant::now();
        executor
            .run(&Invocation::new("sleep", ["2"]).detached())
            .unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
    }
}
