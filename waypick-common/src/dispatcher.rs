use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::backend::{BackendDescriptor, BackendKind};
use crate::command_builder::{CommandBuilder, DispatchTarget, Invocation};
use crate::error::{BackendError, ErrorReporting, ProcessError, WaypickError};
use crate::executor::{CommandRunner, ProcessExecutor};
use crate::media::MonitorTarget;
use crate::Result;

pub const DEFAULT_SPACING: Duration = Duration::from_millis(100);
pub const DEFAULT_DAEMON_STARTUP_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct DispatchOutcome {
    pub monitor: MonitorTarget,
    pub wallpaper: PathBuf,
    pub backend: BackendKind,
    pub result: Result<()>,
}

impl DispatchOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct Dispatcher<R: CommandRunner = ProcessExecutor> {
    runner: Arc<R>,
    spacing: Duration,
    daemon_startup_delay: Duration,
    daemon_lock: Arc<Mutex<()>>,
}

impl<R: CommandRunner> Clone for Dispatcher<R> {
    fn clone(&self) -> Self {
        Self {
            runner: Arc::clone(&self.runner),
            spacing: self.spacing,
            daemon_startup_delay: self.daemon_startup_delay,
            daemon_lock: Arc::clone(&self.daemon_lock),
        }
    }
}

impl Dispatcher<ProcessExecutor> {
    pub fn with_processes() -> Self {
        Self::new(ProcessExecutor::new())
    }
}

impl<R: CommandRunner + 'static> Dispatcher<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner: Arc::new(runner),
            spacing: DEFAULT_SPACING,
            daemon_startup_delay: DEFAULT_DAEMON_STARTUP_DELAY,
            daemon_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_spacing(mut self, spacing: Duration) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_daemon_startup_delay(mut self, delay: Duration) -> Self {
        self.daemon_startup_delay = delay;
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// The monitor a backend will actually target: backends without
    /// per-monitor support always cover every monitor.
    pub fn effective_monitor(backend: &BackendDescriptor, monitor: &MonitorTarget) -> MonitorTarget {
        if backend.capabilities.per_monitor || monitor.is_all() {
            monitor.clone()
        } else {
            log::info!(
                "{} cannot target a single monitor, setting {} on all monitors",
                backend.name,
                monitor
            );
            MonitorTarget::All
        }
    }

    pub fn apply(&self, target: &DispatchTarget, backend: &BackendDescriptor) -> Result<()> {
        if backend.kind == BackendKind::None {
            return Err(WaypickError::Backend(BackendError::NotConfigured));
        }
        if !backend.supports(&target.file) {
            return Err(WaypickError::Backend(BackendError::UnsupportedFile {
                backend: backend.name.to_string(),
                path: target.file.path().to_path_buf(),
            }));
        }

        let mut target = target.clone();
        target.monitor = Self::effective_monitor(backend, &target.monitor);
        let plan = CommandBuilder::build(backend, &target);

        for invocation in &plan.prelude {
            if let Err(e) = self.runner.run(invocation) {
                log::debug!("Ignoring failed cleanup `{}`: {}", invocation, e);
            }
        }

        if let Some(daemon) = &plan.daemon {
            // Concurrent dispatches must not start the same daemon twice.
            let _guard = self.daemon_lock.lock().unwrap_or_else(|p| p.into_inner());
            if self.runner.run(&daemon.probe).is_err() {
                log::info!("Starting {} for {}", daemon.start.program, backend.name);
                self.runner.run(&daemon.start)?;
                std::thread::sleep(self.daemon_startup_delay);
            }
        }

        for invocation in &plan.steps {
            self.runner.run(invocation)?;
        }
        log::info!("Set {} on {} with {}", target.file, target.monitor, backend.name);

        self.run_post_command(&target);
        Ok(())
    }

    fn run_post_command(&self, target: &DispatchTarget) {
        if target.options.no_post_command {
            return;
        }
        let Some(command) = target.options.post_command.as_deref() else {
            return;
        };
        if command.trim().is_empty() {
            return;
        }

        let command = command.replace("$wallpaper", &target.file.path().to_string_lossy());
        let invocation = Invocation::new("sh", ["-c".to_string(), command]).detached();
        if let Err(e) = self.runner.run(&invocation) {
            log::warn!("Post command failed: {}", e);
        }
    }

    /// Dispatch every target on its own blocking task, starting them
    /// `spacing` apart. A failing monitor never stops the others.
    pub async fn apply_batch(
        &self,
        targets: Vec<DispatchTarget>,
        backend: &BackendDescriptor,
    ) -> Vec<DispatchOutcome> {
        let mut handles = Vec::with_capacity(targets.len());

        for (index, target) in targets.into_iter().enumerate() {
            if index > 0 && !self.spacing.is_zero() {
                tokio::time::sleep(self.spacing).await;
            }

            let monitor = Self::effective_monitor(backend, &target.monitor);
            let wallpaper = target.file.path().to_path_buf();
            let dispatcher = self.clone();
            let descriptor = backend.clone();
            let handle = tokio::task::spawn_blocking(move || dispatcher.apply(&target, &descriptor));
            handles.push((monitor, wallpaper, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (monitor, wallpaper, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(WaypickError::Process(ProcessError::Execution {
                    command: format!("dispatch to {}", monitor),
                    source: std::io::Error::other(e.to_string()),
                })),
            };
            if let Err(e) = &result {
                log::error!(
                    "Failed to set wallpaper on {}: {}",
                    monitor,
                    e.user_friendly_message()
                );
            }
            outcomes.push(DispatchOutcome {
                monitor,
                wallpaper,
                backend: backend.kind,
                result,
            });
        }
        outcomes
    }
}
