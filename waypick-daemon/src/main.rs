use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::interval;
use waypick_common::{
    DispatchOutcome, ErrorReporting, IpcCommand, IpcResponse, IpcServer, MonitorStatus, MonitorTarget,
    WallpaperSession, WallpaperState,
};
use waypick_config::Config;

#[derive(Parser)]
#[command(name = "waypick-daemon")]
#[command(about = "Rotates random wallpapers and answers waypick control commands")]
#[command(version)]
struct Args {
    /// Configuration file to use instead of the default one
    #[arg(long)]
    config: Option<PathBuf>,

    /// Do not run the configured post command
    #[arg(long)]
    no_post_command: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Request {
    Next(Option<MonitorTarget>),
    Reload,
}

#[derive(Debug)]
struct DaemonState {
    paused: bool,
    backend: String,
    interval: Duration,
    last_change: Instant,
    current: BTreeMap<String, PathBuf>,
}

impl DaemonState {
    fn new(backend: &str, interval: Duration, saved: &WallpaperState) -> Self {
        let current = saved
            .records()
            .iter()
            .map(|record| (record.monitor.to_string(), record.wallpaper.clone()))
            .collect();

        Self {
            paused: false,
            backend: backend.to_string(),
            interval,
            last_change: Instant::now(),
            current,
        }
    }

    fn is_due(&self) -> bool {
        !self.paused && self.last_change.elapsed() >= self.interval
    }

    fn record(&mut self, outcomes: &[DispatchOutcome]) {
        for outcome in outcomes.iter().filter(|outcome| outcome.is_ok()) {
            if outcome.monitor.is_all() {
                self.current.clear();
            }
            self.current
                .insert(outcome.monitor.to_string(), outcome.wallpaper.clone());
        }
    }

    fn status(&self) -> IpcResponse {
        IpcResponse::Status {
            monitors: self
                .current
                .iter()
                .map(|(name, wallpaper)| MonitorStatus {
                    name: name.clone(),
                    current_wallpaper: Some(wallpaper.to_string_lossy().into_owned()),
                })
                .collect(),
            paused: self.paused,
            backend: self.backend.clone(),
            interval_secs: self.interval.as_secs(),
            next_change_secs: Some(
                self.interval
                    .saturating_sub(self.last_change.elapsed())
                    .as_secs(),
            ),
        }
    }
}

fn lock(state: &Mutex<DaemonState>) -> MutexGuard<'_, DaemonState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn handle_ipc_command(
    command: IpcCommand,
    state: &Mutex<DaemonState>,
    requests: &mpsc::UnboundedSender<Request>,
) -> IpcResponse {
    let queue = |request: Request, message: String| match requests.send(request) {
        Ok(()) => IpcResponse::Success { message },
        Err(_) => IpcResponse::Error {
            message: "Daemon is shutting down".to_string(),
        },
    };

    match command {
        IpcCommand::Next { monitor } => {
            let target = monitor.map(MonitorTarget::from);
            let message = match &target {
                Some(monitor) => format!("Changing wallpaper on {}", monitor),
                None => "Changing wallpapers".to_string(),
            };
            queue(Request::Next(target), message)
        }
        IpcCommand::Pause => {
            lock(state).paused = true;
            IpcResponse::Success {
                message: "Rotation paused".to_string(),
            }
        }
        IpcCommand::Resume => {
            let mut state = lock(state);
            state.paused = false;
            state.last_change = Instant::now();
            IpcResponse::Success {
                message: "Rotation resumed".to_string(),
            }
        }
        IpcCommand::TogglePause => {
            let mut state = lock(state);
            state.paused = !state.paused;
            if !state.paused {
                state.last_change = Instant::now();
            }
            IpcResponse::Success {
                message: if state.paused {
                    "Rotation paused".to_string()
                } else {
                    "Rotation resumed".to_string()
                },
            }
        }
        IpcCommand::Reload => queue(Request::Reload, "Reloading configuration".to_string()),
        IpcCommand::Status => lock(state).status(),
    }
}

async fn rotate(session: &WallpaperSession, monitors: &[MonitorTarget], state: &Mutex<DaemonState>) {
    match session.random(monitors).await {
        Ok(outcomes) => {
            let failed = outcomes.iter().filter(|outcome| !outcome.is_ok()).count();
            if failed > 0 {
                log::warn!("{} of {} monitors kept their wallpaper", failed, outcomes.len());
            }
            lock(state).record(&outcomes);
        }
        Err(e) => e.log_error("Rotation failed"),
    }
}

fn load(args: &Args) -> waypick_common::Result<(Config, WallpaperSession)> {
    let mut config = Config::load(args.config.as_deref())?;
    config.no_post_command = args.no_post_command;
    let session = config.session()?;
    Ok((config, session))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    log::info!("Starting waypick daemon...");

    let (mut config, mut session) = load(&args).map_err(|e| {
        log::error!("Configuration error: {}", e.user_friendly_message());
        anyhow::anyhow!("Configuration error: {}", e.user_friendly_message())
    })?;

    log::info!(
        "Rotating {:?} every {} with {}",
        config.monitor_targets(),
        humantime::format_duration(config.general.rotation_interval),
        session.backend().name
    );

    let saved = WallpaperState::load(&config.state_file()).unwrap_or_else(|e| {
        log::warn!("Failed to load state, starting fresh: {}", e);
        WallpaperState::new()
    });
    let shared_state = Arc::new(Mutex::new(DaemonState::new(
        session.backend().name,
        config.general.rotation_interval,
        &saved,
    )));

    let (requests, mut incoming) = mpsc::unbounded_channel();

    // Start IPC server
    let ipc_state = Arc::clone(&shared_state);
    let server = IpcServer::new();
    let socket_path = server.socket_path().to_path_buf();
    std::thread::spawn(move || {
        if let Err(e) = server.start(move |cmd| handle_ipc_command(cmd, &ipc_state, &requests)) {
            log::error!("IPC server error: {}", e.user_friendly_message());
        }
    });

    rotate(&session, &config.monitor_targets(), &shared_state).await;
    lock(&shared_state).last_change = Instant::now();

    let mut ticker = interval(Duration::from_secs(1));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if lock(&shared_state).is_due() {
                    rotate(&session, &config.monitor_targets(), &shared_state).await;
                    lock(&shared_state).last_change = Instant::now();
                }
            }
            Some(request) = incoming.recv() => match request {
                Request::Next(Some(monitor)) => {
                    rotate(&session, &[monitor], &shared_state).await;
                }
                Request::Next(None) => {
                    rotate(&session, &config.monitor_targets(), &shared_state).await;
                    lock(&shared_state).last_change = Instant::now();
                }
                Request::Reload => match load(&args) {
                    Ok((new_config, new_session)) => {
                        config = new_config;
                        session = new_session;
                        let mut state = lock(&shared_state);
                        state.interval = config.general.rotation_interval;
                        state.backend = session.backend().name.to_string();
                        log::info!("Configuration reloaded");
                    }
                    Err(e) => e.log_error("Reload failed, keeping the previous configuration"),
                },
            },
            _ = &mut shutdown => {
                log::info!("Shutting down");
                if let Err(e) = std::fs::remove_file(&socket_path) {
                    log::debug!("Could not remove {:?}: {}", socket_path, e);
                }
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use waypick_common::BackendKind;

    fn state() -> Mutex<DaemonState> {
        Mutex::new(DaemonState::new("swww", Duration::from_secs(300), &WallpaperState::new()))
    }

    #[test]
    fn test_pause_resume_toggle() {
        let state = state();
        let (requests, _incoming) = mpsc::unbounded_channel();

        handle_ipc_command(IpcCommand::Pause, &state, &requests);
        assert!(lock(&state).paused);
        assert!(!lock(&state).is_due());

        handle_ipc_command(IpcCommand::TogglePause, &state, &requests);
        assert!(!lock(&state).paused);

        handle_ipc_command(IpcCommand::TogglePause, &state, &requests);
        handle_ipc_command(IpcCommand::Resume, &state, &requests);
        assert!(!lock(&state).paused);
    }

    #[test]
    fn test_next_is_queued() {
        let state = state();
        let (requests, mut incoming) = mpsc::unbounded_channel();

        let response = handle_ipc_command(
            IpcCommand::Next {
                monitor: Some("DP-1".to_string()),
            },
            &state,
            &requests,
        );
        assert!(matches!(response, IpcResponse::Success { .. }));
        assert_eq!(
            incoming.try_recv().unwrap(),
            Request::Next(Some(MonitorTarget::from("DP-1")))
        );

        handle_ipc_command(IpcCommand::Reload, &state, &requests);
        assert_eq!(incoming.try_recv().unwrap(), Request::Reload);
    }

    #[test]
    fn test_next_after_shutdown() {
        let state = state();
        let (requests, incoming) = mpsc::unbounded_channel();
        drop(incoming);

        let response = handle_ipc_command(IpcCommand::Next { monitor: None }, &state, &requests);
        assert!(matches!(response, IpcResponse::Error { .. }));
    }

    #[test]
    fn test_status_reports_saved_wallpapers() {
        let mut saved = WallpaperState::new();
        saved.record(MonitorTarget::from("DP-1"), Path::new("/pics/a.jpg"), BackendKind::Swww);
        saved.record(MonitorTarget::from("DP-2"), Path::new("/pics/b.jpg"), BackendKind::Swww);
        let state = Mutex::new(DaemonState::new("swww", Duration::from_secs(60), &saved));
        let (requests, _incoming) = mpsc::unbounded_channel();

        match handle_ipc_command(IpcCommand::Status, &state, &requests) {
            IpcResponse::Status {
                monitors,
                paused,
                backend,
                interval_secs,
                next_change_secs,
            } => {
                assert_eq!(monitors.len(), 2);
                assert_eq!(monitors[0].name, "DP-1");
                assert_eq!(monitors[1].current_wallpaper.as_deref(), Some("/pics/b.jpg"));
                assert!(!paused);
                assert_eq!(backend, "swww");
                assert_eq!(interval_secs, 60);
                assert!(next_change_secs.unwrap() <= 60);
            }
            other => panic!("Expected status, got {:?}", other),
        }
    }

    #[test]
    fn test_record_all_replaces_monitors() {
        let state = state();
        let outcome = |monitor: &str, path: &str| DispatchOutcome {
            monitor: MonitorTarget::from(monitor),
            wallpaper: PathBuf::from(path),
            backend: BackendKind::Feh,
            result: Ok(()),
        };

        lock(&state).record(&[outcome("DP-1", "/pics/a.jpg"), outcome("DP-2", "/pics/b.jpg")]);
        assert_eq!(lock(&state).current.len(), 2);

        lock(&state).record(&[outcome("All", "/pics/c.jpg")]);
        let current = &lock(&state).current;
        assert_eq!(current.len(), 1);
        assert_eq!(current["All"], PathBuf::from("/pics/c.jpg"));
    }
}
