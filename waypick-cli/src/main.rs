use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use serde::Serialize;
use std::path::PathBuf;
use waypick_common::{
    send_playback, BackendCatalog, BackendKind, DispatchOutcome, ErrorReporting, FillMode, IpcClient,
    IpcCommand, IpcResponse, MonitorTarget, PlaybackAction, Thumbnail, ThumbnailCache, WallpaperState,
    WaypickError,
};
use waypick_config::{CliOverrides, Config};

#[derive(Parser)]
#[command(name = "waypick")]
#[command(about = "waypick (random wallpaper picker for swaybg, swww, feh, wallutils, hyprpaper and mpvpaper)")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Configuration file to use instead of the default one
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend to use
    #[arg(long, global = true)]
    backend: Option<BackendKind>,

    /// Fill mode: fill, stretch, fit, center or tile
    #[arg(long, global = true)]
    fill: Option<FillMode>,

    /// Wallpaper folder; may be repeated
    #[arg(long = "folder", global = true)]
    folders: Vec<PathBuf>,

    /// State file to read and update
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,

    /// Do not run the configured post command
    #[arg(long, global = true)]
    no_post_command: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Set a wallpaper
    Set {
        file: PathBuf,
        /// Monitor to set it on (default: configured monitors)
        #[arg(long)]
        monitor: Option<String>,
    },

    /// Set a random wallpaper not shown since the last round
    Random {
        #[arg(long)]
        monitor: Option<String>,
    },

    /// Re-apply the last wallpapers
    Restore,

    /// Print the current wallpapers as JSON
    List,

    /// Generate thumbnails for every wallpaper in the folders
    Cache,

    /// Show installed backends and what they support
    Backends {
        #[arg(long)]
        json: bool,
    },

    /// Pause or resume a video wallpaper
    Pause {
        #[arg(long)]
        monitor: Option<String>,
    },

    /// Stop a video wallpaper
    Stop {
        #[arg(long)]
        monitor: Option<String>,
    },

    /// Toggle sound of a video wallpaper
    Mute {
        #[arg(long)]
        monitor: Option<String>,
    },

    /// Ask the daemon to rotate now
    Next {
        #[arg(long)]
        monitor: Option<String>,
    },

    /// Pause the daemon's rotation
    DaemonPause,

    /// Resume the daemon's rotation
    DaemonResume,

    /// Toggle the daemon's rotation
    TogglePause,

    /// Make the daemon reload its configuration
    Reload,

    /// Show daemon status
    Status,

    /// Print the effective configuration
    Config,
}

impl Commands {
    fn monitor(&self) -> Option<&str> {
        match self {
            Commands::Set { monitor, .. }
            | Commands::Random { monitor }
            | Commands::Pause { monitor }
            | Commands::Stop { monitor }
            | Commands::Mute { monitor }
            | Commands::Next { monitor } => monitor.as_deref(),
            _ => None,
        }
    }
}

fn friendly(e: WaypickError) -> anyhow::Error {
    e.log_error("waypick");
    anyhow::anyhow!(e.user_friendly_message())
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::load(cli.global.config.as_deref()).map_err(friendly)?;
    config.apply_overrides(&CliOverrides {
        backend: cli.global.backend,
        fill: cli.global.fill,
        folders: cli.global.folders.clone(),
        monitor: cli.command.monitor().map(str::to_string),
        state_file: cli.global.state_file.clone(),
        no_post_command: cli.global.no_post_command,
    });
    config.validate().map_err(friendly)?;
    log::debug!("Using backend {} with folders {:?}", config.general.backend, config.folders());
    Ok(config)
}

// Previews do not need a working backend, only its list of extensions.
async fn cache_thumbnails(config: &Config) -> Vec<Thumbnail> {
    let scan_config = config.clone();
    let files = match tokio::task::spawn_blocking(move || scan_config.scan_media()).await {
        Ok(files) => files,
        Err(e) => {
            log::error!("Folder scan failed: {}", e);
            Vec::new()
        }
    };
    ThumbnailCache::new(config.cache_dir()).cache_all(files).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Set { file, .. } => {
            if !file.is_file() {
                bail!("No such file: {}", file.display());
            }
            let file = std::path::absolute(file).with_context(|| format!("Invalid path {:?}", file))?;
            let session = config.session().map_err(friendly)?;
            let outcomes = session.set(&file, &config.monitor_targets()).await;
            report_outcomes(&outcomes)?;
        }

        Commands::Random { .. } => {
            let session = config.session().map_err(friendly)?;
            let outcomes = session.random(&config.monitor_targets()).await.map_err(friendly)?;
            report_outcomes(&outcomes)?;
        }

        Commands::Restore => {
            let session = config.session().map_err(friendly)?;
            let outcomes = session.restore().await.map_err(friendly)?;
            if outcomes.is_empty() {
                println!("Nothing to restore");
            } else {
                report_outcomes(&outcomes)?;
            }
        }

        Commands::List => {
            let state = WallpaperState::load(&config.state_file()).map_err(friendly)?;
            println!("{}", state.list_json().map_err(friendly)?);
        }

        Commands::Cache => {
            let thumbnails = cache_thumbnails(&config).await;
            let placeholders = thumbnails.iter().filter(|t| t.placeholder).count();
            println!(
                "✓ Cached {} thumbnails in {} ({} placeholders)",
                thumbnails.len(),
                config.cache_dir().display(),
                placeholders
            );
        }

        Commands::Backends { json } => print_backends(*json)?,

        Commands::Pause { .. } => playback(&config, PlaybackAction::Pause)?,
        Commands::Stop { .. } => playback(&config, PlaybackAction::Stop)?,
        Commands::Mute { .. } => playback(&config, PlaybackAction::Mute)?,

        Commands::Next { monitor } => send_daemon(IpcCommand::Next {
            monitor: monitor.clone(),
        })?,
        Commands::DaemonPause => send_daemon(IpcCommand::Pause)?,
        Commands::DaemonResume => send_daemon(IpcCommand::Resume)?,
        Commands::TogglePause => send_daemon(IpcCommand::TogglePause)?,
        Commands::Reload => send_daemon(IpcCommand::Reload)?,
        Commands::Status => send_daemon(IpcCommand::Status)?,

        Commands::Config => print!("{}", config.to_toml().map_err(friendly)?),
    }

    Ok(())
}

fn report_outcomes(outcomes: &[DispatchOutcome]) -> anyhow::Result<()> {
    for outcome in outcomes {
        match &outcome.result {
            Ok(()) => println!("✓ {}: {}", outcome.monitor, outcome.wallpaper.display()),
            Err(e) => eprintln!("✗ {}: {}", outcome.monitor, e.user_friendly_message()),
        }
    }
    if !outcomes.iter().any(DispatchOutcome::is_ok) {
        bail!("No wallpaper was set");
    }
    Ok(())
}

fn playback(config: &Config, action: PlaybackAction) -> anyhow::Result<()> {
    let catalog = BackendCatalog::new();
    let backend = catalog.get(config.general.backend);
    let monitors = config.monitor_targets();
    let monitor = monitors.first().cloned().unwrap_or(MonitorTarget::All);

    send_playback(backend, &monitor, action).map_err(friendly)?;
    println!("✓ Sent {} to {}", action, monitor);
    Ok(())
}

#[derive(Serialize)]
struct BackendReport {
    name: &'static str,
    installed: bool,
    per_monitor: bool,
    fill_mode: bool,
    color: bool,
    transitions: bool,
    playback: bool,
    extensions: Vec<&'static str>,
}

fn print_backends(json: bool) -> anyhow::Result<()> {
    let catalog = BackendCatalog::new();
    let reports: Vec<BackendReport> = catalog
        .iter()
        .filter(|backend| backend.kind != BackendKind::None)
        .map(|backend| BackendReport {
            name: backend.name,
            installed: backend.is_installed(),
            per_monitor: backend.capabilities.per_monitor,
            fill_mode: backend.capabilities.fill_mode,
            color: backend.capabilities.color,
            transitions: backend.capabilities.transitions,
            playback: backend.capabilities.playback,
            extensions: backend.extensions.clone(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    let flag = |supported: bool, name: &str| if supported { name.to_string() } else { String::new() };
    for report in &reports {
        let features: Vec<String> = [
            flag(report.per_monitor, "per-monitor"),
            flag(report.fill_mode, "fill"),
            flag(report.color, "color"),
            flag(report.transitions, "transitions"),
            flag(report.playback, "playback"),
        ]
        .into_iter()
        .filter(|f| !f.is_empty())
        .collect();

        println!(
            "{} {:<10} {} [{}]",
            if report.installed { "✓" } else { "✗" },
            report.name,
            features.join(", "),
            report.extensions.join(" ")
        );
    }
    Ok(())
}

fn send_daemon(command: IpcCommand) -> anyhow::Result<()> {
    let client = IpcClient::new();
    let response = client.send_command(&command).map_err(friendly)?;
    print_response(response)
}

fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        let minutes = seconds / 60;
        let secs = seconds % 60;
        if secs == 0 {
            format!("{}m", minutes)
        } else {
            format!("{}m{}s", minutes, secs)
        }
    } else {
        let hours = seconds / 3600;
        let minutes = (seconds % 3600) / 60;
        if minutes == 0 {
            format!("{}h", hours)
        } else {
            format!("{}h{}m", hours, minutes)
        }
    }
}

fn print_response(response: IpcResponse) -> anyhow::Result<()> {
    match response {
        IpcResponse::Success { message } => {
            println!("✓ {}", message);
        }

        IpcResponse::Error { message } => {
            bail!(message);
        }

        IpcResponse::Status {
            monitors,
            paused,
            backend,
            interval_secs,
            next_change_secs,
        } => {
            println!("waypick Status:");
            println!("===============");
            println!("Rotation: {}", if paused { "PAUSED" } else { "RUNNING" });
            println!("Backend: {}", backend);
            println!("Interval: {}", format_duration(interval_secs));
            if let Some(remaining) = next_change_secs.filter(|_| !paused) {
                println!("Next change in: {}", format_duration(remaining));
            }
            println!();

            if monitors.is_empty() {
                println!("No wallpapers set yet");
            }
            for monitor in monitors {
                let current = monitor
                    .current_wallpaper
                    .as_deref()
                    .map(|p| {
                        std::path::Path::new(p)
                            .file_name()
                            .and_then(|n| n.to_str())
                            .unwrap_or("unknown")
                    })
                    .unwrap_or("None");
                println!("{}: {}", monitor.name, current);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_cache_without_backend() {
        let walls = tempdir().unwrap();
        let cache_dir = tempdir().unwrap();
        fs::write(walls.path().join("a.png"), "not really a png").unwrap();
        fs::write(walls.path().join("b.jpg"), "not really a jpg").unwrap();

        let mut config = Config::default();
        config.general.backend = BackendKind::None;
        config.general.folders = vec![walls.path().to_string_lossy().into_owned()];
        config.general.cache_dir = Some(cache_dir.path().to_string_lossy().into_owned());

        let thumbnails = cache_thumbnails(&config).await;

        assert_eq!(thumbnails.len(), 2);
        assert!(cache_dir.path().join("a.png").exists());
        assert!(cache_dir.path().join("b.jpg").exists());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(45), "45s");
        assert_eq!(format_duration(300), "5m");
        assert_eq!(format_duration(330), "5m30s");
        assert_eq!(format_duration(3600), "1h");
        assert_eq!(format_duration(5400), "1h30m");
    }

    #[test]
    fn test_parse_global_options() {
        let cli = Cli::try_parse_from([
            "waypick",
            "random",
            "--monitor",
            "DP-1",
            "--backend",
            "swww",
            "--fill",
            "fit",
            "--folder",
            "/a",
            "--folder",
            "/b",
            "--no-post-command",
        ])
        .unwrap();

        assert_eq!(cli.global.backend, Some(BackendKind::Swww));
        assert_eq!(cli.global.fill, Some(FillMode::Fit));
        assert_eq!(cli.global.folders, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        assert!(cli.global.no_post_command);
        assert_eq!(cli.command.monitor(), Some("DP-1"));
    }

    #[test]
    fn test_rejects_unknown_backend() {
        assert!(Cli::try_parse_from(["waypick", "--backend", "xwallpaper", "list"]).is_err());
    }

    #[test]
    fn test_set_requires_file() {
        assert!(Cli::try_parse_from(["waypick", "set"]).is_err());
        let cli = Cli::try_parse_from(["waypick", "set", "/pics/a.jpg"]).unwrap();
        assert!(matches!(cli.command, Commands::Set { .. }));
        assert_eq!(cli.command.monitor(), None);
    }
}
