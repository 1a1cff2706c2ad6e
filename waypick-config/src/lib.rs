use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use waypick_common::{
    error::ConfigError, BackendCatalog, BackendDescriptor, BackendKind, DispatchOptions, Dispatcher,
    FillMode, MediaFile, MonitorTarget, Result, ScanOptions, SessionSettings, SwwwTransition, WallpaperSession,
    WallpaperState, WaypickError,
};

// Custom deserialization for Duration from human-readable strings
fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let duration_str = String::deserialize(deserializer)?;
    waypick_common::duration::parse_duration(&duration_str).map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub swww: SwwwConfig,
    #[serde(default)]
    pub mpvpaper: MpvpaperConfig,
    // Set from the command line only.
    #[serde(skip)]
    pub no_post_command: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    #[serde(default = "default_backend")]
    pub backend: BackendKind,
    #[serde(default)]
    pub fill: FillMode,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_folders")]
    pub folders: Vec<String>,
    #[serde(default)]
    pub include_subfolders: bool,
    #[serde(default)]
    pub include_all_subfolders: bool,
    #[serde(default)]
    pub show_hidden: bool,
    #[serde(default)]
    pub only_gifs: bool,
    #[serde(default = "default_monitors")]
    pub monitors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_command: Option<String>,
    #[serde(
        default = "default_rotation_interval",
        deserialize_with = "deserialize_duration",
        serialize_with = "humantime_serde::serialize"
    )]
    pub rotation_interval: Duration,
    #[serde(
        default = "default_dispatch_spacing",
        deserialize_with = "deserialize_duration",
        serialize_with = "humantime_serde::serialize"
    )]
    pub dispatch_spacing: Duration,
    #[serde(
        default = "default_daemon_startup_delay",
        deserialize_with = "deserialize_duration",
        serialize_with = "humantime_serde::serialize"
    )]
    pub daemon_startup_delay: Duration,
    #[serde(default = "default_true")]
    pub stop_other_backends: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SwwwConfig {
    #[serde(default = "default_transition_type")]
    pub transition_type: String,
    #[serde(default = "default_transition_step")]
    pub transition_step: u32,
    #[serde(default)]
    pub transition_angle: u32,
    // Seconds, as swww takes it.
    #[serde(default = "default_transition_duration")]
    pub transition_duration: f32,
    #[serde(default = "default_transition_fps")]
    pub transition_fps: u32,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MpvpaperConfig {
    #[serde(default)]
    pub sound: bool,
}

// Default values
fn default_backend() -> BackendKind {
    BackendKind::Swaybg
}

fn default_color() -> String {
    "#ffffff".to_string()
}

fn default_folders() -> Vec<String> {
    vec!["~/Pictures".to_string()]
}

fn default_monitors() -> Vec<String> {
    vec!["All".to_string()]
}

fn default_rotation_interval() -> Duration {
    Duration::from_secs(300) // 5 minutes
}

fn default_dispatch_spacing() -> Duration {
    waypick_common::dispatcher::DEFAULT_SPACING
}

fn default_daemon_startup_delay() -> Duration {
    waypick_common::dispatcher::DEFAULT_DAEMON_STARTUP_DELAY
}

fn default_true() -> bool {
    true
}

fn default_transition_type() -> String {
    "any".to_string()
}

fn default_transition_step() -> u32 {
    90
}

fn default_transition_duration() -> f32 {
    2.0
}

fn default_transition_fps() -> u32 {
    60
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            fill: FillMode::default(),
            color: default_color(),
            folders: default_folders(),
            include_subfolders: false,
            include_all_subfolders: false,
            show_hidden: false,
            only_gifs: false,
            monitors: default_monitors(),
            post_command: None,
            rotation_interval: default_rotation_interval(),
            dispatch_spacing: default_dispatch_spacing(),
            daemon_startup_delay: default_daemon_startup_delay(),
            stop_other_backends: true,
            cache_dir: None,
            state_file: None,
        }
    }
}

impl Default for SwwwConfig {
    fn default() -> Self {
        Self {
            transition_type: default_transition_type(),
            transition_step: default_transition_step(),
            transition_angle: 0,
            transition_duration: default_transition_duration(),
            transition_fps: default_transition_fps(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub backend: Option<BackendKind>,
    pub fill: Option<FillMode>,
    pub folders: Vec<PathBuf>,
    pub monitor: Option<String>,
    pub state_file: Option<PathBuf>,
    pub no_post_command: bool,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };
        Self::load_from_path(&config_path)
    }

    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            log::info!("No config file at {:?}, using defaults", config_path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path).map_err(|e| {
            WaypickError::Config(ConfigError::FileRead {
                path: config_path.to_path_buf(),
                source: e,
            })
        })?;

        let config: Config = toml::from_str(&content)?;
        config.validate()?;

        log::debug!("Loaded configuration from {:?}", config_path);
        Ok(config)
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or(WaypickError::Config(ConfigError::NoConfigDir))?
            .join("waypick");

        Ok(config_dir.join("config.toml"))
    }

    pub fn apply_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(backend) = overrides.backend {
            self.general.backend = backend;
        }
        if let Some(fill) = overrides.fill {
            self.general.fill = fill;
        }
        if !overrides.folders.is_empty() {
            self.general.folders = overrides
                .folders
                .iter()
                .map(|folder| folder.to_string_lossy().into_owned())
                .collect();
        }
        if let Some(monitor) = &overrides.monitor {
            self.general.monitors = vec![monitor.clone()];
        }
        if let Some(state_file) = &overrides.state_file {
            self.general.state_file = Some(state_file.to_string_lossy().into_owned());
        }
        if overrides.no_post_command {
            self.no_post_command = true;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let general = &self.general;

        if !is_hex_color(&general.color) {
            return Err(invalid("color", &general.color));
        }

        if general.rotation_interval < Duration::from_secs(1) {
            return Err(invalid(
                "rotation_interval",
                &format!("{:?}", general.rotation_interval),
            ));
        }

        if general.folders.is_empty() {
            return Err(invalid("folders", "[]"));
        }

        if self.swww.transition_step == 0 {
            return Err(invalid(
                "swww.transition_step",
                &self.swww.transition_step.to_string(),
            ));
        }

        if self.swww.transition_fps == 0 {
            return Err(invalid(
                "swww.transition_fps",
                &self.swww.transition_fps.to_string(),
            ));
        }

        if self.swww.transition_angle > 360 {
            return Err(invalid(
                "swww.transition_angle",
                &self.swww.transition_angle.to_string(),
            ));
        }

        Ok(())
    }

    pub fn folders(&self) -> Vec<PathBuf> {
        self.general.folders.iter().map(|f| expand_tilde(f)).collect()
    }

    // Monitors to rotate; an empty list means every monitor at once.
    pub fn monitor_targets(&self) -> Vec<MonitorTarget> {
        if self.general.monitors.is_empty() {
            return vec![MonitorTarget::All];
        }
        self.general
            .monitors
            .iter()
            .map(|m| MonitorTarget::from(m.as_str()))
            .collect()
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            include_subfolders: self.general.include_subfolders,
            include_all_subfolders: self.general.include_all_subfolders,
            include_hidden: self.general.show_hidden,
            only_gifs: self.general.only_gifs,
        }
    }

    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            color: self.general.color.clone(),
            swww: SwwwTransition {
                transition_type: self.swww.transition_type.clone(),
                step: self.swww.transition_step,
                angle: self.swww.transition_angle,
                duration: self.swww.transition_duration,
                fps: self.swww.transition_fps,
            },
            mpvpaper_sound: self.mpvpaper.sound,
            post_command: self
                .general
                .post_command
                .clone()
                .filter(|command| !command.trim().is_empty()),
            no_post_command: self.no_post_command,
            stop_other_backends: self.general.stop_other_backends,
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        match &self.general.cache_dir {
            Some(dir) => expand_tilde(dir),
            None => dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join("waypick"),
        }
    }

    pub fn state_file(&self) -> PathBuf {
        match &self.general.state_file {
            Some(file) => expand_tilde(file),
            None => WallpaperState::get_state_file(),
        }
    }

    pub fn session_settings(&self, backend: BackendDescriptor) -> SessionSettings {
        SessionSettings {
            backend,
            folders: self.folders(),
            scan: self.scan_options(),
            fill: self.general.fill,
            options: self.dispatch_options(),
            cache_dir: self.cache_dir(),
            state_file: self.state_file(),
        }
    }

    /// Files the configured backend accepts, whether or not it is installed.
    pub fn scan_media(&self) -> Vec<MediaFile> {
        BackendCatalog::new()
            .get(self.general.backend)
            .scan(&self.folders(), &self.scan_options())
    }

    pub fn session(&self) -> Result<WallpaperSession> {
        let backend = BackendCatalog::new().resolve(self.general.backend)?.clone();
        let dispatcher = Dispatcher::with_processes()
            .with_spacing(self.general.dispatch_spacing)
            .with_daemon_startup_delay(self.general.daemon_startup_delay);
        Ok(WallpaperSession::new(self.session_settings(backend), dispatcher))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| {
            WaypickError::Config(ConfigError::TomlParse {
                message: e.to_string(),
            })
        })
    }
}

fn invalid(field: &str, value: &str) -> WaypickError {
    WaypickError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    })
}

fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_duration_deserialization() {
        let toml_str = r#"
            [general]
            rotation_interval = "3m"
            dispatch_spacing = "250ms"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.rotation_interval, Duration::from_secs(180));
        assert_eq!(config.general.dispatch_spacing, Duration::from_millis(250));
        assert_eq!(config.general.daemon_startup_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r##"
            [general]
            backend = "mpvpaper"
            fill = "tile"
            color = "#1E1E2E"
            folders = ["/srv/walls", "/home/me/art"]
            include_subfolders = true
            show_hidden = true
            monitors = ["DP-1", "HDMI-A-1"]
            post_command = "wal -i $wallpaper"
            stop_other_backends = false

            [swww]
            transition_type = "wipe"
            transition_angle = 30
            transition_fps = 144

            [mpvpaper]
            sound = true
        "##;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.general.backend, BackendKind::Mpvpaper);
        assert_eq!(config.general.fill, FillMode::Tile);
        assert_eq!(
            config.folders(),
            vec![PathBuf::from("/srv/walls"), PathBuf::from("/home/me/art")]
        );
        assert_eq!(
            config.monitor_targets(),
            vec![MonitorTarget::from("DP-1"), MonitorTarget::from("HDMI-A-1")]
        );

        let scan = config.scan_options();
        assert!(scan.include_subfolders && scan.include_hidden);
        assert!(!scan.include_all_subfolders && !scan.only_gifs);

        let options = config.dispatch_options();
        assert_eq!(options.color, "#1E1E2E");
        assert_eq!(options.swww.transition_type, "wipe");
        assert_eq!(options.swww.angle, 30);
        assert_eq!(options.swww.step, 90);
        assert_eq!(options.swww.fps, 144);
        assert!(options.mpvpaper_sound);
        assert!(!options.stop_other_backends);
        assert_eq!(options.post_command.as_deref(), Some("wal -i $wallpaper"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.general.color = "white".to_string();
        assert!(config.validate().is_err());
        config.general.color = "#12345g".to_string();
        assert!(config.validate().is_err());
        config.general.color = "#00ff00".to_string();

        config.general.rotation_interval = Duration::from_millis(500);
        assert!(config.validate().is_err());
        config.general.rotation_interval = Duration::from_secs(60);

        config.swww.transition_fps = 0;
        assert!(config.validate().is_err());
        config.swww.transition_fps = 30;

        config.swww.transition_angle = 361;
        assert!(config.validate().is_err());
        config.swww.transition_angle = 360;
        assert!(config.validate().is_ok());

        config.general.folders.clear();
        match config.validate() {
            Err(WaypickError::Config(ConfigError::InvalidValue { field, .. })) => {
                assert_eq!(field, "folders");
            }
            other => panic!("Expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let config = Config::load_from_path(&temp_dir.path().join("config.toml")).unwrap();

        assert_eq!(config.general.backend, BackendKind::Swaybg);
        assert_eq!(config.monitor_targets(), vec![MonitorTarget::All]);
        assert_eq!(config.general.rotation_interval, Duration::from_secs(300));
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");

        fs::write(&path, "[general]\nbackend = \"xwallpaper\"\n").unwrap();
        assert!(matches!(
            Config::load_from_path(&path),
            Err(WaypickError::Config(ConfigError::TomlParse { .. }))
        ));

        fs::write(&path, "[general]\nrotation_interval = \"0s\"\n").unwrap();
        assert!(matches!(
            Config::load_from_path(&path),
            Err(WaypickError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = Config::default();
        config.general.post_command = Some("notify-send hi".to_string());

        config.apply_overrides(&CliOverrides {
            backend: Some(BackendKind::Feh),
            fill: Some(FillMode::Center),
            folders: vec![PathBuf::from("/tmp/walls")],
            monitor: Some("eDP-1".to_string()),
            state_file: Some(PathBuf::from("/tmp/state.json")),
            no_post_command: true,
        });

        assert_eq!(config.general.backend, BackendKind::Feh);
        assert_eq!(config.general.fill, FillMode::Center);
        assert_eq!(config.folders(), vec![PathBuf::from("/tmp/walls")]);
        assert_eq!(config.monitor_targets(), vec![MonitorTarget::from("eDP-1")]);
        assert_eq!(config.state_file(), PathBuf::from("/tmp/state.json"));
        assert!(config.dispatch_options().no_post_command);
    }

    #[test]
    fn test_empty_overrides_keep_file_values() {
        let mut config = Config::default();
        config.general.folders = vec!["/srv/walls".to_string()];

        config.apply_overrides(&CliOverrides::default());

        assert_eq!(config.folders(), vec![PathBuf::from("/srv/walls")]);
        assert_eq!(config.general.backend, BackendKind::Swaybg);
        assert!(!config.no_post_command);
    }

    #[test]
    fn test_blank_post_command_is_dropped() {
        let mut config = Config::default();
        config.general.post_command = Some("   ".to_string());
        assert_eq!(config.dispatch_options().post_command, None);
    }

    #[test]
    fn test_session_settings() {
        let mut config = Config::default();
        config.general.cache_dir = Some("/var/tmp/waypick".to_string());
        config.general.fill = FillMode::Fit;

        let settings = config.session_settings(BackendDescriptor::for_kind(BackendKind::Swww));

        assert_eq!(settings.backend.kind, BackendKind::Swww);
        assert_eq!(settings.cache_dir, PathBuf::from("/var/tmp/waypick"));
        assert_eq!(settings.fill, FillMode::Fit);
        assert_eq!(settings.folders, config.folders());
    }

    #[test]
    fn test_none_backend_cannot_start_session() {
        let mut config = Config::default();
        config.general.backend = BackendKind::None;
        assert!(matches!(
            config.session(),
            Err(WaypickError::Backend(waypick_common::error::BackendError::NotConfigured))
        ));
    }

    #[test]
    fn test_scan_media_without_installed_backend() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("a.png"), "fake").unwrap();
        fs::write(temp_dir.path().join("clip.mp4"), "fake").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "text").unwrap();

        let mut config = Config::default();
        config.general.backend = BackendKind::None;
        config.general.folders = vec![temp_dir.path().to_string_lossy().into_owned()];

        let files = config.scan_media();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path(), temp_dir.path().join("a.png"));

        config.general.backend = BackendKind::Mpvpaper;
        assert_eq!(config.scan_media().len(), 2);
    }

    #[test]
    fn test_tilde_expansion() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_tilde("~/Pictures"), home.join("Pictures"));
        assert_eq!(expand_tilde("~"), home);
        assert_eq!(expand_tilde("/abs/~/path"), PathBuf::from("/abs/~/path"));
    }

    #[test]
    fn test_default_config_serializes() {
        let rendered = Config::default().to_toml().unwrap();
        assert!(rendered.contains("rotation_interval = \"5m\""));

        let reparsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(reparsed.general.dispatch_spacing, Duration::from_millis(100));
    }
}
