use std::path::PathBuf;
use thiserror::Error;

/// Main error type for waypick operations
#[derive(Error, Debug)]
pub enum WaypickError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Thumbnail error: {0}")]
    Thumbnail(#[from] ThumbnailError),

    #[error("Selection error: {0}")]
    Selection(#[from] SelectionError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Process execution error: {0}")]
    Process(#[from] ProcessError),

    #[error("IPC error: {0}")]
    Ipc(#[from] IpcError),

    #[error("State persistence error: {0}")]
    State(#[from] StateError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {path:?}")]
    FileRead { path: PathBuf, source: std::io::Error },

    #[error("Failed to parse TOML configuration: {message}")]
    TomlParse { message: String },

    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Filesystem errors met while walking wallpaper folders
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to read {path:?}: {source}")]
    DirectoryRead { path: PathBuf, source: std::io::Error },
}

/// Preview generation errors, always recovered by a placeholder
#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("Failed to decode {path:?}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("Failed to encode thumbnail {path:?}: {message}")]
    Encode { path: PathBuf, message: String },

    #[error("Failed to extract first frame of {path:?}: {message}")]
    VideoFrame { path: PathBuf, message: String },
}

/// Random selection errors
#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("No wallpaper candidates found")]
    NoCandidate,

    #[error("Failed to read used wallpapers file: {path:?}")]
    UsedSetRead { path: PathBuf, source: std::io::Error },

    #[error("Failed to write used wallpapers file: {path:?}")]
    UsedSetWrite { path: PathBuf, source: std::io::Error },
}

/// Backend availability and capability errors
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("No wallpaper backend is installed")]
    Unavailable { requested: String },

    #[error("No wallpaper backend is configured")]
    NotConfigured,

    #[error("Backend {backend} does not support {feature}")]
    Unsupported { backend: String, feature: String },

    #[error("Backend {backend} cannot display {path:?}")]
    UnsupportedFile { backend: String, path: PathBuf },

    #[error("Unknown backend: {name}")]
    Unknown { name: String },
}

/// Process execution errors
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Command execution failed: {command:?}")]
    Execution { command: String, source: std::io::Error },

    #[error("Command returned non-zero exit code: {code}")]
    NonZeroExit { command: String, code: i32, stderr: String },

    #[error("Failed to reach playback socket {path:?}")]
    Socket { path: PathBuf, source: std::io::Error },
}

/// IPC communication errors
#[derive(Error, Debug)]
pub enum IpcError {
    #[error("Failed to connect to daemon at {path:?}")]
    Connection { path: PathBuf, source: std::io::Error },

    #[error("Invalid IPC message format")]
    InvalidMessage,

    #[error("Daemon not responding")]
    DaemonUnresponsive,
}

/// State persistence errors
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to read state file: {path:?}")]
    FileRead { path: PathBuf, source: std::io::Error },

    #[error("Failed to write state file: {path:?}")]
    FileWrite { path: PathBuf, source: std::io::Error },

    #[error("Failed to serialize state")]
    Serialization,

    #[error("State file is corrupted: {message}")]
    Corrupted { message: String },
}

/// Validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid fill mode: {value}")]
    InvalidFillMode { value: String },

    #[error("Validation failed: {message}")]
    General { message: String },
}

// Convenience type alias
pub type Result<T> = std::result::Result<T, WaypickError>;

impl From<serde_json::Error> for WaypickError {
    fn from(_err: serde_json::Error) -> Self {
        WaypickError::State(StateError::Serialization)
    }
}

impl From<toml::de::Error> for WaypickError {
    fn from(err: toml::de::Error) -> Self {
        WaypickError::Config(ConfigError::TomlParse {
            message: err.to_string(),
        })
    }
}

// Error reporting utilities
pub trait ErrorReporting {
    fn log_error(&self, context: &str);
    fn user_friendly_message(&self) -> String;
}

impl ErrorReporting for WaypickError {
    fn log_error(&self, context: &str) {
        log::error!("{}: {:?}", context, self);
    }

    fn user_friendly_message(&self) -> String {
        match self {
            WaypickError::Config(ConfigError::FileRead { path, .. }) => {
                format!("Could not read configuration file: {:?}", path)
            }
            WaypickError::Config(ConfigError::TomlParse { message }) => {
                format!("Invalid configuration format: {}", message)
            }
            WaypickError::Selection(SelectionError::NoCandidate) => {
                "No wallpapers found in the configured folders.".to_string()
            }
            WaypickError::Backend(BackendError::Unavailable { requested }) => {
                format!(
                    "Backend '{}' is not installed and no other backend was found. \
                     Install one of: swaybg, swww, feh, wallutils, hyprpaper, mpvpaper.",
                    requested
                )
            }
            WaypickError::Backend(BackendError::NotConfigured) => {
                "No backend is selected. Choose one with --backend or in config.toml.".to_string()
            }
            WaypickError::Ipc(IpcError::Connection { .. }) => {
                "waypick daemon is not running. Please start waypick-daemon first.".to_string()
            }
            WaypickError::Ipc(IpcError::DaemonUnresponsive) => {
                "waypick daemon is not responding. Please restart the daemon.".to_string()
            }
            WaypickError::Process(ProcessError::NonZeroExit { command, code, stderr }) => {
                format!("{} exited with code {}: {}", command, code, stderr.trim())
            }
            _ => self.to_string(),
        }
    }
}
