use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ValidationError;

/// Extensions treated as video: thumbnails come from the first frame and
/// only mpvpaper can display them.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "webm", "mkv", "flv", "vob", "ogv", "ogg", "rrc", "gifv", "mng", "mov", "avi", "qt", "wmv",
    "yuv", "rm", "asf", "amv", "mp4", "m4p", "m4v", "mpg", "mp2", "mpeg", "mpe", "mpv", "svi",
    "3gp", "3g2", "mxf", "roq", "nsv", "f4v", "f4p", "f4a", "f4b", "mod",
];

pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaFile {
    path: PathBuf,
    extension: String,
    is_video: bool,
}

impl MediaFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let extension = extension_of(&path);
        let is_video = VIDEO_EXTENSIONS.contains(&extension.as_str());
        Self { path, extension, is_video }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn is_video(&self) -> bool {
        self.is_video
    }

    pub fn id(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub fn file_name(&self) -> Option<&std::ffi::OsStr> {
        self.path.file_name()
    }
}

impl fmt::Display for MediaFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    Fill,
    Stretch,
    Fit,
    Center,
    Tile,
}

impl FillMode {
    pub const ALL: [FillMode; 5] = [
        FillMode::Fill,
        FillMode::Stretch,
        FillMode::Fit,
        FillMode::Center,
        FillMode::Tile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FillMode::Fill => "fill",
            FillMode::Stretch => "stretch",
            FillMode::Fit => "fit",
            FillMode::Center => "center",
            FillMode::Tile => "tile",
        }
    }
}

impl Default for FillMode {
    fn default() -> Self {
        FillMode::Fill
    }
}

impl fmt::Display for FillMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FillMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FillMode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValidationError::InvalidFillMode { value: s.to_string() })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MonitorTarget {
    All,
    Named(String),
}

impl MonitorTarget {
    pub fn name(&self) -> Option<&str> {
        match self {
            MonitorTarget::All => None,
            MonitorTarget::Named(name) => Some(name),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, MonitorTarget::All)
    }
}

impl From<String> for MonitorTarget {
    fn from(value: String) -> Self {
        if value.is_empty() || value.eq_ignore_ascii_case("all") {
            MonitorTarget::All
        } else {
            MonitorTarget::Named(value)
        }
    }
}

impl From<&str> for MonitorTarget {
    fn from(value: &str) -> Self {
        MonitorTarget::from(value.to_string())
    }
}

impl From<MonitorTarget> for String {
    fn from(value: MonitorTarget) -> Self {
        value.to_string()
    }
}

impl fmt::Display for MonitorTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorTarget::All => f.write_str("All"),
            MonitorTarget::Named(name) => f.write_str(name),
        }
    }
}

impl FromStr for MonitorTarget {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(MonitorTarget::from(s))
    }
}
