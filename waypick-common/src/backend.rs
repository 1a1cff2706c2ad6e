use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{BackendError, WaypickError};
use crate::media::{extension_of, MediaFile, VIDEO_EXTENSIONS};
use crate::scanner::{self, ScanOptions};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    None,
    Swaybg,
    Swww,
    Feh,
    Wallutils,
    Hyprpaper,
    Mpvpaper,
}

impl BackendKind {
    /// Catalog order, also the fallback order when the requested backend is missing.
    pub const ALL: [BackendKind; 7] = [
        BackendKind::None,
        BackendKind::Swaybg,
        BackendKind::Swww,
        BackendKind::Feh,
        BackendKind::Wallutils,
        BackendKind::Hyprpaper,
        BackendKind::Mpvpaper,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::None => "none",
            BackendKind::Swaybg => "swaybg",
            BackendKind::Swww => "swww",
            BackendKind::Feh => "feh",
            BackendKind::Wallutils => "wallutils",
            BackendKind::Hyprpaper => "hyprpaper",
            BackendKind::Mpvpaper => "mpvpaper",
        }
    }
}

impl Default for BackendKind {
    fn default() -> Self {
        BackendKind::Swaybg
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = BackendError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| BackendError::Unknown { name: s.to_string() })
    }
}

/// How the backend process relates to the wallpaper it shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchStyle {
    Inert,
    /// The process must keep running to keep the wallpaper visible. Spawned and not waited on.
    Daemon,
    /// A short-lived client; its exit status decides success.
    OneShot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub per_monitor: bool,
    pub fill_mode: bool,
    pub color: bool,
    pub transitions: bool,
    pub playback: bool,
    pub sound: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendDescriptor {
    pub kind: BackendKind,
    pub name: &'static str,
    pub binary: Option<&'static str>,
    pub extensions: Vec<&'static str>,
    pub capabilities: Capabilities,
    pub launch: LaunchStyle,
}

const STILL_COMMON: &[&str] = &["gif", "jpg", "jpeg", "png", "webp", "bmp", "pnm", "tiff"];

impl BackendDescriptor {
    pub fn for_kind(kind: BackendKind) -> Self {
        let none = Capabilities::default();
        match kind {
            BackendKind::None => Self {
                kind,
                name: "None",
                binary: None,
                extensions: STILL_COMMON.to_vec(),
                capabilities: none,
                launch: LaunchStyle::Inert,
            },
            BackendKind::Swaybg => Self {
                kind,
                name: "swaybg",
                binary: Some("swaybg"),
                extensions: vec!["gif", "jpg", "jpeg", "png"],
                capabilities: Capabilities {
                    per_monitor: true,
                    fill_mode: true,
                    color: true,
                    ..none
                },
                launch: LaunchStyle::Daemon,
            },
            BackendKind::Swww => Self {
                kind,
                name: "swww",
                binary: Some("swww"),
                extensions: STILL_COMMON.to_vec(),
                capabilities: Capabilities {
                    per_monitor: true,
                    fill_mode: true,
                    color: true,
                    transitions: true,
                    ..none
                },
                launch: LaunchStyle::OneShot,
            },
            BackendKind::Feh => Self {
                kind,
                name: "feh",
                binary: Some("feh"),
                extensions: vec!["gif", "jpg", "jpeg", "png", "bmp", "pnm", "tiff"],
                capabilities: Capabilities {
                    fill_mode: true,
                    color: true,
                    ..none
                },
                launch: LaunchStyle::OneShot,
            },
            BackendKind::Wallutils => Self {
                kind,
                name: "wallutils",
                binary: Some("setwallpaper"),
                extensions: vec!["gif", "jpg", "jpeg", "png"],
                capabilities: Capabilities {
                    fill_mode: true,
                    ..none
                },
                launch: LaunchStyle::OneShot,
            },
            BackendKind::Hyprpaper => Self {
                kind,
                name: "Hyprpaper",
                binary: Some("hyprpaper"),
                extensions: vec!["jpg", "jpeg", "png", "webp"],
                capabilities: Capabilities {
                    per_monitor: true,
                    ..none
                },
                launch: LaunchStyle::OneShot,
            },
            BackendKind::Mpvpaper => {
                let mut extensions = STILL_COMMON.to_vec();
                extensions.push("avif");
                extensions.extend_from_slice(VIDEO_EXTENSIONS);
                Self {
                    kind,
                    name: "mpvpaper",
                    binary: Some("mpvpaper"),
                    extensions,
                    capabilities: Capabilities {
                        per_monitor: true,
                        fill_mode: true,
                        playback: true,
                        sound: true,
                        ..none
                    },
                    launch: LaunchStyle::Daemon,
                }
            }
        }
    }

    pub fn is_extension_supported(&self, path: &Path) -> bool {
        let ext = extension_of(path);
        !ext.is_empty() && self.extensions.contains(&ext.as_str())
    }

    pub fn supports(&self, file: &MediaFile) -> bool {
        self.is_extension_supported(file.path())
    }

    pub fn scan(&self, folders: &[PathBuf], options: &ScanOptions) -> Vec<MediaFile> {
        scanner::scan(folders, options, &self.extensions)
    }

    pub fn is_installed(&self) -> bool {
        self.binary
            .map(|binary| which::which(binary).is_ok())
            .unwrap_or(false)
    }

    pub fn require(&self, feature: &str, supported: bool) -> Result<()> {
        if supported {
            Ok(())
        } else {
            Err(WaypickError::Backend(BackendError::Unsupported {
                backend: self.name.to_string(),
                feature: feature.to_string(),
            }))
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackendCatalog {
    backends: HashMap<BackendKind, BackendDescriptor>,
}

impl BackendCatalog {
    pub fn new() -> Self {
        let backends = BackendKind::ALL
            .into_iter()
            .map(|kind| (kind, BackendDescriptor::for_kind(kind)))
            .collect();
        Self { backends }
    }

    pub fn get(&self, kind: BackendKind) -> &BackendDescriptor {
        // Built from BackendKind::ALL, so every kind is present.
        &self.backends[&kind]
    }

    pub fn iter(&self) -> impl Iterator<Item = &BackendDescriptor> {
        BackendKind::ALL.into_iter().map(move |kind| self.get(kind))
    }

    pub fn installed(&self) -> Vec<&BackendDescriptor> {
        self.iter().filter(|backend| backend.is_installed()).collect()
    }

    pub fn resolve(&self, requested: BackendKind) -> Result<&BackendDescriptor> {
        let installed: Vec<BackendKind> = self.installed().iter().map(|b| b.kind).collect();
        self.resolve_among(requested, &installed)
    }

    pub fn resolve_among(
        &self,
        requested: BackendKind,
        installed: &[BackendKind],
    ) -> Result<&BackendDescriptor> {
        if requested == BackendKind::None {
            return Err(WaypickError::Backend(BackendError::NotConfigured));
        }
        if installed.contains(&requested) {
            return Ok(self.get(requested));
        }
        match BackendKind::ALL
            .into_iter()
            .find(|kind| *kind != BackendKind::None && installed.contains(kind))
        {
            Some(fallback) => {
                log::warn!(
                    "Backend {} is not installed, falling back to {}",
                    requested,
                    fallback
                );
                Ok(self.get(fallback))
            }
            None => Err(WaypickError::Backend(BackendError::Unavailable {
                requested: requested.to_string(),
            })),
        }
    }
}

impl Default for BackendCatalog {
    fn default() -> Self {
        Self::new()
    }
}
