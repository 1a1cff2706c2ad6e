use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::backend::BackendKind;
use crate::error::{StateError, WaypickError};
use crate::media::MonitorTarget;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallpaperRecord {
    pub monitor: MonitorTarget,
    pub wallpaper: PathBuf,
    pub backend: BackendKind,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WallpaperState {
    pub wallpapers: Vec<WallpaperRecord>,
    pub last_save: chrono::DateTime<chrono::Utc>,
}

impl Default for WallpaperState {
    fn default() -> Self {
        Self::new()
    }
}

impl WallpaperState {
    pub fn new() -> Self {
        Self {
            wallpapers: Vec::new(),
            last_save: chrono::Utc::now(),
        }
    }

    pub fn save(&self, state_file: &Path) -> Result<()> {
        let write_error = |source| {
            WaypickError::State(StateError::FileWrite {
                path: state_file.to_path_buf(),
                source,
            })
        };

        if let Some(parent) = state_file.parent() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(state_file, json).map_err(write_error)?;

        log::debug!("State saved to {:?}", state_file);
        Ok(())
    }

    pub fn load(state_file: &Path) -> Result<Self> {
        if !state_file.exists() {
            log::info!("No state file found, starting fresh");
            return Ok(Self::new());
        }

        let json = fs::read_to_string(state_file).map_err(|source| {
            WaypickError::State(StateError::FileRead {
                path: state_file.to_path_buf(),
                source,
            })
        })?;

        let state: Self = serde_json::from_str(&json).map_err(|e| {
            WaypickError::State(StateError::Corrupted {
                message: e.to_string(),
            })
        })?;

        log::info!("State loaded from {:?}", state_file);
        Ok(state)
    }

    pub fn get_state_file() -> PathBuf {
        dirs::state_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("waypick")
            .join("state.json")
    }

    // Remember `wallpaper` on `monitor`. Setting `All` supersedes every
    // per-monitor record.
    pub fn record(&mut self, monitor: MonitorTarget, wallpaper: &Path, backend: BackendKind) {
        let record = WallpaperRecord {
            monitor,
            wallpaper: wallpaper.to_path_buf(),
            backend,
        };

        if record.monitor.is_all() {
            self.wallpapers.clear();
            self.wallpapers.push(record);
        } else if let Some(existing) = self
            .wallpapers
            .iter_mut()
            .find(|existing| existing.monitor == record.monitor)
        {
            *existing = record;
        } else {
            self.wallpapers.push(record);
        }
        self.last_save = chrono::Utc::now();
    }

    pub fn get(&self, monitor: &MonitorTarget) -> Option<&WallpaperRecord> {
        self.wallpapers.iter().find(|record| &record.monitor == monitor)
    }

    pub fn records(&self) -> &[WallpaperRecord] {
        &self.wallpapers
    }

    pub fn list_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.wallpapers)?)
    }
}
