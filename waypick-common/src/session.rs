use std::path::{Path, PathBuf};

use crate::backend::{BackendCatalog, BackendDescriptor};
use crate::command_builder::{DispatchOptions, DispatchTarget};
use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::error::{SelectionError, WaypickError};
use crate::executor::{CommandRunner, ProcessExecutor};
use crate::media::{FillMode, MediaFile, MonitorTarget};
use crate::scanner::ScanOptions;
use crate::selector::RandomSelector;
use crate::state::WallpaperState;
use crate::Result;

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub backend: BackendDescriptor,
    pub folders: Vec<PathBuf>,
    pub scan: ScanOptions,
    pub fill: FillMode,
    pub options: DispatchOptions,
    pub cache_dir: PathBuf,
    pub state_file: PathBuf,
}

pub struct WallpaperSession<R: CommandRunner = ProcessExecutor> {
    settings: SessionSettings,
    selector: RandomSelector,
    dispatcher: Dispatcher<R>,
    catalog: BackendCatalog,
}

impl<R: CommandRunner + 'static> WallpaperSession<R> {
    pub fn new(settings: SessionSettings, dispatcher: Dispatcher<R>) -> Self {
        let selector = RandomSelector::new(&settings.cache_dir);
        Self {
            settings,
            selector,
            dispatcher,
            catalog: BackendCatalog::new(),
        }
    }

    pub fn backend(&self) -> &BackendDescriptor {
        &self.settings.backend
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub async fn scan(&self) -> Vec<MediaFile> {
        let backend = self.settings.backend.clone();
        let folders = self.settings.folders.clone();
        let options = self.settings.scan;
        match tokio::task::spawn_blocking(move || backend.scan(&folders, &options)).await {
            Ok(files) => files,
            Err(e) => {
                log::error!("Folder scan failed: {}", e);
                Vec::new()
            }
        }
    }

    fn target(&self, file: MediaFile, monitor: MonitorTarget) -> DispatchTarget {
        DispatchTarget {
            file,
            monitor,
            fill: self.settings.fill,
            options: self.settings.options.clone(),
        }
    }

    pub async fn set(&self, file: &Path, monitors: &[MonitorTarget]) -> Vec<DispatchOutcome> {
        let file = MediaFile::new(file);
        let targets = monitors
            .iter()
            .map(|monitor| self.target(file.clone(), monitor.clone()))
            .collect();
        let outcomes = self.dispatcher.apply_batch(targets, &self.settings.backend).await;
        self.remember(&outcomes);
        outcomes
    }

    pub async fn random(&self, monitors: &[MonitorTarget]) -> Result<Vec<DispatchOutcome>> {
        let candidates = self.scan().await;
        if candidates.is_empty() {
            return Err(WaypickError::Selection(SelectionError::NoCandidate));
        }

        let mut targets = Vec::with_capacity(monitors.len());
        for monitor in monitors {
            match self.selector.pick(&candidates) {
                Some(file) => targets.push(self.target(file, monitor.clone())),
                None => log::warn!("Could not pick a wallpaper for {}", monitor),
            }
        }
        if targets.is_empty() {
            return Err(WaypickError::Selection(SelectionError::NoCandidate));
        }

        let outcomes = self.dispatcher.apply_batch(targets, &self.settings.backend).await;
        self.remember(&outcomes);
        Ok(outcomes)
    }

    pub async fn restore(&self) -> Result<Vec<DispatchOutcome>> {
        let state = WallpaperState::load(&self.settings.state_file)?;
        let mut outcomes = Vec::with_capacity(state.records().len());

        for (index, record) in state.records().iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.dispatcher.spacing()).await;
            }
            let backend = self.catalog.get(record.backend);
            let target = self.target(MediaFile::new(&record.wallpaper), record.monitor.clone());
            outcomes.extend(self.dispatcher.apply_batch(vec![target], backend).await);
        }
        Ok(outcomes)
    }

    fn remember(&self, outcomes: &[DispatchOutcome]) {
        if !outcomes.iter().any(DispatchOutcome::is_ok) {
            return;
        }

        let state_file = &self.settings.state_file;
        let mut state = WallpaperState::load(state_file).unwrap_or_else(|e| {
            log::warn!("Failed to load state, starting fresh: {}", e);
            WallpaperState::new()
        });
        for outcome in outcomes.iter().filter(|outcome| outcome.is_ok()) {
            state.record(outcome.monitor.clone(), &outcome.wallpaper, outcome.backend);
        }
        if let Err(e) = state.save(state_file) {
            log::error!("Failed to save state: {}", e);
        }
    }
}
