use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{SelectionError, WaypickError};
use crate::media::MediaFile;
use crate::Result;

pub const USED_WALLPAPERS_FILE: &str = "used_wallpapers.txt";

/// Non-repeating random picker backed by `<cache_dir>/used_wallpapers.txt`.
///
/// Picks through one selector are serialized. Two selectors (or two processes)
/// sharing a cache directory can still lose each other's updates.
#[derive(Debug)]
pub struct RandomSelector {
    cache_dir: PathBuf,
    lock: Mutex<()>,
}

impl RandomSelector {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn used_file(&self) -> PathBuf {
        self.cache_dir.join(USED_WALLPAPERS_FILE)
    }

    /// Pick a wallpaper not shown since the last reset, or `None` when there is
    /// nothing to pick or the used-set file could not be handled.
    pub fn pick(&self, candidates: &[MediaFile]) -> Option<MediaFile> {
        self.pick_with_rng(candidates, &mut rand::thread_rng())
    }

    pub fn pick_with_rng<R: Rng + ?Sized>(&self, candidates: &[MediaFile], rng: &mut R) -> Option<MediaFile> {
        // A poisoned lock only means a previous pick panicked; the file is rewritten whole anyway.
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        match self.try_pick(candidates, rng) {
            Ok(pick) => pick,
            Err(e) => {
                log::error!("Error getting random wallpaper: {}", e);
                None
            }
        }
    }

    fn try_pick<R: Rng + ?Sized>(&self, candidates: &[MediaFile], rng: &mut R) -> Result<Option<MediaFile>> {
        if candidates.is_empty() {
            log::info!("No wallpaper candidates to pick from");
            return Ok(None);
        }

        let used_file = self.used_file();
        let mut used = load_used(&used_file)?;
        let used_ids: HashSet<&str> = used.iter().map(String::as_str).collect();

        let remaining: Vec<&MediaFile> = candidates
            .iter()
            .filter(|candidate| !used_ids.contains(candidate.id().as_str()))
            .collect();

        let pick = match remaining.choose(rng) {
            Some(pick) => {
                let pick = (*pick).clone();
                used.push(pick.id());
                pick
            }
            None => {
                let Some(pick) = candidates.choose(rng) else {
                    return Err(WaypickError::Selection(SelectionError::NoCandidate));
                };
                log::info!("All {} wallpapers shown, starting a new round", candidates.len());
                used = vec![pick.id()];
                pick.clone()
            }
        };

        save_used(&used_file, &used)?;
        log::debug!("Picked {} ({} used)", pick, used.len());
        Ok(Some(pick))
    }
}

fn load_used(path: &Path) -> Result<Vec<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| read_error(path, e))?;
            }
            fs::File::create(path).map_err(|e| read_error(path, e))?;
            Ok(Vec::new())
        }
        Err(e) => Err(read_error(path, e)),
    }
}

// Write next to the target and rename so readers never see a truncated file.
fn save_used(path: &Path, used: &[String]) -> Result<()> {
    let tmp = path.with_extension("txt.tmp");
    let write = || -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        for entry in used {
            writeln!(file, "{}", entry)?;
        }
        file.sync_all()?;
        fs::rename(&tmp, path)
    };
    write().map_err(|e| {
        WaypickError::Selection(SelectionError::UsedSetWrite {
            path: path.to_path_buf(),
            source: e,
        })
    })
}

fn read_error(path: &Path, source: std::io::Error) -> WaypickError {
    WaypickError::Selection(SelectionError::UsedSetRead {
        path: path.to_path_buf(),
        source,
    })
}
