use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::error::{ScanError, WaypickError};
use crate::media::{extension_of, MediaFile};

/// Filters applied while walking wallpaper folders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanOptions {
    pub include_subfolders: bool,
    pub include_all_subfolders: bool,
    pub include_hidden: bool,
    pub only_gifs: bool,
}

impl ScanOptions {
    /// walkdir depth limit: root files sit at depth 1.
    fn max_depth(&self) -> Option<usize> {
        match (self.include_subfolders, self.include_all_subfolders) {
            (false, _) => Some(1),
            (true, false) => Some(2),
            (true, true) => None,
        }
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Walk every folder and return the media files that pass the filters.
///
/// Folders that cannot be read are skipped with a warning; the walk itself never fails.
/// Within a directory files come before subdirectories, each sorted by name, so the
/// result is stable for a given tree.
pub fn scan(folders: &[PathBuf], options: &ScanOptions, allowed_extensions: &[&str]) -> Vec<MediaFile> {
    let mut files = Vec::new();

    for folder in folders {
        let root = std::path::absolute(folder).unwrap_or_else(|_| folder.clone());
        let before = files.len();
        scan_folder(&root, options, allowed_extensions, &mut files);
        log::debug!("Found {} files in {:?}", files.len() - before, root);
    }

    log::info!("Discovered {} wallpapers in {} folders", files.len(), folders.len());
    files
}

fn scan_folder(root: &Path, options: &ScanOptions, allowed_extensions: &[&str], files: &mut Vec<MediaFile>) {
    let include_hidden = options.include_hidden;
    let mut walker = WalkDir::new(root)
        .follow_links(true)
        .min_depth(1)
        .sort_by(|a, b| {
            a.file_type()
                .is_dir()
                .cmp(&b.file_type().is_dir())
                .then_with(|| a.file_name().cmp(b.file_name()))
        });
    if let Some(depth) = options.max_depth() {
        walker = walker.max_depth(depth);
    }

    let entries = walker
        .into_iter()
        .filter_entry(move |entry| include_hidden || !is_hidden(entry));

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                let error = WaypickError::Scan(ScanError::DirectoryRead {
                    path,
                    source: e.into(),
                });
                log::warn!("Skipping unreadable path: {}", error);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let extension = extension_of(entry.path());
        if !allowed_extensions.contains(&extension.as_str()) {
            continue;
        }
        if options.only_gifs && extension != "gif" {
            continue;
        }

        files.push(MediaFile::new(entry.into_path()));
    }
}
