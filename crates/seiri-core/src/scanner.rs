//! Watch folder scanner.
//!
//! Walks user-configured directories and turns every video file that passes
//! the size threshold into an unmatched [`LocalFile`].

use std::collections::BTreeMap;
use std::path::Path;

use tracing::warn;
use walkdir::WalkDir;

use crate::config::LibraryConfig;
use crate::error::SeiriError;
use crate::models::LocalFile;

/// Discover video files under every configured watch folder.
///
/// Missing folders are logged and skipped. The result is sorted by
/// normalized path, and a file reachable through two folders appears once.
#[tracing::instrument(name = "discover_local_files", skip_all)]
pub fn discover_local_files(config: &LibraryConfig) -> Result<Vec<LocalFile>, SeiriError> {
    let min_bytes = config.min_file_size_mb * 1024 * 1024;
    let extensions: Vec<String> = config
        .video_extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_lowercase())
        .collect();

    let mut found = BTreeMap::new();
    let mut skipped = 0u32;

    for folder in &config.watch_folders {
        if !folder.is_dir() {
            warn!(path = %folder.display(), "Watch folder does not exist, skipping");
            continue;
        }

        tracing::info!(path = %folder.display(), "Scanning watch folder");

        for entry in WalkDir::new(folder).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Failed to read directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !has_extension(entry.path(), &extensions) {
                continue;
            }

            let size = match entry.metadata() {
                Ok(m) => m.len(),
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "Failed to read file metadata");
                    skipped += 1;
                    continue;
                }
            };
            if size < min_bytes {
                skipped += 1;
                continue;
            }

            let file = LocalFile::new(entry.path());
            found.entry(file.path.clone()).or_insert(file);
        }
    }

    tracing::info!(found = found.len(), skipped, "Watch folder scan complete");
    Ok(found.into_values().collect())
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
}
