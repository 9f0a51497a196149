//! Junk removal after extraction

use crate::tree::EntryFilter;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Remove junk files and directories (`__MACOSX`, `.DS_Store`, `Thumbs.db`, ...) below `root`
///
/// Names are matched case-insensitively. Errors are logged and do not fail
/// the extraction. Returns the number of entries removed.
pub(crate) async fn remove_junk(root: &Path, filter: &EntryFilter) -> usize {
    use tokio::fs;

    let mut files_to_delete = Vec::new();
    let mut folders_to_delete = Vec::new();
    collect_junk(root, filter, &mut files_to_delete, &mut folders_to_delete).await;

    let mut removed = 0;
    for file in &files_to_delete {
        match fs::remove_file(file).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(?file, error = %e, "failed to delete junk file"),
        }
    }
    for folder in &folders_to_delete {
        match fs::remove_dir_all(folder).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(?folder, error = %e, "failed to delete junk folder"),
        }
    }

    debug!(?root, removed, "junk cleanup complete");
    removed
}

fn collect_junk<'a>(
    path: &'a Path,
    filter: &'a EntryFilter,
    files_to_delete: &'a mut Vec<PathBuf>,
    folders_to_delete: &'a mut Vec<PathBuf>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
        let mut entries = match tokio::fs::read_dir(path).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(?path, error = %e, "failed to read directory during junk cleanup");
                return;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let entry_path = entry.path();
            let file_type = match entry.file_type().await {
                Ok(ft) => ft,
                Err(_) => continue,
            };
            let name = entry.file_name().to_string_lossy().into_owned();

            if file_type.is_dir() {
                if filter.is_junk_dir(&name) {
                    folders_to_delete.push(entry_path);
                } else {
                    collect_junk(&entry_path, filter, files_to_delete, folders_to_delete).await;
                }
            } else if filter.is_junk_file(&name) {
                files_to_delete.push(entry_path);
            }
        }
    })
}
