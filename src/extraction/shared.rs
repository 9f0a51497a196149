use crate::error::Result;
use crate::tree::EntryFilter;
use crate::types::ArchiveType;
use crate::utils::{extension_lowercase, file_stem_lossy};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Detect archive type by file extension
///
/// Comic-book extensions map to their container format: `.cbz` is ZIP and
/// `.cbr` is RAR.
pub fn detect_archive_type(path: &Path) -> Option<ArchiveType> {
    match extension_lowercase(path)?.as_str() {
        "rar" | "cbr" => Some(ArchiveType::Rar),
        "7z" => Some(ArchiveType::SevenZip),
        "zip" | "cbz" => Some(ArchiveType::Zip),
        _ => None,
    }
}

/// Check if a file is an archive based on its extension
///
/// # Arguments
/// * `path` - Path to the file to check
/// * `archive_extensions` - List of extensions to treat as archives (without dots)
pub fn is_archive(path: &Path, archive_extensions: &[String]) -> bool {
    if let Some(ext) = path.extension() {
        let ext_str = ext.to_string_lossy().to_lowercase();
        archive_extensions
            .iter()
            .any(|ae| ae.to_lowercase() == ext_str)
    } else {
        false
    }
}

/// Archive files directly inside `dir`, sorted by path
pub fn find_archives(dir: &Path, filter: &EntryFilter) -> Result<Vec<PathBuf>> {
    let mut archives = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() && filter.is_archive(&entry.path()) {
            archives.push(entry.path());
        }
    }
    archives.sort();
    debug!(?dir, count = archives.len(), "found top-level archives");
    Ok(archives)
}

/// Archive files anywhere below `dir`, sorted by path
///
/// Hidden and junk directories (`__MACOSX`) are not descended into, so
/// AppleDouble companions such as `._Vol 1.cbz` are never extracted.
pub fn find_archives_recursive(dir: &Path, filter: &EntryFilter) -> Vec<PathBuf> {
    let mut archives: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| {
            !(e.file_type().is_dir() && filter.skips_dir(&e.file_name().to_string_lossy()))
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && filter.is_archive(e.path()))
        .map(|e| e.into_path())
        .collect();
    archives.sort();
    archives
}

/// Directory an archive is extracted into, below `parent`
///
/// Named after the archive stem so the name stays available for volume
/// number detection. If that name is taken, the extension is appended in
/// brackets, then a counter.
pub fn extraction_target(parent: &Path, archive: &Path) -> PathBuf {
    let stem = file_stem_lossy(archive);
    let stem = if stem.trim().is_empty() {
        "archive".to_string()
    } else {
        stem
    };

    let plain = parent.join(&stem);
    if !plain.exists() {
        return plain;
    }

    let ext = extension_lowercase(archive).unwrap_or_default();
    let tagged = parent.join(format!("{stem} [{ext}]"));
    if !tagged.exists() {
        return tagged;
    }

    (2u32..)
        .map(|n| parent.join(format!("{stem} [{ext} #{n}]")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(tagged)
}
