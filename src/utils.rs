//! Utility functions for file names and path manipulation

use std::path::Path;

/// Whether a file or directory name is hidden (dot-prefixed)
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Lowercased extension of a path, without the dot
pub fn extension_lowercase(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Whether the path's extension appears in `extensions` (case-insensitive)
///
/// # Examples
///
/// ```
/// use manga_import::utils::has_extension;
/// use std::path::Path;
///
/// let images = vec!["jpg".to_string(), "png".to_string()];
/// assert!(has_extension(Path::new("001.JPG"), &images));
/// assert!(!has_extension(Path::new("notes.txt"), &images));
/// ```
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    match extension_lowercase(path) {
        Some(ext) => extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)),
        None => false,
    }
}

/// File name without its extension, lossily converted to UTF-8
pub fn file_stem_lossy(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Final path component, lossily converted to UTF-8
pub fn file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Directory name of a manga in the canonical library layout
///
/// The title is sanitized so that path separators and reserved characters can
/// never escape the library root.
///
/// # Examples
///
/// ```
/// use manga_import::utils::manga_dir_name;
///
/// assert_eq!(manga_dir_name("Berserk", 30002), "Berserk [id-30002]");
/// assert_eq!(manga_dir_name("Fate/Zero", 7), "FateZero [id-7]");
/// ```
pub fn manga_dir_name(title: &str, id: i64) -> String {
    let sanitized = sanitize_filename::sanitize(title.trim());
    if sanitized.is_empty() {
        format!("[id-{id}]")
    } else {
        format!("{sanitized} [id-{id}]")
    }
}

/// Directory name of a volume in the canonical library layout (`v05`, `v123`)
pub fn volume_dir_name(volume_number: u32) -> String {
    format!("v{volume_number:02}")
}
