//! Volume folder detection

use crate::tree::{DirNode, EntryFilter};
use std::path::PathBuf;

/// Find every folder of a snapshot that is itself a volume
///
/// A folder is a volume when it directly contains page images. Wrapper
/// directories without images are skipped transparently. A folder holding both
/// loose images and volume subfolders counts as an extra volume after its
/// children. Hidden and junk directories are never descended into.
pub fn find_volume_folders(root: &DirNode, filter: &EntryFilter) -> Vec<PathBuf> {
    let mut volumes: Vec<PathBuf> = root
        .dirs
        .iter()
        .filter(|d| !filter.skips_dir(&d.name))
        .flat_map(|d| find_volume_folders(d, filter))
        .collect();

    if root.has_direct_images(filter) {
        volumes.push(root.path.clone());
    }

    volumes
}
