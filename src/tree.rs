//! Directory-tree snapshots
//!
//! The volume detection and numbering logic works on an immutable [`DirNode`]
//! taken once after extraction, so it never interleaves live filesystem calls
//! with decisions. Tests build snapshots with [`DirNode::from_paths`] instead of
//! touching the disk.

use crate::config::ImportConfig;
use crate::error::Result;
use crate::utils::{file_name_lossy, has_extension, is_hidden};
use std::path::{Path, PathBuf};

/// Classifies directory entries as images, archives or junk
#[derive(Clone, Debug)]
pub struct EntryFilter {
    image_extensions: Vec<String>,
    archive_extensions: Vec<String>,
    junk_file_names: Vec<String>,
    junk_dir_names: Vec<String>,
}

impl EntryFilter {
    /// Build a filter from the import configuration
    pub fn from_config(config: &ImportConfig) -> Self {
        let lower = |items: &[String]| -> Vec<String> {
            items.iter().map(|s| s.to_lowercase()).collect()
        };
        Self {
            image_extensions: lower(&config.image_extensions),
            archive_extensions: lower(&config.archive_extensions),
            junk_file_names: lower(&config.junk_file_names),
            junk_dir_names: lower(&config.junk_dir_names),
        }
    }

    /// Whether a file name is a page image (not hidden, recognized extension)
    pub fn is_image(&self, name: &str) -> bool {
        if is_hidden(name) {
            return false;
        }
        has_extension(Path::new(name), &self.image_extensions)
    }

    /// Whether a path has an archive extension
    pub fn is_archive(&self, path: &Path) -> bool {
        crate::extraction::is_archive(path, &self.archive_extensions)
    }

    /// Whether a file name is cleanup junk (case-insensitive)
    pub fn is_junk_file(&self, name: &str) -> bool {
        self.junk_file_names.contains(&name.to_lowercase())
    }

    /// Whether a directory name is cleanup junk (case-insensitive)
    pub fn is_junk_dir(&self, name: &str) -> bool {
        self.junk_dir_names.contains(&name.to_lowercase())
    }

    /// Whether a subdirectory should be ignored during volume detection
    pub fn skips_dir(&self, name: &str) -> bool {
        is_hidden(name) || self.is_junk_dir(name)
    }
}

impl Default for EntryFilter {
    fn default() -> Self {
        Self::from_config(&ImportConfig::default())
    }
}

/// One directory of a snapshot
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirNode {
    /// Absolute (or root-relative, for synthetic trees) path of the directory
    pub path: PathBuf,
    /// Final path component
    pub name: String,
    /// Names of the regular files directly inside, sorted
    pub files: Vec<String>,
    /// Subdirectories, sorted by name
    pub dirs: Vec<DirNode>,
}

impl DirNode {
    /// Create an empty node for `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = file_name_lossy(&path);
        Self {
            path,
            name,
            files: Vec::new(),
            dirs: Vec::new(),
        }
    }

    /// Snapshot the directory tree under `root`
    ///
    /// Symlinks are not followed. Subdirectories that cannot be read are kept
    /// as empty nodes and logged; only an unreadable root is an error.
    pub fn scan(root: &Path) -> Result<DirNode> {
        let mut node = DirNode::new(root);
        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if file_type.is_dir() {
                match DirNode::scan(&entry.path()) {
                    Ok(child) => node.dirs.push(child),
                    Err(e) => {
                        tracing::warn!(path = ?entry.path(), error = %e, "Could not read directory");
                        node.dirs.push(DirNode::new(entry.path()));
                    }
                }
            } else if file_type.is_file() {
                node.files.push(name);
            }
        }
        node.sort();
        Ok(node)
    }

    /// Build a synthetic snapshot from `/`-separated file paths relative to `root`
    ///
    /// Intermediate directories are implied by the file paths. A path ending in
    /// `/` creates an empty directory.
    pub fn from_paths<I, S>(root: impl Into<PathBuf>, paths: I) -> DirNode
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut node = DirNode::new(root);
        for rel in paths {
            let rel = rel.as_ref();
            let mut parts: Vec<&str> = rel.split('/').collect();
            let file = parts.pop().unwrap_or_default();
            let mut current = &mut node;
            for part in parts.into_iter().filter(|p| !p.is_empty()) {
                let idx = match current.dirs.iter().position(|d| d.name == part) {
                    Some(idx) => idx,
                    None => {
                        let child = DirNode::new(current.path.join(part));
                        current.dirs.push(child);
                        current.dirs.len() - 1
                    }
                };
                current = &mut current.dirs[idx];
            }
            if !file.is_empty() {
                current.files.push(file.to_string());
            }
        }
        node.sort();
        node
    }

    fn sort(&mut self) {
        self.files.sort();
        self.dirs.sort_by(|a, b| a.name.cmp(&b.name));
        for dir in &mut self.dirs {
            dir.sort();
        }
    }

    /// Whether this directory directly contains at least one image
    pub fn has_direct_images(&self, filter: &EntryFilter) -> bool {
        self.files.iter().any(|f| filter.is_image(f))
    }

    /// Images directly inside this directory
    pub fn direct_images<'a>(&'a self, filter: &'a EntryFilter) -> impl Iterator<Item = &'a str> {
        self.files
            .iter()
            .map(String::as_str)
            .filter(|f| filter.is_image(f))
    }

    /// Number of images in this directory and all non-hidden descendants
    pub fn image_count(&self, filter: &EntryFilter) -> usize {
        self.direct_images(filter).count()
            + self
                .dirs
                .iter()
                .filter(|d| !is_hidden(&d.name))
                .map(|d| d.image_count(filter))
                .sum::<usize>()
    }

    /// Find the node for `path` within this snapshot
    pub fn find(&self, path: &Path) -> Option<&DirNode> {
        if self.path == path {
            return Some(self);
        }
        if !path.starts_with(&self.path) {
            return None;
        }
        self.dirs.iter().find_map(|d| d.find(path))
    }
}
