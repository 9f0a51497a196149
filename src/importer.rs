//! Copying volumes into the canonical library layout
//!
//! A volume lands in `{title} [id-{id}]/v{NN}/` as `001.ext`, `002.ext`, ...
//! in reading order. An existing target directory is never touched, so
//! importing the same volume again is a no-op.

use crate::config::Config;
use crate::error::{Error, ImportError, Result};
use crate::pages::PageSorter;
use crate::tree::EntryFilter;
use crate::types::ImportOutcome;
use crate::utils::{manga_dir_name, volume_dir_name};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[allow(clippy::expect_used)]
static VOLUME_DIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v([0-9]+)$").expect("volume dir pattern is valid"));

/// One volume to import
#[derive(Clone, Copy, Debug)]
pub struct ImportRequest<'a> {
    /// Folder holding the volume's pages
    pub source_dir: &'a Path,
    /// Manga display title
    pub title: &'a str,
    /// Numeric manga id used in the directory name
    pub library_id: i64,
    /// Volume number
    pub volume_number: u32,
    /// Subfolders of `source_dir` that belong to other volumes
    pub exclude: &'a [PathBuf],
}

/// Copies sorted pages into the library
#[derive(Clone, Debug)]
pub struct VolumeImporter {
    library_dir: PathBuf,
    filter: EntryFilter,
    sorter: PageSorter,
}

impl VolumeImporter {
    /// Create an importer from configuration
    pub fn new(config: &Config) -> Self {
        Self::with_parts(
            config.library.library_dir.clone(),
            EntryFilter::from_config(&config.import),
            PageSorter::new(
                config.import.spread_max_gap,
                config.import.unparseable_fallback_ratio,
            ),
        )
    }

    /// Create an importer from its parts
    pub fn with_parts(library_dir: PathBuf, filter: EntryFilter, sorter: PageSorter) -> Self {
        Self {
            library_dir,
            filter,
            sorter,
        }
    }

    /// Directory holding all volumes of a manga
    pub fn manga_dir(&self, title: &str, library_id: i64) -> PathBuf {
        self.library_dir.join(manga_dir_name(title, library_id))
    }

    /// Canonical directory of one volume
    pub fn target_dir(&self, title: &str, library_id: i64, volume_number: u32) -> PathBuf {
        self.manga_dir(title, library_id)
            .join(volume_dir_name(volume_number))
    }

    /// Volume numbers that already have a `v<N>` directory for this manga
    pub fn existing_volume_numbers(&self, title: &str, library_id: i64) -> Result<BTreeSet<u32>> {
        let dir = self.manga_dir(title, library_id);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(e.into()),
        };

        let mut numbers = BTreeSet::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            if let Some(caps) = VOLUME_DIR.captures(&name.to_string_lossy())
                && let Ok(n) = caps[1].parse::<u32>()
            {
                numbers.insert(n);
            }
        }
        Ok(numbers)
    }

    /// Image files under `source_dir` in reading order
    ///
    /// Hidden entries, junk directories and `exclude`d subfolders are skipped.
    pub fn collect_pages(&self, source_dir: &Path, exclude: &[PathBuf]) -> Vec<PathBuf> {
        let images: Vec<PathBuf> = WalkDir::new(source_dir)
            .into_iter()
            .filter_entry(|e| {
                if e.depth() == 0 {
                    return true;
                }
                if e.file_type().is_dir() {
                    let name = e.file_name().to_string_lossy();
                    return !self.filter.skips_dir(&name)
                        && !exclude.iter().any(|x| x.as_path() == e.path());
                }
                true
            })
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && self.filter.is_image(&e.file_name().to_string_lossy()))
            .map(|e| e.into_path())
            .collect();

        self.sorter.sort_paths(images)
    }

    /// Copy one volume into the library
    ///
    /// Returns [`ImportOutcome::AlreadyImported`] without touching anything when
    /// the target exists. If copying fails part-way the target is removed again.
    pub fn import(&self, request: &ImportRequest<'_>) -> Result<ImportOutcome> {
        let target = self.target_dir(request.title, request.library_id, request.volume_number);

        if target.exists() {
            debug!(?target, volume = request.volume_number, "target exists, skipping");
            return Ok(ImportOutcome::AlreadyImported);
        }

        let pages = self.collect_pages(request.source_dir, request.exclude);
        if pages.is_empty() {
            return Err(Error::Import(ImportError::NoImageFiles {
                path: request.source_dir.to_path_buf(),
            }));
        }

        if let Err(e) = copy_pages(&pages, &target) {
            if let Err(cleanup_err) = std::fs::remove_dir_all(&target) {
                warn!(?target, error = %cleanup_err, "failed to remove partial volume");
            }
            return Err(e);
        }

        info!(
            source = ?request.source_dir,
            ?target,
            volume = request.volume_number,
            pages = pages.len(),
            "imported volume"
        );
        Ok(ImportOutcome::Imported { pages: pages.len() })
    }
}

fn copy_pages(pages: &[PathBuf], target: &Path) -> Result<()> {
    std::fs::create_dir_all(target)?;
    let width = if pages.len() >= 1000 { 4 } else { 3 };

    for (index, page) in pages.iter().enumerate() {
        let name = match page.extension() {
            Some(ext) => format!("{:0width$}.{}", index + 1, ext.to_string_lossy()),
            None => format!("{:0width$}", index + 1),
        };
        std::fs::copy(page, target.join(name))?;
    }
    Ok(())
}
