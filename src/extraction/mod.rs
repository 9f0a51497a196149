//! Archive extraction
//!
//! Turns a completed download (a single archive, a folder of archives, or a
//! plain folder) into a plain directory tree of images. Archives are unpacked
//! into one scoped temporary directory, archives exposed by that first step
//! are unpacked once more in place, and junk entries are removed.
//!
//! `.zip`/`.cbz` are read in-process. `.rar`/`.cbr` go through `bsdtar` and
//! `.7z` through `7z` when those binaries exist, otherwise through the
//! in-process decoders. The archiver timeout bounds the `.rar`/`.7z` backends;
//! ZIP decoding runs to completion.

mod cleanup;
mod external;
mod rar;
mod sevenz;
mod shared;
mod zip;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use external::{ArchiverTools, extract_with_7z, extract_with_bsdtar};
pub use rar::RarExtractor;
pub use sevenz::SevenZipExtractor;
pub use shared::{
    detect_archive_type, extraction_target, find_archives, find_archives_recursive, is_archive,
};
pub use zip::ZipExtractor;

use crate::config::Config;
use crate::error::{Error, ImportError, Result};
use crate::tree::EntryFilter;
use crate::types::ArchiveType;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle, spawn_blocking};
use tracing::{debug, info, warn};

/// A temporary extraction directory, removed when closed or dropped
#[derive(Debug)]
pub struct ExtractionDir {
    dir: tempfile::TempDir,
}

impl ExtractionDir {
    /// Create a fresh directory below `parent` (created if missing)
    pub fn create_in(parent: &Path) -> Result<Self> {
        std::fs::create_dir_all(parent)?;
        let dir = tempfile::Builder::new().prefix("import-").tempdir_in(parent)?;
        debug!(path = ?dir.path(), "created extraction directory");
        Ok(Self { dir })
    }

    /// Path of the directory
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory, reporting removal errors
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        debug!(?path, "removed extraction directory");
        Ok(())
    }
}

/// A download ready for volume detection
#[derive(Debug)]
pub struct PreparedSource {
    /// Directory to scan for volumes
    pub import_path: PathBuf,
    temp: Option<ExtractionDir>,
}

impl PreparedSource {
    /// A source used as-is, without extraction
    pub fn passthrough(path: impl Into<PathBuf>) -> Self {
        Self {
            import_path: path.into(),
            temp: None,
        }
    }

    /// Whether `import_path` is a temporary extraction directory
    pub fn is_extracted(&self) -> bool {
        self.temp.is_some()
    }

    /// Remove the temporary extraction directory, if any
    pub fn close(self) -> Result<()> {
        match self.temp {
            Some(dir) => dir.close(),
            None => Ok(()),
        }
    }
}

/// Prepares completed downloads for import
#[derive(Clone, Debug)]
pub struct ArchiveExtractor {
    filter: EntryFilter,
    tools: ArchiverTools,
    timeout: Duration,
    extract_root: PathBuf,
}

impl ArchiveExtractor {
    /// Create an extractor from configuration, discovering archiver binaries
    pub fn new(config: &Config) -> Self {
        Self::with_tools(
            EntryFilter::from_config(&config.import),
            ArchiverTools::discover(&config.tools),
            config.import.archiver_timeout,
            config.library.extract_dir.clone(),
        )
    }

    /// Create an extractor with explicit tools
    pub fn with_tools(
        filter: EntryFilter,
        tools: ArchiverTools,
        timeout: Duration,
        extract_root: PathBuf,
    ) -> Self {
        Self {
            filter,
            tools,
            timeout,
            extract_root,
        }
    }

    /// Normalize `source` into a plain directory tree
    ///
    /// A single archive, or a directory with archives at its top level, is
    /// extracted into a new [`ExtractionDir`], one subdirectory per archive.
    /// A directory without top-level archives is passed through unchanged.
    /// On failure the temporary directory is removed before returning.
    pub async fn prepare(&self, source: &Path) -> Result<PreparedSource> {
        let metadata = tokio::fs::metadata(source).await?;

        let archives = if metadata.is_file() {
            if !self.filter.is_archive(source) {
                return Err(Error::Import(ImportError::UnsupportedFormat {
                    path: source.to_path_buf(),
                }));
            }
            vec![source.to_path_buf()]
        } else {
            find_archives(source, &self.filter)?
        };

        if archives.is_empty() {
            debug!(?source, "no archives, using download as-is");
            return Ok(PreparedSource::passthrough(source));
        }

        let temp = ExtractionDir::create_in(&self.extract_root)?;
        match self.extract_all(&archives, temp.path()).await {
            Ok(()) => Ok(PreparedSource {
                import_path: temp.path().to_path_buf(),
                temp: Some(temp),
            }),
            Err(e) => {
                if let Err(close_err) = temp.close() {
                    warn!(?source, error = %close_err, "failed to remove extraction directory");
                }
                Err(e)
            }
        }
    }

    async fn extract_all(&self, archives: &[PathBuf], root: &Path) -> Result<()> {
        for archive in archives {
            let dest = extraction_target(root, archive);
            self.extract_archive(archive, &dest).await?;
        }

        let nested = find_archives_recursive(root, &self.filter);
        for archive in &nested {
            let parent = archive.parent().unwrap_or(root);
            let dest = extraction_target(parent, archive);
            info!(?archive, "found nested archive, extracting");
            match self.extract_archive(archive, &dest).await {
                Ok(()) => {
                    if let Err(e) = tokio::fs::remove_file(archive).await {
                        warn!(?archive, error = %e, "failed to delete nested archive");
                    }
                }
                Err(e) => {
                    warn!(?archive, error = %e, "failed to extract nested archive, continuing");
                }
            }
        }

        cleanup::remove_junk(root, &self.filter).await;

        info!(
            archives = archives.len(),
            nested = nested.len(),
            ?root,
            "extraction complete"
        );
        Ok(())
    }

    /// Extract one archive into `dest`, choosing the backend by archive type
    pub async fn extract_archive(&self, archive: &Path, dest: &Path) -> Result<()> {
        let archive_type = detect_archive_type(archive).ok_or_else(|| {
            Error::Import(ImportError::UnsupportedFormat {
                path: archive.to_path_buf(),
            })
        })?;

        info!(?archive, ?archive_type, ?dest, "extracting archive");

        match archive_type {
            ArchiveType::Zip => run_in_process(archive, dest, ZipExtractor::extract).await,
            ArchiveType::Rar => match &self.tools.bsdtar {
                Some(binary) => extract_with_bsdtar(binary, archive, dest, self.timeout).await,
                None => self.run_bounded(archive, dest, RarExtractor::extract).await,
            },
            ArchiveType::SevenZip => match &self.tools.sevenzip {
                Some(binary) => extract_with_7z(binary, archive, dest, self.timeout).await,
                None => self.run_bounded(archive, dest, SevenZipExtractor::extract).await,
            },
        }
    }

    /// Run an in-process fallback decoder under the archiver timeout
    ///
    /// A decoder cannot be interrupted between writes, so after a timeout the
    /// blocking task is still joined. `dest` is never handed back for removal
    /// while something is writing into it.
    async fn run_bounded(&self, archive: &Path, dest: &Path, extract: Decoder) -> Result<()> {
        let mut handle = spawn_decoder(archive, dest, extract);

        match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(joined) => decoder_result(archive, joined),
            Err(_) => {
                warn!(
                    ?archive,
                    timeout_secs = self.timeout.as_secs(),
                    "in-process extraction timed out, waiting for decoder to stop"
                );
                if let Err(e) = handle.await {
                    warn!(?archive, error = %e, "decoder task failed after timeout");
                }
                Err(Error::Import(ImportError::ArchiverTimeout {
                    archive: archive.to_path_buf(),
                    timeout: self.timeout,
                }))
            }
        }
    }
}

type Decoder = fn(&Path, &Path) -> Result<Vec<PathBuf>>;

/// Run an in-process decoder to completion
async fn run_in_process(archive: &Path, dest: &Path, extract: Decoder) -> Result<()> {
    let joined = spawn_decoder(archive, dest, extract).await;
    decoder_result(archive, joined)
}

fn spawn_decoder(archive: &Path, dest: &Path, extract: Decoder) -> JoinHandle<Result<Vec<PathBuf>>> {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();
    spawn_blocking(move || extract(&archive, &dest))
}

fn decoder_result(
    archive: &Path,
    joined: std::result::Result<Result<Vec<PathBuf>>, JoinError>,
) -> Result<()> {
    match joined {
        Ok(result) => result.map(|files| {
            debug!(?archive, extracted = files.len(), "in-process extraction done");
        }),
        Err(e) => Err(Error::Import(ImportError::ExtractionFailed {
            archive: archive.to_path_buf(),
            reason: format!("extraction task panicked: {}", e),
        })),
    }
}
