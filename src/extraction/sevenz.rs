use crate::error::{Error, ImportError, Result};
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

/// In-process 7z decoder, used when no 7z binary is available
pub struct SevenZipExtractor;

impl SevenZipExtractor {
    /// Extract a 7z archive into `dest_path`
    pub fn extract(archive_path: &Path, dest_path: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dest_path)?;

        sevenz_rust::decompress_file(archive_path, dest_path).map_err(|e| {
            Error::Import(ImportError::ExtractionFailed {
                archive: archive_path.to_path_buf(),
                reason: format!("failed to extract 7z archive: {}", e),
            })
        })?;

        Self::validate_extracted_paths(archive_path, dest_path)?;

        let extracted_files: Vec<PathBuf> = WalkDir::new(dest_path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();

        info!(
            ?archive_path,
            extracted_count = extracted_files.len(),
            "7z extraction successful"
        );
        Ok(extracted_files)
    }

    /// Fail if anything written by the decoder resolves outside `dest_path`
    fn validate_extracted_paths(archive_path: &Path, dest_path: &Path) -> Result<()> {
        let canonical_dest = dest_path.canonicalize()?;
        for entry in WalkDir::new(dest_path).min_depth(1) {
            let entry = entry.map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
            let canonical = entry.path().canonicalize()?;
            if !canonical.starts_with(&canonical_dest) {
                return Err(Error::Import(ImportError::ExtractionFailed {
                    archive: archive_path.to_path_buf(),
                    reason: format!(
                        "path traversal detected: extracted file {:?} is outside destination",
                        canonical
                    ),
                }));
            }
        }
        Ok(())
    }
}
