//! Core types for manga-import

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Row identifier of a managed manga
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MangaId(pub i64);

impl MangaId {
    /// Create a new MangaId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for MangaId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<MangaId> for i64 {
    fn from(id: MangaId) -> Self {
        id.0
    }
}

impl std::fmt::Display for MangaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl sqlx::Type<sqlx::Sqlite> for MangaId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for MangaId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for MangaId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Acquisition and import lifecycle of one managed volume
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeStatus {
    /// Known to exist, nothing done yet
    Missing,
    /// A torrent search is in progress
    Searching,
    /// A torrent is downloading
    Downloading,
    /// Download finished, waiting for import
    Downloaded,
    /// Present in the reader library by other means
    Available,
    /// Copied into the canonical layout
    Imported,
    /// Import or download failed
    Failed,
}

impl VolumeStatus {
    /// Text stored in the `status` column
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeStatus::Missing => "missing",
            VolumeStatus::Searching => "searching",
            VolumeStatus::Downloading => "downloading",
            VolumeStatus::Downloaded => "downloaded",
            VolumeStatus::Available => "available",
            VolumeStatus::Imported => "imported",
            VolumeStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for VolumeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VolumeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "missing" => Ok(VolumeStatus::Missing),
            "searching" => Ok(VolumeStatus::Searching),
            "downloading" => Ok(VolumeStatus::Downloading),
            "downloaded" => Ok(VolumeStatus::Downloaded),
            "available" => Ok(VolumeStatus::Available),
            "imported" => Ok(VolumeStatus::Imported),
            "failed" => Ok(VolumeStatus::Failed),
            other => Err(format!("unknown volume status: {other}")),
        }
    }
}

impl sqlx::Type<sqlx::Sqlite> for VolumeStatus {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <str as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for VolumeStatus {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        let text: &'q str = self.as_str();
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&text, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for VolumeStatus {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let text = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(text.parse()?)
    }
}

/// Archive type detected by file extension
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveType {
    /// RAR archive (.rar, .cbr)
    Rar,
    /// 7-Zip archive (.7z)
    SevenZip,
    /// ZIP archive (.zip, .cbz)
    Zip,
}

/// A finished download as reported by the torrent client
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedDownload {
    /// Directory or single archive file holding the payload
    ///
    /// A relative path is resolved against the configured download directory.
    pub path: PathBuf,
    /// Display name of the torrent
    pub name: String,
}

/// Final volume number decided for one detected folder
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeAssignment {
    /// Volume number the folder is imported as
    pub volume_number: u32,
    /// The detected volume folder
    pub path: PathBuf,
}

/// Result of importing one volume
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ImportOutcome {
    /// Pages were copied into a new target directory
    Imported {
        /// Number of pages copied
        pages: usize,
    },
    /// The target directory already existed, nothing was touched
    AlreadyImported,
}

/// Counters reported by one import pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSummary {
    /// Volumes newly copied into the library
    pub imported: usize,
    /// Volumes whose target already existed
    pub already_imported: usize,
    /// Volumes or batches that failed
    pub failed: usize,
    /// Folders skipped because their volume number could not be decided
    pub skipped_ambiguous: usize,
}

impl PassSummary {
    /// Add another summary's counters to this one
    pub fn merge(&mut self, other: PassSummary) {
        self.imported += other.imported;
        self.already_imported += other.already_imported;
        self.failed += other.failed;
        self.skipped_ambiguous += other.skipped_ambiguous;
    }
}

/// Event emitted while an import pass runs
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// An import pass started
    PassStarted,

    /// A volume was copied into the library
    VolumeImported {
        /// Managed manga
        manga_id: MangaId,
        /// Volume number
        volume_number: u32,
        /// Number of pages copied
        pages: usize,
        /// Target directory
        path: PathBuf,
    },

    /// A volume's target directory already existed
    VolumeAlreadyImported {
        /// Managed manga
        manga_id: MangaId,
        /// Volume number
        volume_number: u32,
    },

    /// A volume could not be imported
    VolumeFailed {
        /// Managed manga
        manga_id: MangaId,
        /// Volume number
        volume_number: u32,
        /// Error message
        error: String,
    },

    /// A detected folder was left out of a batch
    FolderSkipped {
        /// Managed manga
        manga_id: MangaId,
        /// The skipped folder
        path: PathBuf,
        /// Why it was skipped
        reason: String,
    },

    /// A batch download finished processing
    BatchFinished {
        /// Managed manga
        manga_id: MangaId,
        /// Counters for this batch
        summary: PassSummary,
        /// Batch-level error, if the batch could not be classified at all
        error: Option<String>,
    },

    /// An import pass finished
    PassCompleted {
        /// Counters for the pass
        summary: PassSummary,
        /// Wall time of the pass
        duration: Duration,
    },

    /// The reader catalog was asked to rescan
    CatalogRefreshRequested,
}
