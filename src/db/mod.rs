//! Database layer for manga-import
//!
//! Handles SQLite persistence for managed manga and their volumes.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`]: Database lifecycle, schema migrations
//! - [`manga`]: Managed manga and their outstanding bulk downloads
//! - [`volumes`]: Per-volume lifecycle status

use crate::types::{MangaId, VolumeStatus};
use sqlx::{FromRow, sqlite::SqlitePool};
use std::path::PathBuf;

mod manga;
mod migrations;
mod volumes;

/// New managed manga to be inserted into the database
#[derive(Debug, Clone, Default)]
pub struct NewManga {
    /// AniList id, used in the canonical directory name
    pub anilist_id: i64,
    /// Romanized title
    pub title_romaji: Option<String>,
    /// English title
    pub title_english: Option<String>,
    /// Native title
    pub title_native: Option<String>,
    /// Whether new volumes should be acquired automatically
    pub monitored: bool,
}

/// Managed manga record from database
#[derive(Debug, Clone, FromRow)]
pub struct ManagedManga {
    /// Unique database ID
    pub id: MangaId,
    /// AniList id
    pub anilist_id: i64,
    /// Romanized title
    pub title_romaji: Option<String>,
    /// English title
    pub title_english: Option<String>,
    /// Native title
    pub title_native: Option<String>,
    /// Torrent id of an outstanding batch download
    pub bulk_torrent_id: Option<String>,
    /// Why the last batch failed as a whole
    pub bulk_error: Option<String>,
    /// Whether new volumes should be acquired automatically
    pub monitored: bool,
    /// Unix timestamp
    pub created_at: i64,
    /// Unix timestamp
    pub updated_at: i64,
}

impl ManagedManga {
    /// Title used for the canonical library directory
    ///
    /// Romaji, then English, then `Manga <anilist id>`.
    pub fn display_title(&self) -> String {
        [&self.title_romaji, &self.title_english]
            .into_iter()
            .flatten()
            .map(|t| t.trim())
            .find(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Manga {}", self.anilist_id))
    }
}

/// Managed volume record from database
#[derive(Debug, Clone, FromRow)]
pub struct ManagedVolume {
    /// Unique database ID
    pub id: i64,
    /// Owning manga
    pub managed_manga_id: MangaId,
    /// Volume number
    pub volume_number: u32,
    /// Lifecycle status
    pub status: VolumeStatus,
    /// Error message if the last import failed
    pub error_message: Option<String>,
    /// Torrent id of the single-volume download
    pub torrent_id: Option<String>,
    /// Where the completed download landed
    pub download_path: Option<String>,
    /// Unix timestamp
    pub created_at: i64,
    /// Unix timestamp
    pub updated_at: i64,
}

impl ManagedVolume {
    /// Completed download location, if one was recorded
    pub fn download_path(&self) -> Option<PathBuf> {
        self.download_path.as_deref().map(PathBuf::from)
    }
}

/// Database handle
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
