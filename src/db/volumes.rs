//! Managed volume lifecycle status.

use crate::error::DatabaseError;
use crate::types::{MangaId, VolumeStatus};
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::path::Path;

use super::{Database, ManagedVolume};

const VOLUME_COLUMNS: &str = "id, managed_manga_id, volume_number, status, error_message, \
     torrent_id, download_path, created_at, updated_at";

impl Database {
    /// Insert a new managed volume
    pub async fn insert_volume(
        &self,
        manga_id: MangaId,
        volume_number: u32,
        status: VolumeStatus,
    ) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO managed_volume (
                managed_manga_id, volume_number, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(manga_id)
        .bind(volume_number)
        .bind(status)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert volume: {}",
                e
            )))
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Get one volume of a manga
    pub async fn get_volume(
        &self,
        manga_id: MangaId,
        volume_number: u32,
    ) -> Result<Option<ManagedVolume>> {
        let row = sqlx::query_as::<_, ManagedVolume>(&format!(
            "SELECT {VOLUME_COLUMNS} FROM managed_volume \
             WHERE managed_manga_id = ? AND volume_number = ?"
        ))
        .bind(manga_id)
        .bind(volume_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get volume: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Create the volume if it is unknown, otherwise overwrite its status and error
    pub async fn upsert_volume_status(
        &self,
        manga_id: MangaId,
        volume_number: u32,
        status: VolumeStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO managed_volume (
                managed_manga_id, volume_number, status, error_message, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(managed_manga_id, volume_number) DO UPDATE SET
                status = excluded.status,
                error_message = excluded.error_message,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(manga_id)
        .bind(volume_number)
        .bind(status)
        .bind(error)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to upsert volume status: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Set a volume's status and error message by row id
    pub async fn set_volume_status(
        &self,
        id: i64,
        status: VolumeStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            "UPDATE managed_volume SET status = ?, error_message = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status)
        .bind(error)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to set volume status: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::Database(DatabaseError::NotFound(format!(
                "volume {}",
                id
            ))));
        }

        Ok(())
    }

    /// Record a single-volume torrent and move the volume to `downloading`
    pub async fn set_volume_downloading(&self, id: i64, torrent_id: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            "UPDATE managed_volume SET status = ?, torrent_id = ?, error_message = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(VolumeStatus::Downloading)
        .bind(torrent_id)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to set volume downloading: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Move a volume to `downloaded`, remembering where the payload landed
    pub async fn mark_volume_downloaded(&self, id: i64, download_path: &Path) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            "UPDATE managed_volume SET status = ?, download_path = ?, error_message = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(VolumeStatus::Downloaded)
        .bind(download_path.to_string_lossy().into_owned())
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to mark volume downloaded: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// List volumes in a given status, ordered by manga then volume number
    pub async fn list_volumes_by_status(&self, status: VolumeStatus) -> Result<Vec<ManagedVolume>> {
        let rows = sqlx::query_as::<_, ManagedVolume>(&format!(
            "SELECT {VOLUME_COLUMNS} FROM managed_volume \
             WHERE status = ? ORDER BY managed_manga_id ASC, volume_number ASC"
        ))
        .bind(status)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list volumes: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Volume numbers of a manga persisted as `imported`
    pub async fn imported_volume_numbers(&self, manga_id: MangaId) -> Result<BTreeSet<u32>> {
        let numbers: Vec<u32> = sqlx::query_scalar(
            "SELECT volume_number FROM managed_volume WHERE managed_manga_id = ? AND status = ?",
        )
        .bind(manga_id)
        .bind(VolumeStatus::Imported)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to query imported volumes: {}",
                e
            )))
        })?;

        Ok(numbers.into_iter().collect())
    }
}
