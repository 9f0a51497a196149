//! Managed manga CRUD and bulk download markers.

use crate::error::DatabaseError;
use crate::types::MangaId;
use crate::{Error, Result};

use super::{Database, ManagedManga, NewManga};

const MANGA_COLUMNS: &str = "id, anilist_id, title_romaji, title_english, title_native, \
     bulk_torrent_id, bulk_error, monitored, created_at, updated_at";

impl Database {
    /// Insert a new managed manga
    pub async fn insert_manga(&self, manga: &NewManga) -> Result<MangaId> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO managed_manga (
                anilist_id, title_romaji, title_english, title_native,
                monitored, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(manga.anilist_id)
        .bind(&manga.title_romaji)
        .bind(&manga.title_english)
        .bind(&manga.title_native)
        .bind(manga.monitored)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert manga: {}",
                e
            )))
        })?;

        Ok(MangaId(result.last_insert_rowid()))
    }

    /// Get a managed manga by ID
    pub async fn get_manga(&self, id: MangaId) -> Result<Option<ManagedManga>> {
        let row = sqlx::query_as::<_, ManagedManga>(&format!(
            "SELECT {MANGA_COLUMNS} FROM managed_manga WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get manga: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// List manga with an outstanding batch download, oldest first
    pub async fn list_manga_with_bulk_downloads(&self) -> Result<Vec<ManagedManga>> {
        let rows = sqlx::query_as::<_, ManagedManga>(&format!(
            "SELECT {MANGA_COLUMNS} FROM managed_manga \
             WHERE bulk_torrent_id IS NOT NULL ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list bulk downloads: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Record an outstanding batch download, clearing any previous batch error
    pub async fn set_bulk_download(&self, id: MangaId, torrent_id: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            "UPDATE managed_manga SET bulk_torrent_id = ?, bulk_error = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(torrent_id)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to set bulk download: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::Database(DatabaseError::NotFound(format!(
                "manga {}",
                id
            ))));
        }

        Ok(())
    }

    /// Clear the batch download marker
    ///
    /// `error` records why the batch as a whole could not be imported; `None`
    /// clears any earlier error.
    pub async fn clear_bulk_download(&self, id: MangaId, error: Option<&str>) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            "UPDATE managed_manga SET bulk_torrent_id = NULL, bulk_error = ?, updated_at = ? WHERE id = ?",
        )
        .bind(error)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to clear bulk download: {}",
                e
            )))
        })?;

        Ok(())
    }
}
