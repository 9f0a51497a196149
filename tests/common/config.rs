//! A throwaway library, database and download source per test

use async_trait::async_trait;
use manga_import::db::NewManga;
use manga_import::{
    CatalogRefresher, CompletedDownload, Config, Database, DownloadSource, ImportOrchestrator,
    MangaId, Result,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Download source whose completed torrents can be added while a test runs
#[derive(Default)]
pub struct FakeDownloadSource {
    completed: Mutex<HashMap<String, PathBuf>>,
}

impl FakeDownloadSource {
    /// Mark `torrent_id` as finished at `path`
    pub fn complete(&self, torrent_id: &str, path: &Path) {
        self.completed
            .lock()
            .unwrap()
            .insert(torrent_id.to_string(), path.to_path_buf());
    }
}

#[async_trait]
impl DownloadSource for FakeDownloadSource {
    async fn completed(&self, torrent_id: &str) -> Result<Option<CompletedDownload>> {
        let completed = self.completed.lock().unwrap();
        Ok(completed.get(torrent_id).map(|path| CompletedDownload {
            path: path.clone(),
            name: path.file_name().unwrap().to_string_lossy().into_owned(),
        }))
    }
}

/// Counts catalog refreshes
#[derive(Default)]
pub struct RecordingRefresher {
    calls: AtomicUsize,
}

impl RecordingRefresher {
    /// Number of refreshes so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogRefresher for RecordingRefresher {
    async fn refresh(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Everything one pipeline test needs, rooted in a temp directory
pub struct TestLibrary {
    _dir: TempDir,
    /// Configuration pointing into the temp directory
    pub config: Config,
    /// Managed-volume store
    pub db: Arc<Database>,
    /// Completion signal
    pub source: Arc<FakeDownloadSource>,
    /// Catalog refresh recorder
    pub refresher: Arc<RecordingRefresher>,
}

impl TestLibrary {
    /// Fresh library, download area and database; external archivers disabled
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.library.library_dir = dir.path().join("manga");
        config.library.download_dir = dir.path().join("downloads");
        config.library.extract_dir = dir.path().join("extract");
        config.tools.search_path = false;
        config.persistence.database_path = dir.path().join("state/import.db");
        config.validate().unwrap();

        let db = Arc::new(
            Database::new(&config.persistence.database_path)
                .await
                .unwrap(),
        );

        Self {
            _dir: dir,
            config,
            db,
            source: Arc::new(FakeDownloadSource::default()),
            refresher: Arc::new(RecordingRefresher::default()),
        }
    }

    /// Orchestrator wired to this library's database, source and refresher
    pub fn orchestrator(&self) -> ImportOrchestrator {
        ImportOrchestrator::new(&self.config, self.db.clone(), self.source.clone())
            .with_refresher(self.refresher.clone())
    }

    /// Path inside the download area
    pub fn download(&self, name: &str) -> PathBuf {
        self.config.library.download_dir.join(name)
    }

    /// Register a managed manga
    pub async fn add_manga(&self, anilist_id: i64, title: &str) -> MangaId {
        self.db
            .insert_manga(&NewManga {
                anilist_id,
                title_romaji: Some(title.to_string()),
                monitored: true,
                ..Default::default()
            })
            .await
            .unwrap()
    }

    /// Canonical directory of a manga
    pub fn manga_dir(&self, anilist_id: i64, title: &str) -> PathBuf {
        self.config
            .library
            .library_dir
            .join(format!("{} [id-{}]", title, anilist_id))
    }
}
