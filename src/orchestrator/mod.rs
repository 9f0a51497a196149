//! Import orchestration
//!
//! One pass walks every completed download, turns it into library volumes and
//! persists each volume's outcome:
//!
//! 1. manga with an outstanding batch download (bulk path),
//! 2. volumes whose single-volume torrent just finished,
//! 3. volumes left in `downloaded` by an earlier, interrupted pass.
//!
//! Downloads are processed strictly one after another. A failure is recorded
//! against the smallest unit that failed (a volume or a batch) and the pass
//! moves on.

mod traits;


pub use traits::{CatalogRefresher, DownloadSource, NoOpCatalogRefresher, PassRunner};

use crate::config::Config;
use crate::db::{Database, ManagedManga, ManagedVolume};
use crate::error::{Error, ImportError, Result};
use crate::extraction::ArchiveExtractor;
use crate::importer::{ImportRequest, VolumeImporter};
use crate::tree::{DirNode, EntryFilter};
use crate::types::{CompletedDownload, Event, ImportOutcome, PassSummary, VolumeStatus};
use crate::volumes::{DuplicateResolver, VolumeAssigner, find_volume_folders};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tokio::task::spawn_blocking;
use tracing::{debug, error, info, warn};

/// Drives import passes over completed downloads
pub struct ImportOrchestrator {
    db: Arc<Database>,
    extractor: ArchiveExtractor,
    importer: VolumeImporter,
    assigner: VolumeAssigner,
    filter: EntryFilter,
    source: Arc<dyn DownloadSource>,
    refresher: Arc<dyn CatalogRefresher>,
    download_dir: PathBuf,
    event_tx: broadcast::Sender<Event>,
}

impl ImportOrchestrator {
    /// Create an orchestrator from configuration
    ///
    /// Archiver binaries are discovered here. No catalog is refreshed until one
    /// is attached with [`with_refresher`](Self::with_refresher).
    pub fn new(config: &Config, db: Arc<Database>, source: Arc<dyn DownloadSource>) -> Self {
        let filter = EntryFilter::from_config(&config.import);
        let (event_tx, _rx) = broadcast::channel(256);

        Self {
            db,
            extractor: ArchiveExtractor::new(config),
            importer: VolumeImporter::new(config),
            assigner: VolumeAssigner::new(
                DuplicateResolver::new(config.import.duplicate_tie_ratio),
                filter.clone(),
            ),
            filter,
            source,
            refresher: Arc::new(NoOpCatalogRefresher),
            download_dir: config.library.download_dir.clone(),
            event_tx,
        }
    }

    /// Replace the archive extractor
    pub fn with_extractor(mut self, extractor: ArchiveExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Attach the reader catalog to refresh after imports
    pub fn with_refresher(mut self, refresher: Arc<dyn CatalogRefresher>) -> Self {
        self.refresher = refresher;
        self
    }

    /// Subscribe to pass events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Where a finished download lives on disk
    ///
    /// Relative paths are taken as relative to the download directory.
    fn download_path(&self, download: &CompletedDownload) -> PathBuf {
        if download.path.is_absolute() {
            download.path.clone()
        } else {
            self.download_dir.join(&download.path)
        }
    }

    /// Events are dropped silently when nobody listens
    fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Run one full import pass
    pub async fn run_pass(&self) -> Result<PassSummary> {
        let started = Instant::now();
        info!("import pass started");
        self.emit(Event::PassStarted);

        let mut summary = PassSummary::default();

        match self.process_bulk_downloads().await {
            Ok(s) => summary.merge(s),
            Err(e) => error!(error = %e, "failed to process batch downloads"),
        }
        match self.process_finished_torrents().await {
            Ok(s) => summary.merge(s),
            Err(e) => error!(error = %e, "failed to process finished volume downloads"),
        }
        match self.process_pending_imports().await {
            Ok(s) => summary.merge(s),
            Err(e) => error!(error = %e, "failed to process pending imports"),
        }

        if summary.imported > 0 {
            self.emit(Event::CatalogRefreshRequested);
            if let Err(e) = self.refresher.refresh().await {
                warn!(error = %e, "catalog refresh failed");
            }
        }

        let duration = started.elapsed();
        info!(
            imported = summary.imported,
            already_imported = summary.already_imported,
            failed = summary.failed,
            skipped_ambiguous = summary.skipped_ambiguous,
            ?duration,
            "import pass complete"
        );
        self.emit(Event::PassCompleted { summary, duration });

        Ok(summary)
    }

    async fn process_bulk_downloads(&self) -> Result<PassSummary> {
        let mut summary = PassSummary::default();

        for manga in self.db.list_manga_with_bulk_downloads().await? {
            let Some(torrent_id) = manga.bulk_torrent_id.as_deref() else {
                continue;
            };
            let download = match self.source.completed(torrent_id).await {
                Ok(Some(download)) => download,
                Ok(None) => {
                    debug!(manga_id = %manga.id, torrent_id, "batch download still running");
                    continue;
                }
                Err(e) => {
                    warn!(manga_id = %manga.id, torrent_id, error = %e, "failed to query download");
                    continue;
                }
            };

            let path = self.download_path(&download);
            info!(manga_id = %manga.id, name = %download.name, ?path, "importing batch download");
            let (batch, batch_error) = match self.import_batch(&manga, &path).await {
                Ok(batch) => (batch, None),
                Err(e) => {
                    error!(manga_id = %manga.id, ?path, error = %e, "batch import failed");
                    let batch = PassSummary {
                        failed: 1,
                        ..Default::default()
                    };
                    (batch, Some(e.to_string()))
                }
            };

            // Cleared even on failure, otherwise an unclassifiable batch is retried forever
            if let Err(e) = self
                .db
                .clear_bulk_download(manga.id, batch_error.as_deref())
                .await
            {
                error!(manga_id = %manga.id, error = %e, "failed to clear batch download marker");
            }

            self.emit(Event::BatchFinished {
                manga_id: manga.id,
                summary: batch,
                error: batch_error,
            });
            summary.merge(batch);
        }

        Ok(summary)
    }

    async fn process_finished_torrents(&self) -> Result<PassSummary> {
        let mut summary = PassSummary::default();

        for volume in self
            .db
            .list_volumes_by_status(VolumeStatus::Downloading)
            .await?
        {
            let Some(torrent_id) = volume.torrent_id.as_deref() else {
                continue;
            };
            let download = match self.source.completed(torrent_id).await {
                Ok(Some(download)) => download,
                Ok(None) => continue,
                Err(e) => {
                    warn!(volume_id = volume.id, torrent_id, error = %e, "failed to query download");
                    continue;
                }
            };

            let path = self.download_path(&download);
            if let Err(e) = self.db.mark_volume_downloaded(volume.id, &path).await
            {
                error!(volume_id = volume.id, error = %e, "failed to record finished download");
                continue;
            }

            summary.merge(self.import_downloaded_volume(&volume, &path).await);
        }

        Ok(summary)
    }

    async fn process_pending_imports(&self) -> Result<PassSummary> {
        let mut summary = PassSummary::default();

        for volume in self
            .db
            .list_volumes_by_status(VolumeStatus::Downloaded)
            .await?
        {
            let Some(path) = volume.download_path() else {
                continue;
            };
            summary.merge(self.import_downloaded_volume(&volume, &path).await);
        }

        Ok(summary)
    }

    async fn import_downloaded_volume(&self, volume: &ManagedVolume, source: &Path) -> PassSummary {
        let manga = match self.db.get_manga(volume.managed_manga_id).await {
            Ok(Some(manga)) => manga,
            Ok(None) => {
                warn!(volume_id = volume.id, "volume belongs to an unknown manga");
                return PassSummary::default();
            }
            Err(e) => {
                error!(volume_id = volume.id, error = %e, "failed to load manga");
                return PassSummary::default();
            }
        };

        match self.import_single(&manga, volume.volume_number, source).await {
            Ok(summary) => summary,
            Err(e) => {
                self.record_failure(&manga, volume.volume_number, &e).await;
                PassSummary {
                    failed: 1,
                    ..Default::default()
                }
            }
        }
    }

    /// Import a download holding several volumes
    ///
    /// Fails as a whole only when the download cannot be extracted or holds no
    /// volume folders; individual volume failures are recorded and counted.
    pub async fn import_batch(&self, manga: &ManagedManga, source: &Path) -> Result<PassSummary> {
        let prepared = self.extractor.prepare(source).await?;

        let result = async {
            let tree = snapshot(&prepared.import_path).await?;
            let folders = find_volume_folders(&tree, &self.filter);
            if folders.is_empty() {
                return Err(Error::Import(ImportError::NoVolumeFoldersDetected {
                    path: source.to_path_buf(),
                }));
            }
            self.import_folders(manga, &tree, &folders).await
        }
        .await;

        if let Err(e) = prepared.close() {
            warn!(?source, error = %e, "failed to remove extraction directory");
        }
        result
    }

    /// Import a download expected to hold `volume_number`
    ///
    /// When the download turns out to bundle more than one volume folder, the
    /// batch logic takes over and assigns numbers from the folders themselves.
    pub async fn import_single(
        &self,
        manga: &ManagedManga,
        volume_number: u32,
        source: &Path,
    ) -> Result<PassSummary> {
        let prepared = self.extractor.prepare(source).await?;

        let result = async {
            let tree = snapshot(&prepared.import_path).await?;
            let folders = find_volume_folders(&tree, &self.filter);

            if folders.len() > 1 {
                info!(
                    manga_id = %manga.id,
                    volume = volume_number,
                    folders = folders.len(),
                    "download bundles several volumes, importing as batch"
                );
                let summary = self.import_folders(manga, &tree, &folders).await?;
                self.settle_expected_volume(manga, volume_number).await;
                return Ok(summary);
            }

            let source_dir = folders
                .into_iter()
                .next()
                .unwrap_or_else(|| tree.path.clone());
            Ok(self
                .import_volume(manga, volume_number, &source_dir, &[])
                .await)
        }
        .await;

        if let Err(e) = prepared.close() {
            warn!(?source, error = %e, "failed to remove extraction directory");
        }
        result
    }

    /// Assign numbers to `folders` and import each assigned one
    async fn import_folders(
        &self,
        manga: &ManagedManga,
        tree: &DirNode,
        folders: &[PathBuf],
    ) -> Result<PassSummary> {
        let existing = self.existing_volume_numbers(manga).await?;
        let plan = self.assigner.assign(tree, folders, &existing);
        let mut summary = PassSummary::default();

        for present in &plan.already_present {
            debug!(
                manga_id = %manga.id,
                volume = present.volume_number,
                path = ?present.path,
                "volume already in library, skipping"
            );
            summary.already_imported += 1;
            self.emit(Event::VolumeAlreadyImported {
                manga_id: manga.id,
                volume_number: present.volume_number,
            });
        }

        if !plan.ambiguous.is_empty() {
            let skipped = ImportError::AmbiguousVolumeNumbers {
                folders: plan.ambiguous.clone(),
            };
            warn!(manga_id = %manga.id, error = %skipped, "skipping folders");
            for path in &plan.ambiguous {
                summary.skipped_ambiguous += 1;
                self.emit(Event::FolderSkipped {
                    manga_id: manga.id,
                    path: path.clone(),
                    reason: "volume number could not be determined".to_string(),
                });
            }
        }

        for assignment in &plan.assignments {
            // Volume folders nested inside this one hold other volumes' pages
            let exclude: Vec<PathBuf> = folders
                .iter()
                .filter(|f| **f != assignment.path && f.starts_with(&assignment.path))
                .cloned()
                .collect();
            summary.merge(
                self.import_volume(manga, assignment.volume_number, &assignment.path, &exclude)
                    .await,
            );
        }

        Ok(summary)
    }

    /// Import one volume folder and persist the outcome
    async fn import_volume(
        &self,
        manga: &ManagedManga,
        volume_number: u32,
        source_dir: &Path,
        exclude: &[PathBuf],
    ) -> PassSummary {
        let mut summary = PassSummary::default();

        if let Err(e) = self
            .db
            .upsert_volume_status(manga.id, volume_number, VolumeStatus::Downloaded, None)
            .await
        {
            error!(manga_id = %manga.id, volume = volume_number, error = %e, "failed to record volume");
            summary.failed += 1;
            return summary;
        }

        match self
            .copy_volume(manga, volume_number, source_dir, exclude)
            .await
        {
            Ok(outcome) => {
                if let Err(e) = self
                    .db
                    .upsert_volume_status(manga.id, volume_number, VolumeStatus::Imported, None)
                    .await
                {
                    error!(manga_id = %manga.id, volume = volume_number, error = %e, "failed to record import");
                }
                match outcome {
                    ImportOutcome::Imported { pages } => {
                        summary.imported += 1;
                        self.emit(Event::VolumeImported {
                            manga_id: manga.id,
                            volume_number,
                            pages,
                            path: self.target_dir(manga, volume_number),
                        });
                    }
                    ImportOutcome::AlreadyImported => {
                        summary.already_imported += 1;
                        self.emit(Event::VolumeAlreadyImported {
                            manga_id: manga.id,
                            volume_number,
                        });
                    }
                }
            }
            Err(e) => {
                self.record_failure(manga, volume_number, &e).await;
                summary.failed += 1;
            }
        }

        summary
    }

    async fn copy_volume(
        &self,
        manga: &ManagedManga,
        volume_number: u32,
        source_dir: &Path,
        exclude: &[PathBuf],
    ) -> Result<ImportOutcome> {
        let importer = self.importer.clone();
        let title = manga.display_title();
        let library_id = manga.anilist_id;
        let source_dir = source_dir.to_path_buf();
        let exclude = exclude.to_vec();

        spawn_blocking(move || {
            importer.import(&ImportRequest {
                source_dir: &source_dir,
                title: &title,
                library_id,
                volume_number,
                exclude: &exclude,
            })
        })
        .await
        .map_err(|e| Error::Other(format!("import task panicked: {}", e)))?
    }

    async fn record_failure(&self, manga: &ManagedManga, volume_number: u32, error: &Error) {
        if error.is_import_failure() {
            warn!(manga_id = %manga.id, volume = volume_number, error = %error, "volume import failed");
        } else {
            error!(manga_id = %manga.id, volume = volume_number, error = %error, "volume import failed");
        }
        let message = error.to_string();
        if let Err(e) = self
            .db
            .upsert_volume_status(manga.id, volume_number, VolumeStatus::Failed, Some(&message))
            .await
        {
            error!(manga_id = %manga.id, volume = volume_number, error = %e, "failed to record failure");
        }
        self.emit(Event::VolumeFailed {
            manga_id: manga.id,
            volume_number,
            error: message,
        });
    }

    /// After a single-volume download was imported as a batch, make sure the
    /// volume it was downloaded for does not stay in `downloaded` forever
    async fn settle_expected_volume(&self, manga: &ManagedManga, volume_number: u32) {
        let volume = match self.db.get_volume(manga.id, volume_number).await {
            Ok(Some(volume)) if volume.status == VolumeStatus::Downloaded => volume,
            Ok(_) => return,
            Err(e) => {
                error!(manga_id = %manga.id, volume = volume_number, error = %e, "failed to load volume");
                return;
            }
        };

        let result = if self.target_dir(manga, volume_number).is_dir() {
            self.db
                .set_volume_status(volume.id, VolumeStatus::Imported, None)
                .await
        } else {
            let message = format!("volume {} not found in download", volume_number);
            warn!(manga_id = %manga.id, volume = volume_number, "{}", message);
            self.db
                .set_volume_status(volume.id, VolumeStatus::Failed, Some(&message))
                .await
        };
        if let Err(e) = result {
            error!(manga_id = %manga.id, volume = volume_number, error = %e, "failed to update volume");
        }
    }

    /// Numbers persisted as imported plus `v<N>` folders already on disk
    async fn existing_volume_numbers(&self, manga: &ManagedManga) -> Result<BTreeSet<u32>> {
        let mut numbers = self.db.imported_volume_numbers(manga.id).await?;
        numbers.extend(
            self.importer
                .existing_volume_numbers(&manga.display_title(), manga.anilist_id)?,
        );
        Ok(numbers)
    }

    fn target_dir(&self, manga: &ManagedManga, volume_number: u32) -> PathBuf {
        self.importer
            .target_dir(&manga.display_title(), manga.anilist_id, volume_number)
    }
}

#[async_trait]
impl PassRunner for ImportOrchestrator {
    async fn run_pass(&self) -> Result<PassSummary> {
        ImportOrchestrator::run_pass(self).await
    }
}

/// Snapshot a directory tree off the async runtime
async fn snapshot(root: &Path) -> Result<DirNode> {
    let root = root.to_path_buf();
    spawn_blocking(move || DirNode::scan(&root))
        .await
        .map_err(|e| Error::Other(format!("directory scan panicked: {}", e)))?
}
