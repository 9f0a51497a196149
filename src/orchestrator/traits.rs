//! Seams between the import pipeline and its collaborators

use crate::Result;
use crate::types::{CompletedDownload, PassSummary};
use async_trait::async_trait;

/// Completion signal of the torrent client
///
/// Implementations report a download as complete once the client has all of
/// its data (seeding, or paused at 100%).
#[async_trait]
pub trait DownloadSource: Send + Sync {
    /// The finished download for `torrent_id`, or `None` while it is still running
    async fn completed(&self, torrent_id: &str) -> Result<Option<CompletedDownload>>;
}

/// Reader catalog that must rescan after volumes were imported
#[async_trait]
pub trait CatalogRefresher: Send + Sync {
    /// Ask the catalog to pick up new volumes
    async fn refresh(&self) -> Result<()>;
}

/// Catalog refresher used when no reader catalog is attached
pub struct NoOpCatalogRefresher;

#[async_trait]
impl CatalogRefresher for NoOpCatalogRefresher {
    async fn refresh(&self) -> Result<()> {
        Ok(())
    }
}

/// One full import pass, as driven by the scheduler
#[async_trait]
pub trait PassRunner: Send + Sync {
    /// Run a pass to completion
    async fn run_pass(&self) -> Result<PassSummary>;
}
