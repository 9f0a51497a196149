//! # manga-import
//!
//! Volume import and normalization engine for a self-hosted manga library.
//!
//! Completed downloads (a single archive, a folder of archives, or a plain
//! folder of images) are turned into the canonical library layout:
//!
//! ```text
//! <library>/<title> [id-<anilist id>]/v01/001.jpg
//!                                    /v01/002.jpg
//!                                    /v02/001.png
//! ```
//!
//! ## Pipeline
//!
//! - [`extraction`] normalizes a download into a plain directory tree
//! - [`volumes`] finds volume folders, reads their volume numbers, resolves
//!   duplicates and assigns numbers to folders without one
//! - [`pages`] orders page images the way a reader expects
//! - [`importer`] copies the ordered pages into the library
//! - [`orchestrator`] runs all of the above per completed download and
//!   persists each volume's status in the [`Database`]
//! - [`scheduler`] runs one pass at a time, periodically or on demand
//!
//! ## Quick Start
//!
//! ```no_run
//! use manga_import::orchestrator::DownloadSource;
//! use manga_import::{Config, Database, ImportOrchestrator, ImportScheduler};
//! use std::sync::Arc;
//!
//! # async fn example(source: Arc<dyn DownloadSource>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! config.validate()?;
//!
//! let db = Arc::new(Database::new(&config.persistence.database_path).await?);
//! let orchestrator = Arc::new(ImportOrchestrator::new(&config, db, source));
//!
//! // Subscribe to events
//! let mut events = orchestrator.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         println!("Event: {:?}", event);
//!     }
//! });
//!
//! let scheduler = ImportScheduler::new(orchestrator, config.import.pass_interval);
//! manga_import::run_until_shutdown(scheduler).await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Archive extraction
pub mod extraction;
/// Copying volumes into the library
pub mod importer;
/// Import passes over completed downloads
pub mod orchestrator;
/// Page ordering
pub mod pages;
/// Periodic import passes
pub mod scheduler;
/// Directory snapshots and entry classification
pub mod tree;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;
/// Volume folder detection and numbering
pub mod volumes;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{DatabaseError, Error, ImportError, Result};
pub use extraction::ArchiveExtractor;
pub use importer::VolumeImporter;
pub use orchestrator::{
    CatalogRefresher, DownloadSource, ImportOrchestrator, NoOpCatalogRefresher, PassRunner,
};
pub use pages::PageSorter;
pub use scheduler::{ImportScheduler, PassGuard};
pub use types::{
    CompletedDownload, Event, ImportOutcome, MangaId, PassSummary, VolumeAssignment, VolumeStatus,
};

/// Run the scheduler until a termination signal arrives.
///
/// The pass in flight when the signal arrives runs to completion; no new
/// pass starts afterwards.
///
/// # Platform-specific behavior
///
/// - **Unix:** listens for SIGTERM and SIGINT.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_until_shutdown(scheduler: ImportScheduler) {
    let token = tokio_util::sync::CancellationToken::new();
    let handle = tokio::spawn(scheduler.run(token.clone()));

    wait_for_signal().await;
    token.cancel();

    if let Err(e) = handle.await {
        tracing::error!(error = %e, "import scheduler task failed");
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted sandboxes; fall back to whatever is left
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            let name = tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
            };
            tracing::info!(signal = name, "shutdown signal received");
        }
        (Ok(mut only), Err(e)) | (Err(e), Ok(mut only)) => {
            tracing::warn!(error = %e, "one signal handler unavailable, waiting on the other");
            only.recv().await;
            tracing::info!("shutdown signal received");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "no signal handler available, falling back to ctrl_c");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!(signal = "ctrl_c", "shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "failed to listen for Ctrl+C"),
    }
}
