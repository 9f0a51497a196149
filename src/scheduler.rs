//! Periodic import passes
//!
//! The scheduler runs one pass at startup and then one every `pass_interval`.
//! Manual triggers share the same guard, so at most one pass is ever in
//! flight; a trigger that arrives while a pass runs is dropped, not queued.
//!
//! # Example
//!
//! ```no_run
//! use manga_import::{Config, Database, ImportOrchestrator, ImportScheduler};
//! use manga_import::orchestrator::DownloadSource;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(source: Arc<dyn DownloadSource>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let db = Arc::new(Database::new(&config.persistence.database_path).await?);
//! let orchestrator = Arc::new(ImportOrchestrator::new(&config, db, source));
//!
//! let scheduler = ImportScheduler::new(orchestrator, config.import.pass_interval);
//! let token = CancellationToken::new();
//! tokio::spawn(scheduler.clone().run(token.clone()));
//!
//! // Later: stop between passes
//! token.cancel();
//! # Ok(())
//! # }
//! ```

use crate::Result;
use crate::orchestrator::PassRunner;
use crate::types::PassSummary;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Admits at most one import pass at a time
#[derive(Clone, Debug, Default)]
pub struct PassGuard {
    running: Arc<AtomicBool>,
}

impl PassGuard {
    /// Create an idle guard
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the guard, or `None` if a pass is already running
    pub fn try_acquire(&self) -> Option<PassPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PassPermit {
                running: self.running.clone(),
            })
    }

    /// Whether a pass currently holds the guard
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Held for the duration of one pass; releases the guard when dropped
#[derive(Debug)]
pub struct PassPermit {
    running: Arc<AtomicBool>,
}

impl Drop for PassPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Runs import passes on a fixed interval and on demand
#[derive(Clone)]
pub struct ImportScheduler {
    runner: Arc<dyn PassRunner>,
    interval: Duration,
    guard: PassGuard,
}

impl ImportScheduler {
    /// Create a scheduler for `runner`
    pub fn new(runner: Arc<dyn PassRunner>, interval: Duration) -> Self {
        Self {
            runner,
            interval,
            guard: PassGuard::new(),
        }
    }

    /// The guard shared by scheduled and manual passes
    pub fn guard(&self) -> &PassGuard {
        &self.guard
    }

    /// Run a pass now unless one is already in flight
    ///
    /// Returns `None` when the pass was skipped.
    pub async fn trigger(&self) -> Option<Result<PassSummary>> {
        let Some(_permit) = self.guard.try_acquire() else {
            debug!("import pass already running, skipping trigger");
            return None;
        };
        Some(self.runner.run_pass().await)
    }

    /// Run passes until `token` is cancelled
    ///
    /// The first pass starts immediately. Cancellation is observed between
    /// passes; a pass in progress always runs to completion.
    pub async fn run(self, token: CancellationToken) {
        info!(interval = ?self.interval, "import scheduler started");

        loop {
            match self.trigger().await {
                Some(Ok(summary)) => debug!(?summary, "scheduled pass finished"),
                Some(Err(e)) => error!(error = %e, "scheduled import pass failed"),
                None => {}
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("import scheduler stopped");
    }
}
