use indexer_core::types::SyncMode;
use indexer_core::{IndexerConfig, Result};
use indexer_db::repositories::SyncStatusRepository;
use indexer_db::DatabasePool;
use indexer_processor::Projector;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::fetcher::EventFetcher;
use crate::provider::{ProviderHealth, ProviderManager};

const PROJECTION_BATCH: i64 = 500;

struct RunState {
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
    handle: JoinHandle<()>,
    health_handle: JoinHandle<()>,
}

/// Background ingestion pipeline: fetch, store, project, repeat.
///
/// One tick per poll interval. A failing tick records the error and the
/// loop keeps going; the engine only stops when asked to.
pub struct SyncEngine {
    config: IndexerConfig,
    db: Arc<DatabasePool>,
    provider: Arc<ProviderManager>,
    fetcher: Arc<EventFetcher>,
    projector: Arc<Projector>,
    running: AtomicBool,
    run_state: tokio::sync::Mutex<Option<RunState>>,
    last_error: RwLock<Option<String>>,
}

impl SyncEngine {
    pub fn new(config: IndexerConfig, db: Arc<DatabasePool>) -> Result<Self> {
        let provider = Arc::new(ProviderManager::new(
            &config.providers,
            Duration::from_secs(config.provider_cooldown_secs),
        )?);
        let fetcher = Arc::new(EventFetcher::new(
            config.clone(),
            provider.clone(),
            db.clone(),
        ));
        let projector = Arc::new(Projector::new(db.clone()));

        Ok(Self {
            config,
            db,
            provider,
            fetcher,
            projector,
            running: AtomicBool::new(false),
            run_state: tokio::sync::Mutex::new(None),
            last_error: RwLock::new(None),
        })
    }

    pub fn fetcher(&self) -> &Arc<EventFetcher> {
        &self.fetcher
    }

    pub fn provider(&self) -> &Arc<ProviderManager> {
        &self.provider
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    pub fn provider_health(&self) -> Vec<ProviderHealth> {
        self.provider.health()
    }

    /// Start the background loop. A second start while running is a no-op.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let mut state = self.run_state.lock().await;
        if state.is_some() {
            info!("Sync engine already running");
            return Ok(());
        }

        SyncStatusRepository::set_sync_mode(self.db.inner(), self.config.sync_mode.as_str())
            .await
            .map_err(|e| indexer_core::IndexerError::Storage(e.to_string()))?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());

        let health_handle = tokio::spawn(Arc::clone(&self.provider).run_health_checks(
            Duration::from_secs(self.config.health_check_interval_secs),
            shutdown.clone(),
        ));

        let engine = Arc::clone(self);
        let loop_shutdown = shutdown.clone();
        let loop_wake = wake.clone();
        let handle = tokio::spawn(async move {
            engine.run_loop(loop_shutdown, loop_wake).await;
        });

        *state = Some(RunState {
            shutdown,
            wake,
            handle,
            health_handle,
        });
        self.running.store(true, Ordering::SeqCst);
        info!(mode = self.config.sync_mode.as_str(), "Sync engine started");
        Ok(())
    }

    /// Stop the background loop and wait for the current tick to finish
    pub async fn stop(&self) {
        let mut state = self.run_state.lock().await;
        let Some(run) = state.take() else {
            info!("Sync engine not running");
            return;
        };

        run.shutdown.store(true, Ordering::SeqCst);
        run.wake.notify_one();
        run.health_handle.abort();
        if let Err(e) = run.handle.await {
            if !e.is_cancelled() {
                error!(error = %e, "Sync loop task panicked");
            }
        }
        self.running.store(false, Ordering::SeqCst);
        info!("Sync engine stopped");
    }

    pub async fn restart(self: &Arc<Self>) -> Result<()> {
        self.stop().await;
        self.start().await
    }

    async fn run_loop(&self, shutdown: Arc<AtomicBool>, wake: Arc<Notify>) {
        let poll_interval = self.config.tier.poll_interval();

        if self.config.sync_mode == SyncMode::Push {
            // A poll catch-up runs from the cursor before every subscribe
            // attempt, so the window between the cursor and the first
            // pushed log is always fetched, never skipped.
            while !shutdown.load(Ordering::Relaxed) {
                self.tick().await;
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                tokio::select! {
                    result = self.fetcher.run_push(shutdown.clone()) => {
                        if let Err(e) = result {
                            warn!(error = %e, "Push subscription lost, falling back to polling");
                            self.record_error(&e.to_string()).await;
                        }
                    }
                    _ = wake.notified() => break,
                }
                if interruptible_sleep(poll_interval, &wake).await {
                    break;
                }
            }
            return;
        }

        while !shutdown.load(Ordering::Relaxed) {
            self.tick().await;
            if interruptible_sleep(poll_interval, &wake).await {
                break;
            }
        }
    }

    /// One pipeline tick. Errors are contained here so a bad provider or
    /// a transient storage failure never kills the loop.
    async fn tick(&self) {
        match self.fetcher.poll_once().await {
            Ok(_) => self.clear_error().await,
            Err(e) => {
                error!(error = %e, "Poll pass failed");
                self.record_error(&e.to_string()).await;
            }
        }

        if let Err(e) = self.projector.apply_next(PROJECTION_BATCH).await {
            error!(error = %e, "Projection pass failed");
            self.record_error(&e.to_string()).await;
        }
    }

    async fn record_error(&self, message: &str) {
        *self.last_error.write() = Some(message.to_string());
        if let Err(e) = SyncStatusRepository::set_last_error(self.db.inner(), Some(message)).await
        {
            error!(error = %e, "Failed to persist last_error");
        }
    }

    async fn clear_error(&self) {
        let had_error = self.last_error.read().is_some();
        if had_error {
            *self.last_error.write() = None;
            if let Err(e) = SyncStatusRepository::set_last_error(self.db.inner(), None).await {
                error!(error = %e, "Failed to clear last_error");
            }
        }
    }
}

/// Sleep that a stop request cuts short. Returns true when woken.
async fn interruptible_sleep(duration: Duration, wake: &Notify) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = wake.notified() => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn stop_request_cuts_the_poll_sleep_short() {
        let wake = Notify::new();
        wake.notify_one();

        let started = Instant::now();
        let woken = interruptible_sleep(Duration::from_secs(60), &wake).await;

        assert!(woken);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn undisturbed_sleep_runs_to_completion() {
        let wake = Notify::new();
        let woken = interruptible_sleep(Duration::from_millis(10), &wake).await;
        assert!(!woken);
    }
}
