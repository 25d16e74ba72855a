//! Periodic background refresh of an [`EntropyPool`].
//!
//! A [`RefreshTask`] owns one OS thread that re-reads the pool's source every
//! [`RefreshConfig::interval`]. The task is cancellable: [`RefreshTask::stop`]
//! (or dropping the task) wakes the thread immediately and joins it.
//!
//! A tick that fails is retried up to [`RefreshConfig::max_retries`] times.
//! When every attempt fails the pool is marked stale, the fatal handler runs,
//! and the thread exits. The default handler aborts the process, because
//! generators would otherwise keep running on entropy that no longer changes.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{EntropyError, Result};
use crate::pool::EntropyPool;

/// Default refresh period: ten refreshes per second.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Default number of extra attempts per tick before a failure is fatal.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Callback run once when a refresh tick exhausts its retries.
pub type FatalHandler = Arc<dyn Fn(&EntropyError) + Send + Sync>;

/// Log the failure and abort the process.
pub fn abort_on_fatal() -> FatalHandler {
    Arc::new(|err: &EntropyError| {
        log::error!("entropy refresh is fatal, aborting: {err}");
        std::process::abort();
    })
}

/// Refresh cadence and failure policy.
#[derive(Clone)]
pub struct RefreshConfig {
    /// Period between refreshes.
    pub interval: Duration,
    /// Retries after the first failed attempt of a tick.
    pub max_retries: u32,
    /// Called once when a tick fails on every attempt.
    pub on_fatal: FatalHandler,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
            on_fatal: abort_on_fatal(),
        }
    }
}

impl RefreshConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_fatal_handler(mut self, on_fatal: FatalHandler) -> Self {
        self.on_fatal = on_fatal;
        self
    }
}

impl std::fmt::Debug for RefreshConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshConfig")
            .field("interval", &self.interval)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

/// Handle to a running refresh thread. Stops and joins on drop.
pub struct RefreshTask {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RefreshTask {
    /// Spawn the refresh thread for `pool`.
    pub fn start(pool: Arc<EntropyPool>, config: RefreshConfig) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("entropy-refresh".into())
            .spawn(move || {
                log::debug!(
                    "entropy refresh started: every {:?}, {} retries",
                    config.interval,
                    config.max_retries
                );
                loop {
                    match stop_rx.recv_timeout(config.interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        // Explicit stop, or the task handle is gone.
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    if let Err(err) = refresh_with_retries(&pool, config.max_retries) {
                        pool.mark_stale();
                        (config.on_fatal)(&err);
                        return;
                    }
                }
                log::debug!("entropy refresh stopped");
            })?;
        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Stop refreshing and wait for the thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    /// Whether the refresh thread is still alive.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            // The thread may already have exited after a fatal tick.
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RefreshTask {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for RefreshTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshTask")
            .field("running", &self.is_running())
            .finish()
    }
}

/// One tick: the first attempt plus up to `max_retries` more.
pub fn refresh_with_retries(pool: &EntropyPool, max_retries: u32) -> Result<()> {
    let attempts = max_retries.saturating_add(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match pool.refresh() {
            Ok(()) => return Ok(()),
            Err(err) if attempt < attempts => {
                log::warn!("entropy refresh attempt {attempt}/{attempts} failed: {err}");
            }
            Err(err) => {
                return Err(EntropyError::RefreshFailed {
                    attempts,
                    last: Box::new(err),
                });
            }
        }
    }
}
