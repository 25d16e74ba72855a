//! The entropy subsystem: one pool, one identity allocator, one optional
//! refresh task.
//!
//! Generators are constructed from an [`Entropy`] handle rather than from
//! hidden process globals, so tests can run generators over a deterministic,
//! non-refreshing pool side by side with the real one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::Result;
use crate::generator::Generator;
use crate::identity::IdentityAllocator;
use crate::pool::EntropyPool;
use crate::refresh::{RefreshConfig, RefreshTask};
use crate::source::{EntropySource, OsSource};

/// How an [`Entropy`] subsystem is brought up.
#[derive(Debug, Clone)]
pub struct EntropyConfig {
    /// Refresh cadence and failure policy.
    pub refresh: RefreshConfig,
    /// Start the refresh task during init.
    pub auto_refresh: bool,
}

impl Default for EntropyConfig {
    fn default() -> Self {
        Self {
            refresh: RefreshConfig::default(),
            auto_refresh: true,
        }
    }
}

impl EntropyConfig {
    /// Config for a pool that is filled once and never refreshed.
    pub fn frozen() -> Self {
        Self {
            auto_refresh: false,
            ..Self::default()
        }
    }
}

/// Owns the entropy pool, the identity allocator and the refresh task.
pub struct Entropy {
    pool: Arc<EntropyPool>,
    allocator: IdentityAllocator,
    refresher: Mutex<Option<RefreshTask>>,
}

impl Entropy {
    /// Bring up a subsystem backed by OS randomness.
    pub fn init(config: EntropyConfig) -> Result<Arc<Self>> {
        Self::with_source(Box::new(OsSource), config)
    }

    /// Bring up a subsystem backed by `source`.
    ///
    /// The allocator constants are drawn from `source` first, then the pool is
    /// filled synchronously. The refresh task starts last, if enabled.
    pub fn with_source(source: Box<dyn EntropySource>, config: EntropyConfig) -> Result<Arc<Self>> {
        let allocator = IdentityAllocator::new(source.as_ref())?;
        let pool = Arc::new(EntropyPool::new(source)?);
        let entropy = Arc::new(Self::from_parts(pool, allocator));
        if config.auto_refresh {
            entropy.start_refresh(config.refresh)?;
        }
        Ok(entropy)
    }

    /// Assemble a subsystem from an existing pool and allocator. No refresh
    /// task is started.
    pub fn from_parts(pool: Arc<EntropyPool>, allocator: IdentityAllocator) -> Self {
        Self {
            pool,
            allocator,
            refresher: Mutex::new(None),
        }
    }

    /// Start periodic refresh. Returns `false` if a task is already running.
    pub fn start_refresh(&self, config: RefreshConfig) -> Result<bool> {
        let mut slot = self.refresher();
        if slot.as_ref().is_some_and(RefreshTask::is_running) {
            return Ok(false);
        }
        *slot = Some(RefreshTask::start(Arc::clone(&self.pool), config)?);
        Ok(true)
    }

    /// Stop periodic refresh and join the thread. Returns `false` if nothing
    /// was running.
    pub fn stop_refresh(&self) -> bool {
        let task = self.refresher().take();
        match task {
            Some(task) => {
                task.stop();
                true
            }
            None => false,
        }
    }

    /// Whether a refresh task is alive.
    pub fn is_refreshing(&self) -> bool {
        self.refresher().as_ref().is_some_and(RefreshTask::is_running)
    }

    /// Construct a standalone generator keyed from this subsystem.
    pub fn new_generator(&self) -> Generator {
        Generator::new(self)
    }

    /// The shared entropy pool.
    pub fn pool(&self) -> &Arc<EntropyPool> {
        &self.pool
    }

    /// The identity allocator.
    pub fn allocator(&self) -> &IdentityAllocator {
        &self.allocator
    }

    fn refresher(&self) -> MutexGuard<'_, Option<RefreshTask>> {
        self.refresher.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Entropy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entropy")
            .field("pool", &self.pool)
            .field("refreshing", &self.is_refreshing())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::POOL_WORDS;
    use crate::source::FixedSource;
    use std::time::{Duration, Instant};

    #[test]
    fn test_frozen_init_does_not_refresh() {
        let entropy = Entropy::init(EntropyConfig::frozen()).unwrap();
        assert!(!entropy.is_refreshing());
        assert_eq!(entropy.pool().refresh_count(), 1);
    }

    #[test]
    fn test_auto_refresh_starts_and_stops() {
        let config = EntropyConfig {
            refresh: RefreshConfig::default().with_interval(Duration::from_millis(5)),
            auto_refresh: true,
        };
        let entropy = Entropy::init(config).unwrap();
        assert!(entropy.is_refreshing());

        let t0 = Instant::now();
        while entropy.pool().refresh_count() < 3 && t0.elapsed() < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(entropy.pool().refresh_count() >= 3);

        assert!(entropy.stop_refresh());
        assert!(!entropy.is_refreshing());
        assert!(!entropy.stop_refresh());
    }

    #[test]
    fn test_start_refresh_twice_is_noop() {
        let entropy = Entropy::init(EntropyConfig::frozen()).unwrap();
        let cfg = RefreshConfig::default().with_interval(Duration::from_secs(60));
        assert!(entropy.start_refresh(cfg.clone()).unwrap());
        assert!(!entropy.start_refresh(cfg).unwrap());
        assert!(entropy.stop_refresh());
    }

    #[test]
    fn test_init_fails_on_dead_source() {
        let result = Entropy::with_source(
            Box::new(FixedSource::new(Vec::new())),
            EntropyConfig::frozen(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_generators_share_pool() {
        let entropy = Entropy::with_source(
            Box::new(FixedSource::unit(POOL_WORDS)),
            EntropyConfig::frozen(),
        )
        .unwrap();
        let a = entropy.new_generator();
        let b = entropy.new_generator();
        assert_ne!(a.snapshot().id, b.snapshot().id);
        assert_eq!(Arc::strong_count(entropy.pool()), 3);
    }
}
