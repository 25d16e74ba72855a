//! Fixed-size entropy pool shared by every generator.
//!
//! Architecture:
//! 1. Read `POOL_WORDS * 8` bytes from the configured [`EntropySource`]
//! 2. Publish each word with an atomic store, so no reader sees a torn word
//! 3. Generators read single words with atomic loads on every permutation
//! 4. A [`RefreshTask`](crate::refresh::RefreshTask) repeats step 1-2 on a
//!    fixed period
//!
//! There is no cross-word invariant, so readers may observe a mix of old and
//! new words while a refresh is in flight. That is acceptable: each word on its
//! own is always a complete random value.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::Result;
use crate::source::EntropySource;

/// Number of 64-bit words held by the pool.
pub const POOL_WORDS: usize = 128;

const POOL_BYTES: usize = POOL_WORDS * 8;

/// Lock-free buffer of true-random words.
pub struct EntropyPool {
    words: [AtomicU64; POOL_WORDS],
    source: Box<dyn EntropySource>,
    created: Instant,
    last_refresh_nanos: AtomicU64,
    refreshes: AtomicU64,
    failures: AtomicU64,
    stale: AtomicBool,
}

impl EntropyPool {
    /// Create a pool and fill it synchronously from `source`.
    ///
    /// Fails if the first fill fails: a pool is never handed out holding
    /// default-valued words.
    pub fn new(source: Box<dyn EntropySource>) -> Result<Self> {
        let pool = Self {
            words: std::array::from_fn(|_| AtomicU64::new(0)),
            source,
            created: Instant::now(),
            last_refresh_nanos: AtomicU64::new(0),
            refreshes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            stale: AtomicBool::new(false),
        };
        pool.refresh()?;
        log::debug!(
            "entropy pool ready: {} words from `{}` source",
            POOL_WORDS,
            pool.source.name()
        );
        Ok(pool)
    }

    /// Overwrite every word with fresh randomness from the source.
    ///
    /// On failure no word is touched and the failure counter is bumped.
    pub fn refresh(&self) -> Result<()> {
        let mut buf = [0u8; POOL_BYTES];
        if let Err(e) = self.source.fill(&mut buf) {
            self.failures.fetch_add(1, Ordering::Relaxed);
            return Err(e);
        }
        for (slot, chunk) in self.words.iter().zip(buf.chunks_exact(8)) {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            slot.store(u64::from_le_bytes(word), Ordering::Relaxed);
        }
        let nanos = u64::try_from(self.created.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.last_refresh_nanos.store(nanos, Ordering::Relaxed);
        self.refreshes.fetch_add(1, Ordering::Release);
        log::trace!("entropy pool refreshed from `{}`", self.source.name());
        Ok(())
    }

    /// Read the word at `index`. Indices wrap modulo [`POOL_WORDS`].
    #[inline]
    pub fn word(&self, index: usize) -> u64 {
        self.words[index % POOL_WORDS].load(Ordering::Relaxed)
    }

    /// Copy of every word as currently visible.
    pub fn snapshot(&self) -> [u64; POOL_WORDS] {
        std::array::from_fn(|i| self.words[i].load(Ordering::Relaxed))
    }

    /// Completed refreshes, including the initial fill.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Acquire)
    }

    /// Failed refresh attempts.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Name of the backing source.
    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// Flag the pool as no longer being refreshed after a fatal tick.
    pub(crate) fn mark_stale(&self) {
        self.stale.store(true, Ordering::Relaxed);
    }

    /// Whether refreshing stopped because of a fatal source failure.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Relaxed)
    }

    /// Time elapsed since the last successful refresh.
    pub fn since_last_refresh(&self) -> Duration {
        let last = Duration::from_nanos(self.last_refresh_nanos.load(Ordering::Relaxed));
        self.created.elapsed().saturating_sub(last)
    }

    /// Health report as structured data.
    pub fn health_report(&self) -> PoolHealth {
        PoolHealth {
            source: self.source.name().to_string(),
            source_kind: self.source.kind().to_string(),
            words: POOL_WORDS,
            refreshes: self.refresh_count(),
            failures: self.failure_count(),
            stale: self.is_stale(),
            since_last_refresh_ms: self.since_last_refresh().as_secs_f64() * 1000.0,
        }
    }
}

impl std::fmt::Debug for EntropyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntropyPool")
            .field("source", &self.source.name())
            .field("refreshes", &self.refresh_count())
            .field("failures", &self.failure_count())
            .field("stale", &self.is_stale())
            .finish_non_exhaustive()
    }
}

/// Health of the entropy pool.
#[derive(Debug, Clone, Serialize)]
pub struct PoolHealth {
    /// Backing source name.
    pub source: String,
    /// Backing source kind (`os` or `deterministic`).
    pub source_kind: String,
    /// Pool capacity in 64-bit words.
    pub words: usize,
    /// Successful refreshes, including the initial fill.
    pub refreshes: u64,
    /// Failed refresh attempts.
    pub failures: u64,
    /// True once the refresher gave up after a fatal failure.
    pub stale: bool,
    /// Milliseconds since the last successful refresh.
    pub since_last_refresh_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EntropyError;
    use crate::source::{FixedSource, OsSource, SourceKind};
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    // -----------------------------------------------------------------------
    // Mock entropy sources for testing
    // -----------------------------------------------------------------------

    /// Succeeds `ok_fills` times, then fails forever.
    struct FlakySource {
        ok_fills: usize,
        calls: AtomicUsize,
    }

    impl FlakySource {
        fn new(ok_fills: usize) -> Self {
            Self {
                ok_fills,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl EntropySource for FlakySource {
        fn name(&self) -> &'static str {
            "flaky"
        }
        fn kind(&self) -> SourceKind {
            SourceKind::Deterministic
        }
        fn fill(&self, dest: &mut [u8]) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::Relaxed);
            if call < self.ok_fills {
                dest.fill(call as u8 + 1);
                Ok(())
            } else {
                Err(EntropyError::Exhausted {
                    source_name: "flaky",
                    wanted: dest.len(),
                })
            }
        }
    }

    // -----------------------------------------------------------------------
    // Creation tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_pool_new_fills_synchronously() {
        let words: Vec<u64> = (1..=POOL_WORDS as u64).collect();
        let pool = EntropyPool::new(Box::new(FixedSource::new(words.clone()))).unwrap();
        assert_eq!(pool.snapshot().to_vec(), words);
        assert_eq!(pool.refresh_count(), 1);
        assert_eq!(pool.failure_count(), 0);
    }

    #[test]
    fn test_pool_new_fails_when_source_fails() {
        let err = EntropyPool::new(Box::new(FixedSource::new(Vec::new()))).unwrap_err();
        assert!(matches!(err, EntropyError::Exhausted { .. }));
    }

    #[test]
    fn test_pool_os_source_not_all_zero() {
        let pool = EntropyPool::new(Box::new(OsSource)).unwrap();
        assert!(pool.snapshot().iter().any(|&w| w != 0));
    }

    // -----------------------------------------------------------------------
    // Refresh tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_refresh_changes_words() {
        let pool = EntropyPool::new(Box::new(OsSource)).unwrap();
        let before = pool.snapshot();
        pool.refresh().unwrap();
        pool.refresh().unwrap();
        let after = pool.snapshot();
        let changed = before
            .iter()
            .zip(after.iter())
            .step_by(8)
            .filter(|(a, b)| a != b)
            .count();
        assert!(changed >= 15, "only {changed}/16 sampled words changed");
        assert_eq!(pool.refresh_count(), 3);
    }

    #[test]
    fn test_failed_refresh_leaves_words_intact() {
        let pool = EntropyPool::new(Box::new(FlakySource::new(1))).unwrap();
        let before = pool.snapshot();
        assert!(pool.refresh().is_err());
        assert_eq!(pool.snapshot(), before);
        assert_eq!(pool.failure_count(), 1);
        assert_eq!(pool.refresh_count(), 1);
    }

    #[test]
    fn test_word_index_wraps() {
        let words: Vec<u64> = (0..POOL_WORDS as u64).map(|i| i * 3).collect();
        let pool = EntropyPool::new(Box::new(FixedSource::new(words))).unwrap();
        assert_eq!(pool.word(5), 15);
        assert_eq!(pool.word(POOL_WORDS + 5), 15);
    }

    #[test]
    fn test_concurrent_reads_during_refresh() {
        let pool = Arc::new(EntropyPool::new(Box::new(OsSource)).unwrap());
        std::thread::scope(|s| {
            let refresher = Arc::clone(&pool);
            s.spawn(move || {
                for _ in 0..50 {
                    refresher.refresh().unwrap();
                }
            });
            for _ in 0..4 {
                let reader = Arc::clone(&pool);
                s.spawn(move || {
                    let mut acc = 0u64;
                    for i in 0..10_000 {
                        acc ^= reader.word(i);
                    }
                    acc
                });
            }
        });
        assert_eq!(pool.refresh_count(), 51);
    }

    // -----------------------------------------------------------------------
    // Health report tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_health_report_fresh_pool() {
        let pool = EntropyPool::new(Box::new(FixedSource::unit(POOL_WORDS))).unwrap();
        let report = pool.health_report();
        assert_eq!(report.source, "fixed");
        assert_eq!(report.source_kind, "deterministic");
        assert_eq!(report.words, POOL_WORDS);
        assert_eq!(report.refreshes, 1);
        assert_eq!(report.failures, 0);
        assert!(!report.stale);
        assert!(report.since_last_refresh_ms >= 0.0);
    }

    #[test]
    fn test_health_report_marks_stale() {
        let pool = EntropyPool::new(Box::new(FixedSource::unit(POOL_WORDS))).unwrap();
        pool.mark_stale();
        assert!(pool.health_report().stale);
    }
}
