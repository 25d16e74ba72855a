//! True-randomness sources that feed the entropy pool.
//!
//! Every source implements the [`EntropySource`] trait. The pool only ever asks
//! a source to fill a byte buffer; it never reads from a source on the
//! generation path.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{EntropyError, Result};

/// Kind of randomness a source provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Operating system CSPRNG.
    Os,
    /// Fixed, replayable words. Only meaningful for tests and golden vectors.
    Deterministic,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Os => write!(f, "os"),
            Self::Deterministic => write!(f, "deterministic"),
        }
    }
}

/// Trait that every entropy source must implement.
pub trait EntropySource: Send + Sync {
    /// Short identifier (e.g. `"os"`).
    fn name(&self) -> &'static str;

    /// Kind of randomness this source yields.
    fn kind(&self) -> SourceKind;

    /// Fill `dest` completely, or fail. Partial fills are never reported as
    /// success.
    fn fill(&self, dest: &mut [u8]) -> Result<()>;
}

/// Operating system randomness via the `getrandom` crate.
///
/// Works cross-platform (Unix, Windows, WASM, etc.) without manual file I/O.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsSource;

impl EntropySource for OsSource {
    fn name(&self) -> &'static str {
        "os"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Os
    }

    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        getrandom::fill(dest)?;
        Ok(())
    }
}

/// Replays a fixed list of 64-bit words, little-endian, cycling forever.
///
/// Every fill starts over from the first word, so a pool refreshed from a
/// `FixedSource` never changes. That is what makes it usable as a
/// non-refreshing pool in avalanche and golden-vector tests.
#[derive(Debug, Clone)]
pub struct FixedSource {
    words: Vec<u64>,
}

impl FixedSource {
    /// Source that replays `words`. An empty list yields an always-exhausted
    /// source.
    pub fn new(words: impl Into<Vec<u64>>) -> Self {
        Self {
            words: words.into(),
        }
    }

    /// All-zero words except index 0, which holds `1`.
    pub fn unit(len: usize) -> Self {
        let mut words = vec![0u64; len];
        if let Some(first) = words.first_mut() {
            *first = 1;
        }
        Self { words }
    }
}

impl EntropySource for FixedSource {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Deterministic
    }

    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        if self.words.is_empty() {
            return Err(EntropyError::Exhausted {
                source_name: self.name(),
                wanted: dest.len(),
            });
        }
        let mut words = self.words.iter().cycle();
        for chunk in dest.chunks_mut(8) {
            // cycle() over a non-empty slice never ends
            let word = words.next().copied().unwrap_or_default();
            chunk.copy_from_slice(&word.to_le_bytes()[..chunk.len()]);
        }
        Ok(())
    }
}

/// Wraps another source and counts how many fills were requested.
///
/// Used by hosts that want to observe refresh cadence without touching the
/// pool internals.
pub struct CountingSource<S> {
    inner: S,
    fills: AtomicUsize,
}

impl<S: EntropySource> CountingSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fills: AtomicUsize::new(0),
        }
    }

    /// Fills requested so far, successful or not.
    pub fn fills(&self) -> usize {
        self.fills.load(Ordering::Relaxed)
    }
}

impl<S: EntropySource> EntropySource for CountingSource<S> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn kind(&self) -> SourceKind {
        self.inner.kind()
    }

    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        self.fills.fetch_add(1, Ordering::Relaxed);
        self.inner.fill(dest)
    }
}

impl<S: EntropySource> EntropySource for std::sync::Arc<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn kind(&self) -> SourceKind {
        (**self).kind()
    }

    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        (**self).fill(dest)
    }
}
