//! Recycling pool of generators for cheap one-off draws.
//!
//! # Design
//!
//! - **Lock-free free list**: idle generators sit in a bounded
//!   `crossbeam_queue::ArrayQueue`; borrow and return are single CAS operations
//! - **Never blocks**: an empty free list constructs a fresh generator, a full
//!   one drops the returned generator
//! - **RAII guard**: [`PooledGenerator`] returns its generator on drop, so every
//!   exit path (including unwinding) gives the instance back
//!
//! ```text
//! draw():
//!   1. pop an idle generator, or construct one
//!   2. produce one value
//!   3. push it back (drop it if the free list is full)
//! ```
//!
//! A borrowed generator is owned by exactly one caller until it is returned,
//! so no two threads ever touch the same generator state.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_queue::ArrayQueue;
use rand::RngCore;
use serde::Serialize;

use crate::entropy::Entropy;
use crate::generator::{Generator, Source64};

/// Minimum free-list capacity used by [`PooledSource::with_default_capacity`].
pub const MIN_CAPACITY: usize = 16;

/// Concurrency-safe recycling container of generators.
pub struct PooledSource {
    entropy: Arc<Entropy>,
    idle: ArrayQueue<Generator>,
    constructed: AtomicU64,
    discarded: AtomicU64,
}

impl PooledSource {
    /// Pool holding at most `capacity` idle generators (at least one).
    pub fn new(entropy: Arc<Entropy>, capacity: usize) -> Self {
        Self {
            entropy,
            idle: ArrayQueue::new(capacity.max(1)),
            constructed: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    /// Pool sized at four idle generators per available CPU.
    pub fn with_default_capacity(entropy: Arc<Entropy>) -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::new(entropy, (cpus * 4).max(MIN_CAPACITY))
    }

    /// Borrow a generator until the guard drops.
    ///
    /// Suited to callers that need a handful of values at once. For long
    /// streams construct a standalone [`Generator`] instead.
    pub fn borrow(&self) -> PooledGenerator<'_> {
        let generator = match self.idle.pop() {
            Some(generator) => generator,
            None => {
                self.constructed.fetch_add(1, Ordering::Relaxed);
                self.entropy.new_generator()
            }
        };
        PooledGenerator {
            owner: self,
            generator: Some(generator),
        }
    }

    /// Borrow, draw exactly one value, return.
    #[inline]
    pub fn draw(&self) -> u64 {
        self.borrow().uint64()
    }

    /// One non-negative 63-bit value.
    #[inline]
    pub fn int63(&self) -> i64 {
        (self.draw() >> 1) as i64
    }

    /// Copyable handle implementing [`Source64`] and [`RngCore`].
    pub fn handle(&self) -> PooledRng<'_> {
        PooledRng { source: self }
    }

    /// The subsystem generators are constructed from.
    pub fn entropy(&self) -> &Arc<Entropy> {
        &self.entropy
    }

    /// Counters for this pool.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.idle.capacity(),
            idle: self.idle.len(),
            constructed: self.constructed.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }

    fn give_back(&self, generator: Generator) {
        if self.idle.push(generator).is_err() {
            self.discarded.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl std::fmt::Debug for PooledSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledSource")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Maximum idle generators kept.
    pub capacity: usize,
    /// Idle generators right now.
    pub idle: usize,
    /// Generators constructed because the free list was empty.
    pub constructed: u64,
    /// Generators dropped because the free list was full.
    pub discarded: u64,
}

/// A generator on loan from a [`PooledSource`]. Returned on drop.
pub struct PooledGenerator<'a> {
    owner: &'a PooledSource,
    generator: Option<Generator>,
}

impl Deref for PooledGenerator<'_> {
    type Target = Generator;

    fn deref(&self) -> &Generator {
        // Only `Drop` takes the generator out.
        self.generator.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for PooledGenerator<'_> {
    fn deref_mut(&mut self) -> &mut Generator {
        self.generator.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledGenerator<'_> {
    fn drop(&mut self) {
        if let Some(generator) = self.generator.take() {
            self.owner.give_back(generator);
        }
    }
}

/// Shared handle to a [`PooledSource`]. Every draw borrows and returns a
/// generator; `seed` is a no-op.
#[derive(Clone, Copy)]
pub struct PooledRng<'a> {
    source: &'a PooledSource,
}

impl PooledRng<'_> {
    /// One value through the pool.
    pub fn uint64(&self) -> u64 {
        self.source.draw()
    }

    /// One non-negative 63-bit value through the pool.
    pub fn int63(&self) -> i64 {
        self.source.int63()
    }

    /// No-op.
    pub fn seed(&self, _seed: i64) {}
}

impl Source64 for PooledRng<'_> {
    fn uint64(&mut self) -> u64 {
        self.source.draw()
    }
}

impl RngCore for PooledRng<'_> {
    fn next_u32(&mut self) -> u32 {
        (self.source.draw() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.source.draw()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.source.borrow().fill_bytes(dest);
    }
}

impl std::fmt::Debug for PooledRng<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledRng").finish_non_exhaustive()
    }
}
