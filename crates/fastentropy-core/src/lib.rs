//! # fastentropy-core
//!
//! **An entropy amplifier.**
//!
//! `fastentropy-core` turns a small, periodically refreshed buffer of OS
//! randomness into a fast stream of 64-bit values. Drawing from the OS on every
//! call is slow; drawing from a plain PRNG gives up unpredictability. This crate
//! sits in between: each generator re-keys itself from fresh entropy on every
//! permutation.
//!
//! ## Quick Start
//!
//! ```no_run
//! use rand::Rng;
//!
//! // One-off values go through the shared recycling pool.
//! let x = fastentropy_core::uint64();
//! let die: u8 = fastentropy_core::pooled().random_range(1..=6);
//!
//! // Many values: own a generator.
//! let mut g = fastentropy_core::new_source();
//! let sum: u64 = (0..1000).map(|_| g.uint64() & 0xFF).sum();
//! # let _ = (x, die, sum);
//! ```
//!
//! ## Architecture
//!
//! OS source → Entropy Pool (128 words, refreshed every 100 ms) → Generator
//! (ARX permutation keyed by pool word, id, counter) → Pooled Source
//!
//! - [`EntropyPool`] holds true-random words behind atomics; a
//!   [`RefreshTask`] rewrites them on a timer.
//! - [`IdentityAllocator`] hands each generator a unique, mixed id.
//! - [`Generator`] is the two-phase state machine producing output.
//! - [`PooledSource`] recycles generators for cheap single draws.
//! - [`Entropy`] owns the pool, allocator and refresh task, and is injected
//!   into generators so tests can swap in a deterministic pool.
//!
//! Not for key material: there is no formal security proof, and seeding is a
//! deliberate no-op.

pub mod entropy;
pub mod error;
pub mod generator;
pub mod global;
pub mod identity;
pub mod permutation;
pub mod pool;
pub mod pooled;
pub mod refresh;
pub mod source;

pub use entropy::{Entropy, EntropyConfig};
pub use error::{EntropyError, Result};
pub use generator::{Generator, GeneratorSnapshot, Phase, Source64};
pub use global::{entropy, int63, new_source, pooled, pooled_source, uint64};
pub use identity::{Identity, IdentityAllocator};
pub use pool::{EntropyPool, POOL_WORDS, PoolHealth};
pub use pooled::{PoolStats, PooledGenerator, PooledRng, PooledSource};
pub use refresh::{FatalHandler, RefreshConfig, RefreshTask};
pub use source::{CountingSource, EntropySource, FixedSource, OsSource, SourceKind};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
