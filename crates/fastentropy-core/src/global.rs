//! Process-wide entropy subsystem and pooled source.
//!
//! Initialized lazily on first use: the pool is filled synchronously from the
//! OS, then refreshed every 100 ms for the rest of the process. Failing to
//! read OS randomness at that point is fatal.

use std::sync::{Arc, OnceLock};

use crate::entropy::{Entropy, EntropyConfig};
use crate::generator::Generator;
use crate::pooled::{PooledRng, PooledSource};

static ENTROPY: OnceLock<Arc<Entropy>> = OnceLock::new();
static POOLED: OnceLock<PooledSource> = OnceLock::new();

/// The process-wide entropy subsystem.
///
/// # Panics
/// Panics if the OS entropy source fails during first use. There is no safe
/// fallback: a generator keyed from default values is not random.
pub fn entropy() -> &'static Arc<Entropy> {
    ENTROPY.get_or_init(|| match Entropy::init(EntropyConfig::default()) {
        Ok(entropy) => entropy,
        Err(err) => panic!("OS entropy unavailable: {err}"),
    })
}

/// The process-wide pooled source.
pub fn pooled_source() -> &'static PooledSource {
    POOLED.get_or_init(|| PooledSource::with_default_capacity(Arc::clone(entropy())))
}

/// Shared handle for many independent single-value draws.
pub fn pooled() -> PooledRng<'static> {
    pooled_source().handle()
}

/// New standalone generator keyed from the process-wide subsystem.
///
/// Cheap to construct; prefer it over [`pooled`] when drawing more than a
/// handful of values.
pub fn new_source() -> Generator {
    entropy().new_generator()
}

/// One random `u64` from the process-wide pooled source.
pub fn uint64() -> u64 {
    pooled_source().draw()
}

/// One non-negative 63-bit value from the process-wide pooled source.
pub fn int63() -> i64 {
    pooled_source().int63()
}
