//! Failure taxonomy for the entropy subsystem.
//!
//! Errors only ever surface at the entropy boundary: creating the pool,
//! refreshing it, or drawing the allocator's process constants. Generation
//! itself is infallible once a pool exists.

use thiserror::Error;

/// Errors raised while reading true randomness.
#[derive(Debug, Error)]
pub enum EntropyError {
    /// The operating system entropy source refused to fill the buffer.
    #[error("OS entropy source failed: {0}")]
    Os(getrandom::Error),

    /// A deterministic source ran out of words to hand out.
    #[error("entropy source `{source_name}` exhausted: wanted {wanted} bytes")]
    Exhausted {
        source_name: &'static str,
        wanted: usize,
    },

    /// A refresh tick failed on every attempt.
    #[error("entropy refresh failed after {attempts} attempt(s): {last}")]
    RefreshFailed {
        attempts: u32,
        #[source]
        last: Box<EntropyError>,
    },

    /// The background refresh thread could not be spawned.
    #[error("failed to spawn entropy refresh thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl From<getrandom::Error> for EntropyError {
    fn from(err: getrandom::Error) -> Self {
        Self::Os(err)
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, EntropyError>;
