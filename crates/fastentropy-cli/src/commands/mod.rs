pub mod bench;
pub mod health;
pub mod report;
pub mod stream;

use fastentropy_core::{Generator, PooledRng};

/// Where a command draws its words from.
pub enum WordSource {
    /// One generator owned by the command.
    Standalone(Generator),
    /// Every word borrowed through the process-wide recycling pool.
    Pooled(PooledRng<'static>),
}

impl WordSource {
    pub fn new(pooled: bool) -> Self {
        if pooled {
            WordSource::Pooled(fastentropy_core::pooled())
        } else {
            WordSource::Standalone(fastentropy_core::new_source())
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WordSource::Standalone(_) => "standalone",
            WordSource::Pooled(_) => "pooled",
        }
    }

    pub fn next_word(&mut self) -> u64 {
        match self {
            WordSource::Standalone(g) => g.uint64(),
            WordSource::Pooled(rng) => rng.uint64(),
        }
    }

    /// Little-endian output bytes, truncated to `n`.
    pub fn bytes(&mut self, n: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(n.next_multiple_of(8));
        while out.len() < n {
            out.extend_from_slice(&self.next_word().to_le_bytes());
        }
        out.truncate(n);
        out
    }
}
