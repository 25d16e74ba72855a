//! The per-instance generator: a two-phase state machine around the ARX
//! permutation.
//!
//! Each permutation application xors one pool word, the instance id and the
//! instance counter into the register, then runs [`permute`]. The processed
//! lanes `v1` and `v3` are handed out one at a time, whitened with per-instance
//! masks:
//!
//! ```text
//! Fresh --uint64()--> return v1 ^ w0 --> Spent
//! Spent --uint64()--> return v3 ^ w1, apply permutation --> Fresh
//! ```
//!
//! A generator is exclusively owned (`&mut self` on every draw). Share draws
//! across threads through [`PooledSource`](crate::pooled::PooledSource), or give
//! each worker its own generator.

use std::sync::Arc;

use rand::RngCore;

use crate::entropy::Entropy;
use crate::identity::Identity;
use crate::permutation::permute;
use crate::pool::EntropyPool;

/// The generator-source contract consumed by distribution helpers.
pub trait Source64 {
    /// Next 64 random bits.
    fn uint64(&mut self) -> u64;

    /// Next non-negative 63-bit value.
    fn int63(&mut self) -> i64 {
        (self.uint64() >> 1) as i64
    }

    /// Deliberately ignored: the stream can not be reseeded to a caller
    /// chosen value.
    fn seed(&mut self, _seed: i64) {}
}

/// Which half of the last permutation output is still unconsumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Both `v1` and `v3` are pending.
    Fresh,
    /// Only `v3` is pending.
    Spent,
}

/// Fast pseudorandom generator keyed from the entropy pool.
pub struct Generator {
    v: [u64; 4],
    id: u64,
    cnt: u64,
    w0: u64,
    w1: u64,
    pos: u32,
    phase: Phase,
    applications: u64,
    pool: Arc<EntropyPool>,
}

impl Generator {
    /// New generator with a freshly allocated identity from `entropy`.
    pub fn new(entropy: &Entropy) -> Self {
        let identity = entropy.allocator().allocate();
        Self::from_identity(Arc::clone(entropy.pool()), identity)
    }

    /// New generator with explicit keying material.
    ///
    /// The register starts as `[0, p, p, p]` and the masks as `p, p`, where
    /// each `p` is a pool word picked by a small per-instance LCG over a copy
    /// of the cursor. `v0` stays zero because the first application xors a
    /// pool word into it anyway. One application runs before returning, so the
    /// generator starts [`Phase::Fresh`].
    pub fn from_identity(pool: Arc<EntropyPool>, identity: Identity) -> Self {
        let mut p = identity.cursor;
        let m = ((p >> 8) & !2) | 5;
        let a = (p >> 16) | 1;
        let mut pick = || {
            p = p.wrapping_mul(m).wrapping_add(a);
            pool.word(p as usize)
        };
        let v = [0, pick(), pick(), pick()];
        let (w0, w1) = (pick(), pick());

        let mut generator = Self {
            v,
            id: identity.id,
            cnt: identity.counter,
            w0,
            w1,
            pos: identity.cursor,
            phase: Phase::Fresh,
            applications: 0,
            pool,
        };
        generator.apply();
        generator
    }

    /// Pool word at index `(cursor >> 25) mod 128`, then `cursor = cursor*9 + 1`.
    #[inline]
    fn pool_pick(&mut self) -> u64 {
        let pos = self.pos;
        self.pos = pos.wrapping_mul(9).wrapping_add(1);
        self.pool.word((pos >> 25) as usize)
    }

    /// One permutation application.
    #[inline]
    fn apply(&mut self) {
        let step = self.pos;
        self.v[0] ^= self.pool_pick();
        self.v[1] ^= self.id;
        self.v[3] ^= self.cnt;
        self.cnt = self.cnt.wrapping_add(u64::from(step));
        permute(&mut self.v);
        self.applications += 1;
    }

    /// Next 64 random bits.
    #[inline]
    pub fn uint64(&mut self) -> u64 {
        match self.phase {
            Phase::Fresh => {
                self.phase = Phase::Spent;
                self.v[1] ^ self.w0
            }
            Phase::Spent => {
                let out = self.v[3] ^ self.w1;
                self.apply();
                self.phase = Phase::Fresh;
                out
            }
        }
    }

    /// `uint64() >> 1`, always in `0..=i64::MAX`.
    #[inline]
    pub fn int63(&mut self) -> i64 {
        (self.uint64() >> 1) as i64
    }

    /// No-op. See [`Source64::seed`].
    pub fn seed(&mut self, _seed: i64) {}

    /// Copy of the internal state, for diagnostics and tests.
    pub fn snapshot(&self) -> GeneratorSnapshot {
        GeneratorSnapshot {
            register: self.v,
            id: self.id,
            counter: self.cnt,
            cursor: self.pos,
            phase: self.phase,
            applications: self.applications,
        }
    }
}

impl Source64 for Generator {
    fn uint64(&mut self) -> u64 {
        Generator::uint64(self)
    }
}

impl RngCore for Generator {
    fn next_u32(&mut self) -> u32 {
        (self.uint64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.uint64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        rand::rand_core::impls::fill_bytes_via_next(self, dest);
    }
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Register and masks stay out of debug output.
        f.debug_struct("Generator")
            .field("phase", &self.phase)
            .field("applications", &self.applications)
            .finish_non_exhaustive()
    }
}

/// Internal generator state at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorSnapshot {
    /// Permutation register `v0..v3`.
    pub register: [u64; 4],
    /// Instance id. Never changes after construction.
    pub id: u64,
    /// Per-instance counter.
    pub counter: u64,
    /// Pool-index cursor.
    pub cursor: u32,
    /// Output phase.
    pub phase: Phase,
    /// Permutation applications so far, priming included.
    pub applications: u64,
}
