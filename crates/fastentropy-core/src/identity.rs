//! Process-wide identity allocation for generator instances.
//!
//! Every generator is keyed with an identity derived from one shared atomic
//! counter. The counter advances by a random odd increment, so it visits all
//! 2^64 values before repeating, and each raw value is passed through an
//! invertible mix so the ordering of instances is not exposed.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Result;
use crate::source::EntropySource;

/// Bits forced on in the multiplier: keeps it odd and spreads the low half
/// into the high half.
const MULTIPLIER_BITS: u64 = 0x2_0008_0001;

/// Keying material handed to one generator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Mixed, unique per-instance id.
    pub id: u64,
    /// Starting value of the per-instance counter.
    pub counter: u64,
    /// Starting pool-index cursor. Decorrelates pool access only.
    pub cursor: u32,
}

/// Issues a distinct [`Identity`] per call for the life of the allocator.
#[derive(Debug)]
pub struct IdentityAllocator {
    next: AtomicU64,
    increment: u64,
    multiplier: u64,
    counter_offset: u64,
}

impl IdentityAllocator {
    /// Draw the counter start, increment, multiplier and counter offset from
    /// `source`.
    pub fn new(source: &dyn EntropySource) -> Result<Self> {
        let mut buf = [0u8; 32];
        source.fill(&mut buf)?;
        let word = |i: usize| {
            let mut w = [0u8; 8];
            w.copy_from_slice(&buf[i * 8..i * 8 + 8]);
            u64::from_le_bytes(w)
        };
        Ok(Self::with_constants(word(0), word(1), word(2), word(3)))
    }

    /// Allocator with explicit constants. `increment` and `multiplier` are
    /// forced odd.
    pub fn with_constants(start: u64, increment: u64, multiplier: u64, counter_offset: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
            increment: increment | 1,
            multiplier: multiplier | MULTIPLIER_BITS,
            counter_offset,
        }
    }

    /// Allocate the next identity. Lock-free; a single `fetch_add`.
    pub fn allocate(&self) -> Identity {
        let raw = self
            .next
            .fetch_add(self.increment, Ordering::Relaxed)
            .wrapping_add(self.increment);
        let id = mix(raw, self.multiplier);
        Identity {
            id,
            counter: self.counter_offset ^ id,
            cursor: (raw as u32).wrapping_add(id as u32),
        }
    }

    /// Odd additive increment of the shared counter.
    pub fn increment(&self) -> u64 {
        self.increment
    }

    /// Odd multiplier used by [`mix`].
    pub fn multiplier(&self) -> u64 {
        self.multiplier
    }
}

/// Invertible mix: xor-shift-right 32, multiply by an odd constant, xor-shift
/// again. Distinct inputs always give distinct outputs.
#[inline]
pub fn mix(mut x: u64, multiplier: u64) -> u64 {
    x ^= x >> 32;
    x = x.wrapping_mul(multiplier);
    x ^= x >> 32;
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{FixedSource, OsSource};
    use std::collections::HashSet;
    use std::sync::Arc;

    /// Multiplicative inverse of an odd `m` modulo 2^64 (Newton iteration).
    fn inverse(m: u64) -> u64 {
        let mut inv = m;
        for _ in 0..6 {
            inv = inv.wrapping_mul(2u64.wrapping_sub(m.wrapping_mul(inv)));
        }
        inv
    }

    fn unmix(mut x: u64, multiplier: u64) -> u64 {
        // x ^= x >> 32 is its own inverse.
        x ^= x >> 32;
        x = x.wrapping_mul(inverse(multiplier));
        x ^= x >> 32;
        x
    }

    #[test]
    fn test_mix_known_value() {
        let m = 0x9E37_79B9_7F4A_7C15 | MULTIPLIER_BITS;
        assert_eq!(m, 0x9E37_79BB_7F4A_7C15);
        assert_eq!(mix(1, m), 0x9E37_79BB_E17D_05AE);
        assert_eq!(mix(3, m), 0xDAA6_6D32_A779_190D);
    }

    #[test]
    fn test_mix_is_invertible() {
        let m = 0x1234_5678_9ABC_DEF1 | MULTIPLIER_BITS;
        for x in [0, 1, 2, u64::MAX, 0xDEAD_BEEF, 1 << 63, 0x8000_0000] {
            assert_eq!(unmix(mix(x, m), m), x);
        }
    }

    #[test]
    fn test_constants_forced_odd() {
        let alloc = IdentityAllocator::with_constants(0, 2, 4, 0);
        assert_eq!(alloc.increment() & 1, 1);
        assert_eq!(alloc.multiplier() & MULTIPLIER_BITS, MULTIPLIER_BITS);
    }

    #[test]
    fn test_allocate_uses_post_add_value() {
        let m = 0x9E37_79B9_7F4A_7C15;
        let alloc = IdentityAllocator::with_constants(0, 1, m, 0);
        let first = alloc.allocate();
        assert_eq!(first.id, 0x9E37_79BB_E17D_05AE);
        assert_eq!(first.counter, first.id);
        assert_eq!(first.cursor, 0xE17D_05AF);
    }

    #[test]
    fn test_counter_offset_applied() {
        let alloc = IdentityAllocator::with_constants(10, 7, 3, 0xFF00);
        let ident = alloc.allocate();
        assert_eq!(ident.counter, ident.id ^ 0xFF00);
    }

    #[test]
    fn test_ids_unique_million() {
        let alloc = IdentityAllocator::new(&OsSource).unwrap();
        let mut seen = HashSet::with_capacity(1_000_000);
        for _ in 0..1_000_000 {
            assert!(seen.insert(alloc.allocate().id), "duplicate identity");
        }
    }

    #[test]
    fn test_ids_unique_across_threads() {
        let alloc = Arc::new(IdentityAllocator::new(&OsSource).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let alloc = Arc::clone(&alloc);
                std::thread::spawn(move || (0..20_000).map(|_| alloc.allocate().id).collect::<Vec<_>>())
            })
            .collect();
        let mut seen = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 160_000);
    }

    #[test]
    fn test_ids_recover_counter_sequence() {
        let m = 0x0F0F_0F0F_0F0F_0F0F;
        let alloc = IdentityAllocator::with_constants(100, 5, m, 0);
        let m = alloc.multiplier();
        let raws: Vec<u64> = (0..16).map(|_| unmix(alloc.allocate().id, m)).collect();
        let expected: Vec<u64> = (1..=16).map(|i| 100 + 5 * i).collect();
        assert_eq!(raws, expected);
    }

    #[test]
    fn test_counter_wraps_without_panic() {
        let alloc = IdentityAllocator::with_constants(u64::MAX - 1, 3, 1, 0);
        let a = alloc.allocate();
        let b = alloc.allocate();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_new_from_fixed_source() {
        let src = FixedSource::new(vec![0, 1, 2, 3]);
        let alloc = IdentityAllocator::new(&src).unwrap();
        assert_eq!(alloc.increment(), 1);
        assert_eq!(alloc.multiplier(), 2 | MULTIPLIER_BITS);
    }
}
