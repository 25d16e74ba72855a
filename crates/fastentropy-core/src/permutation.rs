//! Fixed add-rotate-xor permutation over four 64-bit lanes.
//!
//! Each round mixes `(v0, v1)` and `(v2, v3)` independently, then cross-mixes
//! `(v0, v3)` and `(v1, v2)`. Rotation amounts and their order are fixed; any
//! change here changes every output stream and breaks the golden vectors.

/// Rounds per permutation application. Five rounds give full avalanche.
pub const ROUNDS: usize = 5;

/// One round, all arithmetic modulo 2^64.
#[inline(always)]
fn round(v: &mut [u64; 4]) {
    let [mut v0, mut v1, mut v2, mut v3] = *v;

    v0 = v0.wrapping_add(v1);
    v1 = v1.rotate_left(13);
    v1 ^= v0;
    v0 = v0.rotate_left(32);

    v2 = v2.wrapping_add(v3);
    v3 = v3.rotate_left(16);
    v3 ^= v2;

    v0 = v0.wrapping_add(v3);
    v3 = v3.rotate_left(21);
    v3 ^= v0;

    v2 = v2.wrapping_add(v1);
    v1 = v1.rotate_left(17);
    v1 ^= v2;
    v2 = v2.rotate_left(32);

    *v = [v0, v1, v2, v3];
}

/// Apply [`ROUNDS`] rounds in place.
#[inline]
pub fn permute(v: &mut [u64; 4]) {
    for _ in 0..ROUNDS {
        round(v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_zero_state_is_fixed_point() {
        // No constants are injected; zero stays zero. Generators never
        // start from an all-zero register because pool words are mixed in.
        let mut v = [0u64; 4];
        permute(&mut v);
        assert_eq!(v, [0; 4]);
    }

    #[test]
    fn test_single_round_known_value() {
        let mut v = [1u64, 0, 0, 0];
        round(&mut v);
        // v0 = 1 + 0, rotated 32; v1 ^= v0 (pre-rotate) = 1; then v0 += v3
        // (0); v3 ^= v0 = 1 << 32; v2 += v1 (1); v1 = rotl(1, 17) ^ 1;
        // v2 = rotl(1, 32).
        assert_eq!(v, [1 << 32, (1 << 17) ^ 1, 1 << 32, 1 << 32]);
    }

    #[test]
    fn test_permutation_is_deterministic() {
        let mut a = [1u64, 2, 3, 4];
        let mut b = [1u64, 2, 3, 4];
        permute(&mut a);
        permute(&mut b);
        assert_eq!(a, b);
        assert_ne!(a, [1, 2, 3, 4]);
    }

    #[test]
    fn test_avalanche_fraction() {
        let mut rng = StdRng::seed_from_u64(0x5EED_0001);
        let trials = 20_000u64;
        let mut flipped = 0u64;
        for _ in 0..trials {
            let input: [u64; 4] = rng.random();
            let bit = rng.random_range(0..256usize);
            let mut tweaked = input;
            tweaked[bit / 64] ^= 1 << (bit % 64);

            let mut a = input;
            let mut b = tweaked;
            permute(&mut a);
            permute(&mut b);
            // Output lanes actually exposed by generators.
            flipped += u64::from((a[1] ^ b[1]).count_ones() + (a[3] ^ b[3]).count_ones());
        }
        let fraction = flipped as f64 / (trials * 128) as f64;
        assert!(
            (0.49..=0.51).contains(&fraction),
            "avalanche fraction {fraction:.4} outside [0.49, 0.51]"
        );
    }

    #[test]
    fn test_every_input_lane_reaches_outputs() {
        let mut rng = StdRng::seed_from_u64(42);
        for lane in 0..4 {
            let mut total = 0u32;
            for _ in 0..500 {
                let input: [u64; 4] = rng.random();
                let mut tweaked = input;
                tweaked[lane] ^= 1 << rng.random_range(0..64);
                let mut a = input;
                let mut b = tweaked;
                permute(&mut a);
                permute(&mut b);
                total += (a[1] ^ b[1]).count_ones() + (a[3] ^ b[3]).count_ones();
            }
            let fraction = f64::from(total) / (500.0 * 128.0);
            assert!(
                (0.47..=0.53).contains(&fraction),
                "lane {lane}: fraction {fraction:.4}"
            );
        }
    }
}
