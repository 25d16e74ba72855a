//! Statistical test battery for 64-bit generator output.
//!
//! Bit- and byte-level frequency tests catch gross bias; the word-level tests
//! (`bit_position_bias`, `word_avalanche`, `word_collisions`) look at the
//! output the way a generator hands it out: one little-endian `u64` at a time.
//!
//! Each test returns a [`TestResult`] with a p-value (where applicable), a
//! pass/fail determination, and a letter grade (A through F).

use std::collections::HashSet;
use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF, DiscreteCDF, Normal, Poisson};
use statrs::function::erf::erfc;

/// Significance level used for pass/fail.
pub const ALPHA: f64 = 0.01;

// ═══════════════════════════════════════════════════════════════════════════════
// Core types
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of a single randomness test.
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub p_value: Option<f64>,
    pub statistic: f64,
    pub details: String,
    pub grade: char,
}

impl TestResult {
    /// Assign a letter grade based on p-value.
    ///
    /// - A: p >= 0.1
    /// - B: p >= 0.01
    /// - C: p >= 0.001
    /// - D: p >= 0.0001
    /// - F: otherwise or None
    pub fn grade_from_p(p: Option<f64>) -> char {
        match p {
            Some(p) if p >= 0.1 => 'A',
            Some(p) if p >= 0.01 => 'B',
            Some(p) if p >= 0.001 => 'C',
            Some(p) if p >= 0.0001 => 'D',
            _ => 'F',
        }
    }

    /// Result graded from a p-value against [`ALPHA`].
    fn from_p(name: &str, p: f64, statistic: f64, details: String) -> Self {
        Self {
            name: name.to_string(),
            passed: p >= ALPHA,
            p_value: Some(p),
            statistic,
            details,
            grade: Self::grade_from_p(Some(p)),
        }
    }

    fn failed(name: &str, details: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            p_value: None,
            statistic: 0.0,
            details: details.into(),
            grade: 'F',
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════════

/// Unpack a byte slice into individual bits (MSB first per byte).
fn to_bits(data: &[u8]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(data.len() * 8);
    for &byte in data {
        for shift in (0..8).rev() {
            bits.push((byte >> shift) & 1);
        }
    }
    bits
}

/// Reassemble little-endian 64-bit words; a trailing partial word is dropped.
pub fn to_words(data: &[u8]) -> Vec<u64> {
    data.chunks_exact(8)
        .map(|chunk| {
            let mut w = [0u8; 8];
            w.copy_from_slice(chunk);
            u64::from_le_bytes(w)
        })
        .collect()
}

/// Serialize words little-endian, the byte order the stream command emits.
pub fn from_words(words: &[u64]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

fn insufficient(name: &str, needed: usize, got: usize) -> TestResult {
    TestResult::failed(name, format!("Insufficient data: need {needed}, got {got}"))
}

/// Upper tail of chi-squared with `df` degrees of freedom.
fn chi2_sf(df: f64, stat: f64) -> f64 {
    match ChiSquared::new(df) {
        Ok(dist) => dist.sf(stat),
        Err(_) => 0.0,
    }
}

/// Two-sided p-value for a standard normal z-score.
fn two_sided(z: f64) -> f64 {
    match Normal::new(0.0, 1.0) {
        Ok(norm) => 2.0 * (1.0 - norm.cdf(z.abs())),
        Err(_) => 0.0,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// 1. FREQUENCY TESTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Monobit frequency -- proportion of 1s vs 0s should be ~50%.
pub fn monobit_frequency(data: &[u8]) -> TestResult {
    let name = "Monobit Frequency";
    let n = data.len() * 8;
    if n < 100 {
        return insufficient(name, 100, n);
    }
    let ones: i64 = data.iter().map(|b| i64::from(b.count_ones())).sum();
    let s = 2 * ones - n as i64;
    let s_obs = (s as f64).abs() / (n as f64).sqrt();
    let p = erfc(s_obs / 2.0_f64.sqrt());
    TestResult::from_p(name, p, s_obs, format!("S={s}, n={n}"))
}

/// Block frequency -- frequency within 128-bit blocks. Chi-squared test.
pub fn block_frequency(data: &[u8]) -> TestResult {
    let name = "Block Frequency";
    let block_bytes = 16usize;
    let num_blocks = data.len() / block_bytes;
    if num_blocks < 10 {
        return insufficient(name, block_bytes * 80, data.len() * 8);
    }
    let m = (block_bytes * 8) as f64;
    let chi2: f64 = data
        .chunks_exact(block_bytes)
        .map(|block| {
            let ones: u32 = block.iter().map(|b| b.count_ones()).sum();
            let proportion = f64::from(ones) / m;
            (proportion - 0.5) * (proportion - 0.5)
        })
        .sum::<f64>()
        * 4.0
        * m;
    let p = chi2_sf(num_blocks as f64, chi2);
    TestResult::from_p(name, p, chi2, format!("blocks={num_blocks}, M={m}"))
}

/// Byte frequency -- chi-squared on byte value distribution (256 bins).
pub fn byte_frequency(data: &[u8]) -> TestResult {
    let name = "Byte Frequency";
    let n = data.len();
    if n < 2560 {
        return insufficient(name, 2560, n);
    }
    let mut hist = [0u64; 256];
    for &b in data {
        hist[b as usize] += 1;
    }
    let expected = n as f64 / 256.0;
    let chi2: f64 = hist
        .iter()
        .map(|&c| {
            let diff = c as f64 - expected;
            diff * diff / expected
        })
        .sum();
    let p = chi2_sf(255.0, chi2);
    TestResult::from_p(name, p, chi2, format!("n={n}, expected_per_bin={expected:.1}"))
}

// ═══════════════════════════════════════════════════════════════════════════════
// 2. RUNS / SERIAL TESTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Runs test -- number of uninterrupted runs of 0s or 1s.
pub fn runs_test(data: &[u8]) -> TestResult {
    let name = "Runs Test";
    let bits = to_bits(data);
    let n = bits.len();
    if n < 100 {
        return insufficient(name, 100, n);
    }
    let ones: usize = bits.iter().map(|&b| b as usize).sum();
    let prop = ones as f64 / n as f64;
    if (prop - 0.5).abs() >= 2.0 / (n as f64).sqrt() {
        return TestResult {
            p_value: Some(0.0),
            ..TestResult::failed(name, format!("Pre-test failed: proportion={prop:.4}"))
        };
    }
    let runs = 1 + bits.windows(2).filter(|w| w[0] != w[1]).count();
    let expected = 2.0 * n as f64 * prop * (1.0 - prop) + 1.0;
    let std = 2.0 * (2.0 * n as f64).sqrt() * prop * (1.0 - prop);
    if std < 1e-10 {
        return TestResult::failed(name, "Zero variance");
    }
    let z = (runs as f64 - expected).abs() / std;
    let p = erfc(z / 2.0_f64.sqrt());
    TestResult::from_p(name, p, z, format!("runs={runs}, expected={expected:.0}"))
}

/// Psi-squared statistic over overlapping `m`-bit patterns (cyclic).
fn psi_sq(bits: &[u8], m: usize) -> f64 {
    if m < 1 {
        return 0.0;
    }
    let n = bits.len();
    let num_patterns = 1usize << m;
    let mut counts = vec![0u64; num_patterns];
    for i in 0..n {
        let mut val = 0usize;
        for j in 0..m {
            val = (val << 1) | bits[(i + j) % n] as usize;
        }
        counts[val] += 1;
    }
    let sum_sq: f64 = counts.iter().map(|&c| (c as f64) * (c as f64)).sum();
    sum_sq * (num_patterns as f64) / (n as f64) - n as f64
}

/// Serial test -- frequency of overlapping 4-bit patterns.
pub fn serial_test(data: &[u8]) -> TestResult {
    let name = "Serial Test";
    let m = 4usize;
    let mut bits = to_bits(data);
    bits.truncate(20_000);
    let n = bits.len();
    if n < (1 << m) + 10 {
        return insufficient(name, (1 << m) + 10, n);
    }
    let delta = psi_sq(&bits, m) - psi_sq(&bits, m - 1);
    let df = (1u64 << (m - 1)) as f64;
    let p = chi2_sf(df, delta);
    TestResult::from_p(name, p, delta, format!("m={m}, n={n}"))
}

/// Serial correlation -- adjacent byte correlation. Z-test.
pub fn serial_correlation(data: &[u8]) -> TestResult {
    let name = "Serial Correlation";
    let n = data.len();
    if n < 20 {
        return insufficient(name, 20, n);
    }
    let arr: Vec<f64> = data.iter().map(|&b| f64::from(b)).collect();
    let mean: f64 = arr.iter().sum::<f64>() / n as f64;
    let var: f64 = arr.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n as f64;
    if var < 1e-10 {
        return TestResult::failed(name, "Zero variance");
    }
    let sum: f64 = arr
        .windows(2)
        .map(|w| (w[0] - mean) * (w[1] - mean))
        .sum();
    let r = sum / ((n - 1) as f64 * var);
    let z = r * (n as f64).sqrt();
    TestResult::from_p(name, two_sided(z), r.abs(), format!("r={r:.6}, z={z:.4}"))
}

// ═══════════════════════════════════════════════════════════════════════════════
// 3. WORD TESTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Bit position bias -- each of the 64 bit positions should be set in half of
/// all words. Sum of squared z-scores against chi-squared(64).
pub fn bit_position_bias(data: &[u8]) -> TestResult {
    let name = "Bit Position Bias";
    let words = to_words(data);
    let n = words.len();
    if n < 1000 {
        return insufficient(name, 8000, data.len());
    }
    let mut set = [0u64; 64];
    for w in &words {
        for (bit, count) in set.iter_mut().enumerate() {
            *count += (w >> bit) & 1;
        }
    }
    let half = n as f64 / 2.0;
    let sd = (n as f64 / 4.0).sqrt();
    let (mut chi2, mut worst) = (0.0, 0usize);
    for (bit, &count) in set.iter().enumerate() {
        let z = (count as f64 - half) / sd;
        chi2 += z * z;
        if (count as f64 - half).abs() > (set[worst] as f64 - half).abs() {
            worst = bit;
        }
    }
    let p = chi2_sf(64.0, chi2);
    TestResult::from_p(
        name,
        p,
        chi2,
        format!("words={n}, worst_bit={worst} ({}/{n})", set[worst]),
    )
}

/// Word avalanche -- consecutive words should differ in ~32 of 64 bits.
pub fn word_avalanche(data: &[u8]) -> TestResult {
    let name = "Word Avalanche";
    let words = to_words(data);
    if words.len() < 100 {
        return insufficient(name, 800, data.len());
    }
    let pairs = words.len() - 1;
    let total: u64 = words
        .windows(2)
        .map(|w| u64::from((w[0] ^ w[1]).count_ones()))
        .sum();
    let mean = total as f64 / pairs as f64;
    // Binomial(64, 0.5): sd = 4.
    let z = (mean - 32.0) / (4.0 / (pairs as f64).sqrt());
    TestResult::from_p(
        name,
        two_sided(z),
        mean,
        format!("mean_diff={mean:.3}/64 bits, expected=32.0"),
    )
}

/// Word collisions -- repeated 64-bit words. Poisson against the birthday
/// expectation `n^2 / 2^65`.
pub fn word_collisions(data: &[u8]) -> TestResult {
    let name = "Word Collisions";
    let words = to_words(data);
    let n = words.len();
    if n < 2 {
        return insufficient(name, 16, data.len());
    }
    let unique: HashSet<u64> = words.iter().copied().collect();
    let dups = (n - unique.len()) as u64;
    let lambda = (n as f64) * (n as f64) / 2f64.powi(65);
    let p = if dups == 0 {
        1.0
    } else {
        match Poisson::new(lambda.max(1e-12)) {
            Ok(poisson) => poisson.sf(dups - 1),
            Err(_) => 0.0,
        }
    };
    TestResult::from_p(
        name,
        p,
        dups as f64,
        format!("duplicates={dups}, expected={lambda:.2e}, words={n}"),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// 4. COMPRESSION
// ═══════════════════════════════════════════════════════════════════════════════

/// Compression ratio -- zlib compression ratio (random ~ 1.0+).
pub fn compression_ratio(data: &[u8]) -> TestResult {
    let name = "Compression Ratio";
    let n = data.len();
    if n < 32 {
        return insufficient(name, 32, n);
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    let compressed = match encoder.write_all(data).and_then(|()| encoder.finish()) {
        Ok(c) => c,
        Err(e) => return TestResult::failed(name, format!("zlib failed: {e}")),
    };
    let ratio = compressed.len() as f64 / n as f64;
    let grade = if ratio > 0.95 {
        'A'
    } else if ratio > 0.85 {
        'B'
    } else if ratio > 0.7 {
        'C'
    } else if ratio > 0.5 {
        'D'
    } else {
        'F'
    };
    TestResult {
        name: name.to_string(),
        passed: ratio > 0.85,
        p_value: None,
        statistic: ratio,
        details: format!("{}/{n} = {ratio:.4}", compressed.len()),
        grade,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Test battery
// ═══════════════════════════════════════════════════════════════════════════════

/// Run the complete battery on a byte slice.
pub fn run_all_tests(data: &[u8]) -> Vec<TestResult> {
    let tests: [fn(&[u8]) -> TestResult; 10] = [
        // Frequency (3)
        monobit_frequency,
        block_frequency,
        byte_frequency,
        // Runs / serial (3)
        runs_test,
        serial_test,
        serial_correlation,
        // Words (3)
        bit_position_bias,
        word_avalanche,
        word_collisions,
        // Compression (1)
        compression_ratio,
    ];
    tests.iter().map(|test_fn| test_fn(data)).collect()
}

/// Calculate overall quality score (0-100) from test results.
///
/// Each grade maps to a score: A=100, B=75, C=50, D=25, F=0.
/// Returns the average across all tests.
pub fn calculate_quality_score(results: &[TestResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let total: f64 = results
        .iter()
        .map(|r| match r.grade {
            'A' => 100.0,
            'B' => 75.0,
            'C' => 50.0,
            'D' => 25.0,
            _ => 0.0,
        })
        .sum();
    total / results.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    fn seeded_bytes(n: usize) -> Vec<u8> {
        let mut data = vec![0u8; n];
        StdRng::seed_from_u64(0xDEAD_BEEF_CAFE_BABE).fill_bytes(&mut data);
        data
    }

    fn generator_bytes(n_words: usize) -> Vec<u8> {
        let mut g = fastentropy_core::new_source();
        let words: Vec<u64> = (0..n_words).map(|_| g.uint64()).collect();
        from_words(&words)
    }

    #[test]
    fn test_to_bits() {
        let bits = to_bits(&[0b1011_0001u8]);
        assert_eq!(bits, vec![1, 0, 1, 1, 0, 0, 0, 1]);
    }

    #[test]
    fn test_words_little_endian() {
        let words = [0x0102_0304_0506_0708u64, u64::MAX];
        let bytes = from_words(&words);
        assert_eq!(bytes[0], 0x08);
        assert_eq!(to_words(&bytes), words);
        assert_eq!(to_words(&bytes[..15]).len(), 1);
    }

    #[test]
    fn test_grade_from_p() {
        assert_eq!(TestResult::grade_from_p(Some(0.5)), 'A');
        assert_eq!(TestResult::grade_from_p(Some(0.05)), 'B');
        assert_eq!(TestResult::grade_from_p(Some(0.005)), 'C');
        assert_eq!(TestResult::grade_from_p(Some(0.0005)), 'D');
        assert_eq!(TestResult::grade_from_p(Some(0.000_000_01)), 'F');
        assert_eq!(TestResult::grade_from_p(None), 'F');
    }

    #[test]
    fn test_insufficient_data() {
        let result = monobit_frequency(&[0u8; 5]);
        assert!(!result.passed);
        assert!(result.details.contains("Insufficient"));
    }

    #[test]
    fn test_constant_data_fails() {
        let results = run_all_tests(&vec![0u8; 16_000]);
        let passed = results.iter().filter(|r| r.passed).count();
        assert!(passed < results.len() / 2, "{passed} passed on zeros");
    }

    #[test]
    fn test_repeated_words_detected() {
        let words: Vec<u64> = (0..2000).map(|i| i % 100 * 0x9E37_79B9_7F4A_7C15).collect();
        let result = word_collisions(&from_words(&words));
        assert!(!result.passed);
        assert_eq!(result.statistic, 1900.0);
    }

    #[test]
    fn test_stuck_bit_detected() {
        let mut data = seeded_bytes(80_000);
        for chunk in data.chunks_exact_mut(8) {
            chunk[7] |= 0x80;
        }
        let result = bit_position_bias(&data);
        assert!(!result.passed);
        assert!(result.details.contains("worst_bit=63"));
    }

    #[test]
    fn test_seeded_random_passes() {
        let results = run_all_tests(&seeded_bytes(80_000));
        let failed: Vec<_> = results.iter().filter(|r| !r.passed).collect();
        assert!(failed.len() <= 2, "failed: {failed:?}");
    }

    #[test]
    fn test_generator_output_passes() {
        let results = run_all_tests(&generator_bytes(20_000));
        let failed: Vec<_> = results.iter().filter(|r| !r.passed).collect();
        assert!(failed.len() <= 2, "failed: {failed:?}");
        assert!(calculate_quality_score(&results) > 60.0);
    }

    #[test]
    fn test_pooled_output_passes() {
        let words: Vec<u64> = (0..20_000).map(|_| fastentropy_core::uint64()).collect();
        let results = run_all_tests(&from_words(&words));
        let failed: Vec<_> = results.iter().filter(|r| !r.passed).collect();
        assert!(failed.len() <= 2, "failed: {failed:?}");
    }

    #[test]
    fn test_battery_size() {
        assert_eq!(run_all_tests(&seeded_bytes(8_000)).len(), 10);
    }

    #[test]
    fn test_quality_score() {
        let pass = TestResult::from_p("a", 0.5, 0.0, String::new());
        let fail = TestResult::failed("f", "");
        assert!((calculate_quality_score(&[pass, fail]) - 50.0).abs() < 0.01);
        assert_eq!(calculate_quality_score(&[]), 0.0);
    }
}
