use std::time::Instant;

use rand::RngCore;
use serde::Serialize;

pub struct BenchConfig {
    pub draws: usize,
    pub per_source: usize,
    pub threads: usize,
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Standalone,
    Pooled,
    ThreadRng,
    Os,
}

impl Method {
    const ALL: [Method; 4] = [
        Method::Standalone,
        Method::Pooled,
        Method::ThreadRng,
        Method::Os,
    ];

    fn name(self) -> &'static str {
        match self {
            Method::Standalone => "fastentropy (standalone)",
            Method::Pooled => "fastentropy (pooled)",
            Method::ThreadRng => "rand::rng()",
            Method::Os => "getrandom",
        }
    }
}

#[derive(Debug, Serialize)]
struct BenchRow {
    method: &'static str,
    threads: usize,
    draws: u64,
    seconds: f64,
    draws_per_sec: f64,
    ns_per_draw: f64,
    /// XOR of every draw, so the work can't be optimized away.
    checksum: u64,
}

pub fn run(config: BenchConfig) {
    let threads = config.threads.max(1);
    let per_source = if config.per_source == 0 {
        config.draws.max(1)
    } else {
        config.per_source
    };

    // Pay for global initialization outside the timed region.
    let _ = fastentropy_core::uint64();

    if !config.json {
        println!(
            "Benchmarking {} draws x {threads} thread(s), {per_source} draws per source...\n",
            config.draws
        );
    }

    let mut rows = Vec::new();
    for method in Method::ALL {
        match measure(method, config.draws, per_source, threads) {
            Ok(row) => {
                if !config.json {
                    println!(
                        "  {:<26} {:>8.1} M/s  {:>7.2} ns/draw",
                        row.method,
                        row.draws_per_sec / 1e6,
                        row.ns_per_draw
                    );
                }
                rows.push(row);
            }
            Err(e) => eprintln!("  {:<26} failed: {e}", method.name()),
        }
    }

    if config.json {
        match serde_json::to_string_pretty(&rows) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Failed to encode results: {e}"),
        }
    }
}

fn measure(
    method: Method,
    draws: usize,
    per_source: usize,
    threads: usize,
) -> Result<BenchRow, getrandom::Error> {
    let t0 = Instant::now();
    let per_thread: Vec<Result<u64, getrandom::Error>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|_| s.spawn(move || worker(method, draws, per_source)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    });
    let seconds = t0.elapsed().as_secs_f64();

    let mut checksum = 0u64;
    for result in per_thread {
        checksum ^= result?;
    }
    let total = (draws * threads) as u64;
    Ok(BenchRow {
        method: method.name(),
        threads,
        draws: total,
        seconds,
        draws_per_sec: total as f64 / seconds.max(f64::EPSILON),
        ns_per_draw: seconds * 1e9 / total.max(1) as f64,
        checksum,
    })
}

fn worker(method: Method, draws: usize, per_source: usize) -> Result<u64, getrandom::Error> {
    let mut acc = 0u64;
    let mut remaining = draws;
    while remaining > 0 {
        let n = remaining.min(per_source);
        match method {
            Method::Standalone => {
                let mut g = fastentropy_core::new_source();
                for _ in 0..n {
                    acc ^= g.uint64();
                }
            }
            Method::Pooled => {
                let rng = fastentropy_core::pooled();
                for _ in 0..n {
                    acc ^= rng.uint64();
                }
            }
            Method::ThreadRng => {
                let mut rng = rand::rng();
                for _ in 0..n {
                    acc ^= rng.next_u64();
                }
            }
            Method::Os => {
                for _ in 0..n {
                    acc ^= getrandom::u64()?;
                }
            }
        }
        remaining -= n;
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_counts_all_threads() {
        let row = measure(Method::Standalone, 1000, 100, 3).unwrap();
        assert_eq!(row.draws, 3000);
        assert_eq!(row.threads, 3);
        assert!(row.draws_per_sec > 0.0);
    }

    #[test]
    fn test_every_method_runs() {
        for method in Method::ALL {
            let row = measure(method, 64, 16, 2).unwrap();
            assert_eq!(row.draws, 128);
            assert_ne!(row.checksum, 0);
        }
    }

    #[test]
    fn test_worker_zero_draws() {
        assert_eq!(worker(Method::Pooled, 0, 1).unwrap(), 0);
    }
}
