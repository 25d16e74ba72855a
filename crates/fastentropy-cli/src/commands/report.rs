use std::time::Instant;

use fastentropy_tests::TestResult;
use serde::Serialize;

use super::WordSource;

#[derive(Serialize)]
struct Report<'a> {
    source: &'a str,
    bytes: usize,
    score: f64,
    passed: usize,
    results: &'a [TestResult],
}

pub fn run(n_bytes: usize, pooled: bool, json: bool) {
    let mut source = WordSource::new(pooled);
    let label = source.label();

    if !json {
        println!("Running test battery on {n_bytes} bytes of {label} output...\n");
    }

    let t0 = Instant::now();
    let data = source.bytes(n_bytes);
    let results = fastentropy_tests::run_all_tests(&data);
    let elapsed = t0.elapsed().as_secs_f64();
    let score = fastentropy_tests::calculate_quality_score(&results);
    let passed = results.iter().filter(|r| r.passed).count();
    log::debug!("battery finished in {elapsed:.2}s");

    if json {
        let report = Report {
            source: label,
            bytes: data.len(),
            score,
            passed,
            results: &results,
        };
        match serde_json::to_string_pretty(&report) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("Failed to encode report: {e}"),
        }
    } else {
        print_table(&results);
        println!(
            "\nScore: {score:.1}/100 ({passed}/{} passed) [{elapsed:.1}s]",
            results.len()
        );
    }
}

fn print_table(results: &[TestResult]) {
    println!("{}", "=".repeat(72));
    println!(
        "{:<22} {:>6} {:>10} {:>5}  Details",
        "Test", "Result", "p-value", "Grade"
    );
    println!("{}", "-".repeat(72));
    for r in results {
        let p = r
            .p_value
            .map(|p| format!("{p:.4}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<22} {:>6} {:>10} {:>5}  {}",
            r.name,
            if r.passed { "PASS" } else { "FAIL" },
            p,
            r.grade,
            r.details
        );
    }
}
