use std::time::Duration;

use fastentropy_core::{PoolHealth, PoolStats};
use serde::Serialize;

#[derive(Serialize)]
struct Health {
    version: &'static str,
    refreshing: bool,
    pool: PoolHealth,
    recycling: PoolStats,
}

pub fn run(wait_ms: u64, json: bool) {
    let entropy = fastentropy_core::entropy();
    // Touch the pooled source so its counters exist.
    let _ = fastentropy_core::uint64();
    if wait_ms > 0 {
        std::thread::sleep(Duration::from_millis(wait_ms));
    }

    let health = Health {
        version: fastentropy_core::VERSION,
        refreshing: entropy.is_refreshing(),
        pool: entropy.pool().health_report(),
        recycling: fastentropy_core::pooled_source().stats(),
    };

    if json {
        match serde_json::to_string_pretty(&health) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("Failed to encode health: {e}"),
        }
        return;
    }

    let pool = &health.pool;
    println!("fastentropy {}", health.version);
    println!("\nEntropy pool");
    println!("  source           {} ({})", pool.source, pool.source_kind);
    println!("  words            {}", pool.words);
    println!("  refreshing       {}", health.refreshing);
    println!("  refreshes        {}", pool.refreshes);
    println!("  failures         {}", pool.failures);
    println!("  stale            {}", pool.stale);
    println!("  last refresh     {:.1} ms ago", pool.since_last_refresh_ms);

    let stats = &health.recycling;
    println!("\nRecycling pool");
    println!("  capacity         {}", stats.capacity);
    println!("  idle             {}", stats.idle);
    println!("  constructed      {}", stats.constructed);
    println!("  discarded        {}", stats.discarded);
}
