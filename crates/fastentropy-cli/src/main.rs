//! CLI for fastentropy: an entropy amplifier for fast 64-bit randomness.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "fastentropy")]
#[command(about = "fastentropy: fast 64-bit randomness re-keyed from OS entropy")]
#[command(version = fastentropy_core::VERSION)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream generator output to stdout (pipe-friendly, e.g. into PractRand)
    Stream {
        /// Output format
        #[arg(long, default_value = "raw", value_parser = ["raw", "hex"])]
        format: String,

        /// Total bytes (0 = infinite)
        #[arg(long, default_value = "0")]
        bytes: usize,

        /// Draw every word through the shared recycling pool
        #[arg(long)]
        pooled: bool,
    },

    /// Measure draws/second: standalone generator, pooled, rand::rng(), OS
    Bench {
        /// Draws per thread for each source
        #[arg(long, default_value = "10000000")]
        draws: usize,

        /// Draws taken from each freshly constructed source (0 = one source per thread)
        #[arg(long, default_value = "0")]
        per_source: usize,

        /// Worker threads
        #[arg(long, default_value = "1")]
        threads: usize,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the statistical test battery on generator output
    Report {
        /// Number of bytes to test
        #[arg(long, default_value = "1000000")]
        bytes: usize,

        /// Test output drawn through the shared recycling pool
        #[arg(long)]
        pooled: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show entropy pool and recycling pool health
    Health {
        /// Wait before reporting so refresh ticks can be observed (milliseconds)
        #[arg(long, default_value = "0")]
        wait_ms: u64,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Stream {
            format,
            bytes,
            pooled,
        } => commands::stream::run(&format, bytes, pooled),
        Commands::Bench {
            draws,
            per_source,
            threads,
            json,
        } => commands::bench::run(commands::bench::BenchConfig {
            draws,
            per_source,
            threads,
            json,
        }),
        Commands::Report {
            bytes,
            pooled,
            json,
        } => commands::report::run(bytes, pooled, json),
        Commands::Health { wait_ms, json } => commands::health::run(wait_ms, json),
    }
}
