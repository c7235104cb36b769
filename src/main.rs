//! sweepkv - Eviction Workload Driver
//!
//! Runs a store and its deleter under a synthetic write load and reports
//! how many keys were evicted for age and for count.

use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sweepkv::deleter::{DeleterConfig, DeleterProvider};
use sweepkv::storage::TtlStore;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Workload configuration
struct Config {
    /// Number of distinct keys writers pick from
    keys: u64,
    /// Number of concurrent writer tasks
    writers: u64,
    /// How long to run
    duration: Duration,
    /// Deleter settings
    deleter: DeleterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keys: 100_000,
            writers: 4,
            duration: Duration::from_secs(5),
            deleter: DeleterConfig::default()
                .with_max_age(Duration::from_secs(2))
                .with_sweep_interval(Duration::from_millis(500))
                .with_keep_num(10_000)
                .with_buffer_size(1_000),
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            let flag = args[i].as_str();
            match flag {
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("sweepkv version {}", sweepkv::VERSION);
                    std::process::exit(0);
                }
                _ => {}
            }

            let Some(value) = args.get(i + 1) else {
                eprintln!("Error: {} requires a value", flag);
                std::process::exit(1);
            };
            let number = parse_number(flag, value);

            match flag {
                "--keys" | "-k" => config.keys = number.max(1),
                "--writers" | "-w" => config.writers = number.max(1),
                "--duration-ms" | "-d" => config.duration = Duration::from_millis(number),
                "--max-age-ms" => config.deleter.max_age = Duration::from_millis(number),
                "--interval-ms" => config.deleter.sweep_interval = Duration::from_millis(number),
                "--keep" => config.deleter.keep_num = number as usize,
                "--buffer" => config.deleter.buffer_size = number as usize,
                _ => {
                    eprintln!("Unknown argument: {}", flag);
                    print_help();
                    std::process::exit(1);
                }
            }
            i += 2;
        }

        config
    }
}

fn parse_number(flag: &str, value: &str) -> u64 {
    value.parse().unwrap_or_else(|_| {
        eprintln!("Error: invalid number for {}: {}", flag, value);
        std::process::exit(1);
    })
}

fn print_help() {
    println!(
        r#"
sweepkv - Eviction Workload Driver

USAGE:
    sweepkv [OPTIONS]

OPTIONS:
    -k, --keys <N>             Distinct keys to write (default: 100000)
    -w, --writers <N>          Concurrent writer tasks (default: 4)
    -d, --duration-ms <MS>     How long to run (default: 5000)
        --max-age-ms <MS>      Evict keys idle this long (default: 2000)
        --interval-ms <MS>     Time between sweeps (default: 500)
        --keep <N>             Retention target (default: 10000)
        --buffer <N>           Event queue capacity (default: 1000)
    -v, --version              Print version information
        --help                 Print this help message

Set RUST_LOG=sweepkv=debug to see every sweep.
"#
    );
}

/// Writes pseudo-random keys until told to stop.
async fn write_loop(
    store: Arc<TtlStore<Bytes, Bytes, Arc<sweepkv::Deleter<Bytes>>>>,
    seed: u64,
    keys: u64,
    running: Arc<AtomicBool>,
    writes: Arc<AtomicU64>,
) {
    let mut state = seed;
    while running.load(Ordering::Relaxed) {
        // 64-bit LCG, good enough to spread writes over the key space
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        let key = Bytes::from(format!("key:{}", (state >> 33) % keys));
        store.set(key, Bytes::from_static(b"value")).await;

        if writes.fetch_add(1, Ordering::Relaxed) % 1024 == 0 {
            tokio::task::yield_now().await;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let provider = DeleterProvider::new(config.deleter.clone())?;
    let store = TtlStore::<Bytes, Bytes, _>::with_deleter(&provider, "workload");
    store.deleter().start()?;
    info!(
        keys = config.keys,
        writers = config.writers,
        duration_ms = config.duration.as_millis() as u64,
        "Workload started"
    );

    let running = Arc::new(AtomicBool::new(true));
    let writes = Arc::new(AtomicU64::new(0));
    let mut writers = Vec::new();
    for seed in 0..config.writers {
        writers.push(tokio::spawn(write_loop(
            Arc::clone(&store),
            seed + 1,
            config.keys,
            Arc::clone(&running),
            Arc::clone(&writes),
        )));
    }

    tokio::select! {
        _ = tokio::time::sleep(config.duration) => {}
        result = signal::ctrl_c() => {
            result?;
            info!("Shutdown signal received, stopping workload...");
        }
    }

    running.store(false, Ordering::Relaxed);
    for writer in writers {
        writer.await?;
    }
    store.deleter().stop().await?;

    let deleter = store.deleter().stats();
    let storage = store.stats();
    info!(
        writes = writes.load(Ordering::Relaxed),
        stored = storage.keys,
        tracked = deleter.tracked,
        sweeps = deleter.sweeps,
        stale_evicted = deleter.stale_evicted,
        excess_evicted = deleter.excess_evicted,
        "Workload complete"
    );

    Ok(())
}
