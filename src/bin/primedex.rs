//! primedex command-line interface
//!
//! # Examples
//!
//! ```bash
//! # Generate the first million primes
//! primedex build --target 1000000 --segment-size 10000
//!
//! # Serve lookups over HTTP
//! primedex serve --bind 0.0.0.0 --port 3007
//!
//! # One-off lookups
//! primedex get 1000
//! primedex range 1 20
//! ```

use clap::{Args, Parser, Subcommand};
use primedex::builder::repair_generation_status;
use primedex::codec::CompressionStats;
use primedex::server::start_server;
use primedex::{initialize_store, EngineConfig, PrimeDatabase, PrimeDatabaseBuilder, SegmentStore};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// primedex - indexed prime number storage
#[derive(Parser, Debug)]
#[command(name = "primedex")]
#[command(version = primedex::VERSION)]
#[command(about = "Generate, store and look up the k-th prime", long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Data directory path (overrides the config file)
    #[arg(long, global = true, env = "PRIMEDEX_DATA")]
    data_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true, env = "PRIMEDEX_CONFIG")]
    config: Option<PathBuf>,

    /// Log directory path
    #[arg(long, global = true, default_value = "logs", env = "PRIMEDEX_LOG_DIR")]
    log_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate primes into the data directory (resumes a previous build)
    Build(BuildArgs),

    /// Start the HTTP query server
    Serve(ServeArgs),

    /// Look up the prime at an index
    Get {
        #[arg(allow_negative_numbers = true)]
        index: i64,
    },

    /// Look up the primes for an inclusive index range
    Range {
        #[arg(allow_negative_numbers = true)]
        start: i64,
        #[arg(allow_negative_numbers = true)]
        end: i64,
    },

    /// Show store statistics and lookup timings
    Stats,

    /// Fix the generation status left by an interrupted build
    RepairStatus,

    /// Show version
    Version,
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// Number of primes to generate
    #[arg(short, long, env = "PRIMEDEX_TARGET")]
    target: Option<u64>,

    /// Primes per segment
    #[arg(long, env = "PRIMEDEX_SEGMENT_SIZE")]
    segment_size: Option<u64>,

    /// Numbers scanned per sieve window
    #[arg(long, env = "PRIMEDEX_SIEVE_WINDOW")]
    sieve_window: Option<u64>,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// HTTP bind address
    #[arg(short, long, env = "PRIMEDEX_BIND")]
    bind: Option<String>,

    /// HTTP port
    #[arg(short, long, env = "PRIMEDEX_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli)?;

    let config = load_config(&cli)?;

    // Execute command
    match cli.command {
        Commands::Build(args) => build_command(config, args).await,
        Commands::Serve(args) => serve_command(config, args).await,
        Commands::Get { index } => get_command(config, index).await,
        Commands::Range { start, end } => range_command(config, start, end).await,
        Commands::Stats => stats_command(config).await,
        Commands::RepairStatus => repair_command(config).await,
        Commands::Version => {
            println!("primedex {}", primedex::VERSION);
            Ok(())
        }
    }
}

/// Setup logging with rolling files and console output
fn setup_logging(cli: &Cli) -> anyhow::Result<()> {
    std::fs::create_dir_all(&cli.log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &cli.log_dir, "primedex.log");

    let log_level = cli
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_ansi(!cli.no_color)
                .pretty(),
        )
        .with(fmt::layer().with_writer(file_appender).with_ansi(false))
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    Ok(())
}

/// Config file (if any), then command-line overrides
fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            EngineConfig::from_file(path)?
        }
        None => EngineConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    Ok(config)
}

fn open_database(config: &EngineConfig) -> anyhow::Result<PrimeDatabase> {
    let store = initialize_store(&config.data_dir)?;
    Ok(PrimeDatabase::new(Arc::new(store), &config.cache))
}

/// Build command - generate primes until the target count is stored
async fn build_command(mut config: EngineConfig, args: BuildArgs) -> anyhow::Result<()> {
    if let Some(target) = args.target {
        config.build.target_prime_count = target;
    }
    if let Some(segment_size) = args.segment_size {
        config.build.segment_size = segment_size;
    }
    if let Some(window) = args.sieve_window {
        config.build.sieve_window_size = window;
    }
    config.validate()?;

    let store = Arc::new(initialize_store(&config.data_dir)?);
    info!(path = %config.data_dir.display(), "Store opened");

    let stop = Arc::new(AtomicBool::new(false));
    let signal_flag = Arc::clone(&stop);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current prime");
            signal_flag.store(true, Ordering::SeqCst);
        }
    });

    let builder = PrimeDatabaseBuilder::new(store.clone())
        .with_stop_flag(stop)
        .progress_log_interval(config.build.progress_log_interval);
    let report = builder
        .generate(
            config.build.target_prime_count,
            config.build.segment_size,
            config.build.sieve_window_size,
        )
        .await?;

    println!("Segments written: {}", report.segments_written);
    println!("Primes generated: {}", report.primes_generated);
    println!("Total primes:     {}", report.total_primes);
    println!("Status:           {}", report.status);
    println!("Elapsed:          {:.1}s", report.elapsed.as_secs_f64());
    if report.interrupted {
        println!("Build interrupted; run the same command again to resume.");
    }

    let stats = store.stats().await?;
    let compression = CompressionStats::new(stats.max_prime_index, stats.compressed_bytes);
    println!(
        "Compressed size:  {} bytes ({:.1}% smaller than raw)",
        compression.compressed_size,
        compression.space_saved_percent()
    );
    Ok(())
}

/// Serve command - start the HTTP query server
async fn serve_command(mut config: EngineConfig, args: ServeArgs) -> anyhow::Result<()> {
    info!(version = %primedex::VERSION, "primedex starting");

    if let Some(bind) = args.bind {
        config.server.http_addr = bind;
    }
    if let Some(port) = args.port {
        config.server.http_port = port;
    }
    config.validate()?;

    let db = Arc::new(open_database(&config)?);
    info!(path = %config.data_dir.display(), "Store opened");

    start_server(config.server, db).await
}

async fn get_command(config: EngineConfig, index: i64) -> anyhow::Result<()> {
    let db = open_database(&config)?;
    let started = Instant::now();
    match db.get_prime_by_index(index).await {
        Ok(prime) => {
            println!("Prime #{} = {}", index, prime);
            info!(index, prime, elapsed_us = started.elapsed().as_micros() as u64, "Lookup");
            Ok(())
        }
        Err(e) => {
            error!(index, error = %e, "Lookup failed");
            Err(e.into())
        }
    }
}

async fn range_command(config: EngineConfig, start: i64, end: i64) -> anyhow::Result<()> {
    let db = open_database(&config)?;
    for entry in db.get_primes_by_index_range(start, end).await? {
        match (entry.prime, entry.error) {
            (Some(prime), _) => println!("{}\t{}", entry.index, prime),
            (None, Some(error)) => println!("{}\t{}", entry.index, error),
            (None, None) => println!("{}\t-", entry.index),
        }
    }
    Ok(())
}

/// Stats command - store summary, progress and a lookup timing test
async fn stats_command(config: EngineConfig) -> anyhow::Result<()> {
    let db = open_database(&config)?;
    let stats = db.get_stats().await?;

    println!("Prime Database Statistics");
    println!("───────────────────────────────");
    println!("Status:          {}", stats.status);
    println!("Target count:    {}", stats.target_count);
    println!("Max prime index: {}", stats.max_prime_index);
    println!("Segments:        {}", stats.total_segments);

    let compression = CompressionStats::new(stats.max_prime_index, stats.compressed_bytes);
    println!(
        "Compressed:      {} bytes ({:.2} bytes/prime, {:.1}% saved)",
        compression.compressed_size,
        compression.bytes_per_prime(),
        compression.space_saved_percent()
    );

    if let Some(progress) = db.store().progress().await? {
        println!();
        println!("Generation Progress");
        println!("───────────────────────────────");
        println!("Primes generated: {}", progress.primes_generated);
        println!("Complete:         {:.2}%", progress.percent_complete());
        println!("Rate:             {:.0} primes/s", progress.rate_per_second);
        println!("Last update:      {}", progress.last_update);
        if let Some(eta) = progress.estimated_completion {
            println!("Estimated done:   {}", eta);
        }
    }

    println!();
    println!("Lookup Timings");
    println!("───────────────────────────────");
    for index in [1u64, 100, 10_000, 1_000_000] {
        if index > stats.max_prime_index {
            continue;
        }
        let cold = Instant::now();
        let prime = db.get_prime_by_index(index as i64).await?;
        let cold = cold.elapsed();
        let warm = Instant::now();
        db.get_prime_by_index(index as i64).await?;
        let warm = warm.elapsed();
        println!(
            "#{:<10} {:<12} cold {:>8.1}µs  cached {:>6.1}µs",
            index,
            prime,
            cold.as_secs_f64() * 1e6,
            warm.as_secs_f64() * 1e6
        );
    }

    let cache = db.cache_stats();
    println!(
        "Cache: {} segments, {} points, hit rate {:.1}%",
        cache.segment_entries,
        cache.point_entries,
        cache.hit_rate * 100.0
    );
    Ok(())
}

async fn repair_command(config: EngineConfig) -> anyhow::Result<()> {
    let store = initialize_store(&config.data_dir)?;
    match repair_generation_status(&store).await? {
        Some(status) => println!("Generation status set to {}", status),
        None => println!("Generation status is consistent ({})", store.metadata().await?.generation_status),
    }
    Ok(())
}
