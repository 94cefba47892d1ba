mod fixture;
mod sim;

use clap::{Parser, Subcommand};
use collector::{
    keys, ConfigSource, CorsSupportCollector, LoadingTimeCollector, RandomSampler, SamplingRates,
};
use fixture::PageSnapshot;
use rand::rngs::StdRng;
use sim::PrintingSink;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "harness")]
#[command(about = "Drives the telemetry collectors against a simulated page snapshot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one page view: sample, collect, and print the emitted events
    Collect {
        /// Path to a page snapshot fixture (JSON)
        #[arg(short, long)]
        fixture: PathBuf,
        /// Seed for the sampling decision, for reproducible runs
        #[arg(long)]
        seed: Option<u64>,
        /// Run the collectors even when sampling would skip them
        #[arg(long)]
        force: bool,
    },
    /// Report the empirical inclusion rate of the sampler
    Sample {
        /// Sampling factor ("1 in N" requests measured)
        #[arg(short, long)]
        factor: f64,
        /// Number of simulated requests
        #[arg(short, long, default_value = "100000")]
        trials: u64,
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn make_sampler(seed: Option<u64>) -> RandomSampler<StdRng> {
    match seed {
        Some(seed) => RandomSampler::seeded(seed),
        None => RandomSampler::from_entropy(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Collect {
            fixture,
            seed,
            force,
        } => collect(&fixture, seed, force).await?,
        Commands::Sample {
            factor,
            trials,
            seed,
        } => sample(factor, trials, seed),
    }

    Ok(())
}

async fn collect(
    path: &std::path::Path,
    seed: Option<u64>,
    force: bool,
) -> Result<(), fixture::FixtureError> {
    let snapshot = PageSnapshot::load(path)?;

    if !snapshot.page.is_file_page {
        info!("not a file page, nothing to measure");
        return Ok(());
    }

    let sink = Arc::new(PrintingSink::default());
    let caps = sim::capabilities(&snapshot, Arc::clone(&sink));

    let rates = SamplingRates::from_config(&*caps.config);
    let is_anon = caps
        .config
        .get(keys::USER_ID)
        .map_or(true, |value| value.is_null());
    let mut sampler = make_sampler(seed);

    let image_factor = rates.image_factor(is_anon);
    let run_image = force
        || image_factor
            .map(|factor| sampler.should_sample(factor))
            .unwrap_or(false);
    let cors_factor = rates.cors_factor();
    let run_cors = force
        || cors_factor
            .map(|factor| sampler.should_sample(factor))
            .unwrap_or(false);

    debug!(?image_factor, run_image, ?cors_factor, run_cors, is_anon, "sampling decisions");

    let image_task = async {
        if run_image {
            LoadingTimeCollector::create(image_factor.unwrap_or(0.0), &caps)
                .install()
                .await;
        }
    };
    let cors_task = async {
        if run_cors {
            CorsSupportCollector::create(cors_factor.unwrap_or(0.0), &caps)
                .install()
                .await;
        }
    };
    tokio::join!(image_task, cors_task);

    info!(events = sink.received(), "page view finished");
    Ok(())
}

fn sample(factor: f64, trials: u64, seed: Option<u64>) {
    let mut sampler = make_sampler(seed);
    let hits = (0..trials)
        .filter(|_| sampler.should_sample(factor))
        .count();

    let rate = hits as f64 / trials.max(1) as f64;
    let expected = if factor.is_finite() && factor >= 1.0 {
        1.0 / factor
    } else {
        0.0
    };
    println!(
        "factor {factor}: {hits}/{trials} sampled ({rate:.5}; expected {expected:.5})"
    );
}
