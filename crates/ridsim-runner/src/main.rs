//! `ridsim` binary: broadcasts simulated Remote ID and answers control lines
//! read from stdin.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use ridsim_runner::{
    spawn_reader, LogRadio, RealTimeConfig, RealTimePacer, Runner, RunnerConfig, RunnerResult,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ridsim", version, about = "Remote ID broadcast simulator")]
struct Args {
    /// YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the engine RNG seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many seconds of engine time.
    #[arg(long)]
    duration_secs: Option<f64>,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Realtime speed multiplier.
    #[arg(long, default_value_t = 1.0)]
    realtime_speed: f64,

    /// Run as fast as possible instead of tracking the wall clock.
    #[arg(long)]
    no_realtime: bool,

    /// Serve Prometheus metrics on this address.
    #[cfg(feature = "prometheus")]
    #[arg(long)]
    metrics_addr: Option<std::net::SocketAddr>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> RunnerResult<()> {
    let mut config = match &args.config {
        Some(path) => RunnerConfig::load(path)?,
        None => RunnerConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.engine.rng_seed = seed;
    }

    #[cfg(feature = "prometheus")]
    {
        if let Some(addr) = args.metrics_addr {
            ridsim_metrics::install_prometheus(addr)
                .map_err(|e| ridsim_runner::RunnerError::Metrics(e.to_string()))?;
            info!("Metrics: serving on {}", addr);
        }
    }

    let realtime = if args.no_realtime {
        RealTimeConfig::disabled()
    } else {
        RealTimeConfig::with_speed(args.realtime_speed)?
    };
    let until_ms = args
        .duration_secs
        .map(|secs| (secs.max(0.0) * 1000.0).round() as u64);

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = stop.clone();
    ctrlc::set_handler(move || {
        stop_handler.store(true, Ordering::SeqCst);
    })?;

    let (control, _reader) = spawn_reader(io::stdin())?;
    let mut runner = Runner::new(config, LogRadio::new())?;
    let mut pacer = RealTimePacer::new(realtime, runner.now_ms());

    let stdout = io::stdout();
    let mut output = stdout.lock();
    let summary = runner.run(&control, &mut output, &mut pacer, &stop, until_ms)?;

    info!(
        "Done: {} frames ({} bytes) in {:.1}s wall time, max drift {} ms",
        runner.radio().transmitted(),
        runner.radio().bytes(),
        summary.pacing.elapsed_wall.as_secs_f64(),
        summary.pacing.max_drift_seen_ms
    );
    Ok(())
}
