// graypool-worker
//
// Creates the named pipe, waits for a sender, transforms the received image on
// a fixed worker pool and writes the result as a binary PGM.

use clap::Parser;
use graypool::engine::{create_fifo, open_fifo_reader};
use graypool::{EngineConfig, GrayPoolError, ImageWorker, RequestOverrides, RunMetrics, TransformMode};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "graypool-worker", version, about = "Receive a grayscale image over a FIFO and transform it in parallel")]
struct Args {
    /// Named pipe to create and read from
    fifo: PathBuf,
    /// Output PGM path
    output: PathBuf,
    /// Transform to apply (negative | slice). Defaults to the sender's choice.
    #[arg(long, value_parser = parse_mode)]
    mode: Option<TransformMode>,
    /// Lower slice threshold (exclusive)
    #[arg(long, allow_negative_numbers = true)]
    t1: Option<i32>,
    /// Upper slice threshold (exclusive)
    #[arg(long, allow_negative_numbers = true)]
    t2: Option<i32>,
    /// Worker threads (overrides GRAYPOOL_THREADS)
    #[arg(long)]
    threads: Option<usize>,
    /// Task queue slots (overrides GRAYPOOL_QUEUE_CAPACITY)
    #[arg(long)]
    queue_capacity: Option<usize>,
    /// Fixed task height in rows. Default is one task per worker.
    #[arg(long)]
    rows_per_task: Option<usize>,
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn parse_mode(raw: &str) -> Result<TransformMode, String> {
    TransformMode::from_str(raw).map_err(|e| e.to_string())
}

fn run(args: Args) -> graypool::Result<RunMetrics> {
    let mut config = EngineConfig::from_env().with_rows_per_task(args.rows_per_task);
    if let Some(threads) = args.threads {
        config = config.with_threads(threads);
    }
    if let Some(capacity) = args.queue_capacity {
        config = config.with_queue_capacity(capacity);
    }
    let worker = ImageWorker::new(config).with_overrides(RequestOverrides {
        mode: args.mode,
        t1: args.t1,
        t2: args.t2,
    });
    worker.preflight()?;

    create_fifo(&args.fifo)?;
    info!(fifo = %args.fifo.display(), "waiting for sender");
    let mut pipe = open_fifo_reader(&args.fifo)?;
    worker.serve(&mut pipe, &args.output)
}

fn main() -> ExitCode {
    let args = Args::parse();
    graypool::init_tracing(args.verbose);

    match run(args) {
        Ok(metrics) => {
            println!("processing time: {:.6} s", metrics.processing_secs());
            info!(%metrics, "done");
            ExitCode::SUCCESS
        }
        Err(err) => report(&err),
    }
}

fn report(err: &GrayPoolError) -> ExitCode {
    let phase = err.phase();
    eprintln!("graypool-worker: {phase} failed: {err}");
    ExitCode::from(phase.exit_code())
}
