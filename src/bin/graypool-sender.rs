// graypool-sender
//
// Loads a binary PGM and streams it, with the requested transform in the
// header, into the worker's named pipe.

use clap::Parser;
use graypool::engine::{load_pgm, open_fifo_writer, send_frame, Limits};
use graypool::{GrayPoolError, TransformMode, TransformRequest};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "graypool-sender", version, about = "Stream a grayscale image into a graypool worker")]
struct Args {
    /// Named pipe created by graypool-worker
    fifo: PathBuf,
    /// Input PGM (binary P5)
    input: PathBuf,
    /// Transform to request (negative | slice)
    #[arg(long, value_parser = parse_mode, default_value = "negative")]
    mode: TransformMode,
    #[arg(long, allow_negative_numbers = true)]
    t1: Option<i32>,
    #[arg(long, allow_negative_numbers = true)]
    t2: Option<i32>,
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn parse_mode(raw: &str) -> Result<TransformMode, String> {
    TransformMode::from_str(raw).map_err(|e| e.to_string())
}

fn run(args: Args) -> graypool::Result<usize> {
    let request = TransformRequest::resolve(args.mode, args.t1, args.t2)?;
    request.validate()?;

    // Load before opening the pipe so a bad input never leaves the worker waiting.
    let frame = load_pgm(&args.input, &Limits::default())?;

    info!(fifo = %args.fifo.display(), "waiting for worker");
    let mut pipe = open_fifo_writer(&args.fifo)?;
    send_frame(&mut pipe, &frame, &request)?;
    Ok(frame.len())
}

fn main() -> ExitCode {
    let args = Args::parse();
    graypool::init_tracing(args.verbose);

    match run(args) {
        Ok(bytes) => {
            info!(bytes, "sender finished");
            ExitCode::SUCCESS
        }
        Err(err) => report(&err),
    }
}

fn report(err: &GrayPoolError) -> ExitCode {
    let phase = err.phase();
    eprintln!("graypool-sender: {phase} failed: {err}");
    ExitCode::from(phase.exit_code())
}
