#[macro_use]
extern crate log;

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser};
use qrun_onnx_fix::{fix_file, DEFAULT_BATCH_SIZE};

/// Pin the batch dimension of an ONNX model's first input and output.
#[derive(Parser, Debug)]
#[command(name = "onnx-fix", version)]
struct Args {
    /// Model to read
    #[arg(long = "in-file")]
    in_file: PathBuf,

    /// Where to write the fixed model (may be the input file)
    #[arg(long = "out-file")]
    out_file: PathBuf,

    /// Value written to the first dimension
    #[arg(long = "batch-size", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: i64,

    /// Sets the level of verbosity
    #[arg(short, action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env = env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, level);
    env_logger::Builder::from_env(env).format_timestamp_nanos().init();

    if let Err(e) = fix_file(&args.in_file, &args.out_file, args.batch_size) {
        error!("{e:?}");
        process::exit(1)
    }
}
