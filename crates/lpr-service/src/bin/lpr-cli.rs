//! One-shot plate recognition for a single image file
//!
//! Prints the plate string, or `NoPlate`, on stdout. Logs go to stderr.
//!
//! Usage:
//!   lpr-cli -i ./samples/1.jpg
//!   lpr-cli --image-path car.png --config model.json -v

use clap::Parser;
use lpr_service::{cli::recognize_file, load_model};
use std::{path::PathBuf, process::ExitCode};
use telemetry::{LogConfig, LogWriter};

#[derive(Parser)]
#[command(name = "lpr-cli")]
#[command(about = "Recognize the license plate in an image", long_about = None)]
struct Cli {
    /// Image to read
    #[arg(short = 'i', long, default_value = "./samples/1.jpg")]
    image_path: PathBuf,

    /// Recognition model configuration (JSON)
    #[arg(long, env = "LPR_MODEL_CONFIG")]
    config: Option<PathBuf>,

    /// Log pipeline progress at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    let _log_guard = match telemetry::init_structured_logging(
        LogConfig::new("lpr-cli")
            .with_writer(LogWriter::Stderr)
            .with_default_level(level),
    ) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("lpr-cli: failed to initialize logging: {e:#}");
            None
        }
    };

    let model = match load_model(cli.config.as_deref()) {
        Ok(model) => model,
        Err(e) => {
            eprintln!("lpr-cli: {e}");
            return ExitCode::FAILURE;
        }
    };

    match recognize_file(&model, &cli.image_path) {
        Ok(result) => {
            println!("{}", result.as_text());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("lpr-cli: {e}");
            ExitCode::FAILURE
        }
    }
}
