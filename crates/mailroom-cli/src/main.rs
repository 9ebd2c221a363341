use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod format_mod;

use cli::{Cli, run_cli};

const LOG_ENV: &str = "MAILROOM_LOG";
const INTERRUPT_EXIT: i32 = 0;

fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    report_dotenv(dotenv);
    install_interrupt_handler();

    match run_cli(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

/// Logs how `.env` loading went; a missing file is normal.
fn report_dotenv(outcome: dotenvy::Result<PathBuf>) -> Option<PathBuf> {
    match outcome {
        Ok(path) => {
            debug!(path = %path.display(), "loaded .env");
            Some(path)
        }
        Err(err) if err.not_found() => None,
        Err(err) => {
            warn!(error = %err, "ignoring unreadable .env");
            None
        }
    }
}

/// Ctrl-C during a prompt or a network call ends the process quietly.
fn install_interrupt_handler() {
    if let Err(err) = ctrlc::set_handler(|| std::process::exit(INTERRUPT_EXIT)) {
        warn!(error = %err, "could not install interrupt handler");
    }
}
