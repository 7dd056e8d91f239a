mod cli;

use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, EXIT_FAILURE};
use nsdoctor::config::LoggingConfig;

const VERBOSE_FILTER: &str = "info,nsdoctor=debug,kube=info";

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    init_tracing(&config.logging, cli.verbose);
    debug!("nsdoctor {}", env!("CARGO_PKG_VERSION"));

    match cli.execute(config).await {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

/// Logs go to stderr so that stdout carries only the report.
fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new(VERBOSE_FILTER)
        } else {
            EnvFilter::new(&logging.level)
        }
    });

    let json_layer = logging
        .json_format
        .then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!logging.json_format).then(|| {
        fmt::layer()
            .with_target(verbose)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}
