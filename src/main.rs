//! `bb-pr` entrypoint for managing Bitbucket Cloud pull requests.

use std::io::{self, Write};
use std::process::ExitCode;

use bbpr::{BbprConfig, BitbucketError};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Cli;
use cli::commands::{self, Invocation};
use cli::output::{OutputFormat, write_error_to};

const LOG_ENV: &str = "BBPR_LOG";

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();
    init_tracing(args.global.verbose);
    let format = if args.global.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            // Nothing useful remains to do when stderr itself is gone.
            write_error_to(&mut io::stderr().lock(), format, &error).ok();
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Cli) -> Result<(), BitbucketError> {
    let config = BbprConfig::load_layers()?;
    let invocation = Invocation::new(&config, &args.global);
    let cancel = cancel_on_ctrl_c();

    let mut stdout = io::stdout().lock();
    commands::run(&invocation, &args.command, cancel, &mut stdout).await?;
    stdout.flush().map_err(|error| BitbucketError::Io {
        message: error.to_string(),
    })
}

/// Installs a stderr subscriber filtered by `BBPR_LOG`.
///
/// Defaults to `warn`, or `debug` with `--verbose`.
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "bbpr=debug,bb_pr=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
    if installed.is_err() {
        warn!("tracing subscriber already installed");
    }
}

/// Cancels outstanding requests and backoff waits on Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            trigger.cancel();
        }
    });
    cancel
}
