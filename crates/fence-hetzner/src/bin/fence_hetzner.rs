//! fence_hetzner - I/O fencing agent for Hetzner Cloud virtual machines.

use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use fence_hetzner::config::{args_from_stdin, parse_failure_code, StdinOptions};
use fence_hetzner::error::EC_OK;
use fence_hetzner::providers::hetzner::HetznerCloud;
use fence_hetzner::{fence_action, FenceAgent, FenceArgs, FenceError, Outcome, EC_GENERIC_ERROR};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Cluster managers pass options as key=value lines on stdin.
    let stdin = if std::env::args_os().len() > 1 {
        StdinOptions::default()
    } else {
        match args_from_stdin(io::stdin().lock()) {
            Ok(options) => options,
            Err(e) => {
                eprintln!("Failed to read options from stdin: {e}");
                return ExitCode::from(EC_GENERIC_ERROR);
            }
        }
    };

    let parsed = if stdin.args.is_empty() {
        FenceArgs::try_parse()
    } else {
        FenceArgs::try_parse_from(&stdin.args)
    };
    let cli = match parsed {
        Ok(cli) => cli,
        Err(e) => {
            let code = parse_failure_code(&e);
            if code == EC_OK {
                e.exit();
            }
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    // Initialize logging
    let level = if cli.verbosity() > 0 { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,fence_hetzner={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    for key in &stdin.ignored {
        warn!(key = %key, "Ignoring unknown option");
    }

    match run(cli).await {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            error!(error = %format!("{e:#}"), "Fencing action failed");
            ExitCode::from(
                e.downcast_ref::<FenceError>()
                    .map_or(EC_GENERIC_ERROR, FenceError::exit_code),
            )
        }
    }
}

async fn run(cli: FenceArgs) -> Result<Outcome> {
    let options = cli.into_options()?;

    let transport =
        HetznerCloud::with_base_url(&options.api_token, &options.api_url, options.login_timeout)
            .context("Failed to create Hetzner Cloud client")?;
    let agent = FenceAgent::new(transport)
        .with_retry(options.retry.clone())
        .with_verbose_level(options.verbose_level);

    let outcome = fence_action(&agent, &options, &mut io::stdout()).await?;
    Ok(outcome)
}
