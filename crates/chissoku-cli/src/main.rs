//! chissoku: read a CO2 sensor over serial and emit one reading per interval.

mod logging;
mod opts;

use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

use chissoku_core::prelude::*;
use chissoku_core::protocol::list_ports;

use crate::opts::Opts;

#[tokio::main]
async fn main() -> ExitCode {
    let opts = Opts::parse();
    logging::init(opts.quiet);

    if opts.list_ports {
        return match list_ports() {
            Ok(ports) => {
                for port in ports {
                    let product = port.product.as_deref().unwrap_or("");
                    println!("{}\t{:04x}:{:04x}\t{}", port.name, port.vid, port.pid, product);
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!("Listing ports: {e}");
                ExitCode::FAILURE
            }
        };
    }

    match run(&opts).await {
        Ok(outcome) => {
            tracing::debug!(?outcome, "exiting");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(opts: &Opts) -> anyhow::Result<SessionOutcome> {
    let config = opts.session_config()?;
    let sink = build_sink(opts)?;
    let controller = SessionController::new(config)?;

    spawn_interrupt_listener(controller.shutdown_token());

    let device = controller.config().device.clone();
    let outcome = controller
        .run_serial(sink)
        .await
        .with_context(|| format!("session on {device}"))?;
    Ok(outcome)
}

/// Console unless `--no-stdout`, plus SQLite when `--db` is given
fn build_sink(opts: &Opts) -> anyhow::Result<FanOut> {
    let mut sinks = FanOut::new();
    if !opts.no_stdout {
        sinks.push(Box::new(ConsoleSink::stdout()));
    }
    if let Some(path) = &opts.db {
        let store = SqliteSink::open(path)
            .with_context(|| format!("opening database {}", path.display()))?;
        sinks.push(Box::new(store));
    }
    if sinks.is_empty() {
        return Err(ConfigError::NoSink.into());
    }
    Ok(sinks)
}

/// Request a graceful stop on Ctrl-C; the session ends once the device acknowledges
fn spawn_interrupt_listener(stop: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupted");
                stop.cancel();
            }
            Err(e) => tracing::warn!("Unable to listen for interrupt: {e}"),
        }
    });
}
