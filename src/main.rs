use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use keyfront::cli::Cli;
use keyfront::config::Config;
use keyfront::proxy::dispatcher::Dispatcher;
use tracing::{error, info};

/// Distinct exit codes per failure class, since the only contract the
/// ambient stack promises is "zero on clean shutdown, non-zero otherwise"
/// (see SPEC_FULL.md §6); these specific values are this implementation's
/// own choice, not one the source system dictates.
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_STARTUP_ERROR: u8 = 1;
const EXIT_FORCED_SHUTDOWN: u8 = 1;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = match Config::try_from(cli) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let shutdown_timeout = config.shutdown_timeout;
    let dispatcher = Arc::new(Dispatcher::new(&config));

    let run_handle = {
        let dispatcher = dispatcher.clone();
        let http_addr = config.http_addr();
        let resp_addr = config.resp_addr();
        tokio::spawn(async move { dispatcher.run(http_addr, resp_addr).await })
    };

    tokio::select! {
        result = run_handle => {
            match result {
                Ok(Ok(())) => ExitCode::SUCCESS,
                Ok(Err(e)) => {
                    error!(error = %e, "startup failed");
                    ExitCode::from(EXIT_STARTUP_ERROR)
                }
                Err(e) => {
                    error!(error = %e, "dispatcher task panicked");
                    ExitCode::from(EXIT_STARTUP_ERROR)
                }
            }
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received, draining");
            match dispatcher.shutdown(shutdown_timeout).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!(error = %e, "forced shutdown");
                    ExitCode::from(EXIT_FORCED_SHUTDOWN)
                }
            }
        }
    }
}

fn init_tracing(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}
