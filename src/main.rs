//! Desk Bridge binary entry point.
//!
//! Loads configuration, prepares the audit log, registers the built-in tools
//! and serves until Ctrl-C or `POST /exit`. All logs go to stderr.
//!
//! Coverage is excluded because the main function only wires together
//! components that are tested individually.

// Enable the coverage attribute when running with nightly for llvm-cov exclusions
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use desk_bridge::config::Config;
use desk_bridge::error::AppError;
use desk_bridge::server::McpServer;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::filter::EnvFilter;

#[cfg_attr(coverage_nightly, coverage(off))]
fn init_logging() {
    let filter = std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .parse()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[tokio::main]
async fn main() {
    // .env must be loaded before the subscriber reads LOG_LEVEL
    let _ = dotenvy::dotenv();
    init_logging();

    tracing::info!("desk-bridge starting...");

    if let Err(e) = run().await {
        tracing::error!("{e}");
        std::process::exit(1);
    }

    tracing::info!("desk-bridge shutdown complete");
}

#[cfg_attr(coverage_nightly, coverage(off))]
async fn run() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing::info!(
        listen_address = %config.listen_address,
        port = config.server_port,
        auth = config.auth_token.is_some(),
        audit_log = %config.audit_log_path.display(),
        "Configuration loaded"
    );

    let server = McpServer::from_config(config);
    server.prune_audit_logs();

    let mut activity = server.state().activity().subscribe();
    tokio::spawn(async move {
        loop {
            match activity.recv().await {
                Ok(event) => tracing::debug!(
                    kind = ?event.kind,
                    source = %event.source,
                    "{}",
                    event.message
                ),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Activity mirror lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received");
            shutdown.cancel();
        }
    });

    server.run().await
}
