//! Arena EBS - Main entry point.
//!
//! This binary starts the extension backend with:
//! - Structured JSON logging
//! - Graceful shutdown handling (SIGTERM/SIGINT)
//!
//! # Configuration
//!
//! See [`arena_ebs::config`] for environment variable configuration.
//!
//! # Example
//!
//! ```bash
//! EXTENSION_SECRET="base64secret" \
//! ALERT_SERVER_URL="http://localhost:3000" \
//! PORT=8081 \
//! cargo run --release --bin arena-ebs
//! ```

use std::process::ExitCode;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use arena_ebs::config::Config;
use arena_ebs::routes::{create_router, AppState};

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "Failed to load configuration");
            eprintln!("Error: {err}");
            eprintln!();
            eprintln!("Required environment variables:");
            eprintln!("  EXTENSION_SECRET     - Base64 JWT signing secret from the extension console");
            eprintln!();
            eprintln!("Optional environment variables:");
            eprintln!("  EXTENSION_CLIENT_ID  - Extension client identifier");
            eprintln!("  ALERT_SERVER_URL     - Alert server base URL (default: http://localhost:3000)");
            eprintln!("  ALERT_TIMEOUT_SECS   - Alert server request timeout (default: 5)");
            eprintln!("  STATS_UPDATE_SECRET  - Shared secret for POST /stats/update");
            eprintln!("  PORT                 - HTTP server port (default: 8081)");
            eprintln!("  RUST_LOG             - Log level filter (default: info)");
            return ExitCode::from(1);
        }
    };

    info!(
        port = config.port,
        alert_server_url = %config.alert_server_url,
        alert_timeout_secs = config.alert_timeout.as_secs(),
        client_id = config.extension_client_id.as_deref().unwrap_or("<unset>"),
        stats_secret_configured = config.stats_update_secret.is_some(),
        "Extension backend starting"
    );

    let port = config.port;
    let state = match AppState::new(config) {
        Ok(state) => state,
        Err(err) => {
            error!(error = %err, "Failed to create alert server client");
            return ExitCode::from(1);
        }
    };

    let app = create_router(state);

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = match TcpListener::bind(&bind_addr).await {
        Ok(listener) => {
            info!(port, address = %bind_addr, "Server listening");
            listener
        }
        Err(err) => {
            error!(
                error = %err,
                address = %bind_addr,
                "Failed to bind to address"
            );
            return ExitCode::from(1);
        }
    };

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

    info!("Server ready to accept connections");

    if let Err(err) = server.await {
        error!(error = %err, "Server error");
        return ExitCode::from(1);
    }

    info!("Server shutdown complete");
    ExitCode::SUCCESS
}

/// Initialize structured logging with tracing.
///
/// JSON output, filtered by `RUST_LOG` with a default of `info` for this
/// crate and `debug` for request traces.
fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,axum::rejection=trace"));

    let json_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_level(true)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .init();
}

/// Resolves when SIGINT or SIGTERM is received.
///
/// axum stops accepting new connections and lets in-flight requests finish.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
