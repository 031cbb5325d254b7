//! Task board server entry point.
//!
//! ```bash
//! TASKBOARD_GOOGLE_CLIENT_ID=... \
//! TASKBOARD_GOOGLE_CLIENT_SECRET=... \
//! TASKBOARD_TIMEZONE=Asia/Tokyo \
//! PORT=8080 \
//! cargo run --bin taskboard-sync
//! ```

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use taskboard_sync::application::commands::AppState;
use taskboard_sync::infrastructure::config::AppConfig;
use taskboard_sync::routes::create_router;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            eprintln!();
            eprintln!("Environment variables:");
            eprintln!("  TASKBOARD_GOOGLE_CLIENT_ID      - OAuth client id (or GOOGLE_CLIENT_ID)");
            eprintln!("  TASKBOARD_GOOGLE_CLIENT_SECRET  - OAuth client secret (or GOOGLE_CLIENT_SECRET)");
            eprintln!("  TASKBOARD_TIMEZONE              - IANA zone for the fetch window (default: UTC)");
            eprintln!("  TASKBOARD_SYNC_DAYS             - Days fetched per sync, 1-31 (default: 1)");
            eprintln!("  TASKBOARD_WORKSPACE             - Directory for state/ and logs/ (default: .)");
            eprintln!("  PORT                            - HTTP server port (default: 8080)");
            eprintln!("  RUST_LOG                        - Log level filter (default: info)");
            return ExitCode::from(1);
        }
    };

    let _log_guard = match init_logging(&config.workspace_root.join("logs")) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Error: failed to prepare log directory: {err}");
            return ExitCode::from(1);
        }
    };

    info!(
        port = config.port,
        timezone = %config.timezone,
        sync_days = config.sync_days,
        workspace = %config.workspace_root.display(),
        google_configured = config.google_credentials().is_ok(),
        "task board server starting"
    );

    let port = config.port;
    let state = match AppState::new(config) {
        Ok(state) => Arc::new(state),
        Err(err) => {
            error!(error = %err, kind = err.kind(), "failed to bootstrap workspace");
            return ExitCode::from(1);
        }
    };

    let app = create_router(state);
    let bind_addr = format!("127.0.0.1:{port}");
    let listener = match TcpListener::bind(&bind_addr).await {
        Ok(listener) => {
            info!(address = %bind_addr, "server listening");
            listener
        }
        Err(err) => {
            error!(error = %err, address = %bind_addr, "failed to bind to address");
            return ExitCode::from(1);
        }
    };

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %err, "server error");
        return ExitCode::from(1);
    }

    info!("server shutdown complete");
    ExitCode::SUCCESS
}

/// JSON lines on stdout plus a daily-rolled `commands.log` under `logs_dir`.
/// The returned guard flushes the file writer on drop.
fn init_logging(logs_dir: &Path) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(logs_dir)?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_appender = tracing_appender::rolling::daily(logs_dir, "commands.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let stdout_layer = fmt::layer().json().with_target(true).with_level(true);
    let file_layer = fmt::layer()
        .json()
        .with_ansi(false)
        .with_target(true)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
