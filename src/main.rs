use anyhow::{Context, Result};
use clap::Parser;
use digital_life::{
    AppState, build_router,
    config::{AppConfig, DatabaseBackend},
    init_tracing,
};
use tracing::{error, info};

/// Digital life content service.
#[derive(Debug, Parser)]
#[command(name = "digital-life", version, about)]
struct Cli {
    /// Address to bind; overrides APP_HOST.
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on; overrides APP_PORT.
    #[arg(long)]
    port: Option<u16>,

    /// Storage backend (memory or postgres); overrides DATABASE_BACKEND.
    #[arg(long)]
    backend: Option<DatabaseBackend>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = AppConfig::from_env().context("failed to load application configuration")?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(backend) = cli.backend {
        config.database_backend = backend;
    }

    let store = config.open_store().await?;
    let app = build_router(AppState::new(store, config.retry));

    let addr = config.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(address = %addr, backend = %config.database_backend, "digital life service started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("digital life service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install Ctrl+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
