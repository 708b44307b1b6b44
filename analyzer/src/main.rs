use std::{net::SocketAddr, sync::Arc};

use analyzer::{AppState, build_router, config::load_config, pipeline::Pipeline};
use anyhow::{Context, Result};
use dotenvy::dotenv;
use tokio::{net::TcpListener, signal};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(error = %err, "Analyzer crashed");
        eprintln!("Analyzer crashed: {err}");
    }
}

async fn run() -> Result<()> {
    init_tracing();
    if let Err(err) = dotenv() {
        warn!(error = %err, "No .env file loaded");
    }

    let config = load_config()
        .await
        .context("Failed to load application configuration")?;

    if config.analysis.credentials_path.is_some() || config.analysis.location.is_some() {
        info!(
            location = ?config.analysis.location,
            credentials = ?config.analysis.credentials_path,
            "Google Cloud settings recorded; requests authenticate with the API key"
        );
    }

    let pipeline = Pipeline::new(&config).context("Failed to build document pipeline")?;
    if !pipeline.analysis_available() {
        warn!("Running in fallback-only mode: enhanced analysis and chat are degraded");
    }

    let addr_string = format!("{}:{}", config.server.host, config.server.port);
    let addr = addr_string
        .parse::<SocketAddr>()
        .with_context(|| format!("Invalid server address: {addr_string}"))?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        voting = ?config.classifier.voting,
        "Loaded configuration"
    );

    let app = build_router(Arc::new(AppState::new(config, pipeline)));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind TCP listener on {addr}"))?;
    info!(%addr, "Analyzer server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server encountered a fatal error")?;
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received termination signal (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received termination signal (SIGTERM)");
        }
    }
}
