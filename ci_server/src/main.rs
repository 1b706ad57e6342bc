//! Deploy console server.
//!
//! A standalone binary that proxies the dashboard to Jenkins and the
//! cluster: job creation and triggering, build status and logs,
//! deployment status, SonarQube webhooks and teardown.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use deploy_server::config::ServerConfig;
use deploy_server::routes::{self, AppState};
use deploy_server::services::cluster::Kubectl;
use deploy_server::services::jenkins::JenkinsClient;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "deploy-console", about = "Deploy console backend")]
struct Cli {
    /// Server port
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    tracing::info!("Starting deploy console server...");

    let config = ServerConfig::from_env();
    let jenkins = JenkinsClient::new(&config)?;
    tracing::info!(jenkins = %jenkins.base_url(), "Jenkins client ready");

    let state = AppState {
        jobs: Arc::new(jenkins),
        cluster: Arc::new(Kubectl::new(config.kubectl_bin.clone())),
        config: Arc::new(config),
    };
    let app = routes::app(state);

    deploy_server::metrics::init_metrics();

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    tracing::info!("Deploy console listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// `RUST_LOG` filter (default `info`); JSON lines when `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json") {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
