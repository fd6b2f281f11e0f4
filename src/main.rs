use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use reply_gateway::config::GatewayConfig;
use reply_gateway::queue::QueueRouter;
use reply_gateway::reply::{HttpReplyGenerator, ReplyAdapter, ReplyGenerator, UnavailableGenerator};
use reply_gateway::server::{AppState, gateway_routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env().context("invalid gateway configuration")?;

    // Held for the process lifetime so buffered log lines are flushed on exit.
    let _log_guard = init_tracing(config.log_dir.as_deref())?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Reply gateway starting");

    // ── Reply pipeline ───────────────────────────────────────────────────
    let generator: Arc<dyn ReplyGenerator> = match &config.pipeline {
        Some(pipeline) => {
            tracing::info!(url = %pipeline.url, "Reply pipeline configured");
            Arc::new(HttpReplyGenerator::new(pipeline.clone())?)
        }
        None => {
            tracing::warn!("REPLY_PIPELINE_URL not set; /reply will fail until configured");
            Arc::new(UnavailableGenerator)
        }
    };

    // ── Chat queue ───────────────────────────────────────────────────────
    let queue = QueueRouter::open(
        config.queue_backend,
        &config.queue_path,
        &config.queue_db_path,
    )
    .await
    .context("failed to open chat queue backend")?;

    let app = gateway_routes(AppState {
        replies: ReplyAdapter::new(generator),
        queue,
    });

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    tracing::info!(
        addr = %config.bind,
        backend = config.queue_backend.label(),
        "Reply gateway listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Reply gateway stopped");
    Ok(())
}

/// Console logging, plus a daily-rotated file when `log_dir` is set.
fn init_tracing(log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = fmt::layer().with_target(false);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "reply-gateway.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(console_layer)
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console_layer)
                .init();
            Ok(None)
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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
    tracing::info!("Shutdown signal received");
}
