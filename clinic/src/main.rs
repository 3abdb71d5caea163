//! Code Clinic event handler server
//!
//! Serves the quiz event handler over HTTP. Every request reads the newest
//! snapshot from the Ably channel, applies one action and publishes the
//! result; the process itself keeps no event state.
//!
//! # Usage
//!
//! ```bash
//! ABLY_API_KEY=app.key:secret cargo run --bin code-clinic
//! ```

use anyhow::Context;
use clinic_ably::AblyChannel;
use clinic_core::environment::SystemClock;
use clinic_runtime::metrics::MetricsRecorder;
use clinic_web::AppState;
use code_clinic::{Config, QuestionBank, QuizEnvironment, event_handler};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,code_clinic=debug,clinic_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Code Clinic event handler...");

    // The credential is read here once; a rotated key takes effect on restart.
    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        channel = %config.quiz.channel,
        rest_url = %config.ably.rest_url,
        key = %config.ably.api_key.name(),
        "Configuration loaded"
    );

    let questions = QuestionBank::load(config.quiz.questions_path.as_deref())
        .context("Failed to load question bank")?;

    let channel = AblyChannel::builder()
        .key(config.ably.api_key.clone())
        .rest_url(config.ably.rest_url.clone())
        .timeout(config.ably.timeout)
        .build()
        .context("Failed to build Ably channel")?;

    let mut recorder = MetricsRecorder::new();
    if config.server.metrics_enabled {
        recorder.install().context("Failed to install metrics recorder")?;
    }

    let environment = QuizEnvironment::new(Arc::new(SystemClock), Arc::new(questions));
    let handler = event_handler(environment, Arc::new(channel), config.quiz.channel.clone());

    let state = AppState::new(Arc::new(handler)).with_metrics(recorder.handle().cloned());
    let app = clinic_web::router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!(%address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
