pub mod config;
pub mod db;
pub mod pipeline;

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use pipeline::risk_analysis::{spawn_worker, AnalysisError};

/// Run the worker until its cycle limit or a shutdown signal.
pub async fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = match config::WorkerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let mut worker = spawn_worker(config);

    let finished = tokio::select! {
        result = worker.wait() => Some(result),
        () = shutdown_signal() => None,
    };

    let result = match finished {
        Some(result) => result,
        None => {
            tracing::info!("Shutdown requested, finishing in-flight work");
            worker.shutdown();
            worker.wait().await
        }
    };

    match result {
        Ok(Ok(_)) => ExitCode::SUCCESS,
        Ok(Err(AnalysisError::Config(reason))) => {
            tracing::error!(%reason, "Worker could not start");
            ExitCode::FAILURE
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Worker stopped with an error");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(error = %e, "Worker task panicked");
            ExitCode::FAILURE
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Ctrl-C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
