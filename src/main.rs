use std::sync::Arc;

use axum::http::HeaderValue;
use tracing_subscriber::EnvFilter;

use delivery_tracker::api;
use delivery_tracker::audit::{AuditSink, FileAuditSink, TracingAuditSink};
use delivery_tracker::config::{Config, LogFormat};
use delivery_tracker::directory::InMemoryDirectory;
use delivery_tracker::engine::dispatcher::run_side_effect_dispatcher;
use delivery_tracker::error::AppError;
use delivery_tracker::realtime::run_realtime_relay;
use delivery_tracker::state::{AppState, Collaborators};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;
    init_tracing(&config);

    let directory = match &config.directory_seed_path {
        Some(path) => {
            let directory = InMemoryDirectory::from_seed_file(path).await?;
            tracing::info!(users = directory.len(), path = %path.display(), "identity directory seeded");
            directory
        }
        None => {
            tracing::warn!("DIRECTORY_SEED_PATH not set; courier assignment will reject every id");
            InMemoryDirectory::new()
        }
    };

    let audit: Arc<dyn AuditSink> = match &config.audit_log_path {
        Some(path) => Arc::new(FileAuditSink::new(path)),
        None => Arc::new(TracingAuditSink),
    };

    let collaborators = Collaborators {
        directory: Arc::new(directory),
        audit,
        ..Collaborators::default()
    };

    let (app_state, side_effect_rx) = AppState::new(&config, collaborators);
    let shared_state = Arc::new(app_state);

    tokio::spawn(run_realtime_relay(
        shared_state.gateway.clone(),
        shared_state.bus.subscribe(),
    ));
    tokio::spawn(run_side_effect_dispatcher(
        shared_state.clone(),
        side_effect_rx,
    ));

    let client_origin = config
        .client_origin
        .as_deref()
        .map(HeaderValue::from_str)
        .transpose()
        .map_err(|err| AppError::Internal(format!("invalid CLIENT_ORIGIN: {err}")))?;
    let app = api::rest::router_with_origin(shared_state.clone(), client_origin.as_ref());

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        realtime_scope = ?config.realtime_scope,
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

fn init_tracing(config: &Config) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);

    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
