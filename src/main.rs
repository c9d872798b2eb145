//! bubble-realtime server entry point.
//!
//! Loads configuration, wires the relay sessions to the dispatcher, and
//! serves the control API and UI bridge until ctrl-c.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use bubble_realtime::api;
use bubble_realtime::app_state::AppState;
use bubble_realtime::config::{LogFormat, RealtimeConfig};
use bubble_realtime::domain::{
    BubbleCacheDirectory, Dispatcher, EventConsumer, LoggingConsumer, TypingTracker,
};
use bubble_realtime::relay::{HttpAuthBroker, SessionDeps, TungsteniteConnector};
use bubble_realtime::service::SessionRegistry;
use bubble_realtime::ws::handler::ws_handler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RealtimeConfig::from_env().context("loading configuration")?;
    init_tracing(config.log_format);
    tracing::info!(addr = %config.listen_addr, "starting bubble-realtime");

    let directory = BubbleCacheDirectory::load(&config.bubble_cache_path)
        .with_context(|| format!("loading {}", config.bubble_cache_path.display()))?;
    tracing::info!(bubbles = directory.len(), "bubble cache loaded");

    // Consumers
    let dispatcher = Dispatcher::new();
    let typing = Arc::new(TypingTracker::new());
    let _ = dispatcher.subscribe(Arc::new(LoggingConsumer));
    let _ = dispatcher.subscribe(Arc::clone(&typing) as Arc<dyn EventConsumer>);

    // Relay collaborators
    let settings = config.session_settings();
    let auth = HttpAuthBroker::new(
        &config.api_base_url,
        config.access_token.clone(),
        config.auth_timeout(),
    )?;
    let deps = SessionDeps {
        connector: Arc::new(TungsteniteConnector::new(settings.handshake_timeout)),
        auth: Arc::new(auth),
        dispatcher: dispatcher.clone(),
        settings,
    };
    let registry = Arc::new(SessionRegistry::new(Arc::new(directory), deps));

    for channel_id in &config.autoconnect {
        if let Err(e) = registry.connect(channel_id.clone()).await {
            tracing::error!(%channel_id, error = %e, "autoconnect failed");
        }
    }

    let app_state = AppState {
        registry: Arc::clone(&registry),
        dispatcher,
        typing,
        bridge_buffer: config.bridge_buffer,
    };

    let app = Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let stopped = registry.shutdown_all().await;
    tracing::info!(sessions = stopped, "shutdown complete");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "ctrl-c handler failed");
    }
    tracing::info!("shutdown signal received");
}
