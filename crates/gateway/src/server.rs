use std::{
    any::Any,
    sync::Arc,
    time::{Duration, Instant},
};

use {
    anyhow::Context,
    axum::{
        Json, Router,
        extract::{DefaultBodyLimit, State},
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::{get, post},
    },
    secrecy::Secret,
    serde_json::json,
    telegate_common::{BridgeError, ErrorKind},
    telegate_config::{ServerConfig, TelegateConfig},
    telegate_mcp::{NormalizeOptions, RegistryConfig, SessionRegistry, ToolDispatcher},
    telegate_telegram::{FileResolver, TelegramClient},
    tower_http::{
        catch_panic::CatchPanicLayer,
        cors::{Any as CorsAny, CorsLayer},
        limit::RequestBodyLimitLayer,
        trace::TraceLayer,
    },
    tracing::{error, info},
};

use crate::{
    auth_middleware::require_auth,
    error::ApiError,
    sse::{open_channel, submit_message},
    tools::{TelegramTools, register_telegram_tools},
};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub registry: SessionRegistry,
    pub auth_token: Option<Arc<Secret<String>>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(registry: SessionRegistry, auth_token: Option<Secret<String>>) -> Self {
        Self {
            registry,
            auth_token: auth_token.map(Arc::new),
            started_at: Instant::now(),
        }
    }
}

/// Build the router: the two session routes behind bearer auth, plus
/// an unauthenticated `/health`.
pub fn build_app(state: AppState, server: &ServerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(CorsAny)
        .allow_methods(CorsAny)
        .allow_headers(CorsAny);

    let sessions = Router::new()
        .route(&server.sse_path, get(open_channel))
        .route(&server.message_path, post(submit_message))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(server.max_body_bytes))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .merge(sessions)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Wire the Telegram client, resolver, dispatcher and registry from config.
/// Returns the router and the registry so the caller can drain sessions on
/// shutdown.
pub fn build_bridge(config: &TelegateConfig) -> anyhow::Result<(Router, SessionRegistry)> {
    let client = TelegramClient::from_config(&config.telegram)?;
    let resolver = FileResolver::from_config(&config.files)?;

    let mut dispatcher =
        ToolDispatcher::new(&config.protocol.server_name, env!("CARGO_PKG_VERSION"));
    register_telegram_tools(
        &mut dispatcher,
        TelegramTools::new(client, resolver, config.files.max_bytes),
    );
    info!(tools = ?dispatcher.tool_names(), "tool set registered");

    let registry = SessionRegistry::new(Arc::new(dispatcher), RegistryConfig {
        message_path: config.server.message_path.clone(),
        keepalive_interval: Duration::from_secs(config.server.keepalive_secs),
        normalize: NormalizeOptions {
            legacy_dialect: config.protocol.legacy_dialect,
        },
    });

    let state = AppState::new(registry.clone(), config.server.auth_token.clone());
    Ok((build_app(state, &config.server), registry))
}

/// Bind, serve until ctrl-c, then close every open session.
pub async fn start_server(config: TelegateConfig) -> anyhow::Result<()> {
    let (app, registry) = build_bridge(&config)?;

    let bind = (config.server.bind.as_str(), config.server.port);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {}:{}", bind.0, bind.1))?;
    let addr = listener.local_addr()?;

    info!(
        addr = %addr,
        sse = %config.server.sse_path,
        messages = %config.server.message_path,
        auth = config.server.auth_token.is_some(),
        legacy_dialect = config.protocol.legacy_dialect,
        "telegate listening"
    );

    // Open SSE streams never end on their own, so sessions are closed as soon
    // as the signal arrives to let graceful shutdown complete.
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let closed = registry.close_all().await;
            info!(closed, "shutdown requested, sessions closed");
        })
        .await
        .context("server error")?;

    info!("telegate stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "sessions": state.registry.len().await,
    }))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = detail, "request handler panicked");
    let mut response =
        ApiError(BridgeError::new(ErrorKind::DeliveryFailed, "internal server error")).into_response();
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}
