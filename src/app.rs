use crate::config::Config;
use crate::embed::WebhookMessage;
use crate::error::RelayError;
use crate::forward::{forward, HttpWebhookSender, WebhookSender};
use crate::origin::{client_ip, origin_allowed};
use crate::rate_limit::FixedWindowLimiter;
use crate::sanitize::{parse_body, sanitize_connection, sanitize_review};
use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use http_body_util::LengthLimitError;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const MAX_BODY_BYTES: usize = 1024 * 1024; // 1MB safety cap

pub const CONNECTION_ROUTE: &str = "/api/notify-connection";
pub const REVIEW_ROUTE: &str = "/api/submit-review";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sender: Arc<dyn WebhookSender>,
    pub connection_limiter: Arc<FixedWindowLimiter>,
    pub review_limiter: Arc<FixedWindowLimiter>,
}

impl AppState {
    pub fn new(config: Config, sender: Arc<dyn WebhookSender>) -> Self {
        let connection_limiter = Arc::new(FixedWindowLimiter::new(
            config.connection_limit,
            config.rate_limit_max_entries,
        ));
        let review_limiter = Arc::new(FixedWindowLimiter::new(
            config.review_limit,
            config.rate_limit_max_entries,
        ));
        Self {
            config: Arc::new(config),
            sender,
            connection_limiter,
            review_limiter,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Notifier {
    Connection,
    Review,
}

impl Notifier {
    fn name(self) -> &'static str {
        match self {
            Notifier::Connection => "connection",
            Notifier::Review => "review",
        }
    }

    fn limiter(self, state: &AppState) -> &FixedWindowLimiter {
        match self {
            Notifier::Connection => &state.connection_limiter,
            Notifier::Review => &state.review_limiter,
        }
    }

    fn webhook_url(self, config: &Config) -> Option<&str> {
        match self {
            Notifier::Connection => config.connection_webhook_url.as_deref(),
            Notifier::Review => config.review_webhook_url.as_deref(),
        }
    }

    fn sanitize(self, payload: &Value) -> Result<WebhookMessage, RelayError> {
        match self {
            Notifier::Connection => sanitize_connection(payload),
            Notifier::Review => sanitize_review(payload),
        }
    }
}

pub async fn run_server(config: Config) -> Result<()> {
    if config.connection_webhook_url.is_none() {
        warn!("CONNECTION_WEBHOOK_URL is not set; connection notifications will fail");
    }
    if config.review_webhook_url.is_none() {
        warn!("REVIEW_WEBHOOK_URL is not set; review submissions will fail");
    }
    info!("Allowed origin: {:?}", config.allowed_origin);
    info!(
        "Rate limits: connection {}/{}s, review {}/{}s",
        config.connection_limit.max_requests,
        config.connection_limit.window_secs,
        config.review_limit.max_requests,
        config.review_limit.window_secs
    );

    let addr = config.bind_addr;
    let state = AppState::new(config, Arc::new(HttpWebhookSender::new()));
    let app = build_router(state);

    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(CONNECTION_ROUTE, any(notify_connection))
        .route(REVIEW_ROUTE, any(submit_review))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn notify_connection(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, RelayError> {
    relay(&state, Notifier::Connection, &method, &headers, body).await
}

async fn submit_review(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, RelayError> {
    relay(&state, Notifier::Review, &method, &headers, body).await
}

async fn relay(
    state: &AppState,
    notifier: Notifier,
    method: &Method,
    headers: &HeaderMap,
    body: Body,
) -> Result<Response, RelayError> {
    let allowed_origin = &state.config.allowed_origin;
    if !origin_allowed(headers, allowed_origin) {
        warn!(
            "Rejecting {} request: origin {:?} not allowed",
            notifier.name(),
            headers.get(header::ORIGIN)
        );
        return Err(RelayError::Forbidden);
    }

    if *method != Method::POST {
        return Err(RelayError::MethodNotAllowed);
    }

    let ip = client_ip(headers);
    if !notifier.limiter(state).check(&ip).await {
        warn!("Rate limit exceeded for {} on {}", ip, notifier.name());
        return Err(RelayError::RateLimited);
    }

    // Size is enforced here, after the origin and method checks.
    let body = to_bytes(body, MAX_BODY_BYTES).await.map_err(|e| {
        if e.into_inner().downcast_ref::<LengthLimitError>().is_some() {
            warn!(
                "Rejecting {} request: body over {} bytes",
                notifier.name(),
                MAX_BODY_BYTES
            );
            RelayError::PayloadTooLarge
        } else {
            warn!("Rejecting {} request: failed to read body", notifier.name());
            RelayError::InvalidJson
        }
    })?;

    let payload = parse_body(&body).inspect_err(|_| {
        warn!("Rejecting {} request: invalid JSON body", notifier.name());
    })?;
    let message = notifier.sanitize(&payload).inspect_err(|e| {
        warn!("Rejecting {} request from {}: {}", notifier.name(), ip, e);
    })?;

    forward(
        state.sender.as_ref(),
        notifier.webhook_url(&state.config),
        &message,
    )
    .await?;

    info!("Forwarded {} notification for {}", notifier.name(), ip);
    Ok(success(allowed_origin))
}

fn success(allowed_origin: &HeaderValue) -> Response {
    let mut response = Json(json!({"success": true})).into_response();
    response
        .headers_mut()
        .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allowed_origin.clone());
    response
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
