//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the tunnel and health handlers
//! - Reject malformed or unauthenticated early data before upgrading
//! - Enforce the live session limit
//! - Bind server to listener and drain sessions on shutdown

use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        State,
    },
    http::{header::SEC_WEBSOCKET_PROTOCOL, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::{ConfigError, EdgeConfig, ProxyConfig};
use crate::doh::{DohClient, DohError};
use crate::http::websocket::serve_channel;
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::net::ConnectionTracker;
use crate::observability::metrics;
use crate::protocol::{decode_header, DecodeError};
use crate::tunnel::{decode_early_data, TcpDialer, TunnelContext};

/// How long shutdown waits for open sessions.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors while assembling the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build resolver client: {0}")]
    Doh(#[from] DohError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub tunnel: TunnelContext<TcpDialer>,
    pub tracker: ConnectionTracker,
}

/// HTTP front of the tunnel.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    tracker: ConnectionTracker,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let edge = Arc::new(EdgeConfig::from_proxy_config(&config)?);
        let doh = DohClient::new(config.doh.url.clone(), edge.timeouts.resolve)?;
        let dialer = TcpDialer::new(edge.timeouts.connect);
        let tracker = ConnectionTracker::new(config.listener.max_connections);

        let state = AppState {
            tunnel: TunnelContext::new(edge, doh, dialer),
            tracker: tracker.clone(),
        };

        Ok(Self {
            router: build_router(state),
            config,
            tracker,
        })
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            max_connections = self.config.listener.max_connections,
            doh = %self.config.doh.url,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.recv())
            .await?;

        tracing::info!(active = self.tracker.active_count(), "HTTP server stopped, draining sessions");
        self.tracker.wait_idle(DRAIN_TIMEOUT).await;
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .fallback(tunnel_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health_handler() -> &'static str {
    "ok"
}

/// Accept a tunnel upgrade on any path.
async fn tunnel_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Ok(upgrade) = upgrade else {
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    };

    let protocol = headers
        .get(SEC_WEBSOCKET_PROTOCOL)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let early = match protocol.as_deref().map(decode_early_data).transpose() {
        Ok(early) => early.flatten(),
        Err(e) => {
            tracing::warn!(error = %e, "Malformed early data");
            metrics::record_rejected_upgrade("early_data");
            return (StatusCode::BAD_REQUEST, "Malformed early data").into_response();
        }
    };

    if let Some(early) = &early {
        if let Err(e) = decode_header(early, &state.tunnel.config.identity) {
            tracing::warn!(error = %e, "Rejecting upgrade");
            let (status, reason) = match e {
                DecodeError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),
                _ => (StatusCode::BAD_REQUEST, "bad_header"),
            };
            metrics::record_rejected_upgrade(reason);
            return (status, e.to_string()).into_response();
        }
    }

    let Some(guard) = state.tracker.try_track() else {
        tracing::warn!(active = state.tracker.active_count(), "Session limit reached");
        metrics::record_rejected_upgrade("capacity");
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many sessions").into_response();
    };

    let upgrade = match protocol {
        Some(protocol) => upgrade.protocols([protocol]),
        None => upgrade,
    };

    let ctx = state.tunnel.clone();
    upgrade.on_upgrade(move |socket| serve_channel(socket, early, ctx, guard))
}
