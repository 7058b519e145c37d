//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (tracing, request ID)
//! - Bind server to listener with graceful shutdown
//! - Forward requests through the sticky transport
//! - Map transport errors to client responses and metrics

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::error::ProxyError;
use crate::http::upgrade::{forward_upgrade, is_upgrade_request};
use crate::lifecycle::CancelSignal;
use crate::observability::metrics;
use crate::proxy::ProxyTransport;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub transport: Arc<ProxyTransport>,
    pub shutdown: CancelSignal,
}

/// HTTP server for the reverse proxy.
pub struct HttpServer {
    router: Router,
    shutdown: CancelSignal,
}

impl HttpServer {
    /// Create a server forwarding through `transport`.
    ///
    /// `shutdown` stops the server gracefully and cancels in-flight upgrade
    /// dials.
    pub fn new(transport: Arc<ProxyTransport>, shutdown: CancelSignal) -> Self {
        let state = AppState {
            transport,
            shutdown: shutdown.clone(),
        };

        Self {
            router: Self::build_router(state),
            shutdown,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(self.shutdown.cancelled())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler.
/// Upgrades go through the raw handshake path, everything else through the
/// pooled round trip.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %request.uri().path(),
        "Proxying request"
    );

    let result = if is_upgrade_request(request.headers()) {
        forward_upgrade(&state, request).await
    } else {
        state.transport.round_trip(request).await
    };

    let response = match result {
        Ok(response) => response.into_response(),
        Err(e) => error_response(&request_id, &e),
    };

    metrics::record_request(&method, response.status().as_u16(), start_time);
    response
}

fn error_response(request_id: &str, err: &ProxyError) -> Response {
    if err.is_outage() {
        tracing::warn!(request_id = %request_id, error = %err, "Proxy request failed");
    } else {
        tracing::debug!(request_id = %request_id, error = %err, "Proxy request abandoned");
    }
    (err.status_code(), err.to_string()).into_response()
}
