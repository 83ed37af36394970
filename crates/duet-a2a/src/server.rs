//! A2A server: exposes a [`Responder`] over HTTP
//!
//! - `POST /a2a_exchange` takes a serialized `A2AMessage` and returns the reply
//! - `GET /health` reports readiness

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::protocol::A2AMessage;
use crate::responder::Responder;

pub const EXCHANGE_PATH: &str = "/a2a_exchange";
pub const HEALTH_PATH: &str = "/health";

/// Body of every non-200 reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

/// Body of `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub agent: String,
    pub tools: Vec<String>,
}

#[derive(Clone)]
struct ServerState {
    responder: Arc<Responder>,
    unavailable_detail: Arc<str>,
}

/// HTTP front end for one agent
pub struct A2aServer {
    state: ServerState,
}

impl A2aServer {
    pub fn new(responder: Arc<Responder>) -> Self {
        Self {
            state: ServerState {
                responder,
                unavailable_detail: Arc::from("Agent not ready."),
            },
        }
    }

    /// Detail returned with HTTP 500 while the responder is not ready
    pub fn with_unavailable_detail(mut self, detail: &str) -> Self {
        self.state.unavailable_detail = Arc::from(detail);
        self
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(EXCHANGE_PATH, post(exchange))
            .route(HEALTH_PATH, get(health))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    pub async fn serve(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        self.serve_on(listener).await
    }

    /// Serve on an already-bound listener until Ctrl-C
    pub async fn serve_on(self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr().context("Listener has no local address")?;
        info!(
            "{} listening on http://{}{}",
            self.state.responder.context().agent_name,
            addr,
            EXCHANGE_PATH
        );
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("A2A server error")
    }
}

async fn exchange(State(state): State<ServerState>, body: Bytes) -> Response {
    let agent = state.responder.context().agent_name.as_str();

    if !state.responder.is_ready() {
        error!("{}: rejecting message, not ready", agent);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, &state.unavailable_detail);
    }

    let message = match A2AMessage::from_slice(&body) {
        Ok(m) => m,
        Err(e) => {
            warn!("{}: rejected malformed message: {}", agent, e);
            return error_response(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string());
        }
    };
    debug!("[{}] Received A2A message:\n{}", agent, message.to_json_pretty());

    let reply = state.responder.respond(&message).await;
    debug!("[{}] Sending A2A response:\n{}", agent, reply.to_json_pretty());

    match reply.to_value() {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => {
            error!("{}: could not encode reply: {}", agent, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &format!("Failed to encode reply: {}", e))
        }
    }
}

async fn health(State(state): State<ServerState>) -> Response {
    let responder = &state.responder;
    let (status, label) = if responder.is_ready() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    };
    let body = HealthResponse {
        status: label.to_string(),
        agent: responder.context().agent_name.clone(),
        tools: responder.tool_names().into_iter().map(str::to_string).collect(),
    };
    (status, Json(body)).into_response()
}

fn error_response(status: StatusCode, detail: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            detail: detail.to_string(),
        }),
    )
        .into_response()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
