//! HTTP transport.
//!
//! `GET /mcp` returns server metadata, `POST /mcp` carries one JSON-RPC message,
//! and `OPTIONS /mcp` is answered by the CORS layer with permissive headers.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value as JsonValue;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::{rpc_codes, Result};
use crate::server::{JsonRpcResponse, McpServer};

/// Route serving the MCP endpoint.
pub const MCP_PATH: &str = "/mcp";

/// Build the HTTP router around a shared server.
pub fn router(server: Arc<McpServer>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(86_400));

    Router::new()
        .route(MCP_PATH, get(handle_get).post(handle_post))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}

/// Bind `addr` and serve until the listener fails.
pub async fn serve(server: Arc<McpServer>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, path = MCP_PATH, "serving MCP over HTTP");
    axum::serve(listener, router(server)).await?;
    Ok(())
}

async fn handle_get(State(server): State<Arc<McpServer>>) -> Json<JsonValue> {
    Json(server.metadata())
}

async fn handle_post(State(server): State<Arc<McpServer>>, body: Bytes) -> Response {
    // Store access is synchronous
    let outcome = tokio::task::spawn_blocking(move || server.handle_bytes(&body)).await;

    match outcome {
        Ok(Some(response)) => Json(response).into_response(),
        Ok(None) => StatusCode::ACCEPTED.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "JSON-RPC handler task failed");
            Json(JsonRpcResponse::error(
                JsonValue::Null,
                rpc_codes::INTERNAL_ERROR,
                "Internal error".to_string(),
            ))
            .into_response()
        }
    }
}
