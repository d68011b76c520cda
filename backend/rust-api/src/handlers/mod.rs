use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::metrics;
use crate::services::AppState;
use crate::store::StoreError;

pub mod auth;
pub mod quiz;

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut status = "healthy";
    let mut dependencies = serde_json::Map::new();
    let mut all_healthy = true;

    let storage = probe(state.users.ping(), Duration::from_secs(1), "Storage").await;
    if storage.get("status").and_then(|v| v.as_str()) != Some("healthy") {
        all_healthy = false;
        status = "degraded";
    }
    dependencies.insert("storage".to_string(), json!(storage));

    let blacklist = probe(
        state.blacklist.ping(),
        Duration::from_millis(500),
        "Token blacklist",
    )
    .await;
    if blacklist.get("status").and_then(|v| v.as_str()) != Some("healthy") {
        all_healthy = false;
        status = "degraded";
    }
    dependencies.insert("token_blacklist".to_string(), json!(blacklist));

    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(json!({
            "status": status,
            "service": "vidquiz-api",
            "version": env!("CARGO_PKG_VERSION"),
            "dependencies": dependencies
        })),
    )
}

async fn probe<F>(
    check: F,
    timeout: Duration,
    label: &str,
) -> serde_json::Map<String, serde_json::Value>
where
    F: Future<Output = Result<(), StoreError>>,
{
    let mut result = serde_json::Map::new();

    match tokio::time::timeout(timeout, check).await {
        Ok(Ok(())) => {
            result.insert("status".to_string(), json!("healthy"));
            result.insert(
                "message".to_string(),
                json!(format!("{label} connection successful")),
            );
        }
        Ok(Err(err)) => {
            result.insert("status".to_string(), json!("unhealthy"));
            result.insert("error".to_string(), json!(format!("{label} error: {err}")));
        }
        Err(_) => {
            result.insert("status".to_string(), json!("unhealthy"));
            result.insert(
                "error".to_string(),
                json!(format!("{label} timeout after {}ms", timeout.as_millis())),
            );
        }
    }

    result
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// Protects /metrics with HTTP Basic Auth. Expected credentials come from
/// METRICS_AUTH as `username:password`.
pub async fn metrics_auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !auth_header.starts_with("Basic ") {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let encoded = &auth_header[6..];
    let decoded = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

    let expected = std::env::var("METRICS_AUTH").unwrap_or_else(|_| "admin:changeme".to_string());

    if credentials != expected {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}
