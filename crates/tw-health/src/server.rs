//! HTTP server implementation using axum.

use std::net::SocketAddr;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde_json::json;
use tracing::info;
use tw_telemetry::HealthStatus;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .route("/ready", get(handle_ready))
        .route("/live", get(handle_live))
        .with_state(state)
}

async fn handle_health(State(state): State<AppState>) -> Response {
    let report = state.monitor.get_health_report();
    let status_code = if report.status == HealthStatus::Healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    let body = json!({
        "status": report.status,
        "uptime_seconds": report.uptime_seconds,
        "total_events_received": report.total_events_received,
        "total_events_per_second": (report.total_events_per_second * 100.0).round() / 100.0,
        "streams": report.streams,
    });

    (status_code, Json(body)).into_response()
}

async fn handle_metrics() -> Response {
    match tw_telemetry::metrics::render() {
        Ok(body) => (StatusCode::OK, [("content-type", "text/plain; charset=utf-8")], body).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn handle_ready(State(state): State<AppState>) -> Response {
    let report = state.monitor.get_health_report();
    if report.status == HealthStatus::Unhealthy {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"ready": false, "reason": "unhealthy"}))).into_response();
    }
    (StatusCode::OK, Json(json!({"ready": true}))).into_response()
}

async fn handle_live() -> Response {
    (StatusCode::OK, Json(json!({"live": true}))).into_response()
}

pub async fn run_server(state: AppState, port: u16) -> std::io::Result<()> {
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, "starting health http server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tw_telemetry::HealthMonitor;

    fn state() -> AppState {
        AppState::new(Arc::new(HealthMonitor::default()))
    }

    #[tokio::test]
    async fn health_is_200_when_no_streams_registered() {
        let response = handle_health(State(state())).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_is_503_when_a_stream_is_disconnected() {
        let app_state = state();
        app_state.monitor.set_stream_disconnected("trades", None);
        let response = handle_health(State(app_state)).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn live_always_returns_200() {
        let response = handle_live().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ready_is_503_when_unhealthy() {
        let app_state = state();
        app_state.monitor.set_stream_disconnected("trades", None);
        let response = handle_ready(State(app_state)).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
