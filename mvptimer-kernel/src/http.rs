//! Read-only status API plus a manual refresh trigger.
//!
//! When an API key is configured, every route except `/health` requires it in
//! the `x-api-key` header.

use crate::cycle::CycleRunner;
use crate::health::KernelHealth;
use crate::models::TimerBoard;
use crate::render::{render, RenderOptions};
use crate::state::{BoardReceiver, ShutdownReceiver};
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub boards: BoardReceiver,
    pub runner: CycleRunner,
    pub render_options: RenderOptions,
    pub api_key: Option<String>,
}

async fn require_api_key(
    State(app): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = app.api_key.as_deref() else {
        return Ok(next.run(req).await);
    };
    if req.uri().path().starts_with("/health") {
        return Ok(next.run(req).await);
    }

    let ok = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);

    if !ok {
        warn!(path = %req.uri().path(), "rejected request without valid API key");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(get_status))
        .route("/timers", get(get_timers))
        .route("/timers/text", get(get_timers_text))
        .route("/refresh", post(refresh))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_api_key))
        .with_state(app_state)
}

fn latest(app: &AppState) -> Result<std::sync::Arc<TimerBoard>, StatusCode> {
    app.boards
        .borrow()
        .clone()
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)
}

// GET /status
async fn get_status(State(app): State<AppState>) -> Json<KernelHealth> {
    Json(app.runner.health().get_health())
}

// GET /timers
async fn get_timers(State(app): State<AppState>) -> Result<Json<TimerBoard>, StatusCode> {
    let board = latest(&app)?;
    Ok(Json(board.as_ref().clone()))
}

// GET /timers/text
async fn get_timers_text(State(app): State<AppState>) -> Result<String, StatusCode> {
    let board = latest(&app)?;
    Ok(render(&board, &app.render_options))
}

// POST /refresh
async fn refresh(State(app): State<AppState>) -> (StatusCode, Json<Value>) {
    match app.runner.try_run().await {
        None => (
            StatusCode::CONFLICT,
            Json(json!({ "ok": false, "msg": "refresh already running" })),
        ),
        Some(Ok(timers)) => (StatusCode::OK, Json(json!({ "ok": true, "timers": timers }))),
        Some(Err(e)) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "ok": false, "msg": e.to_string() })),
        ),
    }
}

/// Binds `addr` and serves until shutdown is signalled.
pub async fn spawn_http_server(
    addr: SocketAddr,
    app_state: AppState,
    mut shutdown: ShutdownReceiver,
) -> std::io::Result<JoinHandle<()>> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "http api listening");
    let app = build_router(app_state);

    Ok(tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        });
        if let Err(e) = server.await {
            warn!(error = %e, "http server stopped with error");
        }
    }))
}
