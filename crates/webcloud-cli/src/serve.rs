//! HTTP surface: `GET /api/extract-text?url=...`.

use axum::{
    extract::{Query, State},
    http::{HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use webcloud_core::{Error, FetchBackend};
use webcloud_local::config::Config;
use webcloud_local::pipeline::fetch_and_extract;

/// Origins the original relay page is typically served from.
pub(crate) const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "http://localhost:5500",
];

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) backend: Arc<dyn FetchBackend>,
    pub(crate) cfg: Arc<Config>,
}

#[derive(Debug, Deserialize)]
struct ExtractTextQuery {
    url: Option<String>,
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::MissingParameter(_) | Error::InvalidUrl(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn extract_text(
    State(st): State<AppState>,
    Query(q): Query<ExtractTextQuery>,
) -> (StatusCode, Json<serde_json::Value>) {
    match fetch_and_extract(st.backend.as_ref(), &st.cfg, q.url.as_deref()).await {
        Ok(page) => {
            info!(url = %page.url, chars = page.extracted.chars, "extract-text ok");
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "success": true,
                    "text": page.extracted.text,
                    "length": page.extracted.chars,
                    "url": q.url,
                })),
            )
        }
        Err(e) => {
            let status = status_for(&e);
            warn!(status = status.as_u16(), code = e.code(), error = %e, "extract-text failed");
            (
                status,
                Json(serde_json::json!({
                    "success": false,
                    "error": e.to_string(),
                    "code": e.code(),
                    "hint": e.hint(),
                    "url": q.url,
                })),
            )
        }
    }
}

pub(crate) fn router(state: AppState, allowed_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o.trim()).ok())
        .collect();
    Router::new()
        .route("/api/extract-text", get(extract_text))
        .layer(CorsLayer::new().allow_origin(origins))
        .with_state(state)
}

pub(crate) async fn run(
    addr: SocketAddr,
    state: AppState,
    allowed_origins: &[String],
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "serving /api/extract-text");
    axum::serve(listener, router(state, allowed_origins)).await?;
    Ok(())
}
