//! HTTP server mode: sync endpoint and snapshot read

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::Credential;
use crate::config::AppConfig;
use crate::engine::SyncEngine;
use crate::error::{Error, Result};
use crate::pagination::CursorWalker;
use crate::protocol::{self, encode_records};
use crate::source::BookmarksSource;
use crate::store::{FileSnapshotStore, SnapshotStore};

/// App state shared across handlers
#[derive(Clone)]
pub struct AppState {
    engine: SyncEngine,
}

impl AppState {
    /// Wrap an engine
    pub fn new(engine: SyncEngine) -> Self {
        Self { engine }
    }

    /// Build the production state from config
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let source = BookmarksSource::new(&config.source)?;
        let walker = CursorWalker::new(Arc::new(source)).with_max_items(config.source.max_items);
        let store: Arc<dyn SnapshotStore> =
            Arc::new(FileSnapshotStore::new(&config.storage.snapshot_path));
        Ok(Self::new(SyncEngine::new(walker, store)))
    }
}

/// Build the router
pub fn router(state: AppState) -> Router {
    // Build CORS layer - allow all origins for development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/bookmarks", get(get_snapshot))
        .route("/api/bookmarks/sync", post(sync_bookmarks))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Start the HTTP server
pub async fn serve(config: &AppConfig) -> Result<()> {
    let state = AppState::from_config(config)?;

    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .map_err(|e| Error::config(format!("Invalid server.host: {e}")))?;
    let addr = SocketAddr::from((host, config.server.port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::config(format!("Failed to bind to {addr}: {e}")))?;
    info!("Starting HTTP server on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::config(format!("Server error: {e}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Stored snapshot, or `{"data": null}` when there is none
async fn get_snapshot(State(state): State<Arc<AppState>>) -> Response {
    match state.engine.store().load().await {
        Ok(Some(snapshot)) => Json(snapshot).into_response(),
        Ok(None) => Json(json!({ "data": null })).into_response(),
        Err(e) => {
            warn!("Failed to load snapshot: {e}");
            Json(json!({ "data": null })).into_response()
        }
    }
}

/// Stream a fresh walk as NDJSON.
///
/// Authentication failures are plain 401 responses; once the stream starts
/// every failure arrives as the terminal `error` record instead.
async fn sync_bookmarks(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let credential = match Credential::from_headers(&headers) {
        Ok(credential) => credential,
        Err(e) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    };

    let records = state.engine.start(credential);
    let body = Body::from_stream(encode_records(records).map(Ok::<_, Infallible>));

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, protocol::CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::USER_ID_HEADER;
    use crate::protocol::{ProgressRecord, StreamDecoder};
    use crate::source::{Page, PageOutcome, PageSource};
    use crate::store::MemorySnapshotStore;
    use crate::types::{Item, Snapshot};
    use async_trait::async_trait;
    use axum::http::Request;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tower::ServiceExt;

    struct ScriptedSource(Mutex<VecDeque<PageOutcome>>);

    #[async_trait]
    impl PageSource for ScriptedSource {
        async fn fetch_page(&self, _credential: &Credential, _cursor: Option<&str>) -> PageOutcome {
            self.0.lock().unwrap().pop_front().expect("unscripted page")
        }
    }

    fn app(outcomes: Vec<PageOutcome>, store: Arc<MemorySnapshotStore>) -> Router {
        let source = Arc::new(ScriptedSource(Mutex::new(outcomes.into())));
        router(AppState::new(SyncEngine::new(CursorWalker::new(source), store)))
    }

    fn one_item_page() -> PageOutcome {
        let item: Item = serde_json::from_value(json!({"id": "1", "text": "hi"})).unwrap();
        PageOutcome::Page(Page {
            items: vec![item],
            authors: vec![],
            next_cursor: None,
        })
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(vec![], Arc::new(MemorySnapshotStore::new()))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_get_snapshot_empty() {
        let response = app(vec![], Arc::new(MemorySnapshotStore::new()))
            .oneshot(Request::get("/api/bookmarks").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let value: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(value, json!({"data": null}));
    }

    #[tokio::test]
    async fn test_get_snapshot_stored() {
        let store = Arc::new(MemorySnapshotStore::with_snapshot(Snapshot::new(vec![], vec![])));
        let response = app(vec![], store)
            .oneshot(Request::get("/api/bookmarks").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let value: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(value["data"], json!([]));
        assert!(value["lastSynced"].is_string());
    }

    #[tokio::test]
    async fn test_sync_requires_credential() {
        let response = app(vec![], Arc::new(MemorySnapshotStore::new()))
            .oneshot(
                Request::post("/api/bookmarks/sync")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let value: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(value, json!({"error": "Not authenticated"}));
    }

    #[tokio::test]
    async fn test_sync_streams_ndjson() {
        let store = Arc::new(MemorySnapshotStore::new());
        let response = app(vec![one_item_page()], store.clone())
            .oneshot(
                Request::post("/api/bookmarks/sync")
                    .header("authorization", "Bearer tok")
                    .header(USER_ID_HEADER, "1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/x-ndjson"
        );

        let bytes = body_bytes(response).await;
        assert_eq!(bytes.last(), Some(&b'\n'));

        let mut decoder = StreamDecoder::new();
        let records = decoder.push(&bytes);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], ProgressRecord::Progress(1));
        assert!(matches!(records[1], ProgressRecord::Done(_)));
        assert_eq!(store.load().await.unwrap().map(|s| s.len()), Some(1));
    }

    #[tokio::test]
    async fn test_sync_rate_limited_record() {
        let response = app(vec![PageOutcome::RateLimited], Arc::new(MemorySnapshotStore::new()))
            .oneshot(
                Request::post("/api/bookmarks/sync")
                    .header("authorization", "Bearer tok")
                    .header(USER_ID_HEADER, "1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = body_bytes(response).await;
        assert_eq!(&bytes[..], b"{\"error\":\"Rate limited\",\"status\":429}\n");
    }
}
