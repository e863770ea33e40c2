//! HTTP surface of the node.
//!
//! `/ping` and `/api/status` serve the supervisor and dashboard
//! collaborators (read-only).  `/api/upload`, `/api/search` and
//! `/api/deliver` expose the ingestion and query paths to whatever bot or
//! panel front-end sits in front of the node.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use silo_ingest::{IngestError, IngestHandle};
use silo_search::{DeliveryCoordinator, DeliveryStatus, SearchEngine, SearchError, SearchQuery};
use silo_shared::{ChatId, StorageRef, Upload, UploadMetadata};
use silo_store::{FileRecord, IndexError, IndexStats, IndexStore};

use crate::health::Health;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<IndexStore>,
    pub engine: Arc<SearchEngine>,
    pub coordinator: Arc<DeliveryCoordinator>,
    pub ingest: IngestHandle,
    pub health: Arc<Health>,
}

pub fn build_router(state: AppState, max_upload_size: u64) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/api/status", get(status))
        .route("/api/upload", post(upload))
        .route("/api/search", get(search))
        .route("/api/deliver", post(deliver))
        .layer(DefaultBodyLimit::max(max_upload_size as usize))
        .with_state(state)
}

/// Serve until the listener fails or the task is aborted.
pub async fn serve(state: AppState, addr: SocketAddr, max_upload_size: u64) -> anyhow::Result<()> {
    let router = build_router(state, max_upload_size);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "HTTP API listening");
    axum::serve(listener, router).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn ping() -> &'static str {
    "ok"
}

#[derive(Serialize)]
struct StatusResponse {
    healthy: bool,
    version: &'static str,
    index: IndexStats,
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        healthy: state.health.is_healthy(),
        version: env!("CARGO_PKG_VERSION"),
        index: state.store.stats().await,
    })
}

#[derive(Serialize)]
struct UploadResponse {
    storage_ref: StorageRef,
    sequence_no: u64,
    deduplicated: bool,
}

/// Multipart fields: `file` (required, with a filename), `caption`
/// (optional text).
async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut file: Option<(String, String, Vec<u8>)> = None;
    let mut caption: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                file = Some((file_name, mime_type, bytes.to_vec()));
            }
            Some("caption") => {
                caption = field.text().await.ok().filter(|t| !t.is_empty());
            }
            _ => {}
        }
    }

    let (file_name, mime_type, content) =
        file.ok_or_else(|| ApiError::BadRequest("missing 'file' field".to_string()))?;

    let upload = Upload::new(
        UploadMetadata {
            file_name,
            caption,
            size_bytes: content.len() as u64,
            mime_type,
        },
        content,
    );

    let outcome = state.ingest.submit(upload).await?;
    Ok(Json(UploadResponse {
        storage_ref: outcome.storage_ref,
        sequence_no: outcome.sequence_no,
        deduplicated: outcome.deduplicated,
    }))
}

#[derive(Deserialize)]
struct SearchParams {
    q: String,
    cursor: Option<String>,
    page_size: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    matches: Vec<FileRecord>,
    next_cursor: String,
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let mut query = SearchQuery::from_text(&params.q, params.page_size.unwrap_or(10));
    query.cursor = params.cursor;

    let result = state.engine.query(&query).await?;
    Ok(Json(SearchResponse {
        matches: result.matches,
        next_cursor: result.next_cursor,
    }))
}

#[derive(Deserialize)]
struct DeliverRequest {
    chat_id: i64,
    storage_refs: Vec<i64>,
}

#[derive(Serialize)]
struct DeliverItem {
    storage_ref: StorageRef,
    status: String,
}

#[derive(Serialize)]
struct DeliverResponse {
    items: Vec<DeliverItem>,
}

async fn deliver(
    State(state): State<AppState>,
    Json(request): Json<DeliverRequest>,
) -> Result<Json<DeliverResponse>, ApiError> {
    let mut records = Vec::new();
    let mut items = Vec::new();

    for raw in request.storage_refs {
        match state.store.lookup(StorageRef(raw)).await {
            Ok(record) => records.push(record),
            Err(IndexError::NotFound) => items.push(DeliverItem {
                storage_ref: StorageRef(raw),
                status: "missing".to_string(),
            }),
            Err(e) => return Err(ApiError::Internal(e.to_string())),
        }
    }

    let reports = state
        .coordinator
        .deliver(ChatId(request.chat_id), records)
        .run_to_completion()
        .await;

    items.extend(reports.into_iter().map(|r| DeliverItem {
        storage_ref: r.storage_ref,
        status: match r.status {
            DeliveryStatus::Delivered { .. } => "delivered".to_string(),
            DeliveryStatus::Missing => "missing".to_string(),
            DeliveryStatus::PlatformError(e) => format!("error: {e}"),
        },
    }));

    Ok(Json(DeliverResponse { items }))
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) | ApiError::Search(_) => StatusCode::BAD_REQUEST,
            ApiError::Ingest(IngestError::Filter(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Ingest(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
