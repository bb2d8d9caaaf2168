//! HTTP surface of the quote server.
//!
//! - `GET /health`: health check
//! - `GET /{collection}`: every item in the collection
//! - `POST /{collection}`: create an item, answering `201` with the stored item

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::storage::{CollectionStore, Item, NewItem, StorageError};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CollectionStore>,
}

impl AppState {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            store: Arc::new(CollectionStore::new(data_dir)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/{collection}", get(list_items).post(create_item))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Error response body
#[derive(Serialize)]
struct ApiError {
    error: &'static str,
    message: String,
}

impl IntoResponse for StorageError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            StorageError::InvalidCollection(_) => (StatusCode::BAD_REQUEST, "invalid_collection"),
            StorageError::MissingTitle => (StatusCode::UNPROCESSABLE_ENTITY, "missing_title"),
            StorageError::IoError(_, _) | StorageError::CorruptCollection(_, _) => {
                tracing::error!("{}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error")
            }
        };

        (
            status,
            Json(ApiError {
                error,
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

async fn list_items(
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> Result<Json<Vec<Item>>, StorageError> {
    state.store.list(&collection).map(Json)
}

async fn create_item(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(new_item): Json<NewItem>,
) -> Result<(StatusCode, Json<Item>), StorageError> {
    let item = state.store.insert(&collection, new_item)?;
    tracing::info!("Created {} #{}", collection, item.id);
    Ok((StatusCode::CREATED, Json(item)))
}
