//! HTTP daemon/server mode for `markdir`.
//!
//! A small HTTP+JSON API over one shared `BookmarkStore`:
//!
//! - `GET /v1/health` – health check.
//! - `POST /v1/query` – runs a `QueryRequest`, returns a `QueryResult`.
//! - `GET|POST|PUT|DELETE /v1/bookmark` – get, add, replace, remove.
//! - `POST /v1/bookmark/visit` – records a visit.
//! - `POST /v1/import` – bulk upsert of a JSON array of bookmarks.
//!
//! Bookmarks are addressed with a `?url=` query parameter. Handlers
//! only do JSON (de)serialization and error mapping; all semantics live
//! in `store` and `query`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use crate::models::{
    Bookmark, ImportSummary, Locator, QueryRequest, QueryResult, ReplaceRequest,
};
use crate::query::{self, QueryError};
use crate::store::BookmarkStore;

type SharedStore = Arc<BookmarkStore>;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// JSON error body returned by the API.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Deserialize)]
struct UrlParam {
    url: String,
}

impl UrlParam {
    fn locator(&self) -> Result<Locator, ApiError> {
        Locator::parse(&self.url).map_err(|err| ApiError::bad_request(err.to_string()))
    }
}

/// Maps handler failures to JSON error responses.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(locator: &Locator) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: format!("no bookmark for '{locator}'"),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(query_err) = err.downcast_ref::<QueryError>() {
            return ApiError::bad_request(query_err.to_string());
        }
        tracing::error!(error = %format!("{err:#}"), "request failed");
        ApiError::internal(format!("{err:#}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

/// Build the router for the bookmark API.
pub fn router(store: SharedStore) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/query", post(run_query))
        .route(
            "/v1/bookmark",
            get(get_bookmark)
                .post(add_bookmark)
                .put(replace_bookmark)
                .delete(remove_bookmark),
        )
        .route("/v1/bookmark/visit", post(visit_bookmark))
        .route("/v1/import", post(import_bookmarks))
        .with_state(store)
}

/// Run the HTTP server bound to the provided socket address.
pub async fn run(addr: SocketAddr, store: SharedStore) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, backend = ?store.kind(), "serving bookmark API");
    serve_with_listener(listener, store).await
}

/// Run the HTTP server on an existing listener.
pub async fn serve_with_listener(listener: TcpListener, store: SharedStore) -> Result<()> {
    axum::serve(listener, router(store)).await?;
    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn run_query(
    State(store): State<SharedStore>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResult>, ApiError> {
    let result = query::run_query(&store, &request)?;
    Ok(Json(result))
}

async fn get_bookmark(
    State(store): State<SharedStore>,
    Query(param): Query<UrlParam>,
) -> Result<Json<Bookmark>, ApiError> {
    let locator = param.locator()?;
    match store.get(&locator)? {
        Some(bookmark) => Ok(Json(bookmark)),
        None => Err(ApiError::not_found(&locator)),
    }
}

async fn add_bookmark(
    State(store): State<SharedStore>,
    Json(bookmark): Json<Bookmark>,
) -> Result<Json<Bookmark>, ApiError> {
    let stored = store.add(bookmark)?;
    tracing::debug!(url = %stored.url, "bookmark added");
    Ok(Json(stored))
}

async fn replace_bookmark(
    State(store): State<SharedStore>,
    Json(request): Json<ReplaceRequest>,
) -> Result<Json<Bookmark>, ApiError> {
    let stored = store.replace(&request.replacing, request.bookmark)?;
    Ok(Json(stored))
}

async fn remove_bookmark(
    State(store): State<SharedStore>,
    Query(param): Query<UrlParam>,
) -> Result<Json<Bookmark>, ApiError> {
    let locator = param.locator()?;
    match store.remove(&locator)? {
        Some(removed) => Ok(Json(removed)),
        None => Err(ApiError::not_found(&locator)),
    }
}

async fn visit_bookmark(
    State(store): State<SharedStore>,
    Query(param): Query<UrlParam>,
) -> Result<Json<Bookmark>, ApiError> {
    let locator = param.locator()?;
    match store.visit(&locator)? {
        Some(visited) => Ok(Json(visited)),
        None => Err(ApiError::not_found(&locator)),
    }
}

async fn import_bookmarks(
    State(store): State<SharedStore>,
    Json(bookmarks): Json<Vec<Bookmark>>,
) -> Result<Json<ImportSummary>, ApiError> {
    let summary = store.import(bookmarks)?;
    Ok(Json(summary))
}
