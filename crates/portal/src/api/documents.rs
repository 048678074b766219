//! Document metadata routes, shared by students, advisors and admins.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, put},
    Extension, Json, Router,
};

use compass_core::access::Caller;
use compass_core::documents::{self, AddDocument, ReviewDocument};
use compass_core::models::document::Document;

use crate::error::{ApiJson, ApiPath, ApiResult};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/students/:email/documents", get(list).post(add))
        .route("/api/documents/:id/review", put(review))
        .route("/api/documents/:id", delete(remove))
}

async fn list(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ApiPath(email): ApiPath<String>,
) -> ApiResult<Json<Vec<Document>>> {
    Ok(Json(
        documents::list_documents(&state.repo, &caller, &email).await?,
    ))
}

async fn add(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ApiPath(email): ApiPath<String>,
    ApiJson(input): ApiJson<AddDocument>,
) -> ApiResult<(StatusCode, Json<Document>)> {
    let document = documents::add_document(&state.repo, &caller, &email, input).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

async fn review(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<ReviewDocument>,
) -> ApiResult<Json<Document>> {
    Ok(Json(
        documents::review_document(&state.repo, &caller, id, input).await?,
    ))
}

async fn remove(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    documents::remove_document(&state.repo, &caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
