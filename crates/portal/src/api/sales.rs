//! `/api/sales` routes: lead intake and pre-enrollment fields.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde_json::Value;

use compass_core::access::Caller;
use compass_core::models::student::{Student, StudentFilter, StudentSummary};
use compass_core::students::{self, CreateStudent};

use crate::error::{ApiJson, ApiPath, ApiQuery, ApiResult};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/students", get(list).post(create))
        .route("/students/:email", get(show).patch(update))
}

async fn list(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ApiQuery(filter): ApiQuery<StudentFilter>,
) -> ApiResult<Json<Vec<StudentSummary>>> {
    let list = students::list_students(&state.repo, &caller, filter).await?;
    Ok(Json(list.iter().map(StudentSummary::from).collect()))
}

async fn create(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ApiJson(input): ApiJson<CreateStudent>,
) -> ApiResult<(StatusCode, Json<Student>)> {
    let student = students::create_student(&state.repo, &caller, input).await?;
    Ok((StatusCode::CREATED, Json(student)))
}

async fn show(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ApiPath(email): ApiPath<String>,
) -> ApiResult<Json<Student>> {
    Ok(Json(students::fetch_student(&state.repo, &caller, &email).await?))
}

async fn update(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ApiPath(email): ApiPath<String>,
    ApiJson(changes): ApiJson<Value>,
) -> ApiResult<Json<Student>> {
    Ok(Json(
        students::update_student(&state.repo, &caller, &email, &changes).await?,
    ))
}
