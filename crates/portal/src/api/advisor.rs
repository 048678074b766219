//! `/api/advisor` routes. Every lookup is limited to the advisor's own students.

use std::sync::Arc;

use axum::{
    extract::State,
    routing::get,
    Extension, Json, Router,
};
use serde_json::Value;

use compass_core::access::Caller;
use compass_core::models::student::{Student, StudentFilter, StudentSummary};
use compass_core::students;

use crate::error::{ApiJson, ApiPath, ApiQuery, ApiResult};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/students", get(list))
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
