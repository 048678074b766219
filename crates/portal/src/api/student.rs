//! `/api/student` routes: the signed-in student's own record.

use std::sync::Arc;

use axum::{extract::State, routing::get, Extension, Json, Router};
use serde_json::Value;

use compass_core::access::Caller;
use compass_core::models::advisor::Advisor;
use compass_core::models::student::Student;
use compass_core::students;

use crate::error::{ApiJson, ApiResult};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/profile", get(profile).patch(update_profile))
        .route("/advisor", get(advisor))
}

async fn profile(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Student>> {
    let student = students::fetch_student(&state.repo, &caller, &caller.email).await?;
    Ok(Json(student))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ApiJson(changes): ApiJson<Value>,
) -> ApiResult<Json<Student>> {
    let student = students::update_student(&state.repo, &caller, &caller.email, &changes).await?;
    Ok(Json(student))
}

async fn advisor(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Option<Advisor>>> {
    Ok(Json(students::advisor_for_student(&state.repo, &caller).await?))
}
