//! `/api/admin` routes: full student management, staff accounts, and logs.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use compass_core::access::Caller;
use compass_core::audit;
use compass_core::models::advisor::{Advisor, AdvisorWithLoad};
use compass_core::models::audit::AuditEntry;
use compass_core::models::staff::SalesUser;
use compass_core::models::student::{Student, StudentFilter, StudentSummary};
use compass_core::models::webhook::WebhookEvent;
use compass_core::odoo;
use compass_core::staff::{self, NewAccount};
use compass_core::students::{self, CreateStudent};

use super::LimitQuery;
use crate::error::{ApiJson, ApiPath, ApiQuery, ApiResult};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/students", get(list_students).post(create_student))
        .route(
            "/students/:email",
            get(show_student).patch(update_student).delete(delete_student),
        )
        .route(
            "/students/:email/advisor",
            put(assign_advisor).delete(unassign_advisor),
        )
        .route("/advisors", get(list_advisors).post(create_advisor))
        .route("/advisors/:email", delete(delete_advisor))
        .route("/sales", get(list_sales).post(create_sales))
        .route("/sales/:email", delete(delete_sales))
        .route("/audit", get(audit_log))
        .route("/webhook-events", get(webhook_events))
}

// -- Students --

async fn list_students(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ApiQuery(filter): ApiQuery<StudentFilter>,
) -> ApiResult<Json<Vec<StudentSummary>>> {
    let list = students::list_students(&state.repo, &caller, filter).await?;
    Ok(Json(list.iter().map(StudentSummary::from).collect()))
}

async fn create_student(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ApiJson(input): ApiJson<CreateStudent>,
) -> ApiResult<(StatusCode, Json<Student>)> {
    let student = students::create_student(&state.repo, &caller, input).await?;
    Ok((StatusCode::CREATED, Json(student)))
}

async fn show_student(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ApiPath(email): ApiPath<String>,
) -> ApiResult<Json<Student>> {
    Ok(Json(students::fetch_student(&state.repo, &caller, &email).await?))
}

async fn update_student(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ApiPath(email): ApiPath<String>,
    ApiJson(changes): ApiJson<Value>,
) -> ApiResult<Json<Student>> {
    Ok(Json(
        students::update_student(&state.repo, &caller, &email, &changes).await?,
    ))
}

async fn delete_student(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ApiPath(email): ApiPath<String>,
) -> ApiResult<StatusCode> {
    students::delete_student(&state.repo, &caller, &email).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct AssignAdvisor {
    advisor_email: String,
}

async fn assign_advisor(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ApiPath(email): ApiPath<String>,
    ApiJson(body): ApiJson<AssignAdvisor>,
) -> ApiResult<Json<Student>> {
    Ok(Json(
        students::assign_advisor(&state.repo, &caller, &email, &body.advisor_email).await?,
    ))
}

async fn unassign_advisor(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ApiPath(email): ApiPath<String>,
) -> ApiResult<Json<Student>> {
    Ok(Json(
        students::unassign_advisor(&state.repo, &caller, &email).await?,
    ))
}

// -- Staff accounts --

async fn list_advisors(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Vec<AdvisorWithLoad>>> {
    Ok(Json(staff::list_advisors(&state.repo, &caller).await?))
}

async fn create_advisor(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ApiJson(input): ApiJson<NewAccount>,
) -> ApiResult<(StatusCode, Json<Advisor>)> {
    let advisor = staff::create_advisor(&state.repo, &caller, input).await?;
    Ok((StatusCode::CREATED, Json(advisor)))
}

async fn delete_advisor(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ApiPath(email): ApiPath<String>,
) -> ApiResult<StatusCode> {
    staff::delete_advisor(&state.repo, &caller, &email).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_sales(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Vec<SalesUser>>> {
    Ok(Json(staff::list_sales_users(&state.repo, &caller).await?))
}

async fn create_sales(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ApiJson(input): ApiJson<NewAccount>,
) -> ApiResult<(StatusCode, Json<SalesUser>)> {
    let user = staff::create_sales_user(&state.repo, &caller, input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn delete_sales(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ApiPath(email): ApiPath<String>,
) -> ApiResult<StatusCode> {
    staff::delete_sales_user(&state.repo, &caller, &email).await?;
    Ok(StatusCode::NO_CONTENT)
}

// -- Logs --

async fn audit_log(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> ApiResult<Json<Vec<AuditEntry>>> {
    Ok(Json(
        audit::recent(&state.repo, &caller, query.effective()).await?,
    ))
}

async fn webhook_events(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> ApiResult<Json<Vec<WebhookEvent>>> {
    Ok(Json(
        odoo::recent_events(&state.repo, &caller, query.effective()).await?,
    ))
}
