//! `/api/messages` routes, open to every signed-in role.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use compass_core::access::Caller;
use compass_core::messaging;
use compass_core::models::message::{ConversationSummary, Message};

use crate::error::{ApiJson, ApiPath, ApiResult};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(conversations).post(send))
        .route("/unread", get(unread))
        .route("/with/:email", get(thread))
        .route("/with/:email/read", post(read_thread))
        .route("/:id/read", post(read_one))
}

#[derive(Debug, Deserialize)]
struct SendMessage {
    to: String,
    content: String,
    #[serde(default)]
    reply_to_id: Option<i64>,
}

async fn conversations(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Vec<ConversationSummary>>> {
    Ok(Json(messaging::list_conversations(&state.repo, &caller).await?))
}

async fn send(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ApiJson(body): ApiJson<SendMessage>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    let message = messaging::send_message(
        &state.repo,
        &state.config.messaging,
        &caller,
        &body.to,
        &body.content,
        body.reply_to_id,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn unread(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Value>> {
    let count = messaging::unread_count(&state.repo, &caller).await?;
    Ok(Json(json!({ "unread": count })))
}

async fn thread(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ApiPath(email): ApiPath<String>,
) -> ApiResult<Json<Vec<Message>>> {
    Ok(Json(
        messaging::conversation(&state.repo, &caller, &email).await?,
    ))
}

async fn read_thread(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ApiPath(email): ApiPath<String>,
) -> ApiResult<Json<Value>> {
    let marked = messaging::mark_conversation_read(&state.repo, &caller, &email).await?;
    Ok(Json(json!({ "marked": marked })))
}

async fn read_one(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Message>> {
    Ok(Json(messaging::mark_read(&state.repo, &caller, id).await?))
}
