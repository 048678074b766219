//! Compass Portal: role-scoped JSON API and the Odoo CRM webhook.
//!
//! Routes under `/api/student`, `/api/advisor`, `/api/admin` and `/api/sales`
//! require a session of that role. Messaging and document routes accept any
//! signed-in role and leave finer checks to `compass_core`.

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

use compass_core::config::CompassConfig;
use compass_core::db::sqlite::SqliteRepository;

pub mod api;
pub mod auth;
pub mod error;

/// Shared application state for all portal routes.
pub struct AppState {
    pub repo: SqliteRepository,
    pub config: CompassConfig,
}

/// Build the portal router with all routes and response headers.
pub fn router(state: Arc<AppState>) -> Router {
    let authenticated = Router::new()
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .nest(
            "/api/student",
            api::student::routes().route_layer(middleware::from_fn(auth::student_only)),
        )
        .nest(
            "/api/advisor",
            api::advisor::routes().route_layer(middleware::from_fn(auth::advisor_only)),
        )
        .nest(
            "/api/admin",
            api::admin::routes().route_layer(middleware::from_fn(auth::admin_only)),
        )
        .nest(
            "/api/sales",
            api::sales::routes().route_layer(middleware::from_fn(auth::sales_only)),
        )
        .nest("/api/messages", api::messages::routes())
        .merge(api::documents::routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_session,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/register", post(auth::register))
        .route("/webhooks/odoo", post(api::webhook::odoo_webhook))
        .merge(authenticated)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
}

async fn health() -> &'static str {
    "ok"
}
