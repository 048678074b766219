//! Odoo CRM webhook endpoint.
//!
//! Authenticated by a shared `token` query parameter and, when a signing
//! secret is configured, an `X-Odoo-Signature` HMAC of the raw body.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};

use compass_core::odoo::{self, IngestReport};

use crate::error::{ApiError, ApiQuery, ApiResult};
use crate::AppState;

pub const SIGNATURE_HEADER: &str = "x-odoo-signature";

#[derive(Debug, Deserialize)]
pub struct WebhookQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// POST /webhooks/odoo
pub async fn odoo_webhook(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<WebhookQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<IngestReport>> {
    let config = &state.config.odoo;
    if !config.enabled {
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "odoo webhook is disabled",
        ));
    }

    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    if let Err(e) = odoo::verify_token(config, query.token.as_deref())
        .and_then(|_| odoo::verify_signature(config, &body, signature))
    {
        warn!(error = %e, "rejected odoo webhook delivery");
        return Err(e.into());
    }

    let records = odoo::parse_payload(&body)?;
    let report = odoo::ingest(&state.repo, config, records).await?;
    info!(
        processed = report.processed,
        created = report.created,
        updated = report.updated,
        rejected = report.rejected,
        "odoo webhook processed"
    );
    Ok(Json(report))
}
