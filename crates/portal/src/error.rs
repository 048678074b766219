//! JSON error responses.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::error;

use compass_core::error::CompassError;

/// An error rendered as `{"error": "..."}` with a matching status code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "authentication required")
    }

    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden")
    }
}

impl From<CompassError> for ApiError {
    fn from(e: CompassError) -> Self {
        let status = match e {
            CompassError::Validation(_) => StatusCode::BAD_REQUEST,
            CompassError::NotFound(_) => StatusCode::NOT_FOUND,
            CompassError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            CompassError::Forbidden(_) => StatusCode::FORBIDDEN,
            CompassError::Conflict(_) => StatusCode::CONFLICT,
            CompassError::Config(_)
            | CompassError::Database(_)
            | CompassError::Io(_)
            | CompassError::Serialization(_)
            | CompassError::PasswordHash(_) => {
                error!(error = %e, "request failed");
                return Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error");
            }
        };
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// `Json` extractor whose rejections are reported as 400 JSON errors.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
        }
    }
}

/// `Query` extractor with JSON rejections.
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ApiQuery(value)),
            Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
        }
    }
}

/// `Path` extractor with JSON rejections.
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(ApiPath(value)),
            Err(rejection) => Err(ApiError::new(rejection.status(), rejection.body_text())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compass_errors_map_to_status_codes() {
        let cases = [
            (CompassError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (CompassError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (CompassError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (CompassError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (CompassError::Conflict("x".into()), StatusCode::CONFLICT),
            (CompassError::Config("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = ApiError::from(CompassError::Config("secret path /etc/x".into()));
        assert_eq!(err.message, "internal server error");
    }

    #[test]
    fn hashing_failure_is_internal() {
        let err = ApiError::from(CompassError::PasswordHash("salt too short".into()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "internal server error");
    }

    #[test]
    fn client_errors_keep_message() {
        let err = ApiError::from(CompassError::Validation("email is required".into()));
        assert_eq!(err.message, "validation error: email is required");
    }
}
