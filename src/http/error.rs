use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::server::ServiceError;

/// HTTP wrapper for engine errors. Maps the taxonomy onto status codes:
/// auth 401; missing 404; forbidden/blocked/wrong-password 403; validation,
/// bad state, full rooms, judge failures, and expired battles 400; throttling
/// 429; storage 500.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ServiceError::Auth(_) => StatusCode::UNAUTHORIZED,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Forbidden(_) | ServiceError::WrongPassword => StatusCode::FORBIDDEN,
            ServiceError::InvalidConfig(_)
            | ServiceError::InvalidState(_)
            | ServiceError::Full
            | ServiceError::TimeLimitExceeded
            | ServiceError::Judge(_) => StatusCode::BAD_REQUEST,
            ServiceError::Throttled(_) => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "Request failed with storage error");
        }

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
