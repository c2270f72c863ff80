use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use relist_core::WizardError;
use serde_json::json;

#[derive(Debug)]
pub struct AppError(pub WizardError);

impl From<WizardError> for AppError {
    fn from(err: WizardError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self.0 {
            WizardError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            WizardError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            WizardError::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            WizardError::RateLimited(msg) => {
                (StatusCode::TOO_MANY_REQUESTS, json!({ "error": msg }))
            }
            WizardError::Expired(session_id) => (
                StatusCode::GONE,
                json!({ "error": format!("session {session_id} has expired") }),
            ),
            WizardError::ValidationFailed(msg) => {
                (StatusCode::BAD_REQUEST, json!({ "error": msg }))
            }
            // Enough detail for the client to re-run search for just the
            // offending items.
            WizardError::StaleData {
                stale_count,
                stale_items,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": format!("{stale_count} decision(s) reference offers that are no longer valid"),
                    "stale_count": stale_count,
                    "stale_items": stale_items,
                }),
            ),
            WizardError::Internal(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
