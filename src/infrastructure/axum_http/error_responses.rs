use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::application::errors::BillingError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

impl IntoResponse for BillingError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            BillingError::Upstream(err) => {
                // Don't leak upstream detail to the client
                error!(error = ?err, "http: upstream failure");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            code: status.as_u16(),
            message,
        });

        (status, body).into_response()
    }
}

/// Failure on the webhook route. Always a 400 so Stripe shows the message and retries.
#[derive(Debug)]
pub struct WebhookError(pub BillingError);

impl From<BillingError> for WebhookError {
    fn from(err: BillingError) -> Self {
        WebhookError(err)
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        error!(error = %self.0, "stripe_webhook: responding with error");
        (
            StatusCode::BAD_REQUEST,
            Json(format!("Webhook Error: {}", self.0)),
        )
            .into_response()
    }
}
