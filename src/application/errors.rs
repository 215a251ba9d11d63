use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Signature(String),
    #[error("upstream request failed: {0:#}")]
    Upstream(#[from] anyhow::Error),
    #[error("unhandled relevant event: {0}")]
    UnhandledEvent(String),
}

impl BillingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BillingError::Validation(_)
            | BillingError::Conflict(_)
            | BillingError::Signature(_)
            | BillingError::UnhandledEvent(_) => StatusCode::BAD_REQUEST,
            BillingError::Auth(_) => StatusCode::UNAUTHORIZED,
            BillingError::NotFound(_) => StatusCode::NOT_FOUND,
            BillingError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, BillingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_the_taxonomy_to_status_codes() {
        let cases = [
            (BillingError::Validation("bad".into()), 400),
            (BillingError::Auth("user not logged in".into()), 401),
            (BillingError::Conflict("user already subscribed".into()), 400),
            (BillingError::NotFound("missing".into()), 404),
            (BillingError::Signature("mismatch".into()), 400),
            (BillingError::Upstream(anyhow::anyhow!("boom")), 500),
            (BillingError::UnhandledEvent("price.created".into()), 400),
        ];

        for (err, status) in cases {
            assert_eq!(err.status_code().as_u16(), status, "{err}");
        }
    }

    #[test]
    fn upstream_message_includes_the_cause_chain() {
        let err = BillingError::from(anyhow::anyhow!("connection reset").context("save Subscription"));

        assert_eq!(
            err.to_string(),
            "upstream request failed: save Subscription: connection reset"
        );
    }
}
