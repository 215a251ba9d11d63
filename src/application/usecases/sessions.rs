use std::sync::Arc;

use tracing::{error, warn};

use crate::{
    application::errors::{BillingError, UseCaseResult},
    domain::{entities::users::UserEntity, repositories::users::UserRepository},
};

/// Resolves the caller behind a session token through the data store's current-user lookup.
pub struct SessionResolver<U>
where
    U: UserRepository + 'static,
{
    user_repo: Arc<U>,
}

impl<U> SessionResolver<U>
where
    U: UserRepository + 'static,
{
    pub fn new(user_repo: Arc<U>) -> Self {
        Self { user_repo }
    }

    pub async fn resolve_caller(&self, session_token: Option<&str>) -> UseCaseResult<UserEntity> {
        let session_token = session_token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                warn!("sessions: request without session token");
                BillingError::Auth("user not logged in".to_string())
            })?;

        let user = self
            .user_repo
            .find_by_session_token(session_token)
            .await
            .map_err(|err| {
                error!(error = ?err, "sessions: current user lookup failed");
                BillingError::Upstream(err)
            })?;

        user.ok_or_else(|| {
            warn!("sessions: session token rejected by data store");
            BillingError::Auth("user not logged in".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::users::MockUserRepository;

    fn user() -> UserEntity {
        UserEntity {
            id: "user_1".to_string(),
            email: Some("user@example.com".to_string()),
            subscription: None,
        }
    }

    #[tokio::test]
    async fn missing_token_is_rejected_without_a_lookup() {
        let resolver = SessionResolver::new(Arc::new(MockUserRepository::new()));

        let err = resolver.resolve_caller(None).await.unwrap_err();

        assert!(matches!(err, BillingError::Auth(_)));
    }

    #[tokio::test]
    async fn blank_token_is_rejected_without_a_lookup() {
        let resolver = SessionResolver::new(Arc::new(MockUserRepository::new()));

        let err = resolver.resolve_caller(Some("  ")).await.unwrap_err();

        assert!(matches!(err, BillingError::Auth(_)));
    }

    #[tokio::test]
    async fn unknown_token_is_an_auth_error() {
        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_find_by_session_token()
            .withf(|token| token == "r:expired")
            .returning(|_| Ok(None));
        let resolver = SessionResolver::new(Arc::new(user_repo));

        let err = resolver.resolve_caller(Some("r:expired")).await.unwrap_err();

        assert_eq!(err.status_code().as_u16(), 401);
    }

    #[tokio::test]
    async fn valid_token_resolves_the_user() {
        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_find_by_session_token()
            .withf(|token| token == "r:valid")
            .returning(|_| Ok(Some(user())));
        let resolver = SessionResolver::new(Arc::new(user_repo));

        let caller = resolver.resolve_caller(Some("r:valid")).await.unwrap();

        assert_eq!(caller, user());
    }

    #[tokio::test]
    async fn lookup_failure_is_an_upstream_error() {
        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_find_by_session_token()
            .returning(|_| Err(anyhow::anyhow!("parse unavailable")));
        let resolver = SessionResolver::new(Arc::new(user_repo));

        let err = resolver.resolve_caller(Some("r:valid")).await.unwrap_err();

        assert_eq!(err.status_code().as_u16(), 500);
    }
}
