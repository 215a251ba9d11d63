use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::users::{UserBillingDetails, UserEntity};

#[automock]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserEntity>>;

    /// Resolves the owner of a session token; `None` when the token is not valid.
    async fn find_by_session_token(&self, session_token: &str) -> Result<Option<UserEntity>>;

    async fn update_billing_details(
        &self,
        user_id: &str,
        billing_details: &UserBillingDetails,
    ) -> Result<()>;
}
