use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::subscriptions::SubscriptionEntity;

/// Lookups are first-match queries; nothing enforces `stripe_id` uniqueness in the store.
#[automock]
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn find_by_stripe_id(&self, stripe_id: &str) -> Result<Option<SubscriptionEntity>>;

    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<SubscriptionEntity>>;

    /// Creates the record when it has no object id yet, otherwise overwrites it.
    async fn save(&self, subscription: &SubscriptionEntity) -> Result<SubscriptionEntity>;
}
