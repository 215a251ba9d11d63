use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::prices::PriceEntity;

#[automock]
#[async_trait]
pub trait PriceRepository: Send + Sync {
    async fn find_by_stripe_id(&self, stripe_id: &str) -> Result<Option<PriceEntity>>;

    async fn save(&self, price: &PriceEntity) -> Result<PriceEntity>;

    async fn destroy(&self, price: &PriceEntity) -> Result<()>;
}
