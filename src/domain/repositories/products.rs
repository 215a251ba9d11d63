use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::products::ProductEntity;

#[automock]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_stripe_id(&self, stripe_id: &str) -> Result<Option<ProductEntity>>;

    async fn save(&self, product: &ProductEntity) -> Result<ProductEntity>;

    async fn destroy(&self, product: &ProductEntity) -> Result<()>;
}
