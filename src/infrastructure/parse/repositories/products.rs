use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::json;

use crate::{
    domain::{entities::products::ProductEntity, repositories::products::ProductRepository},
    infrastructure::parse::{
        documents::{PRODUCT_CLASS, ProductDocument, product_body},
        parse_client::{ParseClient, class_path},
    },
};

pub struct ProductParse {
    client: Arc<ParseClient>,
}

impl ProductParse {
    pub fn new(client: Arc<ParseClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProductRepository for ProductParse {
    async fn find_by_stripe_id(&self, stripe_id: &str) -> Result<Option<ProductEntity>> {
        let found: Option<ProductDocument> = self
            .client
            .find_first(PRODUCT_CLASS, &json!({ "stripeId": stripe_id }), None)
            .await?;
        Ok(found.map(ProductEntity::from))
    }

    async fn save(&self, product: &ProductEntity) -> Result<ProductEntity> {
        let mut saved = product.clone();
        let body = product_body(product);
        match &product.object_id {
            Some(object_id) => {
                self.client
                    .update(&class_path(PRODUCT_CLASS, object_id), &body)
                    .await?
            }
            None => saved.object_id = Some(self.client.create(PRODUCT_CLASS, &body).await?),
        }
        Ok(saved)
    }

    async fn destroy(&self, product: &ProductEntity) -> Result<()> {
        let Some(object_id) = &product.object_id else {
            bail!("cannot destroy unsaved product {}", product.stripe_id);
        };
        self.client
            .destroy(&class_path(PRODUCT_CLASS, object_id))
            .await
    }
}
