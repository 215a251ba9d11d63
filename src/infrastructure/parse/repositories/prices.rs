use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::json;

use crate::{
    domain::{entities::prices::PriceEntity, repositories::prices::PriceRepository},
    infrastructure::parse::{
        documents::{PRICE_CLASS, PriceDocument, WriteMode, price_body},
        parse_client::{ParseClient, class_path},
    },
};

pub struct PriceParse {
    client: Arc<ParseClient>,
}

impl PriceParse {
    pub fn new(client: Arc<ParseClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PriceRepository for PriceParse {
    async fn find_by_stripe_id(&self, stripe_id: &str) -> Result<Option<PriceEntity>> {
        let found: Option<PriceDocument> = self
            .client
            .find_first(PRICE_CLASS, &json!({ "stripeId": stripe_id }), None)
            .await?;
        Ok(found.map(PriceEntity::from))
    }

    async fn save(&self, price: &PriceEntity) -> Result<PriceEntity> {
        let mut saved = price.clone();
        match &price.object_id {
            Some(object_id) => {
                self.client
                    .update(
                        &class_path(PRICE_CLASS, object_id),
                        &price_body(price, WriteMode::Update),
                    )
                    .await?
            }
            None => {
                let object_id = self
                    .client
                    .create(PRICE_CLASS, &price_body(price, WriteMode::Create))
                    .await?;
                saved.object_id = Some(object_id);
            }
        }
        Ok(saved)
    }

    async fn destroy(&self, price: &PriceEntity) -> Result<()> {
        let Some(object_id) = &price.object_id else {
            bail!("cannot destroy unsaved price {}", price.stripe_id);
        };
        self.client
            .destroy(&class_path(PRICE_CLASS, object_id))
            .await
    }
}
