use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::{
    domain::{
        entities::subscriptions::SubscriptionEntity,
        repositories::subscriptions::SubscriptionRepository,
    },
    infrastructure::parse::{
        documents::{
            SUBSCRIPTION_CLASS, SubscriptionDocument, USER_CLASS, WriteMode, pointer,
            subscription_body,
        },
        parse_client::{ParseClient, class_path},
    },
};

pub struct SubscriptionParse {
    client: Arc<ParseClient>,
}

impl SubscriptionParse {
    pub fn new(client: Arc<ParseClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionParse {
    async fn find_by_stripe_id(&self, stripe_id: &str) -> Result<Option<SubscriptionEntity>> {
        let found: Option<SubscriptionDocument> = self
            .client
            .find_first(SUBSCRIPTION_CLASS, &json!({ "stripeId": stripe_id }), None)
            .await?;
        Ok(found.map(SubscriptionEntity::from))
    }

    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<SubscriptionEntity>> {
        // Latest record wins when a user has subscribed more than once.
        let found: Option<SubscriptionDocument> = self
            .client
            .find_first(
                SUBSCRIPTION_CLASS,
                &json!({ "user": pointer(USER_CLASS, user_id) }),
                Some("-createdAt"),
            )
            .await?;
        Ok(found.map(SubscriptionEntity::from))
    }

    async fn save(&self, subscription: &SubscriptionEntity) -> Result<SubscriptionEntity> {
        let mut saved = subscription.clone();
        match &subscription.object_id {
            Some(object_id) => {
                self.client
                    .update(
                        &class_path(SUBSCRIPTION_CLASS, object_id),
                        &subscription_body(subscription, WriteMode::Update),
                    )
                    .await?;
            }
            None => {
                let object_id = self
                    .client
                    .create(
                        SUBSCRIPTION_CLASS,
                        &subscription_body(subscription, WriteMode::Create),
                    )
                    .await?;
                saved.object_id = Some(object_id);
            }
        }
        debug!(stripe_id = %saved.stripe_id, object_id = ?saved.object_id, "parse: subscription saved");
        Ok(saved)
    }
}
