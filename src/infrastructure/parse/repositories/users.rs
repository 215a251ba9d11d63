use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::{
    domain::{
        entities::users::{UserBillingDetails, UserEntity},
        repositories::users::UserRepository,
    },
    infrastructure::parse::{
        documents::{UserDocument, billing_details_body},
        parse_client::{ParseClient, user_path},
    },
};

pub struct UserParse {
    client: Arc<ParseClient>,
}

impl UserParse {
    pub fn new(client: Arc<ParseClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UserRepository for UserParse {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserEntity>> {
        let found: Option<UserDocument> = self.client.get(&user_path(user_id)).await?;
        Ok(found.map(UserEntity::from))
    }

    async fn find_by_session_token(&self, session_token: &str) -> Result<Option<UserEntity>> {
        let found: Option<UserDocument> = self.client.current_user(session_token).await?;
        Ok(found.map(UserEntity::from))
    }

    async fn update_billing_details(
        &self,
        user_id: &str,
        billing_details: &UserBillingDetails,
    ) -> Result<()> {
        self.client
            .update(&user_path(user_id), &billing_details_body(billing_details))
            .await?;
        info!(user_id, "parse: user billing details updated");
        Ok(())
    }
}
