use std::sync::Arc;

use tracing::{error, info, warn};

use crate::{
    application::{
        errors::{BillingError, UseCaseResult},
        interfaces::stripe_gateway::StripeGateway,
        usecases::sessions::SessionResolver,
    },
    domain::{
        entities::subscriptions::SubscriptionEntity,
        repositories::{subscriptions::SubscriptionRepository, users::UserRepository},
        value_objects::{checkout::NewCheckoutSession, stripe_objects::StripeSubscription},
    },
};

pub struct SubscriptionUseCase<U, S, G>
where
    U: UserRepository + 'static,
    S: SubscriptionRepository + 'static,
    G: StripeGateway + 'static,
{
    sessions: SessionResolver<U>,
    subscription_repo: Arc<S>,
    stripe_client: Arc<G>,
    callback_url: String,
    default_price_id: String,
}

impl<U, S, G> SubscriptionUseCase<U, S, G>
where
    U: UserRepository + 'static,
    S: SubscriptionRepository + 'static,
    G: StripeGateway + 'static,
{
    pub fn new(
        user_repo: Arc<U>,
        subscription_repo: Arc<S>,
        stripe_client: Arc<G>,
        callback_url: impl Into<String>,
        default_price_id: impl Into<String>,
    ) -> Self {
        Self {
            sessions: SessionResolver::new(user_repo),
            subscription_repo,
            stripe_client,
            callback_url: callback_url.into(),
            default_price_id: default_price_id.into(),
        }
    }

    /// Starts a hosted checkout for the caller and returns its URL.
    ///
    /// `price_id` of `None` subscribes to the configured default price.
    pub async fn create_checkout_session(
        &self,
        session_token: Option<&str>,
        price_id: Option<&str>,
        redirect: Option<&str>,
    ) -> UseCaseResult<String> {
        let price_id = match price_id {
            Some(price_id) if price_id.trim().is_empty() => {
                return Err(BillingError::Validation("priceId must not be empty".to_string()));
            }
            Some(price_id) => price_id.trim().to_string(),
            None => self.default_price_id.clone(),
        };

        let user = self.sessions.resolve_caller(session_token).await?;
        let user_id = user.id.clone();

        if let Some(subscription) = self.find_user_subscription(&user_id).await? {
            if subscription.status.is_active() {
                warn!(
                    %user_id,
                    stripe_id = %subscription.stripe_id,
                    status = %subscription.status,
                    "subscriptions: checkout refused, user already subscribed"
                );
                return Err(BillingError::Conflict("user already subscribed".to_string()));
            }
        }

        let session = NewCheckoutSession {
            price_id,
            customer_email: user.email,
            client_reference_id: user.id,
            success_url: self.callback(redirect),
            cancel_url: format!("{}/", self.callback_url),
        };

        info!(
            %user_id,
            price_id = %session.price_id,
            "subscriptions: creating checkout session"
        );
        let url = self
            .stripe_client
            .create_checkout_session(&session)
            .await
            .map_err(|err| {
                error!(%user_id, error = ?err, "subscriptions: checkout session creation failed");
                BillingError::Upstream(err)
            })?;
        info!(%user_id, "subscriptions: checkout session created");

        Ok(url)
    }

    /// Opens the billing portal for a caller holding an active subscription.
    pub async fn create_portal_session(
        &self,
        session_token: Option<&str>,
        redirect: Option<&str>,
    ) -> UseCaseResult<String> {
        let user = self.sessions.resolve_caller(session_token).await?;
        let user_id = user.id;

        let subscription = self
            .find_user_subscription(&user_id)
            .await?
            .filter(|subscription| subscription.status.is_active())
            .ok_or_else(|| {
                warn!(%user_id, "subscriptions: portal refused, no active subscription");
                BillingError::Auth("user not subscribed".to_string())
            })?;

        let customer_id = subscription.stripe_customer_id.as_deref().ok_or_else(|| {
            warn!(
                %user_id,
                stripe_id = %subscription.stripe_id,
                "subscriptions: subscription has no customer id"
            );
            BillingError::Validation("subscription has no customer".to_string())
        })?;

        info!(%user_id, customer_id, "subscriptions: creating portal session");
        self.stripe_client
            .create_portal_session(customer_id, &self.callback(redirect))
            .await
            .map_err(|err| {
                error!(%user_id, error = ?err, "subscriptions: portal session creation failed");
                BillingError::Upstream(err)
            })
    }

    /// Forwards the cancel-at-period-end flag to Stripe.
    ///
    /// The local mirror is left to the `customer.subscription.updated` webhook.
    pub async fn update_subscription(
        &self,
        session_token: Option<&str>,
        cancel_at_period_end: bool,
    ) -> UseCaseResult<StripeSubscription> {
        let user = self.sessions.resolve_caller(session_token).await?;
        let user_id = user.id;

        let subscription = self.find_user_subscription(&user_id).await?.ok_or_else(|| {
            warn!(%user_id, "subscriptions: update refused, user not subscribed");
            BillingError::Validation("user not subscribed".to_string())
        })?;

        info!(
            %user_id,
            stripe_id = %subscription.stripe_id,
            cancel_at_period_end,
            "subscriptions: updating subscription"
        );
        let updated = self
            .stripe_client
            .update_subscription(&subscription.stripe_id, cancel_at_period_end)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    stripe_id = %subscription.stripe_id,
                    error = ?err,
                    "subscriptions: subscription update failed"
                );
                BillingError::Upstream(err)
            })?;

        Ok(updated)
    }

    async fn find_user_subscription(&self, user_id: &str) -> UseCaseResult<Option<SubscriptionEntity>> {
        self.subscription_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(user_id, error = ?err, "subscriptions: subscription lookup failed");
                BillingError::Upstream(err)
            })
    }

    fn callback(&self, redirect: Option<&str>) -> String {
        let redirect = redirect.unwrap_or_default().trim_start_matches('/');
        format!("{}/{}", self.callback_url, redirect)
    }
}
