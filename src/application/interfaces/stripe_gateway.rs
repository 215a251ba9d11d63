use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

use crate::domain::value_objects::{
    checkout::NewCheckoutSession,
    stripe_objects::{StripeEvent, StripePaymentMethod, StripeSubscription},
};

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("missing timestamp in stripe-signature")]
    MissingTimestamp,
    #[error("missing v1 in stripe-signature")]
    MissingSignature,
    #[error("timestamp outside the tolerance zone")]
    TimestampOutsideTolerance,
    #[error("no signatures found matching the expected signature for payload")]
    Mismatch,
    #[error("invalid event payload: {0}")]
    InvalidPayload(String),
}

/// Everything the service asks of Stripe.
#[automock]
#[async_trait]
pub trait StripeGateway: Send + Sync {
    /// Returns the hosted checkout URL.
    async fn create_checkout_session(&self, session: &NewCheckoutSession) -> Result<String>;

    /// Returns the hosted billing portal URL.
    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String>;

    async fn update_subscription(
        &self,
        subscription_id: &str,
        cancel_at_period_end: bool,
    ) -> Result<StripeSubscription>;

    /// Verifies the signature over the exact request bytes, then parses the event.
    fn verify_and_parse_event(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<StripeEvent, SignatureError>;

    /// Fetches the subscription with its product and payment method expanded.
    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<StripeSubscription>;

    async fn retrieve_payment_method(&self, payment_method_id: &str)
    -> Result<StripePaymentMethod>;
}
