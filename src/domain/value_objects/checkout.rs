use serde::{Deserialize, Serialize};

/// Parameters for a subscription-mode Stripe Checkout session.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCheckoutSession {
    pub price_id: String,
    pub customer_email: Option<String>,
    pub client_reference_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutRequest {
    pub price_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubscriptionRequest {
    pub cancel_at_period_end: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct RedirectQuery {
    pub redirect: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionUrlResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookReceivedResponse {
    pub received: bool,
}
