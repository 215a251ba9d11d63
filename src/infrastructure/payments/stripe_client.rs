use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::{
    application::interfaces::stripe_gateway::{SignatureError, StripeGateway},
    domain::value_objects::{
        checkout::NewCheckoutSession,
        stripe_events::is_relevant_event,
        stripe_objects::{StripeEvent, StripePaymentMethod, StripeSubscription},
    },
    infrastructure::payments::webhook_signature::verify_signature,
};

/// Expansions that let the subscription projection read the product name and
/// the billing details without further requests.
const SUBSCRIPTION_EXPAND: [&str; 3] = [
    "items.data.price.product",
    "plan.product",
    "default_payment_method",
];

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
    webhook_secret: String,
    webhook_tolerance: i64,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionUrl {
    url: Option<String>,
}

impl StripeClient {
    pub fn new(
        api_base: impl Into<String>,
        secret_key: impl Into<String>,
        webhook_secret: impl Into<String>,
        webhook_tolerance: i64,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
            webhook_secret: webhook_secret.into(),
            webhook_tolerance,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{}", self.api_base, path)
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .or_else(|| resp.headers().get("stripe-request-id"))
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.as_deref()),
            stripe_error_message = ?details.as_ref().and_then(|d| d.message.as_deref()),
            response_body = %body,
            context = %context,
            "stripe: api request failed"
        );

        anyhow::bail!(
            "Stripe API request failed: {} (status {}, request_id={:?})",
            context,
            status,
            request_id
        );
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
        context: &str,
    ) -> Result<T> {
        let resp = self
            .http
            .post(self.endpoint(path))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(form)
            .send()
            .await
            .with_context(|| format!("Stripe request failed: {context}"))?;
        let resp = Self::ensure_success(resp, context).await?;

        resp.json()
            .await
            .with_context(|| format!("Stripe response could not be decoded: {context}"))
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        context: &str,
    ) -> Result<T> {
        let resp = self
            .http
            .get(self.endpoint(path))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .query(query)
            .send()
            .await
            .with_context(|| format!("Stripe request failed: {context}"))?;
        let resp = Self::ensure_success(resp, context).await?;

        resp.json()
            .await
            .with_context(|| format!("Stripe response could not be decoded: {context}"))
    }
}

/// Form body for a subscription-mode Checkout Session.
/// https://stripe.com/docs/api/checkout/sessions/create
pub fn checkout_session_form(session: &NewCheckoutSession) -> Vec<(String, String)> {
    let mut form: Vec<(String, String)> = vec![
        ("mode".to_string(), "subscription".to_string()),
        ("payment_method_types[0]".to_string(), "card".to_string()),
        ("billing_address_collection".to_string(), "required".to_string()),
        ("line_items[0][price]".to_string(), session.price_id.clone()),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        ("client_reference_id".to_string(), session.client_reference_id.clone()),
        (
            "subscription_data[metadata][clientId]".to_string(),
            session.client_reference_id.clone(),
        ),
        ("success_url".to_string(), session.success_url.clone()),
        ("cancel_url".to_string(), session.cancel_url.clone()),
    ];

    if let Some(email) = &session.customer_email {
        form.push(("customer_email".to_string(), email.clone()));
    }

    form
}

fn expand_query() -> Vec<(&'static str, &'static str)> {
    SUBSCRIPTION_EXPAND
        .iter()
        .map(|field| ("expand[]", *field))
        .collect()
}

fn session_url(session: SessionUrl, kind: &str) -> Result<String> {
    session
        .url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Stripe {kind} session URL is missing"))
}

#[async_trait]
impl StripeGateway for StripeClient {
    async fn create_checkout_session(&self, session: &NewCheckoutSession) -> Result<String> {
        let form = checkout_session_form(session);
        let created: SessionUrl = self
            .post_form("checkout/sessions", &form, "create checkout session")
            .await?;
        debug!(client_reference_id = %session.client_reference_id, "stripe: checkout session created");
        session_url(created, "checkout")
    }

    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String> {
        // https://stripe.com/docs/api/customer_portal/sessions/create
        let form = [
            ("customer".to_string(), customer_id.to_string()),
            ("return_url".to_string(), return_url.to_string()),
        ];
        let created: SessionUrl = self
            .post_form("billing_portal/sessions", &form, "create portal session")
            .await?;
        session_url(created, "billing portal")
    }

    async fn update_subscription(
        &self,
        subscription_id: &str,
        cancel_at_period_end: bool,
    ) -> Result<StripeSubscription> {
        let mut form = vec![(
            "cancel_at_period_end".to_string(),
            cancel_at_period_end.to_string(),
        )];
        form.extend(
            SUBSCRIPTION_EXPAND
                .iter()
                .map(|field| ("expand[]".to_string(), field.to_string())),
        );

        let subscription: StripeSubscription = self
            .post_form(
                &format!("subscriptions/{subscription_id}"),
                &form,
                "update subscription",
            )
            .await?;
        info!(
            stripe_id = %subscription.id,
            cancel_at_period_end = subscription.cancel_at_period_end,
            "stripe: subscription updated"
        );
        Ok(subscription)
    }

    fn verify_and_parse_event(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<StripeEvent, SignatureError> {
        verify_signature(
            payload,
            signature,
            &self.webhook_secret,
            self.webhook_tolerance,
            Utc::now().timestamp(),
        )?;

        let event: StripeEvent = serde_json::from_slice(payload)
            .map_err(|err| SignatureError::InvalidPayload(err.to_string()))?;
        debug!(
            event_id = %event.id,
            event_type = %event.type_,
            relevant = is_relevant_event(&event.type_),
            "stripe: webhook event verified"
        );
        Ok(event)
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<StripeSubscription> {
        // https://stripe.com/docs/api/subscriptions/retrieve
        self.get(
            &format!("subscriptions/{subscription_id}"),
            &expand_query(),
            "retrieve subscription",
        )
        .await
    }

    async fn retrieve_payment_method(&self, payment_method_id: &str) -> Result<StripePaymentMethod> {
        // https://stripe.com/docs/api/payment_methods/retrieve
        self.get(
            &format!("payment_methods/{payment_method_id}"),
            &[],
            "retrieve payment method",
        )
        .await
    }
}
