//! Stripe API objects as they arrive in webhook payloads and API responses.
//!
//! Only the fields this service reads are modelled; unknown fields are ignored.

use std::collections::HashMap;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::domain::value_objects::enums::{
    price_types::PriceType, subscription_statuses::SubscriptionStatus,
};

/// Anything Stripe can hand back with an `id`.
pub trait StripeObject {
    fn id(&self) -> &str;
}

/// A Stripe field that is either a bare id or the expanded object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expandable<T> {
    Id(String),
    Object(Box<T>),
}

impl<T: StripeObject> Expandable<T> {
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) => id,
            Expandable::Object(object) => object.id(),
        }
    }
}

impl<T> Expandable<T> {
    pub fn as_object(&self) -> Option<&T> {
        match self {
            Expandable::Id(_) => None,
            Expandable::Object(object) => Some(object),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub api_version: Option<String>,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

impl StripeEvent {
    /// Deserializes `data.object` into the type the event type promises.
    pub fn data_object<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data.object)
    }
}

/// Minimal view of any object, used for `*.deleted` events.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeObjectRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
    pub email: Option<String>,
}

impl StripeObject for StripeCustomer {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StripeProduct {
    pub id: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StripeObject for StripeProduct {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StripeRecurring {
    pub interval: String,
    pub interval_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StripePrice {
    pub id: String,
    #[serde(default)]
    pub active: bool,
    pub unit_amount: Option<i64>,
    pub currency: String,
    #[serde(rename = "type")]
    pub type_: PriceType,
    pub recurring: Option<StripeRecurring>,
    pub product: Option<Expandable<StripeProduct>>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StripeObject for StripePrice {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Legacy single-plan view Stripe still attaches to single-item subscriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StripePlan {
    pub id: String,
    pub product: Option<Expandable<StripeProduct>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StripeSubscriptionItems {
    #[serde(default)]
    pub data: Vec<StripeSubscriptionItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StripeSubscriptionItem {
    pub id: String,
    pub price: Option<StripePrice>,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: Expandable<StripeCustomer>,
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    pub created: Option<i64>,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub ended_at: Option<i64>,
    pub cancel_at: Option<i64>,
    pub canceled_at: Option<i64>,
    #[serde(default)]
    pub items: StripeSubscriptionItems,
    pub plan: Option<StripePlan>,
    pub default_payment_method: Option<Expandable<StripePaymentMethod>>,
}

impl StripeObject for StripeSubscription {
    fn id(&self) -> &str {
        &self.id
    }
}

impl StripeSubscription {
    /// Display name of the subscribed product, when the product is expanded.
    pub fn product_name(&self) -> Option<&str> {
        self.items
            .data
            .first()
            .and_then(|item| item.price.as_ref())
            .and_then(|price| price.product.as_ref())
            .and_then(Expandable::as_object)
            .or_else(|| {
                self.plan
                    .as_ref()
                    .and_then(|plan| plan.product.as_ref())
                    .and_then(Expandable::as_object)
            })
            .map(|product| product.name.as_str())
    }

    /// Period start, falling back to the first item on API versions that moved it there.
    pub fn period_start(&self) -> Option<i64> {
        self.current_period_start.or_else(|| {
            self.items
                .data
                .first()
                .and_then(|item| item.current_period_start)
        })
    }

    /// Period end, falling back to the first item when needed.
    pub fn period_end(&self) -> Option<i64> {
        self.current_period_end.or_else(|| {
            self.items
                .data
                .first()
                .and_then(|item| item.current_period_end)
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub mode: Option<String>,
    pub client_reference_id: Option<String>,
    pub customer: Option<Expandable<StripeCustomer>>,
    pub subscription: Option<Expandable<StripeSubscription>>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoice {
    pub id: String,
    pub subscription: Option<Expandable<StripeSubscription>>,
    pub parent: Option<StripeInvoiceParent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoiceParent {
    pub subscription_details: Option<StripeInvoiceSubscriptionDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoiceSubscriptionDetails {
    pub subscription: Option<Expandable<StripeSubscription>>,
}

impl StripeInvoice {
    /// Subscription the invoice bills, from the legacy field or the newer `parent` block.
    pub fn subscription_ref(&self) -> Option<Expandable<StripeSubscription>> {
        self.subscription.clone().or_else(|| {
            self.parent
                .as_ref()
                .and_then(|parent| parent.subscription_details.as_ref())
                .and_then(|details| details.subscription.clone())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StripePaymentMethod {
    pub id: String,
    #[serde(default)]
    pub billing_details: StripeBillingDetails,
}

impl StripeObject for StripePaymentMethod {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StripeBillingDetails {
    pub address: Option<StripeAddress>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StripeAddress {
    pub city: Option<String>,
    pub country: Option<String>,
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub postal_code: Option<String>,
    pub state: Option<String>,
}
