//! JSON shapes of the Parse classes this service reads and writes.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::domain::{
    entities::{
        prices::PriceEntity,
        products::ProductEntity,
        subscriptions::SubscriptionEntity,
        users::{UserBillingDetails, UserEntity},
    },
    value_objects::enums::{price_types::PriceType, subscription_statuses::SubscriptionStatus},
};

pub const SUBSCRIPTION_CLASS: &str = "Subscription";
pub const PRODUCT_CLASS: &str = "Product";
pub const PRICE_CLASS: &str = "Price";
pub const USER_CLASS: &str = "_User";

/// Parse `Date` value: `{"__type":"Date","iso":"2023-11-14T22:13:20.000Z"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseDate {
    #[serde(rename = "__type")]
    pub type_: String,
    pub iso: DateTime<Utc>,
}

impl ParseDate {
    pub fn to_value(date: &DateTime<Utc>) -> Value {
        json!({
            "__type": "Date",
            "iso": date.to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsePointer {
    pub class_name: String,
    pub object_id: String,
}

pub fn pointer(class_name: &str, object_id: &str) -> Value {
    json!({
        "__type": "Pointer",
        "className": class_name,
        "objectId": object_id,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Update,
}

/// Body of a create or update request.
///
/// An absent value is left out when creating and unset with a `Delete` op when
/// updating, so a saved record never keeps a stale field.
struct DocumentBody {
    mode: WriteMode,
    fields: Map<String, Value>,
}

impl DocumentBody {
    fn new(mode: WriteMode) -> Self {
        Self {
            mode,
            fields: Map::new(),
        }
    }

    fn set(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    fn set_optional(&mut self, key: &str, value: Option<Value>) -> &mut Self {
        match (value, self.mode) {
            (Some(value), _) => {
                self.fields.insert(key.to_string(), value);
            }
            (None, WriteMode::Update) => {
                self.fields
                    .insert(key.to_string(), json!({ "__op": "Delete" }));
            }
            (None, WriteMode::Create) => {}
        }
        self
    }

    fn set_date(&mut self, key: &str, value: Option<&DateTime<Utc>>) -> &mut Self {
        self.set_optional(key, value.map(ParseDate::to_value))
    }

    fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

fn metadata_value(metadata: &HashMap<String, String>) -> Value {
    json!(metadata)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDocument {
    pub object_id: String,
    pub stripe_id: String,
    pub stripe_customer_id: Option<String>,
    pub user: Option<ParsePointer>,
    pub status: Option<SubscriptionStatus>,
    pub plan: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
    pub cancel_at_period_end: Option<bool>,
    pub created: Option<ParseDate>,
    pub current_period_start: Option<ParseDate>,
    pub current_period_end: Option<ParseDate>,
    pub ended_at: Option<ParseDate>,
    pub cancel_at: Option<ParseDate>,
    pub canceled_at: Option<ParseDate>,
}

impl From<SubscriptionDocument> for SubscriptionEntity {
    fn from(document: SubscriptionDocument) -> Self {
        let date = |value: Option<ParseDate>| value.map(|date| date.iso);
        Self {
            object_id: Some(document.object_id),
            stripe_id: document.stripe_id,
            stripe_customer_id: document.stripe_customer_id,
            user_id: document.user.map(|user| user.object_id),
            status: document.status.unwrap_or_default(),
            plan: document.plan,
            metadata: document.metadata.unwrap_or_default(),
            cancel_at_period_end: document.cancel_at_period_end.unwrap_or_default(),
            created: date(document.created),
            current_period_start: date(document.current_period_start),
            current_period_end: date(document.current_period_end),
            ended_at: date(document.ended_at),
            cancel_at: date(document.cancel_at),
            canceled_at: date(document.canceled_at),
        }
    }
}

pub fn subscription_body(record: &SubscriptionEntity, mode: WriteMode) -> Value {
    let mut body = DocumentBody::new(mode);
    body.set("stripeId", record.stripe_id.as_str())
        .set_optional("stripeCustomerId", record.stripe_customer_id.clone().map(Value::from))
        .set_optional(
            "user",
            record.user_id.as_deref().map(|user_id| pointer(USER_CLASS, user_id)),
        )
        .set("status", record.status.to_string())
        .set_optional("plan", record.plan.clone().map(Value::from))
        .set("metadata", metadata_value(&record.metadata))
        .set("cancelAtPeriodEnd", record.cancel_at_period_end)
        .set_date("created", record.created.as_ref())
        .set_date("currentPeriodStart", record.current_period_start.as_ref())
        .set_date("currentPeriodEnd", record.current_period_end.as_ref())
        .set_date("endedAt", record.ended_at.as_ref())
        .set_date("cancelAt", record.cancel_at.as_ref())
        .set_date("canceledAt", record.canceled_at.as_ref());
    body.into_value()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDocument {
    pub object_id: String,
    pub stripe_id: String,
    pub active: Option<bool>,
    pub name: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
}

impl From<ProductDocument> for ProductEntity {
    fn from(document: ProductDocument) -> Self {
        Self {
            object_id: Some(document.object_id),
            stripe_id: document.stripe_id,
            active: document.active.unwrap_or_default(),
            name: document.name.unwrap_or_default(),
            metadata: document.metadata.unwrap_or_default(),
        }
    }
}

pub fn product_body(record: &ProductEntity) -> Value {
    json!({
        "stripeId": record.stripe_id,
        "active": record.active,
        "name": record.name,
        "metadata": metadata_value(&record.metadata),
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceDocument {
    pub object_id: String,
    pub stripe_id: String,
    pub active: Option<bool>,
    pub unit_amount: Option<i64>,
    pub currency: Option<String>,
    #[serde(rename = "type")]
    pub price_type: Option<PriceType>,
    pub interval: Option<String>,
    pub interval_count: Option<i64>,
    pub metadata: Option<HashMap<String, String>>,
}

impl From<PriceDocument> for PriceEntity {
    fn from(document: PriceDocument) -> Self {
        Self {
            object_id: Some(document.object_id),
            stripe_id: document.stripe_id,
            active: document.active.unwrap_or_default(),
            unit_amount: document.unit_amount,
            currency: document.currency.unwrap_or_default(),
            price_type: document.price_type.unwrap_or_default(),
            interval: document.interval,
            interval_count: document.interval_count,
            metadata: document.metadata.unwrap_or_default(),
        }
    }
}

pub fn price_body(record: &PriceEntity, mode: WriteMode) -> Value {
    let mut body = DocumentBody::new(mode);
    body.set("stripeId", record.stripe_id.as_str())
        .set("active", record.active)
        .set_optional("unitAmount", record.unit_amount.map(Value::from))
        .set("currency", record.currency.as_str())
        .set("type", record.price_type.to_string())
        .set_optional("interval", record.interval.clone().map(Value::from))
        .set_optional("intervalCount", record.interval_count.map(Value::from))
        .set("metadata", metadata_value(&record.metadata));
    body.into_value()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDocument {
    pub object_id: String,
    pub email: Option<String>,
    pub subscription: Option<ParsePointer>,
}

impl From<UserDocument> for UserEntity {
    fn from(document: UserDocument) -> Self {
        Self {
            id: document.object_id,
            email: document.email.filter(|email| !email.is_empty()),
            subscription: document.subscription.map(|pointer| pointer.object_id),
        }
    }
}

/// The address is replaced (or unset); the phone only overwrites when present.
pub fn billing_details_body(details: &UserBillingDetails) -> Value {
    let mut body = DocumentBody::new(WriteMode::Update);
    body.set_optional("billingAddress", details.address.as_ref().map(|address| json!(address)));
    if let Some(phone) = &details.phone {
        body.set("phone", phone.as_str());
    }
    body.into_value()
}
