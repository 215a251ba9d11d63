use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::value_objects::{
    enums::subscription_statuses::SubscriptionStatus,
    stripe_objects::StripeSubscription,
    timestamps::get_date,
};

/// Local mirror of a Stripe subscription, keyed by `stripe_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubscriptionEntity {
    /// Data-store object id; `None` until the record is first saved.
    pub object_id: Option<String>,
    pub stripe_id: String,
    pub stripe_customer_id: Option<String>,
    pub user_id: Option<String>,
    pub status: SubscriptionStatus,
    pub plan: Option<String>,
    pub metadata: HashMap<String, String>,
    pub cancel_at_period_end: bool,
    pub created: Option<DateTime<Utc>>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub cancel_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
}

impl SubscriptionEntity {
    /// Unsaved record for a subscription not yet mirrored locally.
    pub fn new(stripe_id: impl Into<String>) -> Self {
        Self {
            stripe_id: stripe_id.into(),
            ..Self::default()
        }
    }

    pub fn is_saved(&self) -> bool {
        self.object_id.is_some()
    }

    /// Overwrites every mirrored field from the provider's subscription.
    ///
    /// The projection is a pure overwrite, so applying the same subscription twice
    /// leaves the record unchanged. `object_id` and `user_id` are left alone.
    pub fn apply_stripe_subscription(&mut self, subscription: &StripeSubscription) {
        self.stripe_id = subscription.id.clone();
        self.stripe_customer_id = Some(subscription.customer.id().to_string());
        self.status = subscription.status;
        self.plan = subscription.product_name().map(str::to_string);
        self.metadata = subscription.metadata.clone();
        self.cancel_at_period_end = subscription.cancel_at_period_end;
        self.created = get_date(subscription.created);
        self.current_period_start = get_date(subscription.period_start());
        self.current_period_end = get_date(subscription.period_end());
        self.ended_at = get_date(subscription.ended_at);
        self.cancel_at = get_date(subscription.cancel_at);
        self.canceled_at = get_date(subscription.canceled_at);
    }
}
