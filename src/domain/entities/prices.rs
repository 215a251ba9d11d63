use std::collections::HashMap;

use crate::domain::value_objects::{
    enums::price_types::PriceType, stripe_objects::StripePrice,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceEntity {
    pub object_id: Option<String>,
    pub stripe_id: String,
    pub active: bool,
    pub unit_amount: Option<i64>,
    pub currency: String,
    pub price_type: PriceType,
    pub interval: Option<String>,
    pub interval_count: Option<i64>,
    pub metadata: HashMap<String, String>,
}

impl PriceEntity {
    pub fn new(stripe_id: impl Into<String>) -> Self {
        Self {
            stripe_id: stripe_id.into(),
            ..Self::default()
        }
    }

    /// Interval fields are only set for recurring prices.
    pub fn apply_stripe_price(&mut self, price: &StripePrice) {
        self.stripe_id = price.id.clone();
        self.active = price.active;
        self.unit_amount = price.unit_amount;
        self.currency = price.currency.clone();
        self.price_type = price.type_;
        self.interval = price.recurring.as_ref().map(|r| r.interval.clone());
        self.interval_count = price.recurring.as_ref().map(|r| r.interval_count);
        self.metadata = price.metadata.clone();
    }
}
