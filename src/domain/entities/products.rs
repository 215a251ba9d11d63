use std::collections::HashMap;

use crate::domain::value_objects::stripe_objects::StripeProduct;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductEntity {
    pub object_id: Option<String>,
    pub stripe_id: String,
    pub active: bool,
    pub name: String,
    pub metadata: HashMap<String, String>,
}

impl ProductEntity {
    pub fn new(stripe_id: impl Into<String>) -> Self {
        Self {
            stripe_id: stripe_id.into(),
            ..Self::default()
        }
    }

    pub fn apply_stripe_product(&mut self, product: &StripeProduct) {
        self.stripe_id = product.id.clone();
        self.active = product.active;
        self.name = product.name.clone();
        self.metadata = product.metadata.clone();
    }
}
