use serde::{Deserialize, Serialize};

use crate::domain::value_objects::stripe_objects::StripeAddress;

/// A data-store user as seen by this service. Owned by the data store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEntity {
    pub id: String,
    pub email: Option<String>,
    /// Object id of the user's Subscription record, when the store links one.
    pub subscription: Option<String>,
}

/// Billing details copied from the subscription's default payment method.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserBillingDetails {
    pub address: Option<StripeAddress>,
    pub phone: Option<String>,
}
