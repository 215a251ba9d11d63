pub mod price_types;
pub mod subscription_statuses;
