pub mod prices;
pub mod products;
pub mod subscriptions;
pub mod users;
