pub mod checkout;
pub mod enums;
pub mod stripe_events;
pub mod stripe_objects;
pub mod timestamps;
