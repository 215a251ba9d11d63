pub mod axum_http;
pub mod observability;
pub mod parse;
pub mod payments;
