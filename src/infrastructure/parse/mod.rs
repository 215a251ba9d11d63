pub mod documents;
pub mod parse_client;
pub mod repositories;
