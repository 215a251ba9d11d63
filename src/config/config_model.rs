#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub server: Server,
    pub parse: ParseServer,
    pub stripe: Stripe,
    pub callback_url: String,
}

#[derive(Debug, Clone)]
pub struct Server {
    pub port: u16,
    /// Request body limit in MiB.
    pub body_limit: u64,
    /// Request timeout in seconds.
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct ParseServer {
    pub api_url: String,
    pub application_id: String,
    pub rest_api_key: String,
    pub master_key: String,
}

#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub webhook_secret: String,
    pub default_price_id: String,
    pub api_base: String,
    /// Maximum age, in seconds, of a webhook signature timestamp.
    pub webhook_tolerance: i64,
    pub sync_billing_address: bool,
}
