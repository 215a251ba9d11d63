use anyhow::{Context, Result, bail};

use super::config_model::{DotEnvyConfig, ParseServer, Server, Stripe};

const DEFAULT_SERVER_PORT: u16 = 3000;
const DEFAULT_BODY_LIMIT_MIB: u64 = 1;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    load_from(|key| std::env::var(key).ok())
}

/// Builds the config from an arbitrary variable lookup.
///
/// Every missing required variable is collected so the startup error names all
/// of them at once instead of failing on the first.
pub fn load_from<F>(lookup: F) -> Result<DotEnvyConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing: Vec<&'static str> = Vec::new();
    let mut required = |key: &'static str| -> String {
        match lookup(key).map(|value| value.trim().to_string()) {
            Some(value) if !value.is_empty() => value,
            _ => {
                missing.push(key);
                String::new()
            }
        }
    };

    let api_url = required("API_URL");
    let application_id = required("X_PARSE_APPLICATION_ID");
    let rest_api_key = required("X_PARSE_REST_API_KEY");
    let master_key = required("X_PARSE_MASTER_KEY");
    let secret_key = required("STRIPE_PRIVATE_KEY");
    let webhook_secret = required("STRIPE_WEBHOOK_SECRET");
    let default_price_id = required("STRIPE_DEFAULT_SUBSCRIBE_PRICE_ID");
    let callback_url = required("CALLBACK_URL");

    if !missing.is_empty() {
        bail!("Missing environment variables:\n  {}", missing.join("\n  "));
    }

    let server = Server {
        port: parse_or(&lookup, "SERVER_PORT", DEFAULT_SERVER_PORT)?,
        body_limit: parse_or(&lookup, "SERVER_BODY_LIMIT", DEFAULT_BODY_LIMIT_MIB)?,
        timeout: parse_or(&lookup, "SERVER_TIMEOUT", DEFAULT_TIMEOUT_SECS)?,
    };

    let parse = ParseServer {
        api_url: api_url.trim_end_matches('/').to_string(),
        application_id,
        rest_api_key,
        master_key,
    };

    let stripe = Stripe {
        secret_key,
        webhook_secret,
        default_price_id,
        api_base: lookup("STRIPE_API_BASE")
            .filter(|value| !value.trim().is_empty())
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_STRIPE_API_BASE.to_string()),
        webhook_tolerance: parse_or(
            &lookup,
            "STRIPE_WEBHOOK_TOLERANCE",
            DEFAULT_WEBHOOK_TOLERANCE_SECS,
        )?,
        sync_billing_address: parse_or(&lookup, "STRIPE_SYNC_BILLING_ADDRESS", false)?,
    };

    Ok(DotEnvyConfig {
        server,
        parse,
        stripe,
        callback_url: callback_url.trim_end_matches('/').to_string(),
    })
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key).filter(|value| !value.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} is invalid")),
        None => Ok(default),
    }
}
