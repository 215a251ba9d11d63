use std::sync::Arc;

use anyhow::Result;
use stripe_parse_bridge::{
    config::config_loader,
    infrastructure::{
        axum_http::http_serve, observability::init_observability, parse::parse_client::ParseClient,
        payments::stripe_client::StripeClient,
    },
};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Server exited with error: {:#}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    init_observability("stripe-parse-bridge")?;

    let dotenvy_env = config_loader::load()?;
    info!("ENV has been loaded");

    let parse_client = ParseClient::new(&dotenvy_env.parse)?;
    let stripe_client = StripeClient::new(
        dotenvy_env.stripe.api_base.clone(),
        dotenvy_env.stripe.secret_key.clone(),
        dotenvy_env.stripe.webhook_secret.clone(),
        dotenvy_env.stripe.webhook_tolerance,
    );
    info!(
        parse_api = %dotenvy_env.parse.api_url,
        sync_billing_address = dotenvy_env.stripe.sync_billing_address,
        "Upstream clients have been configured"
    );

    http_serve::start(
        Arc::new(dotenvy_env),
        Arc::new(parse_client),
        Arc::new(stripe_client),
    )
    .await?;

    Ok(())
}
