use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    Router,
    http::{HeaderName, Method, header::CONTENT_TYPE},
    routing::get,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::{
    config::config_model::DotEnvyConfig,
    domain::value_objects::stripe_events::{dispatch_table, verify_dispatch_table},
    infrastructure::{
        axum_http::{
            auth::SESSION_TOKEN_HEADER,
            default_routers,
            routers::{stripe_webhook, subscriptions},
        },
        parse::parse_client::ParseClient,
        payments::stripe_client::StripeClient,
    },
};

pub async fn start(
    config: Arc<DotEnvyConfig>,
    parse_client: Arc<ParseClient>,
    stripe_client: Arc<StripeClient>,
) -> Result<()> {
    verify_dispatch_table(&dispatch_table())?;

    let app = Router::new()
        .fallback(default_routers::not_found)
        .merge(subscriptions::routes(
            Arc::clone(&parse_client),
            Arc::clone(&stripe_client),
            &config,
        ))
        .merge(stripe_webhook::routes(
            Arc::clone(&parse_client),
            Arc::clone(&stripe_client),
            &config,
        ))
        .route("/health-check", get(default_routers::health_check))
        .layer(TimeoutLayer::new(Duration::from_secs(config.server.timeout)))
        .layer(RequestBodyLimitLayer::new(
            (config.server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::PUT])
                .allow_headers([CONTENT_TYPE, HeaderName::from_static(SESSION_TOKEN_HEADER)])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = TcpListener::bind(addr).await?;

    info!(port = config.server.port, "Server is running");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
