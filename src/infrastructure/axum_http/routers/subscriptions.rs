use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    http::{StatusCode, header::LOCATION},
    response::IntoResponse,
    routing::{get, post, put},
};
use serde_json::json;

use crate::{
    application::{
        errors::BillingError, interfaces::stripe_gateway::StripeGateway,
        usecases::subscriptions::SubscriptionUseCase,
    },
    config::config_model::DotEnvyConfig,
    domain::{
        repositories::{subscriptions::SubscriptionRepository, users::UserRepository},
        value_objects::checkout::{
            CreateCheckoutRequest, RedirectQuery, SessionUrlResponse, UpdateSubscriptionRequest,
        },
    },
    infrastructure::{
        axum_http::auth::SessionToken,
        parse::{
            parse_client::ParseClient,
            repositories::{subscriptions::SubscriptionParse, users::UserParse},
        },
        payments::stripe_client::StripeClient,
    },
};

pub fn routes(
    parse_client: Arc<ParseClient>,
    stripe_client: Arc<StripeClient>,
    config: &DotEnvyConfig,
) -> Router {
    let user_repository = UserParse::new(Arc::clone(&parse_client));
    let subscription_repository = SubscriptionParse::new(Arc::clone(&parse_client));
    let subscriptions_usecase = SubscriptionUseCase::new(
        Arc::new(user_repository),
        Arc::new(subscription_repository),
        stripe_client,
        config.callback_url.clone(),
        config.stripe.default_price_id.clone(),
    );

    router(Arc::new(subscriptions_usecase))
}

pub fn router<U, S, G>(subscriptions_usecase: Arc<SubscriptionUseCase<U, S, G>>) -> Router
where
    U: UserRepository + 'static,
    S: SubscriptionRepository + 'static,
    G: StripeGateway + 'static,
{
    Router::new()
        .route(
            "/create-checkout-session",
            get(checkout_redirect::<U, S, G>).post(create_checkout_session::<U, S, G>),
        )
        .route("/create-portal-session", post(create_portal_session::<U, S, G>))
        .route("/update-subscription", put(update_subscription::<U, S, G>))
        .with_state(subscriptions_usecase)
}

/// Browser entry point: subscribes to the default price and redirects to Stripe.
pub async fn checkout_redirect<U, S, G>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<U, S, G>>>,
    session_token: SessionToken,
    Query(query): Query<RedirectQuery>,
) -> Result<impl IntoResponse, BillingError>
where
    U: UserRepository + 'static,
    S: SubscriptionRepository + 'static,
    G: StripeGateway + 'static,
{
    let url = subscriptions_usecase
        .create_checkout_session(session_token.as_deref(), None, query.redirect.as_deref())
        .await?;

    Ok((StatusCode::FOUND, [(LOCATION, url)]))
}

pub async fn create_checkout_session<U, S, G>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<U, S, G>>>,
    session_token: SessionToken,
    Query(query): Query<RedirectQuery>,
    payload: Result<Json<CreateCheckoutRequest>, JsonRejection>,
) -> Result<impl IntoResponse, BillingError>
where
    U: UserRepository + 'static,
    S: SubscriptionRepository + 'static,
    G: StripeGateway + 'static,
{
    let Json(request) = payload.map_err(|rejection| BillingError::Validation(rejection.body_text()))?;

    let url = subscriptions_usecase
        .create_checkout_session(
            session_token.as_deref(),
            Some(&request.price_id),
            query.redirect.as_deref(),
        )
        .await?;

    Ok(Json(SessionUrlResponse { url }))
}

pub async fn create_portal_session<U, S, G>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<U, S, G>>>,
    session_token: SessionToken,
    Query(query): Query<RedirectQuery>,
) -> Result<impl IntoResponse, BillingError>
where
    U: UserRepository + 'static,
    S: SubscriptionRepository + 'static,
    G: StripeGateway + 'static,
{
    let url = subscriptions_usecase
        .create_portal_session(session_token.as_deref(), query.redirect.as_deref())
        .await?;

    Ok(Json(SessionUrlResponse { url }))
}

pub async fn update_subscription<U, S, G>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<U, S, G>>>,
    session_token: SessionToken,
    payload: Result<Json<UpdateSubscriptionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, BillingError>
where
    U: UserRepository + 'static,
    S: SubscriptionRepository + 'static,
    G: StripeGateway + 'static,
{
    let Json(request) = payload.map_err(|rejection| BillingError::Validation(rejection.body_text()))?;

    let subscription = subscriptions_usecase
        .update_subscription(session_token.as_deref(), request.cancel_at_period_end)
        .await?;

    Ok(Json(json!({ "subscription": subscription })))
}
