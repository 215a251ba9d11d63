use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};

use crate::{
    application::{
        interfaces::stripe_gateway::StripeGateway,
        usecases::stripe_webhook::StripeWebhookUseCase,
    },
    config::config_model::DotEnvyConfig,
    domain::{
        repositories::{
            prices::PriceRepository, products::ProductRepository,
            subscriptions::SubscriptionRepository, users::UserRepository,
        },
        value_objects::checkout::WebhookReceivedResponse,
    },
    infrastructure::{
        axum_http::error_responses::WebhookError,
        parse::{
            parse_client::ParseClient,
            repositories::{
                prices::PriceParse, products::ProductParse, subscriptions::SubscriptionParse,
                users::UserParse,
            },
        },
        payments::stripe_client::StripeClient,
    },
};

const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub fn routes(
    parse_client: Arc<ParseClient>,
    stripe_client: Arc<StripeClient>,
    config: &DotEnvyConfig,
) -> Router {
    let webhook_usecase = StripeWebhookUseCase::new(
        Arc::new(UserParse::new(Arc::clone(&parse_client))),
        Arc::new(SubscriptionParse::new(Arc::clone(&parse_client))),
        Arc::new(ProductParse::new(Arc::clone(&parse_client))),
        Arc::new(PriceParse::new(Arc::clone(&parse_client))),
        stripe_client,
        config.stripe.sync_billing_address,
    );

    router(Arc::new(webhook_usecase))
}

pub fn router<U, S, P, R, G>(webhook_usecase: Arc<StripeWebhookUseCase<U, S, P, R, G>>) -> Router
where
    U: UserRepository + 'static,
    S: SubscriptionRepository + 'static,
    P: ProductRepository + 'static,
    R: PriceRepository + 'static,
    G: StripeGateway + 'static,
{
    Router::new()
        .route("/webhooks", post(stripe_webhook::<U, S, P, R, G>))
        .with_state(webhook_usecase)
}

/// Takes the body as raw bytes; the signature covers them exactly as sent.
pub async fn stripe_webhook<U, S, P, R, G>(
    State(webhook_usecase): State<Arc<StripeWebhookUseCase<U, S, P, R, G>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookReceivedResponse>, WebhookError>
where
    U: UserRepository + 'static,
    S: SubscriptionRepository + 'static,
    P: ProductRepository + 'static,
    R: PriceRepository + 'static,
    G: StripeGateway + 'static,
{
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    webhook_usecase.handle_webhook(&body, signature).await?;

    Ok(Json(WebhookReceivedResponse { received: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        application::interfaces::stripe_gateway::{MockStripeGateway, SignatureError},
        domain::repositories::{
            prices::MockPriceRepository, products::MockProductRepository,
            subscriptions::MockSubscriptionRepository, users::MockUserRepository,
        },
    };
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use tower::ServiceExt;

    fn app(stripe: MockStripeGateway) -> Router {
        router(Arc::new(StripeWebhookUseCase::new(
            Arc::new(MockUserRepository::new()),
            Arc::new(MockSubscriptionRepository::new()),
            Arc::new(MockProductRepository::new()),
            Arc::new(MockPriceRepository::new()),
            Arc::new(stripe),
            false,
        )))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn irrelevant_event_is_acknowledged() {
        let raw = r#"{"id":"evt_1","type":"customer.created","data":{"object":{"id":"cus_1"}}}"#;
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_verify_and_parse_event()
            .withf(move |payload, signature| payload == raw.as_bytes() && signature == "t=1,v1=abc")
            .returning(move |_, _| Ok(serde_json::from_str(raw).unwrap()));

        let response = app(stripe)
            .oneshot(
                Request::post("/webhooks")
                    .header("stripe-signature", "t=1,v1=abc")
                    .header("content-type", "application/json")
                    .body(Body::from(raw))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!({ "received": true }));
    }

    #[tokio::test]
    async fn missing_signature_is_a_bad_request() {
        let response = app(MockStripeGateway::new())
            .oneshot(
                Request::post("/webhooks")
                    .body(Body::from(r#"{"id":"evt_1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            serde_json::json!("Webhook Error: request missing stripe-signature")
        );
    }

    #[tokio::test]
    async fn forged_signature_is_a_bad_request() {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_verify_and_parse_event()
            .returning(|_, _| Err(SignatureError::Mismatch));

        let response = app(stripe)
            .oneshot(
                Request::post("/webhooks")
                    .header("stripe-signature", "t=1,v1=forged")
                    .body(Body::from(r#"{"id":"evt_1","type":"product.created"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
