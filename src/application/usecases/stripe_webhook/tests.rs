use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use super::*;
use crate::{
    application::interfaces::stripe_gateway::{MockStripeGateway, SignatureError},
    domain::{
        entities::users::UserEntity,
        repositories::{
            prices::MockPriceRepository, products::MockProductRepository,
            subscriptions::MockSubscriptionRepository, users::MockUserRepository,
        },
        value_objects::enums::subscription_statuses::SubscriptionStatus,
    },
};

type TestUseCase = StripeWebhookUseCase<
    MockUserRepository,
    MockSubscriptionRepository,
    MockProductRepository,
    MockPriceRepository,
    MockStripeGateway,
>;

#[derive(Default)]
struct Mocks {
    users: MockUserRepository,
    subscriptions: MockSubscriptionRepository,
    products: MockProductRepository,
    prices: MockPriceRepository,
    stripe: MockStripeGateway,
    sync_billing_address: bool,
}

impl Mocks {
    fn delivering(event: StripeEvent) -> Self {
        let mut mocks = Self::default();
        mocks
            .stripe
            .expect_verify_and_parse_event()
            .withf(|_, signature| signature == "t=1,v1=abc")
            .returning(move |_, _| Ok(event.clone()));
        mocks
    }

    fn build(self) -> TestUseCase {
        StripeWebhookUseCase::new(
            Arc::new(self.users),
            Arc::new(self.subscriptions),
            Arc::new(self.products),
            Arc::new(self.prices),
            Arc::new(self.stripe),
            self.sync_billing_address,
        )
    }
}

fn event(event_type: &str, object: Value) -> StripeEvent {
    serde_json::from_value(json!({
        "id": "evt_1",
        "type": event_type,
        "created": 1700000000,
        "livemode": false,
        "data": { "object": object }
    }))
    .unwrap()
}

fn subscription_json(status: &str) -> Value {
    json!({
        "id": "sub_123",
        "customer": "cus_123",
        "status": status,
        "metadata": { "clientId": "user_1" },
        "cancel_at_period_end": false,
        "created": 1700000000,
        "current_period_start": 1700000000,
        "current_period_end": 1702592000,
        "ended_at": null,
        "cancel_at": null,
        "canceled_at": null,
        "default_payment_method": "pm_123",
        "items": { "data": [{
            "id": "si_1",
            "price": {
                "id": "price_1",
                "active": true,
                "unit_amount": 999,
                "currency": "usd",
                "type": "recurring",
                "recurring": { "interval": "month", "interval_count": 1 },
                "product": { "id": "prod_1", "active": true, "name": "Pro" }
            }
        }] }
    })
}

fn stripe_subscription(status: &str) -> StripeSubscription {
    serde_json::from_value(subscription_json(status)).unwrap()
}

fn stored_subscription() -> SubscriptionEntity {
    let mut record = SubscriptionEntity::new("sub_123");
    record.object_id = Some("obj_1".to_string());
    record.user_id = Some("user_1".to_string());
    record.status = SubscriptionStatus::Incomplete;
    record
}

fn user() -> UserEntity {
    UserEntity {
        id: "user_1".to_string(),
        email: Some("user@example.com".to_string()),
        subscription: None,
    }
}

fn checkout_event(client_reference_id: Option<&str>) -> StripeEvent {
    event(
        "checkout.session.completed",
        json!({
            "id": "cs_test_1",
            "mode": "subscription",
            "client_reference_id": client_reference_id,
            "customer": "cus_123",
            "subscription": "sub_123"
        }),
    )
}

#[tokio::test]
async fn missing_signature_is_rejected_without_touching_anything() {
    let err = Mocks::default()
        .build()
        .handle_webhook(b"{}", None)
        .await
        .unwrap_err();

    assert!(matches!(err, BillingError::Signature(_)));
}

#[tokio::test]
async fn forged_signature_is_rejected_without_mutation() {
    let mut mocks = Mocks::default();
    mocks
        .stripe
        .expect_verify_and_parse_event()
        .returning(|_, _| Err(SignatureError::Mismatch));

    let err = mocks
        .build()
        .handle_webhook(b"{\"id\":\"evt_1\"}", Some("t=1,v1=forged"))
        .await
        .unwrap_err();

    assert!(matches!(err, BillingError::Signature(_)));
    assert_eq!(err.status_code().as_u16(), 400);
}

#[tokio::test]
async fn irrelevant_events_are_acknowledged_without_mutation() {
    let outcome = Mocks::delivering(event("customer.created", json!({ "id": "cus_1" })))
        .build()
        .handle_webhook(b"{}", Some("t=1,v1=abc"))
        .await
        .unwrap();

    assert_eq!(outcome, WebhookOutcome::Ignored);
}

#[tokio::test]
async fn allow_listed_event_without_handler_is_an_error() {
    let mut usecase =
        Mocks::delivering(event("price.deleted", json!({ "id": "price_1" }))).build();
    usecase.handlers.remove("price.deleted");

    let err = usecase
        .handle_webhook(b"{}", Some("t=1,v1=abc"))
        .await
        .unwrap_err();

    assert!(matches!(err, BillingError::UnhandledEvent(ref event_type) if event_type == "price.deleted"));
}

#[tokio::test]
async fn product_created_inserts_a_new_product() {
    let mut mocks = Mocks::delivering(event(
        "product.created",
        json!({ "id": "prod_1", "active": true, "name": "Pro", "metadata": { "tier": "gold" } }),
    ));
    mocks
        .products
        .expect_find_by_stripe_id()
        .withf(|stripe_id| stripe_id == "prod_1")
        .returning(|_| Ok(None));
    mocks
        .products
        .expect_save()
        .withf(|product| {
            product.object_id.is_none()
                && product.stripe_id == "prod_1"
                && product.active
                && product.name == "Pro"
                && product.metadata.get("tier").map(String::as_str) == Some("gold")
        })
        .times(1)
        .returning(|product| Ok(product.clone()));

    let outcome = mocks
        .build()
        .handle_webhook(b"{}", Some("t=1,v1=abc"))
        .await
        .unwrap();

    assert_eq!(outcome, WebhookOutcome::Processed);
}

#[tokio::test]
async fn price_updated_overwrites_the_existing_price() {
    let mut mocks = Mocks::delivering(event(
        "price.updated",
        json!({
            "id": "price_1",
            "active": false,
            "unit_amount": 1999,
            "currency": "usd",
            "type": "recurring",
            "recurring": { "interval": "year", "interval_count": 1 }
        }),
    ));
    mocks.prices.expect_find_by_stripe_id().returning(|_| {
        let mut price = PriceEntity::new("price_1");
        price.object_id = Some("obj_price".to_string());
        price.active = true;
        Ok(Some(price))
    });
    mocks
        .prices
        .expect_save()
        .withf(|price| {
            price.object_id.as_deref() == Some("obj_price")
                && !price.active
                && price.unit_amount == Some(1999)
                && price.interval.as_deref() == Some("year")
                && price.interval_count == Some(1)
        })
        .times(1)
        .returning(|price| Ok(price.clone()));

    mocks
        .build()
        .handle_webhook(b"{}", Some("t=1,v1=abc"))
        .await
        .unwrap();
}

#[tokio::test]
async fn deleting_an_unknown_product_is_tolerated() {
    let mut mocks = Mocks::delivering(event("product.deleted", json!({ "id": "prod_gone" })));
    mocks.products.expect_find_by_stripe_id().returning(|_| Ok(None));

    let outcome = mocks
        .build()
        .handle_webhook(b"{}", Some("t=1,v1=abc"))
        .await
        .unwrap();

    assert_eq!(outcome, WebhookOutcome::Processed);
}

#[tokio::test]
async fn price_deleted_destroys_the_local_price() {
    let mut mocks = Mocks::delivering(event("price.deleted", json!({ "id": "price_1" })));
    mocks.prices.expect_find_by_stripe_id().returning(|_| {
        let mut price = PriceEntity::new("price_1");
        price.object_id = Some("obj_price".to_string());
        Ok(Some(price))
    });
    mocks
        .prices
        .expect_destroy()
        .withf(|price| price.object_id.as_deref() == Some("obj_price"))
        .times(1)
        .returning(|_| Ok(()));

    mocks
        .build()
        .handle_webhook(b"{}", Some("t=1,v1=abc"))
        .await
        .unwrap();
}

#[tokio::test]
async fn failed_destroy_is_reported() {
    let mut mocks = Mocks::delivering(event("product.deleted", json!({ "id": "prod_1" })));
    mocks
        .products
        .expect_find_by_stripe_id()
        .returning(|_| Ok(Some(ProductEntity::new("prod_1"))));
    mocks
        .products
        .expect_destroy()
        .returning(|_| Err(anyhow::anyhow!("parse returned 500")));

    let err = mocks
        .build()
        .handle_webhook(b"{}", Some("t=1,v1=abc"))
        .await
        .unwrap_err();

    assert!(matches!(err, BillingError::Upstream(_)));
}

#[tokio::test]
async fn checkout_completed_links_the_subscription_to_the_user() {
    let mut mocks = Mocks::delivering(checkout_event(Some("user_1")));
    mocks
        .stripe
        .expect_retrieve_subscription()
        .withf(|subscription_id| subscription_id == "sub_123")
        .times(1)
        .returning(|_| Ok(stripe_subscription("active")));
    mocks
        .users
        .expect_find_by_id()
        .withf(|user_id| user_id == "user_1")
        .returning(|_| Ok(Some(user())));
    mocks
        .subscriptions
        .expect_find_by_stripe_id()
        .returning(|_| Ok(None));
    mocks
        .subscriptions
        .expect_save()
        .withf(|record| {
            record.stripe_id == "sub_123"
                && record.user_id.as_deref() == Some("user_1")
                && record.status == SubscriptionStatus::Active
                && record.stripe_customer_id.as_deref() == Some("cus_123")
                && record.plan.as_deref() == Some("Pro")
        })
        .times(1)
        .returning(|record| Ok(record.clone()));

    let outcome = mocks
        .build()
        .handle_webhook(b"{}", Some("t=1,v1=abc"))
        .await
        .unwrap();

    assert_eq!(outcome, WebhookOutcome::Processed);
}

#[tokio::test]
async fn checkout_completed_requires_a_client_reference() {
    let err = Mocks::delivering(checkout_event(None))
        .build()
        .handle_webhook(b"{}", Some("t=1,v1=abc"))
        .await
        .unwrap_err();

    assert!(matches!(err, BillingError::Validation(_)));
}

#[tokio::test]
async fn checkout_completed_for_unknown_user_creates_nothing() {
    let mut mocks = Mocks::delivering(checkout_event(Some("user_missing")));
    mocks
        .stripe
        .expect_retrieve_subscription()
        .returning(|_| Ok(stripe_subscription("active")));
    mocks.users.expect_find_by_id().returning(|_| Ok(None));
    mocks
        .subscriptions
        .expect_find_by_stripe_id()
        .returning(|_| Ok(None));

    let err = mocks
        .build()
        .handle_webhook(b"{}", Some("t=1,v1=abc"))
        .await
        .unwrap_err();

    assert!(matches!(err, BillingError::NotFound(_)));
}

#[tokio::test]
async fn payment_mode_checkout_is_acknowledged_without_action() {
    let outcome = Mocks::delivering(event(
        "checkout.session.completed",
        json!({ "id": "cs_test_2", "mode": "payment", "client_reference_id": "user_1" }),
    ))
    .build()
    .handle_webhook(b"{}", Some("t=1,v1=abc"))
    .await
    .unwrap();

    assert_eq!(outcome, WebhookOutcome::Processed);
}

#[tokio::test]
async fn checkout_completed_syncs_billing_details_when_enabled() {
    let mut mocks = Mocks::delivering(checkout_event(Some("user_1")));
    mocks.sync_billing_address = true;
    mocks
        .stripe
        .expect_retrieve_subscription()
        .returning(|_| Ok(stripe_subscription("active")));
    mocks
        .stripe
        .expect_retrieve_payment_method()
        .withf(|payment_method_id| payment_method_id == "pm_123")
        .times(1)
        .returning(|_| {
            Ok(serde_json::from_value(json!({
                "id": "pm_123",
                "billing_details": {
                    "address": { "city": "Berlin", "country": "DE", "line1": "Main St 1" },
                    "phone": "+49301234567"
                }
            }))
            .unwrap())
        });
    mocks.users.expect_find_by_id().returning(|_| Ok(Some(user())));
    mocks
        .users
        .expect_update_billing_details()
        .withf(|user_id, details| {
            user_id == "user_1"
                && details.phone.as_deref() == Some("+49301234567")
                && details
                    .address
                    .as_ref()
                    .and_then(|address| address.city.as_deref())
                    == Some("Berlin")
        })
        .times(1)
        .returning(|_, _| Ok(()));
    mocks
        .subscriptions
        .expect_find_by_stripe_id()
        .returning(|_| Ok(None));
    mocks
        .subscriptions
        .expect_save()
        .returning(|record| Ok(record.clone()));

    mocks
        .build()
        .handle_webhook(b"{}", Some("t=1,v1=abc"))
        .await
        .unwrap();
}

#[tokio::test]
async fn subscription_deleted_without_local_record_creates_nothing() {
    let mut mocks = Mocks::delivering(event(
        "customer.subscription.deleted",
        subscription_json("canceled"),
    ));
    mocks
        .subscriptions
        .expect_find_by_stripe_id()
        .returning(|_| Ok(None));

    let err = mocks
        .build()
        .handle_webhook(b"{}", Some("t=1,v1=abc"))
        .await
        .unwrap_err();

    assert!(matches!(err, BillingError::NotFound(_)));
}

#[tokio::test]
async fn replayed_subscription_update_is_idempotent() {
    let saved: Arc<Mutex<Vec<SubscriptionEntity>>> = Arc::default();
    let store: Arc<Mutex<SubscriptionEntity>> = Arc::new(Mutex::new(stored_subscription()));

    let mut mocks = Mocks::delivering(event(
        "customer.subscription.updated",
        subscription_json("past_due"),
    ));
    let lookup = Arc::clone(&store);
    mocks
        .subscriptions
        .expect_find_by_stripe_id()
        .returning(move |_| Ok(Some(lookup.lock().unwrap().clone())));
    let writes = Arc::clone(&saved);
    let persisted = Arc::clone(&store);
    mocks
        .subscriptions
        .expect_save()
        .times(2)
        .returning(move |record| {
            writes.lock().unwrap().push(record.clone());
            *persisted.lock().unwrap() = record.clone();
            Ok(record.clone())
        });
    let usecase = mocks.build();

    usecase.handle_webhook(b"{}", Some("t=1,v1=abc")).await.unwrap();
    usecase.handle_webhook(b"{}", Some("t=1,v1=abc")).await.unwrap();

    let saved = saved.lock().unwrap();
    assert_eq!(saved[0], saved[1]);
    assert_eq!(saved[0].status, SubscriptionStatus::PastDue);
    assert_eq!(saved[0].user_id.as_deref(), Some("user_1"));
    assert_eq!(saved[0].object_id.as_deref(), Some("obj_1"));
}

#[tokio::test]
async fn subscription_event_without_expanded_product_is_fetched_again() {
    let mut payload = subscription_json("active");
    payload["items"]["data"][0]["price"]["product"] = json!("prod_1");

    let mut mocks = Mocks::delivering(event("customer.subscription.created", payload));
    mocks
        .stripe
        .expect_retrieve_subscription()
        .withf(|subscription_id| subscription_id == "sub_123")
        .times(1)
        .returning(|_| Ok(stripe_subscription("active")));
    mocks
        .subscriptions
        .expect_find_by_stripe_id()
        .returning(|_| Ok(Some(stored_subscription())));
    mocks
        .subscriptions
        .expect_save()
        .withf(|record| record.plan.as_deref() == Some("Pro"))
        .times(1)
        .returning(|record| Ok(record.clone()));

    mocks
        .build()
        .handle_webhook(b"{}", Some("t=1,v1=abc"))
        .await
        .unwrap();
}

#[tokio::test]
async fn invoice_payment_failed_refreshes_the_subscription() {
    let mut mocks = Mocks::delivering(event(
        "invoice.payment_failed",
        json!({
            "id": "in_1",
            "parent": { "subscription_details": { "subscription": "sub_123" } }
        }),
    ));
    mocks
        .stripe
        .expect_retrieve_subscription()
        .returning(|_| Ok(stripe_subscription("past_due")));
    mocks
        .subscriptions
        .expect_find_by_stripe_id()
        .returning(|_| Ok(Some(stored_subscription())));
    mocks
        .subscriptions
        .expect_save()
        .withf(|record| record.status == SubscriptionStatus::PastDue)
        .times(1)
        .returning(|record| Ok(record.clone()));

    mocks
        .build()
        .handle_webhook(b"{}", Some("t=1,v1=abc"))
        .await
        .unwrap();
}

#[tokio::test]
async fn invoice_without_subscription_is_acknowledged() {
    let outcome = Mocks::delivering(event("invoice.payment_failed", json!({ "id": "in_2" })))
        .build()
        .handle_webhook(b"{}", Some("t=1,v1=abc"))
        .await
        .unwrap();

    assert_eq!(outcome, WebhookOutcome::Processed);
}

#[tokio::test]
async fn malformed_object_is_a_validation_error() {
    let err = Mocks::delivering(event("price.created", json!({ "id": "price_1" })))
        .build()
        .handle_webhook(b"{}", Some("t=1,v1=abc"))
        .await
        .unwrap_err();

    assert!(matches!(err, BillingError::Validation(_)));
}
