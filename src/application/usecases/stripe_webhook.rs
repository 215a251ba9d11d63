use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::{
    application::{
        errors::{BillingError, UseCaseResult},
        interfaces::stripe_gateway::StripeGateway,
    },
    domain::{
        entities::{
            prices::PriceEntity, products::ProductEntity, subscriptions::SubscriptionEntity,
            users::UserBillingDetails,
        },
        repositories::{
            prices::PriceRepository, products::ProductRepository,
            subscriptions::SubscriptionRepository, users::UserRepository,
        },
        value_objects::{
            stripe_events::{DispatchTable, EventHandler, dispatch_table, is_relevant_event},
            stripe_objects::{
                Expandable, StripeCheckoutSession, StripeEvent, StripeInvoice, StripeObjectRef,
                StripePrice, StripeProduct, StripeSubscription,
            },
        },
    },
};

/// Metadata key set on subscriptions at checkout to carry the user id.
pub const CLIENT_ID_METADATA_KEY: &str = "clientId";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed,
    /// Verified, but not an event type this service acts on.
    Ignored,
}

pub struct StripeWebhookUseCase<U, S, P, R, G>
where
    U: UserRepository + 'static,
    S: SubscriptionRepository + 'static,
    P: ProductRepository + 'static,
    R: PriceRepository + 'static,
    G: StripeGateway + 'static,
{
    user_repo: Arc<U>,
    subscription_repo: Arc<S>,
    product_repo: Arc<P>,
    price_repo: Arc<R>,
    stripe_client: Arc<G>,
    handlers: DispatchTable,
    sync_billing_address: bool,
}

impl<U, S, P, R, G> StripeWebhookUseCase<U, S, P, R, G>
where
    U: UserRepository + 'static,
    S: SubscriptionRepository + 'static,
    P: ProductRepository + 'static,
    R: PriceRepository + 'static,
    G: StripeGateway + 'static,
{
    pub fn new(
        user_repo: Arc<U>,
        subscription_repo: Arc<S>,
        product_repo: Arc<P>,
        price_repo: Arc<R>,
        stripe_client: Arc<G>,
        sync_billing_address: bool,
    ) -> Self {
        Self {
            user_repo,
            subscription_repo,
            product_repo,
            price_repo,
            stripe_client,
            handlers: dispatch_table(),
            sync_billing_address,
        }
    }

    /// Verifies a webhook delivery over its raw bytes and reconciles it into the data store.
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> UseCaseResult<WebhookOutcome> {
        let signature = signature.filter(|value| !value.is_empty()).ok_or_else(|| {
            warn!("stripe_webhook: request missing stripe-signature");
            BillingError::Signature("request missing stripe-signature".to_string())
        })?;

        let event = self
            .stripe_client
            .verify_and_parse_event(payload, signature)
            .map_err(|err| {
                warn!(error = %err, "stripe_webhook: signature verification failed");
                BillingError::Signature(err.to_string())
            })?;

        info!(
            event_id = %event.id,
            event_type = %event.type_,
            "stripe_webhook: received event"
        );

        if !is_relevant_event(&event.type_) {
            debug!(event_type = %event.type_, "stripe_webhook: ignoring event type");
            return Ok(WebhookOutcome::Ignored);
        }

        let handler = self.handlers.get(event.type_.as_str()).copied().ok_or_else(|| {
            error!(event_type = %event.type_, "stripe_webhook: relevant event has no handler");
            BillingError::UnhandledEvent(event.type_.clone())
        })?;

        match handler {
            EventHandler::UpsertProduct => self.upsert_product(&event).await?,
            EventHandler::DeleteProduct => self.delete_product(&event).await?,
            EventHandler::UpsertPrice => self.upsert_price(&event).await?,
            EventHandler::DeletePrice => self.delete_price(&event).await?,
            EventHandler::CheckoutCompleted => self.checkout_completed(&event).await?,
            EventHandler::SubscriptionChanged => self.subscription_changed(&event).await?,
            EventHandler::InvoicePaymentFailed => self.invoice_payment_failed(&event).await?,
        }

        info!(
            event_id = %event.id,
            event_type = %event.type_,
            "stripe_webhook: event processed"
        );
        Ok(WebhookOutcome::Processed)
    }

    async fn upsert_product(&self, event: &StripeEvent) -> UseCaseResult<()> {
        let product: StripeProduct = data_object(event, "product")?;

        let mut record = self
            .product_repo
            .find_by_stripe_id(&product.id)
            .await
            .map_err(|err| upstream("product lookup failed", &product.id, err))?
            .unwrap_or_else(|| ProductEntity::new(&product.id));
        record.apply_stripe_product(&product);

        self.product_repo
            .save(&record)
            .await
            .map_err(|err| upstream("product save failed", &product.id, err))?;
        info!(stripe_id = %product.id, active = product.active, "stripe_webhook: product upserted");
        Ok(())
    }

    async fn delete_product(&self, event: &StripeEvent) -> UseCaseResult<()> {
        let product: StripeObjectRef = data_object(event, "product")?;

        let Some(record) = self
            .product_repo
            .find_by_stripe_id(&product.id)
            .await
            .map_err(|err| upstream("product lookup failed", &product.id, err))?
        else {
            warn!(stripe_id = %product.id, "stripe_webhook: deleted product not found locally");
            return Ok(());
        };

        self.product_repo
            .destroy(&record)
            .await
            .map_err(|err| upstream("product destroy failed", &product.id, err))?;
        info!(stripe_id = %product.id, "stripe_webhook: product deleted");
        Ok(())
    }

    async fn upsert_price(&self, event: &StripeEvent) -> UseCaseResult<()> {
        let price: StripePrice = data_object(event, "price")?;

        let mut record = self
            .price_repo
            .find_by_stripe_id(&price.id)
            .await
            .map_err(|err| upstream("price lookup failed", &price.id, err))?
            .unwrap_or_else(|| PriceEntity::new(&price.id));
        record.apply_stripe_price(&price);

        self.price_repo
            .save(&record)
            .await
            .map_err(|err| upstream("price save failed", &price.id, err))?;
        info!(stripe_id = %price.id, price_type = %price.type_, "stripe_webhook: price upserted");
        Ok(())
    }

    async fn delete_price(&self, event: &StripeEvent) -> UseCaseResult<()> {
        let price: StripeObjectRef = data_object(event, "price")?;

        let Some(record) = self
            .price_repo
            .find_by_stripe_id(&price.id)
            .await
            .map_err(|err| upstream("price lookup failed", &price.id, err))?
        else {
            warn!(stripe_id = %price.id, "stripe_webhook: deleted price not found locally");
            return Ok(());
        };

        self.price_repo
            .destroy(&record)
            .await
            .map_err(|err| upstream("price destroy failed", &price.id, err))?;
        info!(stripe_id = %price.id, "stripe_webhook: price deleted");
        Ok(())
    }

    /// Creates or refreshes the local subscription and links it to the paying user.
    async fn checkout_completed(&self, event: &StripeEvent) -> UseCaseResult<()> {
        let session: StripeCheckoutSession = data_object(event, "checkout session")?;

        if session.mode.as_deref() != Some("subscription") {
            debug!(
                session_id = %session.id,
                mode = ?session.mode,
                "stripe_webhook: checkout session is not a subscription"
            );
            return Ok(());
        }

        let user_id = session
            .client_reference_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                warn!(session_id = %session.id, "stripe_webhook: checkout session has no client reference");
                BillingError::Validation("checkout session has no client_reference_id".to_string())
            })?;
        let subscription_ref = session.subscription.ok_or_else(|| {
            warn!(session_id = %session.id, "stripe_webhook: checkout session has no subscription");
            BillingError::Validation("session did not contain subscription data".to_string())
        })?;

        let subscription = self.resolve_subscription(subscription_ref).await?;

        let (user, existing) = tokio::try_join!(
            self.user_repo.find_by_id(&user_id),
            self.subscription_repo.find_by_stripe_id(&subscription.id),
        )
        .map_err(|err| upstream("checkout lookups failed", &subscription.id, err))?;

        if user.is_none() {
            warn!(%user_id, stripe_id = %subscription.id, "stripe_webhook: checkout user not found");
            return Err(BillingError::NotFound(format!(
                "user not found in database with id {user_id}"
            )));
        }

        let mut record = existing.unwrap_or_else(|| SubscriptionEntity::new(&subscription.id));
        record.apply_stripe_subscription(&subscription);
        record.user_id = Some(user_id.clone());

        self.subscription_repo
            .save(&record)
            .await
            .map_err(|err| upstream("subscription save failed", &subscription.id, err))?;
        info!(
            %user_id,
            stripe_id = %subscription.id,
            status = %subscription.status,
            "stripe_webhook: subscription linked to user"
        );

        if self.sync_billing_address {
            self.sync_billing_details(&user_id, &subscription).await?;
        }
        Ok(())
    }

    async fn subscription_changed(&self, event: &StripeEvent) -> UseCaseResult<()> {
        let subscription: StripeSubscription = data_object(event, "subscription")?;
        let subscription = self
            .resolve_subscription(Expandable::Object(Box::new(subscription)))
            .await?;

        let record = self.refresh_subscription(&subscription).await?;

        if self.sync_billing_address && event.type_ == "customer.subscription.updated" {
            let user_id = record
                .user_id
                .clone()
                .or_else(|| subscription.metadata.get(CLIENT_ID_METADATA_KEY).cloned());
            match user_id {
                Some(user_id) => self.sync_billing_details(&user_id, &subscription).await?,
                None => warn!(
                    stripe_id = %subscription.id,
                    "stripe_webhook: no user linked, skipping billing details"
                ),
            }
        }
        Ok(())
    }

    async fn invoice_payment_failed(&self, event: &StripeEvent) -> UseCaseResult<()> {
        let invoice: StripeInvoice = data_object(event, "invoice")?;

        let Some(subscription_ref) = invoice.subscription_ref() else {
            info!(invoice_id = %invoice.id, "stripe_webhook: failed invoice has no subscription");
            return Ok(());
        };

        let subscription = self.resolve_subscription(subscription_ref).await?;
        self.refresh_subscription(&subscription).await?;
        warn!(
            invoice_id = %invoice.id,
            stripe_id = %subscription.id,
            status = %subscription.status,
            "stripe_webhook: invoice payment failed"
        );
        Ok(())
    }

    /// Overwrites an existing local subscription; records are only created at checkout.
    async fn refresh_subscription(
        &self,
        subscription: &StripeSubscription,
    ) -> UseCaseResult<SubscriptionEntity> {
        let mut record = self
            .subscription_repo
            .find_by_stripe_id(&subscription.id)
            .await
            .map_err(|err| upstream("subscription lookup failed", &subscription.id, err))?
            .ok_or_else(|| {
                warn!(stripe_id = %subscription.id, "stripe_webhook: subscription not found locally");
                BillingError::NotFound(format!("subscription {} not found", subscription.id))
            })?;

        record.apply_stripe_subscription(subscription);
        let saved = self
            .subscription_repo
            .save(&record)
            .await
            .map_err(|err| upstream("subscription save failed", &subscription.id, err))?;
        info!(
            stripe_id = %subscription.id,
            status = %subscription.status,
            "stripe_webhook: subscription updated"
        );
        Ok(saved)
    }

    /// Full subscription with its product expanded. Objects that already carry the
    /// product are used as-is; anything else is fetched again.
    async fn resolve_subscription(
        &self,
        subscription: Expandable<StripeSubscription>,
    ) -> UseCaseResult<StripeSubscription> {
        let subscription_id = match subscription {
            Expandable::Object(object) if object.product_name().is_some() => return Ok(*object),
            other => other.id().to_string(),
        };

        debug!(stripe_id = %subscription_id, "stripe_webhook: retrieving subscription");
        self.stripe_client
            .retrieve_subscription(&subscription_id)
            .await
            .map_err(|err| upstream("subscription retrieval failed", &subscription_id, err))
    }

    async fn sync_billing_details(
        &self,
        user_id: &str,
        subscription: &StripeSubscription,
    ) -> UseCaseResult<()> {
        let payment_method = match &subscription.default_payment_method {
            None => {
                warn!(
                    user_id,
                    stripe_id = %subscription.id,
                    "stripe_webhook: subscription has no default payment method"
                );
                return Ok(());
            }
            Some(Expandable::Object(payment_method)) => (**payment_method).clone(),
            Some(Expandable::Id(payment_method_id)) => self
                .stripe_client
                .retrieve_payment_method(payment_method_id)
                .await
                .map_err(|err| upstream("payment method retrieval failed", payment_method_id, err))?,
        };

        let billing_details = UserBillingDetails {
            address: payment_method.billing_details.address,
            phone: payment_method.billing_details.phone,
        };
        self.user_repo
            .update_billing_details(user_id, &billing_details)
            .await
            .map_err(|err| upstream("billing details update failed", user_id, err))?;
        info!(user_id, "stripe_webhook: billing details synced");
        Ok(())
    }
}

fn data_object<T: serde::de::DeserializeOwned>(event: &StripeEvent, kind: &str) -> UseCaseResult<T> {
    event.data_object().map_err(|err| {
        warn!(event_id = %event.id, error = %err, "stripe_webhook: malformed {kind} payload");
        BillingError::Validation(format!("invalid {kind} payload: {err}"))
    })
}

fn upstream(message: &'static str, stripe_id: &str, err: anyhow::Error) -> BillingError {
    error!(stripe_id, error = ?err, "stripe_webhook: {message}");
    BillingError::Upstream(err)
}

#[cfg(test)]
mod tests;
