use std::collections::HashMap;

use anyhow::{Result, bail};

/// Event types the webhook acts on. Everything else is acknowledged and ignored.
pub const RELEVANT_EVENTS: [&str; 11] = [
    "product.created",
    "product.updated",
    "product.deleted",
    "price.created",
    "price.updated",
    "price.deleted",
    "checkout.session.completed",
    "customer.subscription.created",
    "customer.subscription.updated",
    "customer.subscription.deleted",
    "invoice.payment_failed",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventHandler {
    UpsertProduct,
    DeleteProduct,
    UpsertPrice,
    DeletePrice,
    CheckoutCompleted,
    SubscriptionChanged,
    InvoicePaymentFailed,
}

pub type DispatchTable = HashMap<&'static str, EventHandler>;

pub fn is_relevant_event(event_type: &str) -> bool {
    RELEVANT_EVENTS.contains(&event_type)
}

pub fn dispatch_table() -> DispatchTable {
    HashMap::from([
        ("product.created", EventHandler::UpsertProduct),
        ("product.updated", EventHandler::UpsertProduct),
        ("product.deleted", EventHandler::DeleteProduct),
        ("price.created", EventHandler::UpsertPrice),
        ("price.updated", EventHandler::UpsertPrice),
        ("price.deleted", EventHandler::DeletePrice),
        ("checkout.session.completed", EventHandler::CheckoutCompleted),
        ("customer.subscription.created", EventHandler::SubscriptionChanged),
        ("customer.subscription.updated", EventHandler::SubscriptionChanged),
        ("customer.subscription.deleted", EventHandler::SubscriptionChanged),
        ("invoice.payment_failed", EventHandler::InvoicePaymentFailed),
    ])
}

/// Checks that the allow-list and the dispatch table describe the same events.
///
/// Run at startup so an allow-listed event can never reach the dispatcher without
/// a handler.
pub fn verify_dispatch_table(table: &DispatchTable) -> Result<()> {
    let unhandled: Vec<&str> = RELEVANT_EVENTS
        .iter()
        .copied()
        .filter(|event_type| !table.contains_key(event_type))
        .collect();
    if !unhandled.is_empty() {
        bail!("relevant events without a handler: {}", unhandled.join(", "));
    }

    let mut unlisted: Vec<&str> = table
        .keys()
        .copied()
        .filter(|event_type| !is_relevant_event(event_type))
        .collect();
    if !unlisted.is_empty() {
        unlisted.sort_unstable();
        bail!("handlers for events outside the allow-list: {}", unlisted.join(", "));
    }

    Ok(())
}
