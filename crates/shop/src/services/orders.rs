//! Order lifecycle: checkout, status changes, delivery, refunds, dashboard.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{error, info, instrument, warn};

use stockhub_core::{
    ContactHandle, Email, OrderId, OrderStatus, PaymentStatus, TransitionKind, UserId,
};

use crate::error::ShopError;
use crate::models::order::DEFAULT_DELIVERY_METHOD;
use crate::models::{
    AuditAction, AuditTarget, BillingDetails, BulkAction, BulkOutcome, Buyer, Checkout,
    DashboardStats, MAX_AMOUNT, NewAdminLogEntry, NewOrder, NewRefund, Order, OrderFilter,
    OrderStatusCounts, Page, Refund, ShippingDetails,
};
use crate::services::AuditLog;
use crate::store::{Store, StoreError};

/// Notes recorded when an admin verifies an order without writing any.
pub const DEFAULT_VERIFICATION_NOTES: &str =
    "Order verified and delivered - Accounts sent to customer email and Telegram";

/// Validate a checkout and turn it into an order ready to persist.
///
/// The total is the sum of `unit_price × quantity` unless the checkout
/// carries an explicit total.
///
/// # Errors
///
/// Returns `ShopError::Validation` describing the first rejected field.
pub fn prepare_order(checkout: &Checkout) -> Result<NewOrder, ShopError> {
    if checkout.items.is_empty() {
        return Err(ShopError::validation("order must contain at least one item"));
    }
    for item in &checkout.items {
        if item.product_name.trim().is_empty() {
            return Err(ShopError::validation("item name cannot be empty"));
        }
        if item.quantity <= 0 {
            return Err(ShopError::validation(format!(
                "quantity for {} must be positive",
                item.product_name
            )));
        }
        if item.unit_price < Decimal::ZERO {
            return Err(ShopError::validation(format!(
                "price for {} cannot be negative",
                item.product_name
            )));
        }
        if item.unit_price > MAX_AMOUNT {
            return Err(ShopError::validation(format!(
                "price for {} is out of range",
                item.product_name
            )));
        }
    }

    let method = checkout.payment.method.trim();
    let reference = checkout.payment.reference.trim();
    if method.is_empty() {
        return Err(ShopError::validation("payment method is required"));
    }
    if reference.is_empty() {
        return Err(ShopError::validation("payment reference is required"));
    }

    let total_amount = match checkout.explicit_total {
        Some(total) if total < Decimal::ZERO => {
            return Err(ShopError::validation("total cannot be negative"));
        }
        Some(total) => total,
        None => checkout
            .items
            .iter()
            .try_fold(Decimal::ZERO, |sum, item| {
                item.line_total().and_then(|line| sum.checked_add(line))
            })
            .ok_or_else(|| ShopError::validation("amount out of range"))?,
    };
    if total_amount > MAX_AMOUNT {
        return Err(ShopError::validation("amount out of range"));
    }

    let (user_id, guest_email, contact_handle) = match &checkout.buyer {
        Buyer::Registered { user_id } => (Some(*user_id), None, None),
        Buyer::Guest {
            email,
            contact_handle,
        } => {
            let email = Email::parse(email)
                .map_err(|e| ShopError::validation(format!("invalid email: {e}")))?;
            let handle = ContactHandle::parse(contact_handle)
                .map_err(|e| ShopError::validation(format!("invalid contact handle: {e}")))?;
            (None, Some(String::from(email)), Some(handle.as_str().to_owned()))
        }
    };

    let delivery_method = checkout
        .delivery_method
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_DELIVERY_METHOD);

    Ok(NewOrder {
        user_id,
        guest_email: guest_email.clone(),
        shipping: ShippingDetails {
            contact_handle: contact_handle.clone(),
            delivery_method: delivery_method.to_owned(),
        },
        billing: BillingDetails {
            contact_handle,
            email: guest_email,
            payment_method: method.to_owned(),
            transaction_id: reference.to_owned(),
        },
        items: checkout.items.clone(),
        total_amount,
        payment_reference: reference.to_owned(),
    })
}

/// Order lifecycle manager.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    audit: AuditLog,
}

impl OrderService {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, audit: AuditLog) -> Self {
        Self { store, audit }
    }

    /// Validate and persist a checkout together with its stock reservations.
    ///
    /// # Errors
    ///
    /// - `Validation` if the checkout is malformed (nothing is written)
    /// - `NotFound` if an item references an unknown product
    /// - `Conflict` if a product is not sellable or lacks stock
    #[instrument(skip(self, checkout), fields(items = checkout.items.len()))]
    pub async fn create_order(&self, checkout: &Checkout) -> Result<Order, ShopError> {
        let new_order = prepare_order(checkout)?;
        let order = self
            .store
            .create_order(&new_order)
            .await
            .map_err(|e| log_write_failure("create_order", e))?;

        info!(
            order_id = %order.id,
            total = %order.total_amount,
            items = order.items.len(),
            "Order created"
        );
        Ok(order)
    }

    /// # Errors
    ///
    /// Returns `ShopError::NotFound` for an unknown id.
    pub async fn get_order(&self, id: OrderId) -> Result<Order, ShopError> {
        self.store
            .get_order(id)
            .await?
            .ok_or_else(|| ShopError::NotFound(format!("order {id}")))
    }

    /// Overwrite the status. Transitions out of a terminal state are
    /// allowed as admin overrides and flagged in the audit entry.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` for an unknown id.
    #[instrument(skip(self), fields(order_id = %id, status = %status))]
    pub async fn set_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        admin: Option<UserId>,
    ) -> Result<Order, ShopError> {
        let change = self.store.set_order_status(id, status).await?;
        let kind = change.previous.check_transition(status);
        if kind == TransitionKind::Override {
            warn!(from = %change.previous, to = %status, "Order status overridden");
        } else {
            info!(from = %change.previous, to = %status, "Order status updated");
        }

        self.audit
            .record(NewAdminLogEntry::new(
                admin,
                AuditAction::UpdateStatus,
                AuditTarget::Order,
                id.get(),
                json!({
                    "from": change.previous,
                    "to": status,
                    "override": kind == TransitionKind::Override,
                }),
            ))
            .await?;
        Ok(change.order)
    }

    /// Mark the order delivered, re-stamping the delivery date. Calling it
    /// again on a delivered order only refreshes the date and notes.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` for an unknown id.
    #[instrument(skip(self, notes), fields(order_id = %id))]
    pub async fn verify_delivery(
        &self,
        id: OrderId,
        notes: Option<&str>,
        admin: Option<UserId>,
    ) -> Result<Order, ShopError> {
        let notes = notes
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_VERIFICATION_NOTES);
        let order = self.store.mark_delivered(id, Some(notes)).await?;
        info!("Order verified and delivered");

        self.audit
            .record(NewAdminLogEntry::new(
                admin,
                AuditAction::VerifyOrder,
                AuditTarget::Order,
                id.get(),
                json!({
                    "verification_notes": notes,
                    "delivered_at": order.delivery_date,
                }),
            ))
            .await?;
        Ok(order)
    }

    /// Apply `action` to every id independently. Orders that cannot be
    /// updated are reported in `failed`; one aggregate audit entry is written
    /// when anything changed.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Validation` for an empty id list, or the audit
    /// write error.
    #[instrument(skip(self, ids), fields(action = action.as_str(), count = ids.len()))]
    pub async fn bulk_action(
        &self,
        ids: &[OrderId],
        action: BulkAction,
        admin: Option<UserId>,
    ) -> Result<BulkOutcome, ShopError> {
        if ids.is_empty() {
            return Err(ShopError::validation("no orders selected"));
        }

        let mut outcome = BulkOutcome::default();
        let mut updated = Vec::with_capacity(ids.len());
        for &id in ids {
            let result = match action {
                BulkAction::Deliver => self.store.mark_delivered(id, None).await.map(|_| ()),
                BulkAction::Cancel => self
                    .store
                    .set_order_status(id, action.target_status())
                    .await
                    .map(|_| ()),
            };
            match result {
                Ok(()) => {
                    outcome.succeeded += 1;
                    updated.push(id);
                }
                Err(e) => {
                    warn!(order_id = %id, error = %e, "Bulk action skipped order");
                    outcome.failed.push(id);
                }
            }
        }

        if outcome.succeeded > 0 {
            self.audit
                .record(NewAdminLogEntry::new(
                    admin,
                    AuditAction::BulkAction,
                    AuditTarget::Orders,
                    None::<i32>,
                    json!({
                        "action": action.as_str(),
                        "order_ids": join_ids(&updated),
                        "failed_ids": join_ids(&outcome.failed),
                        "updated_count": outcome.succeeded,
                    }),
                ))
                .await?;
        }

        info!(
            succeeded = outcome.succeeded,
            failed = outcome.failed.len(),
            "Bulk action finished"
        );
        Ok(outcome)
    }

    /// Record a payment status change reported by the payment provider.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` for an unknown id.
    #[instrument(skip(self), fields(order_id = %id, status = %status))]
    pub async fn record_payment(
        &self,
        id: OrderId,
        status: PaymentStatus,
        payment_intent_id: Option<&str>,
        admin: Option<UserId>,
    ) -> Result<Order, ShopError> {
        let order = self
            .store
            .set_payment_status(id, status, payment_intent_id)
            .await?;
        info!("Payment status updated");

        self.audit
            .record(NewAdminLogEntry::new(
                admin,
                AuditAction::UpdatePayment,
                AuditTarget::Order,
                id.get(),
                json!({
                    "payment_status": status,
                    "payment_intent_id": payment_intent_id,
                }),
            ))
            .await?;
        Ok(order)
    }

    /// Mark the order refunded and book the refund as one unit.
    ///
    /// # Errors
    ///
    /// - `Validation` if `amount` is not positive
    /// - `NotFound` for an unknown order
    /// - `TransactionFailure` if the write was rolled back
    #[instrument(skip(self, reason), fields(order_id = %id, amount = %amount))]
    pub async fn process_refund(
        &self,
        id: OrderId,
        amount: Decimal,
        reason: &str,
        admin: Option<UserId>,
        payment_reference: Option<&str>,
    ) -> Result<Refund, ShopError> {
        if amount <= Decimal::ZERO {
            return Err(ShopError::validation("refund amount must be positive"));
        }
        // Fail with NotFound before opening a transaction.
        self.get_order(id).await?;

        let refund = self
            .store
            .record_refund(&NewRefund {
                order_id: id,
                admin_id: admin,
                amount,
                reason: reason.trim().to_owned(),
                payment_reference: payment_reference.map(str::to_owned),
            })
            .await
            .map_err(|e| log_write_failure("process_refund", e))?;
        info!(refund_id = %refund.id, "Refund processed");

        self.audit
            .record(NewAdminLogEntry::new(
                admin,
                AuditAction::Refund,
                AuditTarget::Order,
                id.get(),
                json!({
                    "refund_id": refund.id,
                    "amount": refund.amount,
                    "reason": refund.reason,
                    "payment_reference": refund.payment_reference,
                }),
            ))
            .await?;
        Ok(refund)
    }

    /// Refunds booked against an order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ShopError` if the store fails.
    pub async fn refunds(&self, id: OrderId) -> Result<Vec<Refund>, ShopError> {
        Ok(self.store.refunds_for(id).await?)
    }

    /// # Errors
    ///
    /// Returns `ShopError` if the store fails.
    pub async fn list_orders(
        &self,
        filter: &OrderFilter,
        page: Page,
    ) -> Result<Vec<Order>, ShopError> {
        Ok(self.store.list_orders(filter, page).await?)
    }

    /// # Errors
    ///
    /// Returns `ShopError` if the store fails.
    pub async fn dashboard_stats(&self) -> Result<DashboardStats, ShopError> {
        Ok(self.store.order_stats(Utc::now()).await?)
    }

    /// Revenue of delivered, unrefunded orders created in `[since, until)`.
    /// Open bounds are unbounded.
    ///
    /// # Errors
    ///
    /// - `Validation` if `since` is not before `until`
    /// - `Store` if the store fails
    pub async fn revenue_between(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Decimal, ShopError> {
        if since.zip(until).is_some_and(|(since, until)| since >= until) {
            return Err(ShopError::validation("revenue range start must precede its end"));
        }
        Ok(self.store.revenue_between(since, until).await?)
    }

    /// # Errors
    ///
    /// Returns `ShopError` if the store fails.
    pub async fn order_counts_by_status(&self) -> Result<OrderStatusCounts, ShopError> {
        Ok(self.store.order_counts_by_status().await?)
    }
}

fn join_ids(ids: &[OrderId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Log rolled-back writes at `error` before converting.
fn log_write_failure(operation: &'static str, err: StoreError) -> ShopError {
    if matches!(err, StoreError::Transaction(_)) {
        error!(operation, error = %err, "Transaction rolled back");
    }
    err.into()
}
