use crate::config::DeliverySettings;
use crate::domain::delivery::{DeliveredAsset, Delivery, DeliverySummary, Invoice};
use crate::domain::order::{Order, OrderItem, OrderStatus};
use crate::domain::ports::{Backend, DynamicFulfillerRef, NotifierRef};
use crate::domain::product::{ClaimRequest, DeliveryType, Product, SerialKey, Variant};
use crate::domain::webhook::DynamicPayload;
use crate::error::{PipelineError, Result};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

pub const ALREADY_DELIVERED_MESSAGE: &str = "Order already has deliveries";

/// Statuses from which an admin may re-run delivery.
const RETRIGGERABLE: [OrderStatus; 3] = [
    OrderStatus::Paid,
    OrderStatus::Delivered,
    OrderStatus::Completed,
];

#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct DeliveryReport {
    pub delivery: Delivery,
    pub invoice: Invoice,
    /// Items whose dynamic webhook failed.
    pub failed_items: Vec<Uuid>,
    pub email_sent: bool,
}

#[derive(Debug, Serialize, PartialEq, Clone)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// The order was not `paid`; nothing was written.
    Skipped { status: OrderStatus },
    /// Another delivery for this order holds the lock.
    InProgress,
    /// A delivery row exists already; nothing was written.
    AlreadyDelivered,
    Delivered(DeliveryReport),
}

#[derive(Debug, Serialize, PartialEq, Clone)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RetriggerOutcome {
    AlreadyDelivered { message: String },
    /// A delivery for this order is running right now.
    InProgress,
    Triggered(DeliveryOutcome),
}

/// An order item resolved against the catalog.
struct Line<'a> {
    item: &'a OrderItem,
    product: Product,
    variant: Option<Variant>,
}

/// Turns a paid order into a delivered one.
///
/// Each item is handed over according to its product's [`DeliveryType`]. Exactly one
/// delivery row and one invoice are written per order. Both delivery and retrigger
/// run under the store's per-order delivery lock, and the order is moved with a
/// `paid -> delivered` compare-and-set.
pub struct DeliveryOrchestrator {
    backend: Backend,
    fulfiller: DynamicFulfillerRef,
    notifier: NotifierRef,
    settings: DeliverySettings,
}

impl DeliveryOrchestrator {
    pub fn new(
        backend: Backend,
        fulfiller: DynamicFulfillerRef,
        notifier: NotifierRef,
        settings: DeliverySettings,
    ) -> Self {
        Self {
            backend,
            fulfiller,
            notifier,
            settings,
        }
    }

    async fn load_order(&self, order_id: Uuid) -> Result<Order> {
        self.backend
            .orders
            .get(order_id)
            .await?
            .ok_or_else(|| PipelineError::not_found("order", order_id))
    }

    async fn release_lock(&self, order_id: Uuid) {
        if let Err(e) = self.backend.orders.unlock_delivery(order_id).await {
            tracing::error!(order_id = %order_id, error = %e, "Failed to release delivery lock");
        }
    }

    pub async fn deliver_product(&self, order_id: Uuid) -> Result<DeliveryOutcome> {
        let order = self.load_order(order_id).await?;
        if order.status != OrderStatus::Paid {
            tracing::info!(
                order_id = %order_id,
                status = %order.status,
                "Order is not paid, skipping delivery"
            );
            return Ok(DeliveryOutcome::Skipped {
                status: order.status,
            });
        }

        if !self.backend.orders.try_lock_delivery(order_id).await? {
            tracing::warn!(order_id = %order_id, "Delivery already in progress");
            return Ok(DeliveryOutcome::InProgress);
        }
        let result = self.deliver_locked(order_id).await;
        self.release_lock(order_id).await;
        result
    }

    /// Runs the delivery. The caller holds the order's delivery lock.
    async fn deliver_locked(&self, order_id: Uuid) -> Result<DeliveryOutcome> {
        // Re-read under the lock; a concurrent run may have finished in between.
        let order = self.load_order(order_id).await?;
        if order.status != OrderStatus::Paid {
            return Ok(DeliveryOutcome::Skipped {
                status: order.status,
            });
        }
        if !self
            .backend
            .fulfillment
            .deliveries_for(order_id)
            .await?
            .is_empty()
        {
            tracing::warn!(order_id = %order_id, "Paid order already has a delivery row");
            return Ok(DeliveryOutcome::AlreadyDelivered);
        }

        let lines = self.resolve_lines(&order).await?;
        let mut assets = Vec::new();
        let mut summary = DeliverySummary::default();
        let mut failed_items = Vec::new();

        // Claim every serial before any webhook call or stock change.
        let mut reused = HashSet::new();
        for line in lines
            .iter()
            .filter(|l| l.product.delivery_type == DeliveryType::Serials)
        {
            let claimed = self.deliver_serials(&order, line, &mut reused).await?;
            assets.extend(claimed);
        }

        for line in &lines {
            match line.product.delivery_type {
                DeliveryType::Serials => {}
                DeliveryType::Dynamic => {
                    match self.deliver_dynamic(&order, line).await {
                        Ok(delivered) => assets.extend(delivered),
                        Err(e) => {
                            tracing::warn!(
                                order_id = %order.id,
                                product_id = %line.product.id,
                                error = %e,
                                "Dynamic delivery failed"
                            );
                            summary.delivery_failure = true;
                            failed_items.push(line.item.id);
                        }
                    }
                    self.decrement_finite_stock(line).await?;
                }
                DeliveryType::Service => {
                    summary.has_service = true;
                    self.decrement_finite_stock(line).await?;
                }
            }
        }

        summary.has_assets = !assets.is_empty();
        let delivery = Delivery::new(order.id, assets, summary);
        self.backend
            .fulfillment
            .insert_delivery(delivery.clone())
            .await?;

        let moved = self
            .backend
            .orders
            .transition(order.id, &[OrderStatus::Paid], OrderStatus::Delivered)
            .await?;
        if !moved {
            tracing::warn!(order_id = %order.id, "Order left 'paid' during delivery");
        }

        let invoice = Invoice::paid(order.id, Utc::now());
        self.backend
            .fulfillment
            .insert_invoice(invoice.clone())
            .await?;

        let email_sent = self.notify(&order, &delivery.assets).await;

        tracing::info!(
            order_id = %order.id,
            readable_id = %order.readable_id,
            assets = delivery.assets.len(),
            delivery_type = ?delivery.delivery_type,
            invoice = %invoice.invoice_number,
            "Order delivered"
        );

        Ok(DeliveryOutcome::Delivered(DeliveryReport {
            delivery,
            invoice,
            failed_items,
            email_sent,
        }))
    }

    async fn resolve_lines<'a>(&self, order: &'a Order) -> Result<Vec<Line<'a>>> {
        let mut lines = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let product = self
                .backend
                .catalog
                .get_product(item.product_id)
                .await?
                .ok_or_else(|| PipelineError::not_found("product", item.product_id))?;
            let variant = match item.variant_id {
                Some(variant_id) => Some(
                    self.backend
                        .catalog
                        .get_variant(variant_id)
                        .await?
                        .ok_or_else(|| PipelineError::not_found("variant", variant_id))?,
                ),
                None => None,
            };
            lines.push(Line {
                item,
                product,
                variant,
            });
        }
        Ok(lines)
    }

    /// Claims serials for one line, reusing any this order already holds from an aborted run.
    async fn deliver_serials(
        &self,
        order: &Order,
        line: &Line<'_>,
        reused: &mut HashSet<Uuid>,
    ) -> Result<Vec<DeliveredAsset>> {
        let wanted = line.item.quantity as usize;
        let mut serials: Vec<SerialKey> = self
            .backend
            .inventory
            .claimed_serials(line.product.id, order.id)
            .await?
            .into_iter()
            .filter(|s| s.variant_id == line.item.variant_id && !reused.contains(&s.id))
            .take(wanted)
            .collect();
        reused.extend(serials.iter().map(|s| s.id));
        if !serials.is_empty() {
            tracing::info!(
                order_id = %order.id,
                product_id = %line.product.id,
                reused = serials.len(),
                "Reusing serials claimed by an earlier attempt"
            );
        }

        let missing = wanted - serials.len();
        if missing > 0 {
            let request = ClaimRequest {
                product_id: line.product.id,
                variant_id: line.item.variant_id,
                quantity: missing as u32,
                order_id: order.id,
                selection: line
                    .product
                    .serial_selection
                    .unwrap_or(self.settings.serial_selection),
            };
            let claimed = self
                .backend
                .inventory
                .claim_stock(request)
                .await
                .inspect_err(|e| {
                    tracing::error!(
                        order_id = %order.id,
                        product_id = %line.product.id,
                        error = %e,
                        "Stock claim failed"
                    );
                })?;
            reused.extend(claimed.iter().map(|s| s.id));
            serials.extend(claimed);
        }

        let name = display_name(&line.product, line.variant.as_ref());
        Ok(serials
            .into_iter()
            .map(|serial| DeliveredAsset::serial(serial.content, name.clone()))
            .collect())
    }

    async fn deliver_dynamic(&self, order: &Order, line: &Line<'_>) -> Result<Vec<DeliveredAsset>> {
        let product = &line.product;
        let variant = line.variant.as_ref();
        let url = variant
            .and_then(|v| v.webhook_url.as_deref())
            .or(product.webhook_url.as_deref())
            .ok_or_else(|| {
                PipelineError::WebhookError(format!(
                    "no webhook URL configured for product {}",
                    product.id
                ))
            })?;

        let payload = DynamicPayload::build(order, line.item, product, variant);
        let credentials = self.fulfiller.fetch_credentials(url, &payload).await?;
        if credentials.is_empty() {
            return Err(PipelineError::WebhookError(format!(
                "webhook for product {} returned no credentials",
                product.id
            )));
        }

        let name = display_name(product, variant);
        Ok(credentials
            .into_iter()
            .map(|line| DeliveredAsset::text(line, Some(name.clone())))
            .collect())
    }

    async fn decrement_finite_stock(&self, line: &Line<'_>) -> Result<()> {
        let unlimited = match &line.variant {
            Some(variant) => variant.unlimited_stock,
            None => line.product.unlimited_stock,
        };
        if unlimited {
            return Ok(());
        }
        self.backend
            .inventory
            .adjust_stock(
                line.product.id,
                line.item.variant_id,
                -i64::from(line.item.quantity),
            )
            .await
    }

    async fn notify(&self, order: &Order, assets: &[DeliveredAsset]) -> bool {
        if !self.settings.notify_on_delivery {
            return false;
        }
        match self.notifier.send_delivery_completed(order, assets).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "Delivery email failed");
                false
            }
        }
    }

    /// Admin escape hatch for an order whose delivery never happened.
    ///
    /// Runs under the same per-order delivery lock as [`Self::deliver_product`].
    pub async fn retrigger_delivery(&self, order_id: Uuid) -> Result<RetriggerOutcome> {
        let order = self.load_order(order_id).await?;
        ensure_retriggerable(&order)?;

        if !self.backend.orders.try_lock_delivery(order_id).await? {
            tracing::warn!(order_id = %order_id, "Retrigger refused, delivery in progress");
            return Ok(RetriggerOutcome::InProgress);
        }
        let result = self.retrigger_locked(order_id).await;
        self.release_lock(order_id).await;
        result
    }

    async fn retrigger_locked(&self, order_id: Uuid) -> Result<RetriggerOutcome> {
        let order = self.load_order(order_id).await?;
        ensure_retriggerable(&order)?;

        if !self
            .backend
            .fulfillment
            .deliveries_for(order_id)
            .await?
            .is_empty()
        {
            tracing::info!(order_id = %order_id, "Retrigger ignored, deliveries exist");
            return Ok(RetriggerOutcome::AlreadyDelivered {
                message: ALREADY_DELIVERED_MESSAGE.to_string(),
            });
        }

        tracing::info!(order_id = %order_id, previous = %order.status, "Retriggering delivery");
        self.backend
            .orders
            .set_status(order_id, OrderStatus::Paid)
            .await?;
        Ok(RetriggerOutcome::Triggered(
            self.deliver_locked(order_id).await?,
        ))
    }
}

fn ensure_retriggerable(order: &Order) -> Result<()> {
    if RETRIGGERABLE.contains(&order.status) {
        return Ok(());
    }
    Err(PipelineError::InvalidStatus(format!(
        "cannot retrigger delivery of order {} in status '{}'",
        order.id, order.status
    )))
}

fn display_name(product: &Product, variant: Option<&Variant>) -> String {
    match variant {
        Some(variant) => format!("{} - {}", product.name, variant.name),
        None => product.name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_includes_variant() {
        let product = Product::new("Netflix", DeliveryType::Dynamic);
        let variant = Variant::new(product.id, "Premium");
        assert_eq!(display_name(&product, Some(&variant)), "Netflix - Premium");
        assert_eq!(display_name(&product, None), "Netflix");
    }

    #[test]
    fn test_outcome_serialization_is_tagged() {
        let json = serde_json::to_value(DeliveryOutcome::Skipped {
            status: OrderStatus::Pending,
        })
        .unwrap();
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["status"], "pending");

        let retrigger = serde_json::to_value(RetriggerOutcome::AlreadyDelivered {
            message: ALREADY_DELIVERED_MESSAGE.to_string(),
        })
        .unwrap();
        assert_eq!(retrigger["result"], "already_delivered");
    }

    #[test]
    fn test_only_live_orders_are_retriggerable() {
        let mut order = Order::new("ORD-1", "a@example.com", "USD");
        assert!(matches!(
            ensure_retriggerable(&order),
            Err(PipelineError::InvalidStatus(_))
        ));
        order.status = OrderStatus::Completed;
        assert!(ensure_retriggerable(&order).is_ok());
    }
}
