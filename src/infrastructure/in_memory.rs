use crate::domain::delivery::{Delivery, Invoice};
use crate::domain::order::{Order, OrderStatus};
use crate::domain::payment::{Payment, PaymentStatus};
use crate::domain::ports::{
    CatalogStore, FulfillmentStore, InventoryStore, OrderStore, PaymentStore,
};
use crate::domain::product::{ClaimRequest, Product, SerialKey, Variant, select_serials};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    orders: HashMap<Uuid, Order>,
    delivery_locks: HashSet<Uuid>,
    products: HashMap<Uuid, Product>,
    variants: HashMap<Uuid, Variant>,
    serials: HashMap<Uuid, SerialKey>,
    deliveries: Vec<Delivery>,
    invoices: Vec<Invoice>,
    payments: HashMap<Uuid, Payment>,
}

/// A thread-safe in-memory backend implementing every store port.
///
/// All tables live behind one `RwLock`, so multi-row operations such as
/// `claim_stock` and status transitions are atomic. `Clone` shares the state.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn store(&self, order: Order) -> Result<()> {
        let mut state = self.state.write().await;
        state.orders.insert(order.id, order);
        Ok(())
    }

    async fn get(&self, order_id: Uuid) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.get(&order_id).cloned())
    }

    async fn set_status(&self, order_id: Uuid, status: OrderStatus) -> Result<()> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| PipelineError::not_found("order", order_id))?;
        order.status = status;
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn transition(
        &self,
        order_id: Uuid,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| PipelineError::not_found("order", order_id))?;
        if !from.contains(&order.status) {
            return Ok(false);
        }
        order.status = to;
        order.updated_at = Utc::now();
        Ok(true)
    }

    async fn try_lock_delivery(&self, order_id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        Ok(state.delivery_locks.insert(order_id))
    }

    async fn unlock_delivery(&self, order_id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        state.delivery_locks.remove(&order_id);
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn store_product(&self, product: Product) -> Result<()> {
        let mut state = self.state.write().await;
        state.products.insert(product.id, product);
        Ok(())
    }

    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>> {
        let state = self.state.read().await;
        Ok(state.products.get(&product_id).cloned())
    }

    async fn store_variant(&self, variant: Variant) -> Result<()> {
        let mut state = self.state.write().await;
        state.variants.insert(variant.id, variant);
        Ok(())
    }

    async fn get_variant(&self, variant_id: Uuid) -> Result<Option<Variant>> {
        let state = self.state.read().await;
        Ok(state.variants.get(&variant_id).cloned())
    }
}

#[async_trait]
impl InventoryStore for InMemoryStore {
    async fn add_serials(&self, serials: Vec<SerialKey>) -> Result<usize> {
        let mut state = self.state.write().await;
        let count = serials.len();
        for serial in serials {
            state.serials.insert(serial.id, serial);
        }
        Ok(count)
    }

    async fn available_serials(&self, product_id: Uuid, variant_id: Option<Uuid>) -> Result<usize> {
        let state = self.state.read().await;
        Ok(state
            .serials
            .values()
            .filter(|s| s.is_available_for(product_id, variant_id))
            .count())
    }

    async fn claim_stock(&self, request: ClaimRequest) -> Result<Vec<SerialKey>> {
        let mut state = self.state.write().await;
        let candidates: Vec<SerialKey> = state
            .serials
            .values()
            .filter(|s| s.is_available_for(request.product_id, request.variant_id))
            .cloned()
            .collect();
        let available = candidates.len();

        let mut claimed = select_serials(candidates, request.quantity as usize, request.selection)
            .ok_or(PipelineError::OutOfStock {
                product_id: request.product_id,
                requested: request.quantity,
                available,
            })?;

        for serial in claimed.iter_mut() {
            serial.order_id = Some(request.order_id);
            state.serials.insert(serial.id, serial.clone());
        }
        Ok(claimed)
    }

    async fn claimed_serials(&self, product_id: Uuid, order_id: Uuid) -> Result<Vec<SerialKey>> {
        let state = self.state.read().await;
        Ok(state
            .serials
            .values()
            .filter(|s| s.product_id == product_id && s.order_id == Some(order_id))
            .cloned()
            .collect())
    }

    async fn adjust_stock(
        &self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        delta: i64,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        match variant_id {
            Some(variant_id) => {
                let variant = state
                    .variants
                    .get_mut(&variant_id)
                    .ok_or_else(|| PipelineError::not_found("variant", variant_id))?;
                variant.stock += delta;
            }
            None => {
                let product = state
                    .products
                    .get_mut(&product_id)
                    .ok_or_else(|| PipelineError::not_found("product", product_id))?;
                product.stock += delta;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl FulfillmentStore for InMemoryStore {
    async fn insert_delivery(&self, delivery: Delivery) -> Result<()> {
        let mut state = self.state.write().await;
        state.deliveries.push(delivery);
        Ok(())
    }

    async fn deliveries_for(&self, order_id: Uuid) -> Result<Vec<Delivery>> {
        let state = self.state.read().await;
        Ok(state
            .deliveries
            .iter()
            .filter(|d| d.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn insert_invoice(&self, invoice: Invoice) -> Result<()> {
        let mut state = self.state.write().await;
        state.invoices.push(invoice);
        Ok(())
    }

    async fn invoices_for(&self, order_id: Uuid) -> Result<Vec<Invoice>> {
        let state = self.state.read().await;
        Ok(state
            .invoices
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn store(&self, payment: Payment) -> Result<()> {
        let mut state = self.state.write().await;
        state.payments.insert(payment.id, payment);
        Ok(())
    }

    async fn get(&self, payment_id: Uuid) -> Result<Option<Payment>> {
        let state = self.state.read().await;
        Ok(state.payments.get(&payment_id).cloned())
    }

    async fn payments_for(&self, order_id: Uuid) -> Result<Vec<Payment>> {
        let state = self.state.read().await;
        let mut payments: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }

    async fn mark_processing(&self, payment_id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        let payment = state
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| PipelineError::not_found("payment", payment_id))?;
        if payment.status == PaymentStatus::Pending {
            payment.status = PaymentStatus::Processing;
        }
        Ok(())
    }

    async fn complete(&self, payment_id: Uuid, tx_id: Option<String>) -> Result<bool> {
        let mut state = self.state.write().await;
        let payment = state
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| PipelineError::not_found("payment", payment_id))?;
        if !payment.is_open() {
            return Ok(false);
        }
        payment.status = PaymentStatus::Completed;
        payment.tx_id = tx_id;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::{DeliveryType, SelectionMethod};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_order_store_and_transition() {
        let store = InMemoryStore::new();
        let order = Order::new("ORD-1", "a@example.com", "USD");
        let id = order.id;
        OrderStore::store(&store, order).await.unwrap();

        let moved = store
            .transition(id, &[OrderStatus::Pending], OrderStatus::Paid)
            .await
            .unwrap();
        assert!(moved);

        let again = store
            .transition(id, &[OrderStatus::Pending], OrderStatus::Paid)
            .await
            .unwrap();
        assert!(!again);

        let retrieved = OrderStore::get(&store, id).await.unwrap().unwrap();
        assert_eq!(retrieved.status, OrderStatus::Paid);
        assert!(OrderStore::get(&store, Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delivery_lock_is_exclusive() {
        let store = InMemoryStore::new();
        let id = Uuid::new_v4();
        assert!(store.try_lock_delivery(id).await.unwrap());
        assert!(!store.try_lock_delivery(id).await.unwrap());
        store.unlock_delivery(id).await.unwrap();
        assert!(store.try_lock_delivery(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_claim_stock_is_all_or_nothing() {
        let store = InMemoryStore::new();
        let product = Product::new("Game Key", DeliveryType::Serials);
        let serials = (0..2)
            .map(|i| SerialKey::new(product.id, None, format!("KEY-{}", i)))
            .collect();
        store.add_serials(serials).await.unwrap();

        let request = ClaimRequest {
            product_id: product.id,
            variant_id: None,
            quantity: 3,
            order_id: Uuid::new_v4(),
            selection: SelectionMethod::Last,
        };
        let result = store.claim_stock(request.clone()).await;
        assert!(matches!(
            result,
            Err(PipelineError::OutOfStock { requested: 3, available: 2, .. })
        ));
        assert_eq!(store.available_serials(product.id, None).await.unwrap(), 2);

        let claimed = store
            .claim_stock(ClaimRequest { quantity: 2, ..request })
            .await
            .unwrap();
        assert_eq!(claimed.len(), 2);
        assert!(claimed.iter().all(|s| s.order_id.is_some()));
        assert_eq!(store.available_serials(product.id, None).await.unwrap(), 0);

        let held = store.claimed_serials(product.id, request.order_id).await.unwrap();
        assert_eq!(held.len(), 2);
        assert!(store.claimed_serials(product.id, Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_adjust_stock_targets_variant() {
        let store = InMemoryStore::new();
        let mut product = Product::new("Hosting", DeliveryType::Service);
        product.stock = 5;
        let mut variant = Variant::new(product.id, "Large");
        variant.stock = 3;
        store.store_product(product.clone()).await.unwrap();
        store.store_variant(variant.clone()).await.unwrap();

        store.adjust_stock(product.id, Some(variant.id), -1).await.unwrap();
        store.adjust_stock(product.id, None, -2).await.unwrap();

        assert_eq!(store.get_variant(variant.id).await.unwrap().unwrap().stock, 2);
        assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 3);
    }

    #[tokio::test]
    async fn test_payment_completes_once() {
        let store = InMemoryStore::new();
        let payment = Payment::crypto(Uuid::new_v4(), "BTC", dec!(0.01), "bc1qexample");
        let id = payment.id;
        PaymentStore::store(&store, payment).await.unwrap();

        store.mark_processing(id).await.unwrap();
        assert!(store.complete(id, Some("tx1".to_string())).await.unwrap());
        assert!(!store.complete(id, Some("tx2".to_string())).await.unwrap());

        let stored = PaymentStore::get(&store, id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Completed);
        assert_eq!(stored.tx_id.as_deref(), Some("tx1"));
    }
}
