use crate::domain::order::{Order, OrderStatus};
use crate::domain::ports::OrderStoreRef;
use crate::error::{PipelineError, Result};
use chrono::{Duration, Utc};
use uuid::Uuid;

/// Reads orders, expiring stale pending ones on the way.
#[derive(Clone)]
pub struct OrderReader {
    orders: OrderStoreRef,
    ttl: Duration,
}

impl OrderReader {
    pub fn new(orders: OrderStoreRef, ttl: Duration) -> Self {
        Self { orders, ttl }
    }

    pub async fn find(&self, order_id: Uuid) -> Result<Option<Order>> {
        let Some(mut order) = self.orders.get(order_id).await? else {
            return Ok(None);
        };
        if order.is_stale(Utc::now(), self.ttl) {
            let expired = self
                .orders
                .transition(order_id, &[OrderStatus::Pending], OrderStatus::Expired)
                .await?;
            if expired {
                tracing::info!(order_id = %order_id, "Pending order expired");
                order.status = OrderStatus::Expired;
            } else if let Some(current) = self.orders.get(order_id).await? {
                order = current;
            }
        }
        Ok(Some(order))
    }

    pub async fn load(&self, order_id: Uuid) -> Result<Order> {
        self.find(order_id)
            .await?
            .ok_or_else(|| PipelineError::not_found("order", order_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::OrderStore;
    use crate::infrastructure::in_memory::InMemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_stale_pending_order_expires_on_read() {
        let store = InMemoryStore::new();
        let mut order = Order::new("ORD-1", "a@example.com", "USD");
        order.created_at = Utc::now() - Duration::minutes(90);
        let id = order.id;
        OrderStore::store(&store, order).await.unwrap();

        let reader = OrderReader::new(Arc::new(store.clone()), Duration::hours(1));
        let loaded = reader.load(id).await.unwrap();
        assert_eq!(loaded.status, OrderStatus::Expired);

        let persisted = OrderStore::get(&store, id).await.unwrap().unwrap();
        assert_eq!(persisted.status, OrderStatus::Expired);
    }

    #[tokio::test]
    async fn test_fresh_and_paid_orders_are_untouched() {
        let store = InMemoryStore::new();
        let fresh = Order::new("ORD-2", "a@example.com", "USD");
        let mut paid = Order::new("ORD-3", "a@example.com", "USD");
        paid.status = OrderStatus::Paid;
        paid.created_at = Utc::now() - Duration::days(2);
        OrderStore::store(&store, fresh.clone()).await.unwrap();
        OrderStore::store(&store, paid.clone()).await.unwrap();

        let reader = OrderReader::new(Arc::new(store), Duration::hours(1));
        assert_eq!(reader.load(fresh.id).await.unwrap().status, OrderStatus::Pending);
        assert_eq!(reader.load(paid.id).await.unwrap().status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_missing_order() {
        let reader = OrderReader::new(Arc::new(InMemoryStore::new()), Duration::hours(1));
        assert!(reader.find(Uuid::new_v4()).await.unwrap().is_none());
        assert!(matches!(
            reader.load(Uuid::new_v4()).await,
            Err(PipelineError::NotFound { entity: "order", .. })
        ));
    }
}
