use super::delivery::{DeliveredAsset, Delivery, Invoice};
use super::order::{Order, OrderStatus};
use super::payment::Payment;
use super::product::{ClaimRequest, Product, SerialKey, Variant};
use super::tracking::Sighting;
use super::webhook::DynamicPayload;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn store(&self, order: Order) -> Result<()>;
    async fn get(&self, order_id: Uuid) -> Result<Option<Order>>;
    async fn set_status(&self, order_id: Uuid, status: OrderStatus) -> Result<()>;
    /// Moves the order to `to` only if its current status is one of `from`.
    ///
    /// Returns whether the transition happened.
    async fn transition(
        &self,
        order_id: Uuid,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> Result<bool>;
    /// Takes the per-order delivery lock. Returns `false` if someone else holds it.
    async fn try_lock_delivery(&self, order_id: Uuid) -> Result<bool>;
    async fn unlock_delivery(&self, order_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn store_product(&self, product: Product) -> Result<()>;
    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>>;
    async fn store_variant(&self, variant: Variant) -> Result<()>;
    async fn get_variant(&self, variant_id: Uuid) -> Result<Option<Variant>>;
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn add_serials(&self, serials: Vec<SerialKey>) -> Result<usize>;
    async fn available_serials(&self, product_id: Uuid, variant_id: Option<Uuid>) -> Result<usize>;
    /// Reserves `quantity` unclaimed serials for an order, all or nothing.
    async fn claim_stock(&self, request: ClaimRequest) -> Result<Vec<SerialKey>>;
    /// Serials of `product_id` already claimed by `order_id`.
    async fn claimed_serials(&self, product_id: Uuid, order_id: Uuid) -> Result<Vec<SerialKey>>;
    /// Adds `delta` to the variant's stock when `variant_id` is set, the product's otherwise.
    async fn adjust_stock(
        &self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        delta: i64,
    ) -> Result<()>;
}

#[async_trait]
pub trait FulfillmentStore: Send + Sync {
    async fn insert_delivery(&self, delivery: Delivery) -> Result<()>;
    async fn deliveries_for(&self, order_id: Uuid) -> Result<Vec<Delivery>>;
    async fn insert_invoice(&self, invoice: Invoice) -> Result<()>;
    async fn invoices_for(&self, order_id: Uuid) -> Result<Vec<Invoice>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn store(&self, payment: Payment) -> Result<()>;
    async fn get(&self, payment_id: Uuid) -> Result<Option<Payment>>;
    async fn payments_for(&self, order_id: Uuid) -> Result<Vec<Payment>>;
    async fn mark_processing(&self, payment_id: Uuid) -> Result<()>;
    /// Completes an open payment. Returns `false` if it was already closed.
    async fn complete(&self, payment_id: Uuid, tx_id: Option<String>) -> Result<bool>;
}

/// Customer notifications sent after delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_delivery_completed(&self, order: &Order, assets: &[DeliveredAsset]) -> Result<()>;
}

/// Fetches credentials for a dynamic product from a merchant endpoint.
#[async_trait]
pub trait DynamicFulfiller: Send + Sync {
    async fn fetch_credentials(&self, url: &str, payload: &DynamicPayload) -> Result<Vec<String>>;
}

/// A single block-explorer backend for one currency.
#[async_trait]
pub trait ExplorerProvider: Send + Sync {
    fn name(&self) -> &str;
    /// Best qualifying transaction paying `address`, if any.
    async fn lookup(&self, address: &str, min_timestamp: Option<i64>) -> Result<Option<Sighting>>;
}

pub type OrderStoreRef = Arc<dyn OrderStore>;
pub type CatalogStoreRef = Arc<dyn CatalogStore>;
pub type InventoryStoreRef = Arc<dyn InventoryStore>;
pub type FulfillmentStoreRef = Arc<dyn FulfillmentStore>;
pub type PaymentStoreRef = Arc<dyn PaymentStore>;
pub type NotifierRef = Arc<dyn Notifier>;
pub type DynamicFulfillerRef = Arc<dyn DynamicFulfiller>;
pub type ExplorerProviderBox = Box<dyn ExplorerProvider>;

/// Every store the pipeline reads or writes.
#[derive(Clone)]
pub struct Backend {
    pub orders: OrderStoreRef,
    pub catalog: CatalogStoreRef,
    pub inventory: InventoryStoreRef,
    pub fulfillment: FulfillmentStoreRef,
    pub payments: PaymentStoreRef,
}

impl Backend {
    /// Builds a backend where one adapter serves every port.
    pub fn from_store<S>(store: S) -> Self
    where
        S: OrderStore + CatalogStore + InventoryStore + FulfillmentStore + PaymentStore + 'static,
    {
        let store = Arc::new(store);
        Self {
            orders: store.clone(),
            catalog: store.clone(),
            inventory: store.clone(),
            fulfillment: store.clone(),
            payments: store,
        }
    }
}
