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
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

pub const CF_ORDERS: &str = "orders";
pub const CF_LOCKS: &str = "delivery_locks";
pub const CF_PRODUCTS: &str = "products";
pub const CF_VARIANTS: &str = "variants";
/// Keyed `product_id ++ serial_id`.
pub const CF_SERIALS: &str = "serials";
/// Keyed `order_id ++ delivery_id`.
pub const CF_DELIVERIES: &str = "deliveries";
/// Keyed `order_id ++ invoice_id`.
pub const CF_INVOICES: &str = "invoices";
/// Keyed `order_id ++ payment_id`.
pub const CF_PAYMENTS: &str = "payments";
/// Secondary index `payment_id -> order_id`.
pub const CF_PAYMENT_INDEX: &str = "payment_index";

const COLUMN_FAMILIES: [&str; 9] = [
    CF_ORDERS,
    CF_LOCKS,
    CF_PRODUCTS,
    CF_VARIANTS,
    CF_SERIALS,
    CF_DELIVERIES,
    CF_INVOICES,
    CF_PAYMENTS,
    CF_PAYMENT_INDEX,
];

/// A persistent backend using RocksDB, one column family per table, JSON values.
///
/// Read-modify-write operations (stock claims, status transitions, locks) are
/// serialized through `write_lock` so they stay atomic within one process.
/// `Clone` shares the underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

fn composite_key(prefix: Uuid, id: Uuid) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(prefix.as_bytes());
    key.extend_from_slice(id.as_bytes());
    key
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at `path` with every column family present.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            PipelineError::InternalError(Box::new(std::io::Error::other(format!(
                "Column family '{}' not found",
                name
            ))))
        })
    }

    fn put_json<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        self.db.put_cf(cf, key, serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_pinned_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All values whose key starts with `prefix`, in key order.
    fn scan_prefix<T: DeserializeOwned>(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    fn load_order(&self, order_id: Uuid) -> Result<Order> {
        self.get_json(CF_ORDERS, order_id.as_bytes())?
            .ok_or_else(|| PipelineError::not_found("order", order_id))
    }

    fn payment_key(&self, payment_id: Uuid) -> Result<Option<Vec<u8>>> {
        let order_id: Option<Uuid> = self.get_json(CF_PAYMENT_INDEX, payment_id.as_bytes())?;
        Ok(order_id.map(|order_id| composite_key(order_id, payment_id)))
    }

    fn load_payment(&self, payment_id: Uuid) -> Result<(Vec<u8>, Payment)> {
        let key = self
            .payment_key(payment_id)?
            .ok_or_else(|| PipelineError::not_found("payment", payment_id))?;
        let payment = self
            .get_json(CF_PAYMENTS, &key)?
            .ok_or_else(|| PipelineError::not_found("payment", payment_id))?;
        Ok((key, payment))
    }
}

#[async_trait]
impl OrderStore for RocksDBStore {
    async fn store(&self, order: Order) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.put_json(CF_ORDERS, order.id.as_bytes(), &order)
    }

    async fn get(&self, order_id: Uuid) -> Result<Option<Order>> {
        self.get_json(CF_ORDERS, order_id.as_bytes())
    }

    async fn set_status(&self, order_id: Uuid, status: OrderStatus) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut order = self.load_order(order_id)?;
        order.status = status;
        order.updated_at = Utc::now();
        self.put_json(CF_ORDERS, order_id.as_bytes(), &order)
    }

    async fn transition(
        &self,
        order_id: Uuid,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut order = self.load_order(order_id)?;
        if !from.contains(&order.status) {
            return Ok(false);
        }
        order.status = to;
        order.updated_at = Utc::now();
        self.put_json(CF_ORDERS, order_id.as_bytes(), &order)?;
        Ok(true)
    }

    async fn try_lock_delivery(&self, order_id: Uuid) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let cf = self.cf(CF_LOCKS)?;
        if self.db.get_pinned_cf(cf, order_id.as_bytes())?.is_some() {
            return Ok(false);
        }
        self.put_json(CF_LOCKS, order_id.as_bytes(), &Utc::now())?;
        Ok(true)
    }

    async fn unlock_delivery(&self, order_id: Uuid) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let cf = self.cf(CF_LOCKS)?;
        self.db.delete_cf(cf, order_id.as_bytes())?;
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for RocksDBStore {
    async fn store_product(&self, product: Product) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.put_json(CF_PRODUCTS, product.id.as_bytes(), &product)
    }

    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>> {
        self.get_json(CF_PRODUCTS, product_id.as_bytes())
    }

    async fn store_variant(&self, variant: Variant) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.put_json(CF_VARIANTS, variant.id.as_bytes(), &variant)
    }

    async fn get_variant(&self, variant_id: Uuid) -> Result<Option<Variant>> {
        self.get_json(CF_VARIANTS, variant_id.as_bytes())
    }
}

#[async_trait]
impl InventoryStore for RocksDBStore {
    async fn add_serials(&self, serials: Vec<SerialKey>) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        for serial in &serials {
            self.put_json(CF_SERIALS, &composite_key(serial.product_id, serial.id), serial)?;
        }
        Ok(serials.len())
    }

    async fn available_serials(&self, product_id: Uuid, variant_id: Option<Uuid>) -> Result<usize> {
        let serials: Vec<SerialKey> = self.scan_prefix(CF_SERIALS, product_id.as_bytes())?;
        Ok(serials
            .iter()
            .filter(|s| s.is_available_for(product_id, variant_id))
            .count())
    }

    async fn claim_stock(&self, request: ClaimRequest) -> Result<Vec<SerialKey>> {
        let _guard = self.write_lock.lock().await;
        let candidates: Vec<SerialKey> = self
            .scan_prefix::<SerialKey>(CF_SERIALS, request.product_id.as_bytes())?
            .into_iter()
            .filter(|s| s.is_available_for(request.product_id, request.variant_id))
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
            self.put_json(CF_SERIALS, &composite_key(serial.product_id, serial.id), serial)?;
        }
        Ok(claimed)
    }

    async fn claimed_serials(&self, product_id: Uuid, order_id: Uuid) -> Result<Vec<SerialKey>> {
        let serials: Vec<SerialKey> = self.scan_prefix(CF_SERIALS, product_id.as_bytes())?;
        Ok(serials
            .into_iter()
            .filter(|s| s.order_id == Some(order_id))
            .collect())
    }

    async fn adjust_stock(
        &self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        delta: i64,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        match variant_id {
            Some(variant_id) => {
                let mut variant: Variant = self
                    .get_json(CF_VARIANTS, variant_id.as_bytes())?
                    .ok_or_else(|| PipelineError::not_found("variant", variant_id))?;
                variant.stock += delta;
                self.put_json(CF_VARIANTS, variant_id.as_bytes(), &variant)
            }
            None => {
                let mut product: Product = self
                    .get_json(CF_PRODUCTS, product_id.as_bytes())?
                    .ok_or_else(|| PipelineError::not_found("product", product_id))?;
                product.stock += delta;
                self.put_json(CF_PRODUCTS, product_id.as_bytes(), &product)
            }
        }
    }
}

#[async_trait]
impl FulfillmentStore for RocksDBStore {
    async fn insert_delivery(&self, delivery: Delivery) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.put_json(
            CF_DELIVERIES,
            &composite_key(delivery.order_id, delivery.id),
            &delivery,
        )
    }

    async fn deliveries_for(&self, order_id: Uuid) -> Result<Vec<Delivery>> {
        self.scan_prefix(CF_DELIVERIES, order_id.as_bytes())
    }

    async fn insert_invoice(&self, invoice: Invoice) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.put_json(
            CF_INVOICES,
            &composite_key(invoice.order_id, invoice.id),
            &invoice,
        )
    }

    async fn invoices_for(&self, order_id: Uuid) -> Result<Vec<Invoice>> {
        self.scan_prefix(CF_INVOICES, order_id.as_bytes())
    }
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn store(&self, payment: Payment) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.put_json(CF_PAYMENT_INDEX, payment.id.as_bytes(), &payment.order_id)?;
        self.put_json(
            CF_PAYMENTS,
            &composite_key(payment.order_id, payment.id),
            &payment,
        )
    }

    async fn get(&self, payment_id: Uuid) -> Result<Option<Payment>> {
        match self.payment_key(payment_id)? {
            Some(key) => self.get_json(CF_PAYMENTS, &key),
            None => Ok(None),
        }
    }

    async fn payments_for(&self, order_id: Uuid) -> Result<Vec<Payment>> {
        let mut payments: Vec<Payment> = self.scan_prefix(CF_PAYMENTS, order_id.as_bytes())?;
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }

    async fn mark_processing(&self, payment_id: Uuid) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let (key, mut payment) = self.load_payment(payment_id)?;
        if payment.status == PaymentStatus::Pending {
            payment.status = PaymentStatus::Processing;
            self.put_json(CF_PAYMENTS, &key, &payment)?;
        }
        Ok(())
    }

    async fn complete(&self, payment_id: Uuid, tx_id: Option<String>) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let (key, mut payment) = self.load_payment(payment_id)?;
        if !payment.is_open() {
            return Ok(false);
        }
        payment.status = PaymentStatus::Completed;
        payment.tx_id = tx_id;
        self.put_json(CF_PAYMENTS, &key, &payment)?;
        Ok(true)
    }
}
