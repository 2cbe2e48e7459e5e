#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storefront_pipeline::application::delivery::DeliveryOrchestrator;
use storefront_pipeline::config::DeliverySettings;
use storefront_pipeline::domain::delivery::DeliveredAsset;
use storefront_pipeline::domain::order::{Order, OrderStatus};
use storefront_pipeline::domain::ports::{Backend, DynamicFulfiller, DynamicFulfillerRef, Notifier};
use storefront_pipeline::domain::product::{DeliveryType, Product, SerialKey};
use storefront_pipeline::domain::webhook::DynamicPayload;
use storefront_pipeline::error::{PipelineError, Result};
use storefront_pipeline::infrastructure::in_memory::InMemoryStore;
use uuid::Uuid;

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn backend() -> Backend {
    Backend::from_store(InMemoryStore::new())
}

/// Returns canned credentials, or fails, and remembers every payload.
#[derive(Default)]
pub struct FakeFulfiller {
    pub response: Option<Vec<String>>,
    pub calls: Mutex<Vec<(String, DynamicPayload)>>,
    pub delay: Duration,
}

impl FakeFulfiller {
    pub fn returning(lines: &[&str]) -> Arc<Self> {
        Self::slow(lines, Duration::ZERO)
    }

    /// Like [`FakeFulfiller::returning`], answering after `delay`.
    pub fn slow(lines: &[&str], delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            response: Some(lines.iter().map(|l| l.to_string()).collect()),
            calls: Mutex::new(Vec::new()),
            delay,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl DynamicFulfiller for FakeFulfiller {
    async fn fetch_credentials(&self, url: &str, payload: &DynamicPayload) -> Result<Vec<String>> {
        self.calls.lock().unwrap().push((url.to_string(), payload.clone()));
        tokio::time::sleep(self.delay).await;
        self.response
            .clone()
            .ok_or_else(|| PipelineError::WebhookError(format!("{} responded with 500", url)))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(Uuid, usize)>>,
    pub fail: bool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_delivery_completed(
        &self,
        order: &Order,
        assets: &[DeliveredAsset],
    ) -> Result<()> {
        if self.fail {
            return Err(PipelineError::InternalError("smtp down".into()));
        }
        self.sent.lock().unwrap().push((order.id, assets.len()));
        Ok(())
    }
}

pub fn orchestrator(
    backend: &Backend,
    fulfiller: DynamicFulfillerRef,
    notifier: Arc<RecordingNotifier>,
) -> DeliveryOrchestrator {
    DeliveryOrchestrator::new(backend.clone(), fulfiller, notifier, DeliverySettings::default())
}

pub async fn add_product(
    backend: &Backend,
    name: &str,
    delivery_type: DeliveryType,
    stock: i64,
) -> Product {
    let mut product = Product::new(name, delivery_type);
    product.stock = stock;
    if delivery_type == DeliveryType::Dynamic {
        product.webhook_url = Some("http://merchant.test/deliver".to_string());
    }
    backend.catalog.store_product(product.clone()).await.unwrap();
    product
}

pub async fn add_serials(backend: &Backend, product: &Product, contents: &[&str]) {
    let serials = contents
        .iter()
        .map(|content| SerialKey::new(product.id, None, *content))
        .collect();
    backend.inventory.add_serials(serials).await.unwrap();
}

/// Stores a paid order with one line per `(product, quantity, unit price)`.
pub async fn paid_order(backend: &Backend, lines: &[(&Product, u32, Decimal)]) -> Order {
    let mut order = Order::new("ORD-TEST", "buyer@example.com", "USD");
    for (product, quantity, price) in lines {
        order.add_item(product.id, None, *quantity, *price);
    }
    order.status = OrderStatus::Paid;
    backend.orders.store(order.clone()).await.unwrap();
    order
}
