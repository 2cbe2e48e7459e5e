use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CONTENT_READY: &str = "Your order is ready. Your items are listed below.";
pub const CONTENT_CONTACT_SUPPORT: &str =
    "We could not deliver part of your order automatically. Please contact support with your order ID.";
pub const CONTENT_SERVICE_CONFIRMED: &str =
    "Your order is confirmed. Further instructions will be sent to you by email.";
pub const CONTENT_PROCESSED: &str = "Your order has been processed.";

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Serial,
    Text,
}

/// One delivered unit, as shown to the customer.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct DeliveredAsset {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(rename = "type")]
    pub kind: AssetKind,
}

impl DeliveredAsset {
    pub fn serial(content: impl Into<String>, product_name: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            product_name: Some(product_name.into()),
            kind: AssetKind::Serial,
        }
    }

    pub fn text(content: impl Into<String>, product_name: Option<String>) -> Self {
        Self {
            content: content.into(),
            product_name,
            kind: AssetKind::Text,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryKind {
    Instant,
    Manual,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Delivery {
    pub id: Uuid,
    pub order_id: Uuid,
    pub assets: Vec<DeliveredAsset>,
    pub content: String,
    pub delivery_type: DeliveryKind,
    pub created_at: DateTime<Utc>,
}

/// Flags gathered while walking the items of an order.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliverySummary {
    pub has_assets: bool,
    pub delivery_failure: bool,
    pub has_service: bool,
}

impl DeliverySummary {
    /// Customer-facing message, by priority: assets, failure, service, generic.
    pub fn content(&self) -> &'static str {
        if self.has_assets {
            CONTENT_READY
        } else if self.delivery_failure {
            CONTENT_CONTACT_SUPPORT
        } else if self.has_service {
            CONTENT_SERVICE_CONFIRMED
        } else {
            CONTENT_PROCESSED
        }
    }

    pub fn kind(&self) -> DeliveryKind {
        if !self.has_assets && self.has_service {
            DeliveryKind::Manual
        } else {
            DeliveryKind::Instant
        }
    }
}

impl Delivery {
    pub fn new(order_id: Uuid, assets: Vec<DeliveredAsset>, summary: DeliverySummary) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            assets,
            content: summary.content().to_string(),
            delivery_type: summary.kind(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Paid,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Invoice {
    pub id: Uuid,
    pub order_id: Uuid,
    pub invoice_number: String,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    pub fn paid(order_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            invoice_number: invoice_number(order_id, now),
            status: InvoiceStatus::Paid,
            created_at: now,
        }
    }
}

/// `INV-<epoch-ms>-<first segment of the order id>`
pub fn invoice_number(order_id: Uuid, now: DateTime<Utc>) -> String {
    let id = order_id.to_string();
    let segment = id.split('-').next().unwrap_or(&id);
    format!("INV-{}-{}", now.timestamp_millis(), segment)
}
