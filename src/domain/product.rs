use crate::error::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// How a product is handed over once its order is paid.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryType {
    /// Pre-uploaded serial keys claimed from a finite pool.
    Serials,
    /// Credentials fetched from a merchant webhook at sale time.
    Dynamic,
    /// No digital asset; fulfilled out of band.
    Service,
}

/// Order in which uploaded serial keys are handed out.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMethod {
    /// Most recently added first.
    #[default]
    Last,
    /// Oldest first.
    First,
    Random,
}

impl FromStr for SelectionMethod {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last" => Ok(Self::Last),
            "first" => Ok(Self::First),
            "random" => Ok(Self::Random),
            other => Err(PipelineError::ConfigError(format!(
                "unknown serial selection method '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub delivery_type: DeliveryType,
    #[serde(default)]
    pub unlimited_stock: bool,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub serial_selection: Option<SelectionMethod>,
}

impl Product {
    pub fn new(name: impl Into<String>, delivery_type: DeliveryType) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            delivery_type,
            unlimited_stock: false,
            stock: 0,
            webhook_url: None,
            serial_selection: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Variant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub unlimited_stock: bool,
    #[serde(default)]
    pub stock: i64,
    /// Overrides the product's webhook for dynamic delivery.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl Variant {
    pub fn new(product_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id,
            name: name.into(),
            unlimited_stock: false,
            stock: 0,
            webhook_url: None,
        }
    }
}

/// One uploaded credential. `order_id` is set once it has been claimed.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct SerialKey {
    pub id: Uuid,
    pub product_id: Uuid,
    #[serde(default)]
    pub variant_id: Option<Uuid>,
    pub content: String,
    pub added_at: DateTime<Utc>,
    #[serde(default)]
    pub order_id: Option<Uuid>,
}

impl SerialKey {
    pub fn new(product_id: Uuid, variant_id: Option<Uuid>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id,
            variant_id,
            content: content.into(),
            added_at: Utc::now(),
            order_id: None,
        }
    }

    pub fn is_available_for(&self, product_id: Uuid, variant_id: Option<Uuid>) -> bool {
        self.order_id.is_none() && self.product_id == product_id && self.variant_id == variant_id
    }
}

/// Arguments of the atomic stock claim.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimRequest {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: u32,
    pub order_id: Uuid,
    pub selection: SelectionMethod,
}

/// Picks `quantity` keys out of `candidates` according to `selection`.
///
/// Returns `None` when the pool is too small; the caller decides how to report it.
pub fn select_serials(
    mut candidates: Vec<SerialKey>,
    quantity: usize,
    selection: SelectionMethod,
) -> Option<Vec<SerialKey>> {
    if candidates.len() < quantity {
        return None;
    }
    match selection {
        SelectionMethod::Last => candidates.sort_by(|a, b| b.added_at.cmp(&a.added_at)),
        SelectionMethod::First => candidates.sort_by(|a, b| a.added_at.cmp(&b.added_at)),
        SelectionMethod::Random => {
            use rand::seq::SliceRandom;
            candidates.shuffle(&mut rand::thread_rng());
        }
    }
    candidates.truncate(quantity);
    Some(candidates)
}
