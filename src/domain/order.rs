use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Delivered,
    Completed,
    Cancelled,
    Refunded,
    Expired,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single line of an order.
///
/// `unit_price` is the price at checkout time and is never re-read from the catalog.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct OrderItem {
    pub id: Uuid,
    pub product_id: Uuid,
    #[serde(default)]
    pub variant_id: Option<Uuid>,
    pub quantity: u32,
    pub unit_price: Decimal,
}

/// A customer order together with its line items.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Order {
    pub id: Uuid,
    pub readable_id: String,
    pub email: String,
    pub total: Decimal,
    pub currency: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Checkout form answers, keyed `<product_id>_<field_name>`.
    #[serde(default)]
    pub custom_fields: BTreeMap<String, String>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn new(
        readable_id: impl Into<String>,
        email: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            readable_id: readable_id.into(),
            email: email.into(),
            total: Decimal::ZERO,
            currency: currency.into(),
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            custom_fields: BTreeMap::new(),
            items: Vec::new(),
        }
    }

    /// Appends an item and adds its line total to the order total.
    pub fn add_item(
        &mut self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: u32,
        unit_price: Decimal,
    ) {
        self.total += unit_price * Decimal::from(quantity);
        self.items.push(OrderItem {
            id: Uuid::new_v4(),
            product_id,
            variant_id,
            quantity,
            unit_price,
        });
    }

    /// True when the order is still pending and older than `ttl`.
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.status == OrderStatus::Pending && now - self.created_at > ttl
    }

    /// Custom fields that belong to `product_id`, with the `<product_id>_` prefix removed.
    pub fn custom_fields_for(&self, product_id: Uuid) -> BTreeMap<String, String> {
        let prefix = format!("{}_", product_id);
        self.custom_fields
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(&prefix)
                    .filter(|field| !field.is_empty())
                    .map(|field| (field.to_string(), value.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_add_item_accumulates_total() {
        let mut order = Order::new("ORD-1", "buyer@example.com", "USD");
        order.add_item(Uuid::new_v4(), None, 2, dec!(12.50));
        order.add_item(Uuid::new_v4(), None, 1, dec!(5.00));

        assert_eq!(order.items.len(), 2);
        assert_eq!(order.total, dec!(30.00));
    }

    #[test]
    fn test_is_stale_only_for_pending() {
        let mut order = Order::new("ORD-2", "buyer@example.com", "USD");
        order.created_at = Utc::now() - Duration::minutes(61);
        assert!(order.is_stale(Utc::now(), Duration::hours(1)));

        order.status = OrderStatus::Paid;
        assert!(!order.is_stale(Utc::now(), Duration::hours(1)));

        let fresh = Order::new("ORD-3", "buyer@example.com", "USD");
        assert!(!fresh.is_stale(Utc::now(), Duration::hours(1)));
    }

    #[test]
    fn test_custom_fields_are_scoped_and_deprefixed() {
        let product = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut order = Order::new("ORD-4", "buyer@example.com", "USD");
        order
            .custom_fields
            .insert(format!("{}_username", product), "neo".to_string());
        order
            .custom_fields
            .insert(format!("{}_server", other), "eu-1".to_string());
        order.custom_fields.insert("note".to_string(), "hi".to_string());

        let fields = order.custom_fields_for(product);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("username").map(String::as_str), Some("neo"));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&OrderStatus::Delivered).unwrap();
        assert_eq!(json, "\"delivered\"");
    }
}
