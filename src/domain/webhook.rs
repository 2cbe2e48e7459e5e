use crate::domain::order::{Order, OrderItem};
use crate::domain::product::{Product, Variant};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub const DYNAMIC_DELIVERY_EVENT: &str = "order.item.delivery";

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PayloadOrder {
    pub id: Uuid,
    pub readable_id: String,
    pub email: String,
    pub total: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PayloadItem {
    pub id: Uuid,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub variant_id: Option<Uuid>,
    pub variant_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PayloadProduct {
    pub id: Uuid,
    pub name: String,
}

/// Body posted to a merchant webhook to obtain credentials for one order item.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct DynamicPayload {
    pub event: String,
    pub order: PayloadOrder,
    pub item: PayloadItem,
    pub product: PayloadProduct,
    /// Only the fields scoped to this product, without their prefix.
    pub custom_fields: BTreeMap<String, String>,
    pub timestamp: i64,
}

impl DynamicPayload {
    pub fn build(
        order: &Order,
        item: &OrderItem,
        product: &Product,
        variant: Option<&Variant>,
    ) -> Self {
        Self {
            event: DYNAMIC_DELIVERY_EVENT.to_string(),
            order: PayloadOrder {
                id: order.id,
                readable_id: order.readable_id.clone(),
                email: order.email.clone(),
                total: order.total,
                currency: order.currency.clone(),
                created_at: order.created_at,
            },
            item: PayloadItem {
                id: item.id,
                quantity: item.quantity,
                unit_price: item.unit_price,
                variant_id: item.variant_id,
                variant_name: variant.map(|v| v.name.clone()),
            },
            product: PayloadProduct {
                id: product.id,
                name: product.name.clone(),
            },
            custom_fields: order.custom_fields_for(product.id),
            timestamp: Utc::now().timestamp(),
        }
    }
}

/// Splits a plaintext webhook response into one credential per non-empty line.
pub fn parse_credentials(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::DeliveryType;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_credentials_drops_blank_lines() {
        let lines = parse_credentials("user1:pass1\r\n\r\n  user2:pass2  \n\n");
        assert_eq!(lines, vec!["user1:pass1", "user2:pass2"]);
        assert!(parse_credentials("\n\n").is_empty());
    }

    #[test]
    fn test_build_payload_scopes_fields() {
        let product = Product::new("VPN Account", DeliveryType::Dynamic);
        let variant = Variant::new(product.id, "12 months");
        let mut order = Order::new("ORD-9", "buyer@example.com", "USD");
        order.add_item(product.id, Some(variant.id), 1, dec!(9.99));
        order
            .custom_fields
            .insert(format!("{}_region", product.id), "EU".to_string());
        order
            .custom_fields
            .insert(format!("{}_region", Uuid::new_v4()), "US".to_string());

        let payload = DynamicPayload::build(&order, &order.items[0], &product, Some(&variant));

        assert_eq!(payload.event, DYNAMIC_DELIVERY_EVENT);
        assert_eq!(payload.item.variant_name.as_deref(), Some("12 months"));
        assert_eq!(payload.custom_fields.len(), 1);
        assert_eq!(payload.custom_fields["region"], "EU");
        assert_eq!(payload.order.total, dec!(9.99));
    }
}
