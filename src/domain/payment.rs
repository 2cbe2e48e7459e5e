use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Expired,
}

impl PaymentStatus {
    /// Statuses from which a payment may still be completed.
    pub const OPEN: [PaymentStatus; 2] = [PaymentStatus::Pending, PaymentStatus::Processing];
}

/// A payment attempt for an order.
///
/// For crypto payments `amount` is the expected amount in `currency` units and
/// `receive_address` is the address generated for this attempt.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub provider: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    #[serde(default)]
    pub receive_address: Option<String>,
    /// Unix seconds at which the address was issued.
    #[serde(default)]
    pub address_issued_at: Option<i64>,
    #[serde(default)]
    pub tx_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn crypto(
        order_id: Uuid,
        currency: impl Into<String>,
        amount: Decimal,
        address: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_id,
            provider: "crypto".to_string(),
            amount,
            currency: currency.into(),
            status: PaymentStatus::Pending,
            receive_address: Some(address.into()),
            address_issued_at: Some(now.timestamp()),
            tx_id: None,
            created_at: now,
        }
    }

    pub fn is_open(&self) -> bool {
        PaymentStatus::OPEN.contains(&self.status)
    }
}
