use crate::application::delivery::{DeliveryOrchestrator, DeliveryOutcome};
use crate::application::orders::OrderReader;
use crate::application::tracking::TrackingDispatcher;
use crate::domain::order::OrderStatus;
use crate::domain::payment::{Payment, PaymentStatus};
use crate::domain::ports::{OrderStoreRef, PaymentStoreRef};
use crate::domain::tracking::TransactionStatus;
use crate::error::{PipelineError, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Result of one polling step for a payment.
#[derive(Debug, Serialize, PartialEq, Clone)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PaymentCheck {
    AlreadyCompleted,
    PaymentClosed { status: PaymentStatus },
    OrderClosed { status: OrderStatus },
    NotTrackable,
    Waiting { tracking: TransactionStatus },
    Detected { tracking: TransactionStatus },
    Underpaid { tracking: TransactionStatus, expected: Decimal },
    Completed { tracking: TransactionStatus, delivery: DeliveryOutcome },
    /// The payment completed but the order left `pending` for a closed status meanwhile.
    PaidOrderClosed { tracking: TransactionStatus, status: OrderStatus },
}

/// Advances a crypto payment from its on-chain state.
///
/// Only the caller that flips the payment to `completed` moves the order to `paid`
/// and starts delivery, so repeated or concurrent checks deliver at most once.
pub struct PaymentMonitor {
    payments: PaymentStoreRef,
    orders: OrderStoreRef,
    reader: OrderReader,
    dispatcher: Arc<TrackingDispatcher>,
    orchestrator: Arc<DeliveryOrchestrator>,
}

impl PaymentMonitor {
    pub fn new(
        payments: PaymentStoreRef,
        orders: OrderStoreRef,
        reader: OrderReader,
        dispatcher: Arc<TrackingDispatcher>,
        orchestrator: Arc<DeliveryOrchestrator>,
    ) -> Self {
        Self {
            payments,
            orders,
            reader,
            dispatcher,
            orchestrator,
        }
    }

    pub async fn check_payment(&self, payment_id: Uuid) -> Result<PaymentCheck> {
        let payment = self
            .payments
            .get(payment_id)
            .await?
            .ok_or_else(|| PipelineError::not_found("payment", payment_id))?;

        if payment.status == PaymentStatus::Completed {
            return Ok(PaymentCheck::AlreadyCompleted);
        }
        if !payment.is_open() {
            return Ok(PaymentCheck::PaymentClosed { status: payment.status });
        }

        let order = self.reader.load(payment.order_id).await?;
        if !matches!(order.status, OrderStatus::Pending | OrderStatus::Paid) {
            tracing::info!(
                payment_id = %payment_id,
                order_id = %order.id,
                status = %order.status,
                "Order closed, not tracking"
            );
            return Ok(PaymentCheck::OrderClosed { status: order.status });
        }

        let Some(address) = payment.receive_address.as_deref() else {
            return Ok(PaymentCheck::NotTrackable);
        };

        let tracking = self
            .dispatcher
            .track_address_status(address, &payment.currency, payment.address_issued_at)
            .await;

        if !tracking.detected {
            return Ok(PaymentCheck::Waiting { tracking });
        }

        if payment.status == PaymentStatus::Pending {
            self.payments.mark_processing(payment_id).await?;
        }

        if !tracking.is_confirmed() {
            tracing::info!(
                payment_id = %payment_id,
                confirmations = tracking.confirmations,
                "Payment detected, awaiting confirmations"
            );
            return Ok(PaymentCheck::Detected { tracking });
        }

        if is_underpaid(&payment, &tracking) {
            tracing::warn!(
                payment_id = %payment_id,
                expected = %payment.amount,
                received = ?tracking.amount_received,
                "Payment underpaid"
            );
            return Ok(PaymentCheck::Underpaid {
                tracking,
                expected: payment.amount,
            });
        }

        if !self.payments.complete(payment_id, tracking.tx_id.clone()).await? {
            return Ok(PaymentCheck::AlreadyCompleted);
        }
        tracing::info!(
            payment_id = %payment_id,
            order_id = %order.id,
            tx_id = ?tracking.tx_id,
            "Payment completed"
        );

        let moved = self
            .orders
            .transition(order.id, &[OrderStatus::Pending], OrderStatus::Paid)
            .await?;
        if !moved {
            let current = self
                .orders
                .get(order.id)
                .await?
                .ok_or_else(|| PipelineError::not_found("order", order.id))?;
            if current.status != OrderStatus::Paid {
                tracing::warn!(
                    payment_id = %payment_id,
                    order_id = %order.id,
                    status = %current.status,
                    "Payment completed for an order that is no longer pending"
                );
                return Ok(PaymentCheck::PaidOrderClosed {
                    tracking,
                    status: current.status,
                });
            }
        }
        let delivery = self.orchestrator.deliver_product(order.id).await?;

        Ok(PaymentCheck::Completed { tracking, delivery })
    }
}

/// A confirmed transfer without a reported amount is accepted.
fn is_underpaid(payment: &Payment, tracking: &TransactionStatus) -> bool {
    tracking
        .amount_received
        .is_some_and(|received| received < payment.amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn status(amount: Option<Decimal>) -> TransactionStatus {
        TransactionStatus {
            amount_received: amount,
            ..TransactionStatus::waiting()
        }
    }

    #[test]
    fn test_underpayment_detection() {
        let payment = Payment::crypto(Uuid::new_v4(), "BTC", dec!(0.0021), "bc1q");
        assert!(is_underpaid(&payment, &status(Some(dec!(0.002)))));
        assert!(!is_underpaid(&payment, &status(Some(dec!(0.0021)))));
        assert!(!is_underpaid(&payment, &status(Some(dec!(0.01)))));
        assert!(!is_underpaid(&payment, &status(None)));
    }

    #[test]
    fn test_check_serializes_with_result_tag() {
        let json = serde_json::to_value(PaymentCheck::Waiting {
            tracking: TransactionStatus {
                last_check: Utc::now(),
                ..TransactionStatus::waiting()
            },
        })
        .unwrap();
        assert_eq!(json["result"], "waiting");
        assert_eq!(json["tracking"]["status"], "waiting");
    }
}
