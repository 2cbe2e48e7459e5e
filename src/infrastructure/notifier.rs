use crate::domain::delivery::DeliveredAsset;
use crate::domain::order::Order;
use crate::domain::ports::Notifier;
use crate::error::Result;
use async_trait::async_trait;

/// Records delivery emails in the log instead of sending them.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_delivery_completed(
        &self,
        order: &Order,
        assets: &[DeliveredAsset],
    ) -> Result<()> {
        tracing::info!(
            order_id = %order.id,
            readable_id = %order.readable_id,
            email = %order.email,
            assets = assets.len(),
            "Delivery email queued"
        );
        Ok(())
    }
}
