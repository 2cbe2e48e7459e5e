use crate::config::TrackerSettings;
use crate::domain::ports::ExplorerProviderBox;
use crate::domain::tracking::{PayCurrency, Sighting, TransactionStatus};
use crate::error::Result;
use crate::infrastructure::explorers::{http_client, providers_for};
use futures::future::join_all;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::timeout;

/// Races the explorer providers of one currency and keeps the best answer.
///
/// Every provider is queried concurrently under its own deadline. Providers that
/// fail, time out, or find nothing are left out; among the rest the sighting with
/// the most confirmations wins.
pub struct ChainTracker {
    currency: PayCurrency,
    providers: Vec<ExplorerProviderBox>,
    timeout: Duration,
}

impl ChainTracker {
    pub fn new(
        currency: PayCurrency,
        providers: Vec<ExplorerProviderBox>,
        timeout: Duration,
    ) -> Self {
        Self {
            currency,
            providers,
            timeout,
        }
    }

    pub fn currency(&self) -> PayCurrency {
        self.currency
    }

    pub async fn track(&self, address: &str, min_timestamp: Option<i64>) -> TransactionStatus {
        let lookups = self.providers.iter().map(|provider| async move {
            let outcome = timeout(self.timeout, provider.lookup(address, min_timestamp)).await;
            match outcome {
                Ok(Ok(sighting)) => Some(sighting),
                Ok(Err(e)) => {
                    tracing::warn!(
                        currency = %self.currency,
                        provider = provider.name(),
                        error = %e,
                        "Explorer lookup failed"
                    );
                    None
                }
                Err(_) => {
                    tracing::warn!(
                        currency = %self.currency,
                        provider = provider.name(),
                        timeout_ms = self.timeout.as_millis() as u64,
                        "Explorer lookup timed out"
                    );
                    None
                }
            }
        });

        let answers: Vec<Option<Option<Sighting>>> = join_all(lookups).await;
        let answered = answers.iter().filter(|a| a.is_some()).count();

        let best = answers
            .into_iter()
            .flatten()
            .flatten()
            .max_by_key(|sighting| sighting.confirmations);

        match best {
            Some(sighting) => {
                tracing::debug!(
                    currency = %self.currency,
                    tx_id = %sighting.tx_id,
                    confirmations = sighting.confirmations,
                    "Transaction sighted"
                );
                TransactionStatus::from_sighting(sighting, self.currency.confirmation_threshold())
            }
            None if answered == 0 && !self.providers.is_empty() => TransactionStatus::failed(),
            None => TransactionStatus::waiting(),
        }
    }
}

/// Routes an `(address, currency)` pair to the tracker for that currency.
pub struct TrackingDispatcher {
    trackers: HashMap<PayCurrency, ChainTracker>,
}

impl TrackingDispatcher {
    pub fn new(trackers: Vec<ChainTracker>) -> Self {
        Self {
            trackers: trackers.into_iter().map(|t| (t.currency(), t)).collect(),
        }
    }

    /// Wires the public explorers for every supported currency.
    pub fn from_settings(settings: &TrackerSettings) -> Result<Self> {
        let client = http_client(settings)?;
        let trackers = PayCurrency::ALL
            .into_iter()
            .map(|currency| {
                ChainTracker::new(
                    currency,
                    providers_for(currency, settings, &client),
                    settings.provider_timeout,
                )
            })
            .collect();
        Ok(Self::new(trackers))
    }

    /// Best known status for `address`.
    ///
    /// Unknown currencies are reported as `waiting`, never as an error.
    pub async fn track_address_status(
        &self,
        address: &str,
        currency: &str,
        min_timestamp: Option<i64>,
    ) -> TransactionStatus {
        let Some(tracker) = PayCurrency::parse(currency).and_then(|c| self.trackers.get(&c)) else {
            tracing::debug!(currency, "No tracker for currency");
            return TransactionStatus::waiting();
        };
        tracker.track(address, min_timestamp).await
    }
}
