//! chain.so v2 API, used for LTC and DOGE.

use crate::domain::ports::ExplorerProvider;
use crate::domain::tracking::{Sighting, passes_min_timestamp};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ChainSoResponse {
    pub status: String,
    #[serde(default)]
    pub data: Option<ChainSoData>,
}

#[derive(Debug, Deserialize)]
pub struct ChainSoData {
    #[serde(default)]
    pub txs: Vec<ChainSoTx>,
}

/// One received output. `value` is already in whole coins.
#[derive(Debug, Deserialize)]
pub struct ChainSoTx {
    pub txid: String,
    pub value: String,
    #[serde(default)]
    pub confirmations: u64,
    #[serde(default)]
    pub time: Option<i64>,
}

pub struct ChainSoProvider {
    network: &'static str,
    base_url: String,
    client: Client,
}

impl ChainSoProvider {
    pub fn new(network: &'static str, base_url: impl Into<String>, client: Client) -> Self {
        Self {
            network,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl ExplorerProvider for ChainSoProvider {
    fn name(&self) -> &str {
        "chain.so"
    }

    async fn lookup(&self, address: &str, min_timestamp: Option<i64>) -> Result<Option<Sighting>> {
        let response: ChainSoResponse = self
            .client
            .get(format!(
                "{}/get_tx_received/{}/{}",
                self.base_url, self.network, address
            ))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.status != "success" {
            return Err(PipelineError::ValidationError(format!(
                "chain.so returned status '{}'",
                response.status
            )));
        }
        let txs = response.data.map(|d| d.txs).unwrap_or_default();
        Ok(select_sighting(&txs, min_timestamp))
    }
}

/// Newest qualifying transaction, with outputs of the same txid summed.
pub fn select_sighting(txs: &[ChainSoTx], min_timestamp: Option<i64>) -> Option<Sighting> {
    let mut sightings: Vec<Sighting> = Vec::new();
    for tx in txs {
        let Ok(value) = tx.value.trim().parse::<Decimal>() else {
            continue;
        };
        if value <= Decimal::ZERO {
            continue;
        }
        if !passes_min_timestamp(tx.confirmations > 0, tx.time, min_timestamp) {
            continue;
        }
        match sightings.iter_mut().find(|s| s.tx_id == tx.txid) {
            Some(existing) => {
                existing.amount = existing.amount.map(|amount| amount + value);
            }
            None => sightings.push(Sighting {
                tx_id: tx.txid.clone(),
                confirmations: tx.confirmations,
                amount: Some(value),
                timestamp: tx.time,
            }),
        }
    }
    sightings
        .into_iter()
        .max_by_key(|s| s.timestamp.unwrap_or(i64::MAX))
}
