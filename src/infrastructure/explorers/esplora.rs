//! Esplora-compatible explorers: mempool.space, blockstream.info, litecoinspace.org.

use crate::domain::ports::ExplorerProvider;
use crate::domain::tracking::{Sighting, from_minor_units, passes_min_timestamp};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

const SATS_DECIMALS: u32 = 8;

#[derive(Debug, Deserialize)]
pub struct EsploraTx {
    pub txid: String,
    pub status: EsploraStatus,
    #[serde(default)]
    pub vout: Vec<EsploraOutput>,
}

#[derive(Debug, Deserialize)]
pub struct EsploraStatus {
    pub confirmed: bool,
    #[serde(default)]
    pub block_height: Option<u64>,
    #[serde(default)]
    pub block_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct EsploraOutput {
    #[serde(default)]
    pub scriptpubkey_address: Option<String>,
    pub value: u64,
}

pub struct EsploraProvider {
    name: String,
    base_url: String,
    client: Client,
}

impl EsploraProvider {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, client: Client) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn tip_height(&self) -> Result<u64> {
        let body = self
            .client
            .get(format!("{}/blocks/tip/height", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        body.trim().parse::<u64>().map_err(|e| {
            PipelineError::ValidationError(format!("bad tip height '{}': {}", body.trim(), e))
        })
    }
}

#[async_trait]
impl ExplorerProvider for EsploraProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, address: &str, min_timestamp: Option<i64>) -> Result<Option<Sighting>> {
        let txs: Vec<EsploraTx> = self
            .client
            .get(format!("{}/address/{}/txs", self.base_url, address))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let tip = if txs.iter().any(|tx| tx.status.confirmed) {
            match self.tip_height().await {
                Ok(height) => Some(height),
                Err(e) => {
                    tracing::debug!(provider = %self.name, error = %e, "Tip height unavailable");
                    None
                }
            }
        } else {
            None
        };

        Ok(select_sighting(&txs, tip, address, min_timestamp))
    }
}

/// Sum of the outputs of `tx` paying `address`, in satoshis.
fn received_by(tx: &EsploraTx, address: &str) -> u64 {
    tx.vout
        .iter()
        .filter(|out| out.scriptpubkey_address.as_deref() == Some(address))
        .map(|out| out.value)
        .sum()
}

/// Picks the newest transaction paying `address` that survives the stale-address guard.
///
/// Esplora lists mempool transactions first, then confirmed ones newest first.
pub fn select_sighting(
    txs: &[EsploraTx],
    tip_height: Option<u64>,
    address: &str,
    min_timestamp: Option<i64>,
) -> Option<Sighting> {
    txs.iter().find_map(|tx| {
        let received = received_by(tx, address);
        if received == 0 {
            return None;
        }
        if !passes_min_timestamp(tx.status.confirmed, tx.status.block_time, min_timestamp) {
            return None;
        }
        let confirmations = match (tx.status.confirmed, tx.status.block_height, tip_height) {
            (false, _, _) => 0,
            (true, Some(height), Some(tip)) if tip >= height => tip - height + 1,
            (true, _, _) => 1,
        };
        Some(Sighting {
            tx_id: tx.txid.clone(),
            confirmations,
            amount: from_minor_units(received as i128, SATS_DECIMALS),
            timestamp: tx.status.block_time,
        })
    })
}
