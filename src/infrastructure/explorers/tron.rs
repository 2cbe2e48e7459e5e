//! TronGrid v1 account APIs for TRX and TRC20 transfers.

use crate::domain::ports::ExplorerProvider;
use crate::domain::tracking::{Sighting, from_minor_units, parse_minor_units, passes_min_timestamp};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;

pub const SUN_DECIMALS: u32 = 6;
pub const USDT_TRC20_CONTRACT: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: serde::de::DeserializeOwned"))]
pub struct TronList<T> {
    #[serde(default)]
    pub data: Vec<T>,
    #[serde(default = "default_success")]
    pub success: bool,
}

fn default_success() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TronTx {
    #[serde(rename = "txID")]
    pub tx_id: String,
    #[serde(default)]
    pub block_number: Option<u64>,
    /// Milliseconds.
    #[serde(default, rename = "block_timestamp")]
    pub block_timestamp: Option<i64>,
    #[serde(default)]
    pub ret: Vec<TronRet>,
    #[serde(rename = "raw_data")]
    pub raw_data: TronRawData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TronRet {
    #[serde(default)]
    pub contract_ret: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TronRawData {
    #[serde(default)]
    pub contract: Vec<TronContract>,
}

#[derive(Debug, Deserialize)]
pub struct TronContract {
    #[serde(rename = "type")]
    pub kind: String,
    pub parameter: TronParameter,
}

#[derive(Debug, Deserialize)]
pub struct TronParameter {
    pub value: TronTransferValue,
}

#[derive(Debug, Deserialize)]
pub struct TronTransferValue {
    #[serde(default)]
    pub amount: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct Trc20Transfer {
    pub transaction_id: String,
    pub block_timestamp: i64,
    pub value: String,
    #[serde(default)]
    pub to: String,
    pub token_info: Trc20TokenInfo,
}

#[derive(Debug, Deserialize)]
pub struct Trc20TokenInfo {
    #[serde(default)]
    pub decimals: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct NowBlock {
    block_header: NowBlockHeader,
}

#[derive(Debug, Deserialize)]
struct NowBlockHeader {
    raw_data: NowBlockRaw,
}

#[derive(Debug, Deserialize)]
struct NowBlockRaw {
    number: u64,
}

impl TronTx {
    fn succeeded(&self) -> bool {
        self.ret
            .iter()
            .all(|r| r.contract_ret.as_deref().is_none_or(|ret| ret == "SUCCESS"))
    }

    fn transferred_sun(&self) -> i64 {
        self.raw_data
            .contract
            .iter()
            .filter(|c| c.kind == "TransferContract")
            .filter_map(|c| c.parameter.value.amount)
            .sum()
    }
}

/// Newest successful native transfer, listed with `only_to=true` so every entry pays the address.
pub fn select_trx_sighting(
    txs: &[TronTx],
    now_block: Option<u64>,
    min_timestamp: Option<i64>,
) -> Option<Sighting> {
    txs.iter().find_map(|tx| {
        if !tx.succeeded() {
            return None;
        }
        let sun = tx.transferred_sun();
        if sun <= 0 {
            return None;
        }
        let timestamp = tx.block_timestamp.map(|ms| ms / 1000);
        if !passes_min_timestamp(true, timestamp, min_timestamp) {
            return None;
        }
        let confirmations = match (tx.block_number, now_block) {
            (Some(block), Some(now)) if now >= block => now - block + 1,
            _ => 1,
        };
        Some(Sighting {
            tx_id: tx.tx_id.clone(),
            confirmations,
            amount: from_minor_units(sun as i128, SUN_DECIMALS),
            timestamp,
        })
    })
}

/// Newest TRC20 transfer into `address`.
pub fn select_trc20_sighting(
    transfers: &[Trc20Transfer],
    address: &str,
    min_timestamp: Option<i64>,
) -> Option<Sighting> {
    transfers.iter().find_map(|transfer| {
        if transfer.to != address {
            return None;
        }
        let timestamp = Some(transfer.block_timestamp / 1000);
        if !passes_min_timestamp(true, timestamp, min_timestamp) {
            return None;
        }
        let decimals = transfer.token_info.decimals.unwrap_or(SUN_DECIMALS);
        let amount = parse_minor_units(&transfer.value, decimals)?;
        if amount.is_zero() {
            return None;
        }
        Some(Sighting {
            tx_id: transfer.transaction_id.clone(),
            confirmations: 1,
            amount: Some(amount),
            timestamp,
        })
    })
}

pub struct TronGridProvider {
    base_url: String,
    /// `None` tracks native TRX; `Some` tracks that TRC20 contract.
    contract: Option<&'static str>,
    client: Client,
}

impl TronGridProvider {
    pub fn native(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            contract: None,
            client,
        }
    }

    pub fn trc20(base_url: impl Into<String>, contract: &'static str, client: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            contract: Some(contract),
            client,
        }
    }

    async fn now_block(&self) -> Result<u64> {
        let block: NowBlock = self
            .client
            .post(format!("{}/wallet/getnowblock", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(block.block_header.raw_data.number)
    }

    async fn list<T: DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let list: TronList<T> = self
            .client
            .get(url)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if !list.success {
            return Err(PipelineError::ValidationError(
                "trongrid reported success=false".to_string(),
            ));
        }
        Ok(list.data)
    }
}

#[async_trait]
impl ExplorerProvider for TronGridProvider {
    fn name(&self) -> &str {
        "trongrid"
    }

    async fn lookup(&self, address: &str, min_timestamp: Option<i64>) -> Result<Option<Sighting>> {
        match self.contract {
            None => {
                let txs: Vec<TronTx> = self
                    .list(
                        format!("{}/v1/accounts/{}/transactions", self.base_url, address),
                        &[("only_to", "true"), ("only_confirmed", "true"), ("limit", "20")],
                    )
                    .await?;
                if txs.is_empty() {
                    return Ok(None);
                }
                let now = match self.now_block().await {
                    Ok(number) => Some(number),
                    Err(e) => {
                        tracing::debug!(error = %e, "TRON head block unavailable");
                        None
                    }
                };
                Ok(select_trx_sighting(&txs, now, min_timestamp))
            }
            Some(contract) => {
                let transfers: Vec<Trc20Transfer> = self
                    .list(
                        format!("{}/v1/accounts/{}/transactions/trc20", self.base_url, address),
                        &[
                            ("only_to", "true"),
                            ("only_confirmed", "true"),
                            ("limit", "20"),
                            ("contract_address", contract),
                        ],
                    )
                    .await?;
                Ok(select_trc20_sighting(&transfers, address, min_timestamp))
            }
        }
    }
}
