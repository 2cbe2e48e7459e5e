//! Solana JSON-RPC: `getSignaturesForAddress` then `getTransaction` for the balance change.

use crate::domain::ports::ExplorerProvider;
use crate::domain::tracking::{Sighting, from_minor_units, passes_min_timestamp};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

const LAMPORTS_DECIMALS: u32 = 9;
const SIGNATURE_LIMIT: usize = 10;
/// Candidates inspected with `getTransaction` per lookup.
const MAX_TRANSACTION_FETCHES: usize = 5;
/// Depth reported for `finalized` signatures (the maximum vote lockout).
const FINALIZED_CONFIRMATIONS: u64 = 32;

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureInfo {
    pub signature: String,
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub confirmation_status: Option<String>,
    #[serde(default)]
    pub err: Option<Value>,
}

impl SignatureInfo {
    pub fn confirmations(&self) -> u64 {
        match self.confirmation_status.as_deref() {
            Some("finalized") => FINALIZED_CONFIRMATIONS,
            Some("confirmed") => 1,
            _ => 0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetail {
    pub meta: Option<TransactionMeta>,
    pub transaction: TransactionBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    pub pre_balances: Vec<u64>,
    pub post_balances: Vec<u64>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionBody {
    pub message: TransactionMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMessage {
    pub account_keys: Vec<String>,
}

impl TransactionDetail {
    /// Lamports gained by `address` in this transaction, if positive.
    pub fn received_by(&self, address: &str) -> Option<u64> {
        let meta = self.meta.as_ref()?;
        let index = self
            .transaction
            .message
            .account_keys
            .iter()
            .position(|key| key == address)?;
        let pre = *meta.pre_balances.get(index)?;
        let post = *meta.post_balances.get(index)?;
        post.checked_sub(pre).filter(|gain| *gain > 0)
    }
}

pub struct SolanaRpcProvider {
    rpc_url: String,
    client: Client,
}

impl SolanaRpcProvider {
    pub fn new(rpc_url: impl Into<String>, client: Client) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            client,
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response: RpcResponse<T> = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if let Some(error) = response.error {
            return Err(PipelineError::ValidationError(format!(
                "{} failed: {}",
                method, error
            )));
        }
        Ok(response.result)
    }
}

#[async_trait]
impl ExplorerProvider for SolanaRpcProvider {
    fn name(&self) -> &str {
        "solana-rpc"
    }

    async fn lookup(&self, address: &str, min_timestamp: Option<i64>) -> Result<Option<Sighting>> {
        let signatures: Vec<SignatureInfo> = self
            .call(
                "getSignaturesForAddress",
                json!([address, { "limit": SIGNATURE_LIMIT }]),
            )
            .await?
            .unwrap_or_default();

        for info in candidate_signatures(&signatures, min_timestamp)
            .into_iter()
            .take(MAX_TRANSACTION_FETCHES)
        {
            let detail: Option<TransactionDetail> = self
                .call(
                    "getTransaction",
                    json!([info.signature, { "encoding": "json", "maxSupportedTransactionVersion": 0 }]),
                )
                .await?;
            let Some(received) = detail.and_then(|d| d.received_by(address)) else {
                continue;
            };
            return Ok(Some(Sighting {
                tx_id: info.signature.clone(),
                confirmations: info.confirmations(),
                amount: from_minor_units(received as i128, LAMPORTS_DECIMALS),
                timestamp: info.block_time,
            }));
        }
        Ok(None)
    }
}

/// Successful signatures that survive the stale-address guard, newest first.
pub fn candidate_signatures(
    signatures: &[SignatureInfo],
    min_timestamp: Option<i64>,
) -> Vec<&SignatureInfo> {
    signatures
        .iter()
        .filter(|s| s.err.as_ref().is_none_or(Value::is_null))
        .filter(|s| passes_min_timestamp(s.confirmations() > 0, s.block_time, min_timestamp))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_filter_errors_and_stale() {
        let signatures: Vec<SignatureInfo> = serde_json::from_str(
            r#"[
                {"signature": "new", "blockTime": 1700000100, "confirmationStatus": "processed", "err": null},
                {"signature": "failed", "blockTime": 1700000090, "confirmationStatus": "finalized", "err": {"InstructionError": [0, "Custom"]}},
                {"signature": "old", "blockTime": 1600000000, "confirmationStatus": "finalized", "err": null}
            ]"#,
        )
        .unwrap();
        let candidates = candidate_signatures(&signatures, Some(1_700_000_000));
        let names: Vec<&str> = candidates.iter().map(|s| s.signature.as_str()).collect();
        assert_eq!(names, vec!["new"]);
        assert_eq!(candidates[0].confirmations(), 0);
    }

    #[test]
    fn test_received_by_balance_delta() {
        let detail: TransactionDetail = serde_json::from_str(
            r#"{
                "meta": {"preBalances": [5000000000, 100], "postBalances": [3499995000, 1500000100]},
                "transaction": {"message": {"accountKeys": ["payer", "merchant"]}}
            }"#,
        )
        .unwrap();
        assert_eq!(detail.received_by("merchant"), Some(1_500_000_000));
        assert_eq!(detail.received_by("payer"), None);
        assert_eq!(detail.received_by("nobody"), None);
    }

    #[test]
    fn test_finalized_counts_as_deep() {
        let info = SignatureInfo {
            signature: "s".to_string(),
            block_time: None,
            confirmation_status: Some("finalized".to_string()),
            err: None,
        };
        assert_eq!(info.confirmations(), FINALIZED_CONFIRMATIONS);
    }
}
