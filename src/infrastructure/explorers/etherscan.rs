//! Etherscan-style account APIs (api.etherscan.io, api.bscscan.com).

use crate::domain::ports::ExplorerProvider;
use crate::domain::tracking::{Sighting, parse_minor_units, passes_min_timestamp};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

pub const NATIVE_DECIMALS: u32 = 18;
pub const USDT_ERC20_CONTRACT: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";
pub const USDT_BEP20_CONTRACT: &str = "0x55d398326f99059fF775485246999027B3197955";

/// What to list: native coin transfers or transfers of one token contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferKind {
    Native,
    Token { contract: &'static str },
}

#[derive(Debug, Deserialize)]
pub struct EtherscanResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    pub result: EtherscanResult,
}

/// `result` is a list on success and an explanatory string on failure.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum EtherscanResult {
    Transfers(Vec<EtherscanTx>),
    Message(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtherscanTx {
    pub hash: String,
    #[serde(default)]
    pub to: String,
    pub value: String,
    #[serde(default)]
    pub confirmations: String,
    pub time_stamp: String,
    #[serde(default)]
    pub is_error: Option<String>,
    #[serde(default)]
    pub token_decimal: Option<String>,
}

pub struct EtherscanProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    kind: TransferKind,
    client: Client,
}

impl EtherscanProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        kind: TransferKind,
        client: Client,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            api_key,
            kind,
            client,
        }
    }

    fn query(&self, address: &str) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("module", "account".to_string()),
            ("address", address.to_string()),
            ("page", "1".to_string()),
            ("offset", "25".to_string()),
            ("sort", "desc".to_string()),
        ];
        match &self.kind {
            TransferKind::Native => query.push(("action", "txlist".to_string())),
            TransferKind::Token { contract } => {
                query.push(("action", "tokentx".to_string()));
                query.push(("contractaddress", contract.to_string()));
            }
        }
        if let Some(key) = &self.api_key {
            query.push(("apikey", key.clone()));
        }
        query
    }
}

#[async_trait]
impl ExplorerProvider for EtherscanProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, address: &str, min_timestamp: Option<i64>) -> Result<Option<Sighting>> {
        let response: EtherscanResponse = self
            .client
            .get(&self.base_url)
            .query(&self.query(address))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match response.result {
            EtherscanResult::Transfers(txs) => {
                Ok(select_sighting(&txs, &self.kind, address, min_timestamp))
            }
            // "No transactions found" comes back as status 0 with an empty list.
            EtherscanResult::Message(message) => Err(PipelineError::ValidationError(format!(
                "{} returned status {}: {} ({})",
                self.name, response.status, response.message, message
            ))),
        }
    }
}

/// Newest successful transfer into `address`. Listed transfers are always mined.
pub fn select_sighting(
    txs: &[EtherscanTx],
    kind: &TransferKind,
    address: &str,
    min_timestamp: Option<i64>,
) -> Option<Sighting> {
    txs.iter().find_map(|tx| {
        if !tx.to.eq_ignore_ascii_case(address) || tx.is_error.as_deref() == Some("1") {
            return None;
        }
        let timestamp = tx.time_stamp.trim().parse::<i64>().ok();
        if !passes_min_timestamp(true, timestamp, min_timestamp) {
            return None;
        }
        let decimals = match kind {
            TransferKind::Native => NATIVE_DECIMALS,
            TransferKind::Token { .. } => tx
                .token_decimal
                .as_deref()
                .and_then(|d| d.trim().parse().ok())
                .unwrap_or(NATIVE_DECIMALS),
        };
        let amount = parse_minor_units(&tx.value, decimals)?;
        if amount.is_zero() {
            return None;
        }
        Some(Sighting {
            tx_id: tx.hash.clone(),
            confirmations: tx.confirmations.trim().parse().unwrap_or(1),
            amount: Some(amount),
            timestamp,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const ADDRESS: &str = "0xAbC0000000000000000000000000000000000001";

    fn response(json: &str) -> EtherscanResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_native_transfer_matches_case_insensitively() {
        let parsed = response(r#"{"status": "1", "message": "OK", "result": [
            {"hash": "0x1", "to": "0xabc0000000000000000000000000000000000001",
             "value": "250000000000000000", "confirmations": "5", "timeStamp": "1700000100", "isError": "0"}
        ]}"#);
        let EtherscanResult::Transfers(txs) = parsed.result else {
            panic!("expected transfers");
        };
        let sighting =
            select_sighting(&txs, &TransferKind::Native, ADDRESS, Some(1_700_000_000)).unwrap();
        assert_eq!(sighting.amount, Some(dec!(0.25)));
        assert_eq!(sighting.confirmations, 5);
        assert_eq!(sighting.timestamp, Some(1_700_000_100));
    }

    #[test]
    fn test_failed_and_stale_transfers_are_skipped() {
        let parsed = response(r#"{"status": "1", "message": "OK", "result": [
            {"hash": "0xfail", "to": "0xabc0000000000000000000000000000000000001",
             "value": "1000", "confirmations": "9", "timeStamp": "1700000100", "isError": "1"},
            {"hash": "0xold", "to": "0xabc0000000000000000000000000000000000001",
             "value": "1000", "confirmations": "900", "timeStamp": "1600000000", "isError": "0"}
        ]}"#);
        let EtherscanResult::Transfers(txs) = parsed.result else {
            panic!("expected transfers");
        };
        assert!(
            select_sighting(&txs, &TransferKind::Native, ADDRESS, Some(1_700_000_000)).is_none()
        );
    }

    #[test]
    fn test_token_transfer_uses_token_decimals() {
        let parsed = response(r#"{"status": "1", "message": "OK", "result": [
            {"hash": "0xt", "to": "0xabc0000000000000000000000000000000000001",
             "value": "150000000", "confirmations": "1", "timeStamp": "1700000100", "tokenDecimal": "6"}
        ]}"#);
        let EtherscanResult::Transfers(txs) = parsed.result else {
            panic!("expected transfers");
        };
        let kind = TransferKind::Token {
            contract: USDT_ERC20_CONTRACT,
        };
        let sighting = select_sighting(&txs, &kind, ADDRESS, None).unwrap();
        assert_eq!(sighting.amount, Some(dec!(150)));
    }

    #[test]
    fn test_error_message_result() {
        let parsed =
            response(r#"{"status": "0", "message": "NOTOK", "result": "Max rate limit reached"}"#);
        assert!(matches!(parsed.result, EtherscanResult::Message(_)));

        let empty =
            response(r#"{"status": "0", "message": "No transactions found", "result": []}"#);
        assert!(matches!(empty.result, EtherscanResult::Transfers(ref txs) if txs.is_empty()));
    }
}
