use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Currencies the tracker knows how to watch.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
pub enum PayCurrency {
    Btc,
    Ltc,
    Eth,
    UsdtErc20,
    Sol,
    Doge,
    Trx,
    UsdtTrc20,
    Bnb,
    UsdtBep20,
}

impl PayCurrency {
    pub const ALL: [PayCurrency; 10] = [
        PayCurrency::Btc,
        PayCurrency::Ltc,
        PayCurrency::Eth,
        PayCurrency::UsdtErc20,
        PayCurrency::Sol,
        PayCurrency::Doge,
        PayCurrency::Trx,
        PayCurrency::UsdtTrc20,
        PayCurrency::Bnb,
        PayCurrency::UsdtBep20,
    ];

    /// Resolves a currency code or alias, case-insensitively.
    pub fn parse(code: &str) -> Option<Self> {
        let code = code.trim().to_uppercase();
        let currency = match code.as_str() {
            "BTC" | "BITCOIN" => PayCurrency::Btc,
            "LTC" | "LITECOIN" => PayCurrency::Ltc,
            "ETH" | "ETHEREUM" => PayCurrency::Eth,
            "USDT" | "USDT_ERC20" | "USDT-ERC20" | "ERC20" => PayCurrency::UsdtErc20,
            "SOL" | "SOLANA" => PayCurrency::Sol,
            "DOGE" | "DOGECOIN" => PayCurrency::Doge,
            "TRX" | "TRON" => PayCurrency::Trx,
            "USDT_TRC20" | "USDT-TRC20" | "TRC20" => PayCurrency::UsdtTrc20,
            "BNB" | "BSC" | "BNB_BSC" => PayCurrency::Bnb,
            "USDT_BEP20" | "USDT-BEP20" | "BEP20" => PayCurrency::UsdtBep20,
            _ => return None,
        };
        Some(currency)
    }

    /// Confirmations needed before a payment counts as settled.
    ///
    /// Faster chains are accepted after a single confirmation.
    pub fn confirmation_threshold(&self) -> u64 {
        match self {
            PayCurrency::Btc
            | PayCurrency::Eth
            | PayCurrency::UsdtErc20
            | PayCurrency::Bnb
            | PayCurrency::UsdtBep20 => 2,
            PayCurrency::Ltc
            | PayCurrency::Doge
            | PayCurrency::Trx
            | PayCurrency::UsdtTrc20
            | PayCurrency::Sol => 1,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PayCurrency::Btc => "BTC",
            PayCurrency::Ltc => "LTC",
            PayCurrency::Eth => "ETH",
            PayCurrency::UsdtErc20 => "USDT_ERC20",
            PayCurrency::Sol => "SOL",
            PayCurrency::Doge => "DOGE",
            PayCurrency::Trx => "TRX",
            PayCurrency::UsdtTrc20 => "USDT_TRC20",
            PayCurrency::Bnb => "BNB",
            PayCurrency::UsdtBep20 => "USDT_BEP20",
        }
    }
}

impl std::fmt::Display for PayCurrency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TrackingState {
    Waiting,
    Detected,
    Confirmed,
    /// No provider answered at all.
    Failed,
}

/// One provider's view of the best qualifying transaction for an address.
#[derive(Debug, Clone, PartialEq)]
pub struct Sighting {
    pub tx_id: String,
    pub confirmations: u64,
    pub amount: Option<Decimal>,
    /// Block time in unix seconds; `None` while unconfirmed.
    pub timestamp: Option<i64>,
}

/// Normalized result of one tracking poll. Never persisted.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatus {
    pub detected: bool,
    pub confirmations: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
    pub status: TrackingState,
    pub last_check: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_received: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl TransactionStatus {
    pub fn waiting() -> Self {
        Self::undetected(TrackingState::Waiting)
    }

    pub fn failed() -> Self {
        Self::undetected(TrackingState::Failed)
    }

    fn undetected(status: TrackingState) -> Self {
        Self {
            detected: false,
            confirmations: 0,
            tx_id: None,
            status,
            last_check: Utc::now(),
            amount_received: None,
            timestamp: None,
        }
    }

    pub fn from_sighting(sighting: Sighting, threshold: u64) -> Self {
        let status = if sighting.confirmations >= threshold {
            TrackingState::Confirmed
        } else {
            TrackingState::Detected
        };
        Self {
            detected: true,
            confirmations: sighting.confirmations,
            tx_id: Some(sighting.tx_id),
            status,
            last_check: Utc::now(),
            amount_received: sighting.amount,
            timestamp: sighting.timestamp,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == TrackingState::Confirmed
    }
}

/// Stale-address guard: a confirmed transaction older than `min_timestamp` does not count.
///
/// Unconfirmed transactions have no settled block time and always pass.
pub fn passes_min_timestamp(
    confirmed: bool,
    block_time: Option<i64>,
    min_timestamp: Option<i64>,
) -> bool {
    match (confirmed, block_time, min_timestamp) {
        (true, Some(time), Some(min)) => time >= min,
        _ => true,
    }
}

/// Converts an integer amount of minor units (e.g. satoshis, wei) into whole coins.
pub fn from_minor_units(raw: i128, decimals: u32) -> Option<Decimal> {
    Decimal::try_from_i128_with_scale(raw, decimals)
        .ok()
        .map(|value| value.normalize())
}

/// Same as [`from_minor_units`] for amounts explorers return as decimal strings.
pub fn parse_minor_units(raw: &str, decimals: u32) -> Option<Decimal> {
    raw.trim().parse::<i128>().ok().and_then(|v| from_minor_units(v, decimals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_currency_aliases() {
        assert_eq!(PayCurrency::parse("btc"), Some(PayCurrency::Btc));
        assert_eq!(PayCurrency::parse("Bitcoin"), Some(PayCurrency::Btc));
        assert_eq!(PayCurrency::parse("usdt-trc20"), Some(PayCurrency::UsdtTrc20));
        assert_eq!(PayCurrency::parse("bsc"), Some(PayCurrency::Bnb));
        assert_eq!(PayCurrency::parse("XMR"), None);
        assert_eq!(PayCurrency::parse(""), None);
    }

    #[test]
    fn test_every_code_round_trips_through_parse() {
        for currency in PayCurrency::ALL {
            assert_eq!(PayCurrency::parse(currency.code()), Some(currency));
        }
    }

    #[test]
    fn test_thresholds() {
        assert_eq!(PayCurrency::Btc.confirmation_threshold(), 2);
        assert_eq!(PayCurrency::Bnb.confirmation_threshold(), 2);
        assert_eq!(PayCurrency::Ltc.confirmation_threshold(), 1);
        assert_eq!(PayCurrency::Trx.confirmation_threshold(), 1);
    }

    #[test]
    fn test_status_from_sighting() {
        let sighting = Sighting {
            tx_id: "abc".to_string(),
            confirmations: 1,
            amount: Some(dec!(0.5)),
            timestamp: Some(1_700_000_000),
        };
        let btc = TransactionStatus::from_sighting(sighting.clone(), 2);
        assert!(btc.detected);
        assert_eq!(btc.status, TrackingState::Detected);

        let ltc = TransactionStatus::from_sighting(sighting, 1);
        assert_eq!(ltc.status, TrackingState::Confirmed);
        assert!(ltc.is_confirmed());
    }

    #[test]
    fn test_min_timestamp_rule() {
        assert!(!passes_min_timestamp(true, Some(100), Some(200)));
        assert!(passes_min_timestamp(true, Some(300), Some(200)));
        assert!(passes_min_timestamp(false, Some(100), Some(200)));
        assert!(passes_min_timestamp(false, None, Some(200)));
        assert!(passes_min_timestamp(true, Some(100), None));
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(from_minor_units(210_000, 8), Some(dec!(0.0021)));
        assert_eq!(
            parse_minor_units("1500000000000000000", 18),
            Some(dec!(1.5))
        );
        assert_eq!(parse_minor_units("12.5", 6), None);
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let json = serde_json::to_value(TransactionStatus::waiting()).unwrap();
        assert_eq!(json["detected"], false);
        assert_eq!(json["status"], "waiting");
        assert!(json.get("lastCheck").is_some());
        assert!(json.get("txId").is_none());
    }
}
