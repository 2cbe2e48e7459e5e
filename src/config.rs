//! Runtime settings, loaded from the environment (and an optional `.env` file).
//!
//! Settings are plain values passed into the components that need them.

use crate::domain::product::SelectionMethod;
use crate::error::{PipelineError, Result};
use chrono::Duration as ChronoDuration;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Merchant-wide knobs read by the delivery orchestrator.
#[derive(Debug, Clone)]
pub struct DeliverySettings {
    /// Key for the `X-Signature` HMAC on dynamic delivery webhooks.
    pub webhook_secret: String,
    pub notify_on_delivery: bool,
    pub serial_selection: SelectionMethod,
    pub webhook_timeout: Duration,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            webhook_secret: String::new(),
            notify_on_delivery: true,
            serial_selection: SelectionMethod::Last,
            webhook_timeout: Duration::from_secs(10),
        }
    }
}

/// Base URLs of the block explorers, overridable for tests and self-hosted mirrors.
#[derive(Debug, Clone)]
pub struct ExplorerEndpoints {
    pub mempool: String,
    pub blockstream: String,
    pub litecoinspace: String,
    pub chain_so: String,
    pub etherscan: String,
    pub bscscan: String,
    pub solana_rpc: String,
    pub trongrid: String,
}

impl Default for ExplorerEndpoints {
    fn default() -> Self {
        Self {
            mempool: "https://mempool.space/api".to_string(),
            blockstream: "https://blockstream.info/api".to_string(),
            litecoinspace: "https://litecoinspace.org/api".to_string(),
            chain_so: "https://chain.so/api/v2".to_string(),
            etherscan: "https://api.etherscan.io/api".to_string(),
            bscscan: "https://api.bscscan.com/api".to_string(),
            solana_rpc: "https://api.mainnet-beta.solana.com".to_string(),
            trongrid: "https://api.trongrid.io".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub endpoints: ExplorerEndpoints,
    pub provider_timeout: Duration,
    pub etherscan_api_key: Option<String>,
    pub bscscan_api_key: Option<String>,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            endpoints: ExplorerEndpoints::default(),
            provider_timeout: Duration::from_millis(3500),
            etherscan_api_key: None,
            bscscan_api_key: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub delivery: DeliverySettings,
    pub tracker: TrackerSettings,
    /// How long an order may stay `pending` before it reads back as `expired`.
    pub order_ttl: ChronoDuration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            delivery: DeliverySettings::default(),
            tracker: TrackerSettings::default(),
            order_ttl: ChronoDuration::hours(1),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Settings::default();

        let delivery = DeliverySettings {
            webhook_secret: env::var("WEBHOOK_SECRET").unwrap_or_default(),
            notify_on_delivery: parse_var("NOTIFY_ON_DELIVERY")?
                .unwrap_or(defaults.delivery.notify_on_delivery),
            serial_selection: parse_var("SERIAL_SELECTION")?
                .unwrap_or(defaults.delivery.serial_selection),
            webhook_timeout: parse_var::<u64>("WEBHOOK_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.delivery.webhook_timeout),
        };

        let base = defaults.tracker.endpoints;
        let endpoints = ExplorerEndpoints {
            mempool: string_var("MEMPOOL_URL").unwrap_or(base.mempool),
            blockstream: string_var("BLOCKSTREAM_URL").unwrap_or(base.blockstream),
            litecoinspace: string_var("LITECOINSPACE_URL").unwrap_or(base.litecoinspace),
            chain_so: string_var("CHAIN_SO_URL").unwrap_or(base.chain_so),
            etherscan: string_var("ETHERSCAN_URL").unwrap_or(base.etherscan),
            bscscan: string_var("BSCSCAN_URL").unwrap_or(base.bscscan),
            solana_rpc: string_var("SOLANA_RPC_URL").unwrap_or(base.solana_rpc),
            trongrid: string_var("TRONGRID_URL").unwrap_or(base.trongrid),
        };

        let tracker = TrackerSettings {
            endpoints,
            provider_timeout: parse_var::<u64>("PROVIDER_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.tracker.provider_timeout),
            etherscan_api_key: string_var("ETHERSCAN_API_KEY"),
            bscscan_api_key: string_var("BSCSCAN_API_KEY"),
        };

        let order_ttl = parse_var::<i64>("ORDER_TTL_SECS")?
            .map(ChronoDuration::seconds)
            .unwrap_or(defaults.order_ttl);

        if delivery.webhook_secret.is_empty() {
            tracing::warn!(
                "WEBHOOK_SECRET is not set; dynamic delivery signatures use an empty key"
            );
        }
        tracing::debug!(
            notify_on_delivery = delivery.notify_on_delivery,
            serial_selection = ?delivery.serial_selection,
            provider_timeout_ms = tracker.provider_timeout.as_millis() as u64,
            "Settings loaded"
        );

        Ok(Self {
            delivery,
            tracker,
            order_ttl,
        })
    }
}

fn string_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match string_var(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| PipelineError::ConfigError(format!("Invalid {}: {}", name, e))),
        None => Ok(None),
    }
}
