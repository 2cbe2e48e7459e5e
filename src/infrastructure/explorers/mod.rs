//! HTTP adapters for public block explorers.
//!
//! Each provider normalizes its API into a [`Sighting`](crate::domain::tracking::Sighting);
//! [`providers_for`] wires the providers used for each currency.

pub mod chain_so;
pub mod esplora;
pub mod etherscan;
pub mod solana;
pub mod tron;

use crate::config::TrackerSettings;
use crate::domain::ports::ExplorerProviderBox;
use crate::domain::tracking::PayCurrency;
use crate::error::Result;
use chain_so::ChainSoProvider;
use esplora::EsploraProvider;
use etherscan::{EtherscanProvider, TransferKind, USDT_BEP20_CONTRACT, USDT_ERC20_CONTRACT};
use reqwest::Client;
use solana::SolanaRpcProvider;
use tron::{TronGridProvider, USDT_TRC20_CONTRACT};

/// Shared client for explorer calls. Its timeout backs up the per-provider deadline.
pub fn http_client(settings: &TrackerSettings) -> Result<Client> {
    let client = Client::builder()
        .timeout(settings.provider_timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// The independent providers raced for `currency`.
pub fn providers_for(
    currency: PayCurrency,
    settings: &TrackerSettings,
    client: &Client,
) -> Vec<ExplorerProviderBox> {
    let urls = &settings.endpoints;
    match currency {
        PayCurrency::Btc => vec![
            Box::new(EsploraProvider::new("mempool.space", &urls.mempool, client.clone())),
            Box::new(EsploraProvider::new("blockstream.info", &urls.blockstream, client.clone())),
        ],
        PayCurrency::Ltc => vec![
            Box::new(EsploraProvider::new(
                "litecoinspace.org",
                &urls.litecoinspace,
                client.clone(),
            )),
            Box::new(ChainSoProvider::new("LTC", &urls.chain_so, client.clone())),
        ],
        PayCurrency::Doge => vec![Box::new(ChainSoProvider::new(
            "DOGE",
            &urls.chain_so,
            client.clone(),
        ))],
        PayCurrency::Eth => vec![Box::new(EtherscanProvider::new(
            "etherscan",
            &urls.etherscan,
            settings.etherscan_api_key.clone(),
            TransferKind::Native,
            client.clone(),
        ))],
        PayCurrency::UsdtErc20 => vec![Box::new(EtherscanProvider::new(
            "etherscan",
            &urls.etherscan,
            settings.etherscan_api_key.clone(),
            TransferKind::Token {
                contract: USDT_ERC20_CONTRACT,
            },
            client.clone(),
        ))],
        PayCurrency::Bnb => vec![Box::new(EtherscanProvider::new(
            "bscscan",
            &urls.bscscan,
            settings.bscscan_api_key.clone(),
            TransferKind::Native,
            client.clone(),
        ))],
        PayCurrency::UsdtBep20 => vec![Box::new(EtherscanProvider::new(
            "bscscan",
            &urls.bscscan,
            settings.bscscan_api_key.clone(),
            TransferKind::Token {
                contract: USDT_BEP20_CONTRACT,
            },
            client.clone(),
        ))],
        PayCurrency::Sol => vec![Box::new(SolanaRpcProvider::new(
            &urls.solana_rpc,
            client.clone(),
        ))],
        PayCurrency::Trx => vec![Box::new(TronGridProvider::native(
            &urls.trongrid,
            client.clone(),
        ))],
        PayCurrency::UsdtTrc20 => vec![Box::new(TronGridProvider::trc20(
            &urls.trongrid,
            USDT_TRC20_CONTRACT,
            client.clone(),
        ))],
    }
}
