//! Esplora REST client used as the UTXO source.

use std::time::Duration;

use bitcoin::Txid;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::UtxoError;
use crate::network::Network;
use crate::utxo::{UnspentOutput, UtxoSource, parse_address};

/// Client for the Esplora `address/{address}/utxo` endpoint.
#[derive(Debug, Clone)]
pub struct EsploraClient {
    client: Client,
    base_url: String,
}

impl EsploraClient {
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_utxo_body(&self, network: Network, address: &str) -> Result<String, UtxoError> {
        let url = format!("{}/address/{address}/utxo", self.base_url);
        let network_error = |message: String| UtxoError::Network {
            network,
            address: address.to_string(),
            message,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| network_error(e.to_string()))?
            .error_for_status()
            .map_err(|e| network_error(e.to_string()))?;

        response.text().await.map_err(|e| network_error(e.to_string()))
    }
}

impl UtxoSource for EsploraClient {
    async fn fetch_spendable(
        &self,
        network: Network,
        address: &str,
    ) -> Result<Vec<UnspentOutput>, UtxoError> {
        parse_address(network, address)?;

        let body = self.get_utxo_body(network, address).await?;
        let outputs = parse_utxo_listing(network, address, &body)?;

        debug!(%network, address, count = outputs.len(), "esplora utxo listing");
        Ok(outputs)
    }
}

#[derive(Debug, Deserialize)]
struct EsploraUtxo {
    txid: Txid,
    vout: u32,
    value: u64,
}

/// Parse an Esplora UTXO listing for `address`.
pub fn parse_utxo_listing(
    network: Network,
    address: &str,
    body: &str,
) -> Result<Vec<UnspentOutput>, UtxoError> {
    let entries: Vec<EsploraUtxo> =
        serde_json::from_str(body).map_err(|e| UtxoError::Malformed {
            address: address.to_string(),
            message: e.to_string(),
        })?;

    entries
        .into_iter()
        .map(|entry| {
            UnspentOutput::from_parts(network, address, entry.txid, entry.vout, entry.value)
        })
        .collect()
}
