use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use bitcoin::Txid;
use psbt_swap::{Network, SigningRoles, SpendablePair, UnspentOutput};
use serde::Deserialize;
use serde::de::DeserializeOwned;

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("'{}' is not valid JSON", path.display()))
}

#[derive(Debug, Deserialize)]
struct UtxoEntry {
    txid: Txid,
    vout: u32,
    value: u64,
}

#[derive(Debug, Deserialize)]
struct UtxoFile {
    #[serde(default)]
    payment: Vec<UtxoEntry>,
    #[serde(default)]
    ordinals: Vec<UtxoEntry>,
}

/// Load a stored UTXO listing and attribute each side to its role's address.
pub fn load_spendable(
    path: &Path,
    network: Network,
    roles: &SigningRoles,
) -> Result<SpendablePair> {
    let file: UtxoFile = read_json(path)?;

    let normalize = |entries: Vec<UtxoEntry>, address: &str| -> Result<Vec<UnspentOutput>> {
        entries
            .into_iter()
            .map(|entry| {
                UnspentOutput::from_parts(network, address, entry.txid, entry.vout, entry.value)
                    .with_context(|| format!("invalid UTXO {}:{}", entry.txid, entry.vout))
            })
            .collect()
    };

    Ok(SpendablePair {
        payment: normalize(file.payment, &roles.payment.address)?,
        ordinals: normalize(file.ordinals, &roles.ordinals.address)?,
    })
}
