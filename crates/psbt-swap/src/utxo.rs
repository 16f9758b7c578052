//! Spendable output sets and the concurrent two-address fetch.

use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;

use bitcoin::address::NetworkUnchecked;
use bitcoin::{Address, OutPoint, ScriptBuf, Txid};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::account::{AddressRole, SigningRoles};
use crate::error::{SwapError, UtxoError};
use crate::network::Network;

/// A previously created, not yet spent output owned by one of the swap addresses.
///
/// Identified by `(txid, vout)`. Never mutated after it has been fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentOutput {
    pub txid: Txid,
    pub vout: u32,
    pub value_sats: u64,
    pub script_pubkey: ScriptBuf,
    pub owner_address: String,
}

impl UnspentOutput {
    /// Normalize a raw `(txid, vout, value)` triple reported for `owner_address`.
    ///
    /// The script pubkey is derived from the owner address, which must be valid on `network`.
    pub fn from_parts(
        network: Network,
        owner_address: &str,
        txid: Txid,
        vout: u32,
        value_sats: u64,
    ) -> Result<Self, UtxoError> {
        let address = parse_address(network, owner_address)?;

        Ok(Self {
            txid,
            vout,
            value_sats,
            script_pubkey: address.script_pubkey(),
            owner_address: owner_address.to_string(),
        })
    }

    #[must_use]
    pub const fn outpoint(&self) -> OutPoint {
        OutPoint {
            txid: self.txid,
            vout: self.vout,
        }
    }
}

pub(crate) fn parse_address(network: Network, address: &str) -> Result<Address, UtxoError> {
    Address::<NetworkUnchecked>::from_str(address)
        .map_err(|e| e.to_string())
        .and_then(|unchecked| {
            unchecked
                .require_network(network.to_bitcoin_network())
                .map_err(|e| e.to_string())
        })
        .map_err(|message| UtxoError::InvalidAddress {
            network,
            address: address.to_string(),
            message,
        })
}

/// External indexing service that lists spendable outputs of an address.
///
/// An address without outputs yields `Ok(vec![])`. `Err` is reserved for transport failures,
/// addresses that are not valid on the requested network, and malformed replies.
pub trait UtxoSource {
    fn fetch_spendable(
        &self,
        network: Network,
        address: &str,
    ) -> impl Future<Output = Result<Vec<UnspentOutput>, UtxoError>> + Send;
}

/// UTXO sets of both roles, fetched for one action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendablePair {
    pub payment: Vec<UnspentOutput>,
    pub ordinals: Vec<UnspentOutput>,
}

impl SpendablePair {
    #[must_use]
    pub fn get(&self, role: AddressRole) -> &[UnspentOutput] {
        match role {
            AddressRole::Payment => &self.payment,
            AddressRole::Ordinals => &self.ordinals,
        }
    }
}

/// Fetch both roles' outputs concurrently and wait for both replies.
///
/// Neither result is inspected until both have resolved, so a failure on one side is reported
/// together with the other side's failure instead of racing it.
pub async fn fetch_spendable_pair<S>(
    source: &S,
    network: Network,
    roles: &SigningRoles,
) -> Result<SpendablePair, SwapError>
where
    S: UtxoSource + Sync,
{
    let (payment, ordinals) = tokio::join!(
        source.fetch_spendable(network, &roles.payment.address),
        source.fetch_spendable(network, &roles.ordinals.address),
    );

    match (payment, ordinals) {
        (Ok(payment), Ok(ordinals)) => {
            debug!(
                %network,
                payment = payment.len(),
                ordinals = ordinals.len(),
                "fetched spendable outputs"
            );
            Ok(SpendablePair { payment, ordinals })
        }
        (payment, ordinals) => {
            let failures: Vec<UtxoError> = [payment.err(), ordinals.err()]
                .into_iter()
                .flatten()
                .collect();
            for failure in &failures {
                warn!(%network, "UTXO fetch failed: {failure}");
            }
            Err(SwapError::from_utxo_failures(failures))
        }
    }
}

/// In-memory source keyed by address, for offline builds and tests.
///
/// Addresses are checked against the requested network the way an indexer would.
#[derive(Debug, Clone, Default)]
pub struct MemoryUtxoSource {
    outputs: HashMap<String, Vec<UnspentOutput>>,
    unreachable: Vec<String>,
}

impl MemoryUtxoSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_outputs(mut self, outputs: impl IntoIterator<Item = UnspentOutput>) -> Self {
        for output in outputs {
            self.outputs
                .entry(output.owner_address.clone())
                .or_default()
                .push(output);
        }
        self
    }

    /// Make every fetch for `address` fail as if the indexer were down.
    #[must_use]
    pub fn with_unreachable(mut self, address: impl Into<String>) -> Self {
        self.unreachable.push(address.into());
        self
    }
}

impl UtxoSource for MemoryUtxoSource {
    async fn fetch_spendable(
        &self,
        network: Network,
        address: &str,
    ) -> Result<Vec<UnspentOutput>, UtxoError> {
        parse_address(network, address)?;

        if self.unreachable.iter().any(|candidate| candidate == address) {
            return Err(UtxoError::Network {
                network,
                address: address.to_string(),
                message: "source unreachable".to_string(),
            });
        }

        Ok(self.outputs.get(address).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, PAYMENT_RECIPIENT};

    const NETWORK: Network = Network::Testnet;

    #[test]
    fn derives_script_from_owner_address() {
        let utxo = fixtures::utxo(NETWORK, PAYMENT_RECIPIENT, 7, 5_000);
        assert!(utxo.script_pubkey.is_p2wpkh());
        assert_eq!(utxo.outpoint().vout, 7);

        let ordinals = fixtures::utxo(NETWORK, &fixtures::ordinals_address(NETWORK), 1, 546);
        assert!(ordinals.script_pubkey.is_p2tr());
    }

    #[test]
    fn rejects_address_of_another_network() {
        let err =
            UnspentOutput::from_parts(Network::Mainnet, PAYMENT_RECIPIENT, fixtures::txid(1), 0, 1)
                .expect_err("testnet address on mainnet");
        assert!(matches!(err, UtxoError::InvalidAddress { .. }));
    }

    #[tokio::test]
    async fn empty_address_is_not_an_error() {
        let roles = fixtures::roles(NETWORK);
        let source = MemoryUtxoSource::new().with_outputs([fixtures::utxo(
            NETWORK,
            &roles.payment.address,
            1,
            10_000,
        )]);

        let pair = fetch_spendable_pair(&source, NETWORK, &roles)
            .await
            .expect("both fetches succeed");

        assert_eq!(pair.payment.len(), 1);
        assert!(pair.get(AddressRole::Ordinals).is_empty());
    }

    #[tokio::test]
    async fn collects_failures_from_both_sides() {
        let roles = fixtures::roles(NETWORK);
        let source = MemoryUtxoSource::new()
            .with_unreachable(roles.payment.address.clone())
            .with_unreachable(roles.ordinals.address.clone());

        let err = fetch_spendable_pair(&source, NETWORK, &roles)
            .await
            .expect_err("both unreachable");

        let SwapError::Network(failures) = err else {
            panic!("expected network error, got {err:?}");
        };
        assert_eq!(failures.len(), 2);
    }

    #[tokio::test]
    async fn one_sided_failure_does_not_yield_partial_data() {
        let roles = fixtures::roles(NETWORK);
        let source = MemoryUtxoSource::new()
            .with_outputs([fixtures::utxo(NETWORK, &roles.payment.address, 1, 10_000)])
            .with_unreachable(roles.ordinals.address.clone());

        let err = fetch_spendable_pair(&source, NETWORK, &roles)
            .await
            .expect_err("ordinals unreachable");

        assert!(err.is_retryable());
        assert!(matches!(err, SwapError::Network(ref failures) if failures.len() == 1));
    }

    #[tokio::test]
    async fn account_from_another_network_is_not_retryable() {
        let roles = fixtures::roles(NETWORK);
        let source = MemoryUtxoSource::new().with_outputs([
            fixtures::utxo(NETWORK, &roles.payment.address, 1, 10_000),
            fixtures::utxo(NETWORK, &roles.ordinals.address, 2, 1_000),
        ]);

        let err = fetch_spendable_pair(&source, Network::Mainnet, &roles)
            .await
            .expect_err("testnet roles on mainnet");

        assert!(!err.is_retryable());
        let SwapError::UtxoLookup(failures) = err else {
            panic!("expected UTXO lookup error, got {err:?}");
        };
        assert_eq!(failures.len(), 2);
        assert!(
            failures
                .iter()
                .all(|failure| matches!(failure, UtxoError::InvalidAddress { .. }))
        );
    }
}
