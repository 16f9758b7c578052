//! Typed access to an external wallet signer.

use std::collections::BTreeSet;
use std::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::capability::Capability;
use crate::network::Network;
use crate::outcome::{RawReply, SignerOutcome, classify_as};
use crate::rpc::{
    GetAddressesParams, GetAddressesResult, GetCapabilitiesParams, NetworkParam,
    SignTransactionPayload, SignTransactionResult, method,
};

/// Transport to a wallet that holds the signing keys.
///
/// `call` never fails: unreachable wallets and thrown errors come back as
/// [`RawReply::Failed`], a closed prompt as [`RawReply::Dismissed`].
pub trait ExternalSigner {
    fn call(&self, method: &str, params: Option<Value>) -> impl Future<Output = RawReply> + Send;
}

impl<S: ExternalSigner + Sync> ExternalSigner for &S {
    fn call(&self, method: &str, params: Option<Value>) -> impl Future<Output = RawReply> + Send {
        (**self).call(method, params)
    }
}

#[derive(Debug, Clone)]
pub struct SignerClient<S> {
    signer: S,
}

impl<S: ExternalSigner + Sync> SignerClient<S> {
    pub const fn new(signer: S) -> Self {
        Self { signer }
    }

    pub const fn signer(&self) -> &S {
        &self.signer
    }

    pub async fn get_capabilities(&self, network: Network) -> SignerOutcome<BTreeSet<Capability>> {
        let params = GetCapabilitiesParams {
            network: NetworkParam {
                network_type: network,
            },
        };
        self.request(method::GET_CAPABILITIES, Some(&params)).await
    }

    pub async fn get_addresses(
        &self,
        params: &GetAddressesParams,
    ) -> SignerOutcome<GetAddressesResult> {
        self.request(method::GET_ADDRESSES, Some(params)).await
    }

    pub async fn sign_transaction(
        &self,
        payload: &SignTransactionPayload,
    ) -> SignerOutcome<SignTransactionResult> {
        self.request(method::SIGN_TRANSACTION, Some(payload)).await
    }

    async fn request<P, T>(&self, method: &str, params: Option<&P>) -> SignerOutcome<T>
    where
        P: Serialize + Sync,
        T: DeserializeOwned,
    {
        let params = match params.map(serde_json::to_value).transpose() {
            Ok(params) => params,
            Err(e) => {
                return SignerOutcome::TransportError(format!(
                    "failed to encode {method} params: {e}"
                ));
            }
        };

        debug!(method, "calling signer");
        let raw = self.signer.call(method, params).await;
        classify_as(raw)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::fixtures::FnSigner;

    #[tokio::test]
    async fn capability_query_carries_network() {
        let signer = FnSigner::new(|name, params| {
            assert_eq!(name, method::GET_CAPABILITIES);
            assert_eq!(
                params.cloned(),
                Some(json!({ "network": { "type": "Signet" } }))
            );
            FnSigner::ok(json!(["getAddresses", "signTransaction"]))
        });

        let outcome = SignerClient::new(signer).get_capabilities(Network::Signet).await;

        let SignerOutcome::Finished(capabilities) = outcome else {
            panic!("expected capabilities, got {outcome:?}");
        };
        assert!(capabilities.contains(&Capability::SIGN_TRANSACTION));
    }

    #[tokio::test]
    async fn thrown_failures_surface_as_transport_errors() {
        let signer = FnSigner::new(|_, _| RawReply::Failed("extension not installed".to_string()));

        let outcome = SignerClient::new(&signer)
            .get_addresses(&GetAddressesParams::swap_roles("connect"))
            .await;

        assert_eq!(
            outcome,
            SignerOutcome::TransportError("extension not installed".to_string())
        );
        assert_eq!(signer.calls(), 1);
    }
}
