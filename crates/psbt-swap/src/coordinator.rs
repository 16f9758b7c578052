//! End-to-end swap flow: capability gate, fetch, assemble, authorize, sign, classify.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::account::{SigningRoles, WalletAccount};
use crate::assemble::{
    FirstAvailable, SelectionPolicy, SwapRecipients, UnsignedTransactionDraft,
    assemble_with_policy,
};
use crate::authorization::{SigningAuthorization, build_authorizations};
use crate::capability::{Capability, CapabilitySnapshot};
use crate::error::SwapError;
use crate::network::Network;
use crate::outcome::SignerOutcome;
use crate::psbt::{decode_psbt_base64, encode_psbt_base64, to_psbt};
use crate::rpc::{GetAddressesParams, SignTransactionPayload};
use crate::signer::{ExternalSigner, SignerClient};
use crate::utxo::{SpendablePair, UtxoSource, fetch_spendable_pair};

pub const DEFAULT_SIGN_MESSAGE: &str = "Sign the ordinals swap transaction";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub network: Network,
    pub roles: SigningRoles,
    pub recipients: SwapRecipients,
    pub message: String,
}

impl SwapRequest {
    /// Swap between the wallet's own two addresses.
    #[must_use]
    pub fn between_roles(network: Network, roles: SigningRoles) -> Self {
        Self {
            network,
            recipients: SwapRecipients::between(&roles),
            roles,
            message: DEFAULT_SIGN_MESSAGE.to_string(),
        }
    }
}

/// Everything that is sent to the signer for one swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreparedSwap {
    pub draft: UnsignedTransactionDraft,
    pub authorizations: Vec<SigningAuthorization>,
    pub payload: SignTransactionPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub psbt_base64: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
}

/// Terminal result of a signing attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SwapResult {
    Signed(SignedTransaction),
    Cancelled,
    Rejected { code: i64, message: String },
    TransportFailed { message: String },
}

pub struct SwapCoordinator<U, S> {
    utxos: U,
    signer: SignerClient<S>,
    selection: Arc<dyn SelectionPolicy + Send + Sync>,
}

impl<U, S> SwapCoordinator<U, S>
where
    U: UtxoSource + Sync,
    S: ExternalSigner + Sync,
{
    pub fn new(utxos: U, signer: SignerClient<S>) -> Self {
        Self {
            utxos,
            signer,
            selection: Arc::new(FirstAvailable),
        }
    }

    #[must_use]
    pub fn with_selection(mut self, selection: Arc<dyn SelectionPolicy + Send + Sync>) -> Self {
        self.selection = selection;
        self
    }

    pub const fn signer(&self) -> &SignerClient<S> {
        &self.signer
    }

    /// Ask the wallet for its payment and ordinals addresses.
    pub async fn connect(&self, message: &str) -> Result<SignerOutcome<WalletAccount>, SwapError> {
        match self
            .signer
            .get_addresses(&GetAddressesParams::swap_roles(message))
            .await
        {
            SignerOutcome::Finished(result) => {
                let account = WalletAccount::from_addresses(result.addresses)?;
                info!(
                    payment = %account.roles.payment.address,
                    ordinals = %account.roles.ordinals.address,
                    "wallet connected"
                );
                Ok(SignerOutcome::Finished(account))
            }
            SignerOutcome::UserCancelled => Ok(SignerOutcome::UserCancelled),
            SignerOutcome::Rejected { code, message } => {
                Ok(SignerOutcome::Rejected { code, message })
            }
            SignerOutcome::TransportError(message) => Ok(SignerOutcome::TransportError(message)),
        }
    }

    /// Fetch both roles' outputs and build the signing request.
    pub async fn prepare(&self, request: &SwapRequest) -> Result<PreparedSwap, SwapError> {
        let spendable = fetch_spendable_pair(&self.utxos, request.network, &request.roles).await?;
        self.prepare_from(&spendable, request)
    }

    /// Build the signing request from already fetched outputs.
    pub fn prepare_from(
        &self,
        spendable: &SpendablePair,
        request: &SwapRequest,
    ) -> Result<PreparedSwap, SwapError> {
        prepare_swap(spendable, request, self.selection.as_ref())
    }

    /// Run the whole flow. Nothing is fetched unless `capabilities` allows signing on the
    /// request's network.
    pub async fn sign(
        &self,
        capabilities: &CapabilitySnapshot,
        request: &SwapRequest,
    ) -> Result<SwapResult, SwapError> {
        capabilities.require(request.network, &Capability::SIGN_TRANSACTION)?;

        let prepared = self.prepare(request).await?;
        let outcome = self.signer.sign_transaction(&prepared.payload).await;

        let result = match outcome {
            SignerOutcome::Finished(signed) => match decode_psbt_base64(&signed.psbt_base64) {
                Ok(_) => SwapResult::Signed(SignedTransaction {
                    psbt_base64: signed.psbt_base64,
                    txid: signed.tx_id,
                }),
                Err(e) => SwapResult::TransportFailed {
                    message: format!("signer returned an unreadable PSBT: {e}"),
                },
            },
            SignerOutcome::UserCancelled => SwapResult::Cancelled,
            SignerOutcome::Rejected { code, message } => SwapResult::Rejected { code, message },
            SignerOutcome::TransportError(message) => SwapResult::TransportFailed { message },
        };

        match &result {
            SwapResult::Signed(_) => info!(network = %request.network, "swap signed"),
            SwapResult::Cancelled => info!(network = %request.network, "swap cancelled by user"),
            SwapResult::Rejected { code, message } => {
                warn!(network = %request.network, code, %message, "swap rejected by signer");
            }
            SwapResult::TransportFailed { message } => {
                warn!(network = %request.network, %message, "signer unreachable");
            }
        }

        Ok(result)
    }
}

/// Assemble, authorize and encode a swap without touching the network.
pub fn prepare_swap<P>(
    spendable: &SpendablePair,
    request: &SwapRequest,
    selection: &P,
) -> Result<PreparedSwap, SwapError>
where
    P: SelectionPolicy + ?Sized,
{
    let draft = assemble_with_policy(
        request.network,
        &request.roles,
        spendable,
        &request.recipients,
        selection,
    )?;
    let authorizations = build_authorizations(&draft)?;
    let psbt = to_psbt(&draft)?;
    let payload = SignTransactionPayload::new(
        request.network,
        request.message.clone(),
        encode_psbt_base64(&psbt),
        &authorizations,
    );

    Ok(PreparedSwap {
        draft,
        authorizations,
        payload,
    })
}
