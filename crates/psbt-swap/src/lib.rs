#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]
#![cfg_attr(
    test,
    allow(
        clippy::cast_possible_truncation,
        clippy::needless_pass_by_value,
        clippy::too_many_lines
    )
)]

pub mod account;
pub mod assemble;
pub mod authorization;
pub mod capability;
pub mod coordinator;
pub mod error;
#[cfg(feature = "explorer")]
pub mod explorer;
#[cfg(feature = "http-signer")]
pub mod http_signer;
pub mod network;
pub mod outcome;
pub mod psbt;
pub mod rpc;
pub mod sighash;
pub mod signer;
pub mod utxo;

#[cfg(test)]
mod fixtures;

pub use account::{
    AddressPurpose, AddressRole, RoleKey, SigningRoles, WalletAccount, WalletAddress,
};
pub use assemble::{
    FirstAvailable, LargestValue, SelectionPolicy, SwapRecipients, TransactionInput,
    TransactionOutput, UnsignedTransactionDraft, assemble, assemble_with_policy,
};
pub use authorization::{SigningAuthorization, build_authorizations};
pub use capability::{
    Capability, CapabilityError, CapabilityNegotiator, CapabilitySnapshot, CapabilityState,
    CapabilityWatcher, RetryPolicy, negotiate,
};
pub use coordinator::{
    PreparedSwap, SignedTransaction, SwapCoordinator, SwapRequest, SwapResult, prepare_swap,
};
pub use error::{
    AccountError, AssembleError, AuthorizationError, InsufficientFunds, PsbtError, SwapError,
    UtxoError,
};
#[cfg(feature = "explorer")]
pub use explorer::EsploraClient;
#[cfg(feature = "http-signer")]
pub use http_signer::HttpSigner;
pub use network::Network;
pub use outcome::{RawReply, SignerOutcome, classify, classify_as};
pub use psbt::{decode_psbt_base64, encode_psbt_base64, to_psbt};
pub use sighash::SigHashMode;
pub use signer::{ExternalSigner, SignerClient};
pub use utxo::{MemoryUtxoSource, SpendablePair, UnspentOutput, UtxoSource, fetch_spendable_pair};
