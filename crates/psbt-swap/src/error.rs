use std::fmt;

use thiserror::Error;

use crate::account::{AddressPurpose, AddressRole};
use crate::capability::{Capability, CapabilityError};
use crate::network::Network;

/// Errors raised while fetching or normalizing spendable outputs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UtxoError {
    /// The UTXO source could not be reached or replied with a failure status.
    #[error("failed to fetch UTXOs for {address} on {network}: {message}")]
    Network {
        network: Network,
        address: String,
        message: String,
    },

    #[error("address '{address}' is not valid on {network}: {message}")]
    InvalidAddress {
        network: Network,
        address: String,
        message: String,
    },

    #[error("UTXO source returned a malformed entry for {address}: {message}")]
    Malformed { address: String, message: String },
}

impl UtxoError {
    /// Whether the source itself failed, as opposed to rejecting the address or its data.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

/// An address that had nothing to spend when assembly was attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyAddress {
    pub role: AddressRole,
    pub address: String,
}

/// Every role whose UTXO set was empty, collected before assembly aborts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct InsufficientFunds {
    pub empty: Vec<EmptyAddress>,
}

impl InsufficientFunds {
    #[must_use]
    pub fn affects(&self, role: AddressRole) -> bool {
        self.empty.iter().any(|entry| entry.role == role)
    }
}

impl fmt::Display for InsufficientFunds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("no unspent outputs found for ")?;
        for (position, entry) in self.empty.iter().enumerate() {
            if position > 0 {
                f.write_str(" and ")?;
            }
            write!(f, "{} address {}", entry.role, entry.address)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssembleError {
    #[error(transparent)]
    InsufficientFunds(#[from] InsufficientFunds),

    #[error("fee of {fee_sats} sats exceeds the {available_sats} sats funding output 0")]
    FeeExceedsInput { fee_sats: u64, available_sats: u64 },

    #[error("output total {outputs_sats} sats exceeds input total {inputs_sats} sats")]
    OutputsExceedInputs { inputs_sats: u64, outputs_sats: u64 },

    #[error("value overflow while summing {0}")]
    ValueOverflow(&'static str),

    #[error("recipient '{address}' is not valid on {network}: {message}")]
    InvalidRecipient {
        network: Network,
        address: String,
        message: String,
    },
}

/// Raised when authorization metadata cannot be derived from a draft.
///
/// Both variants indicate a bug between assembly and authorization and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("input {input_index} is owned by {owner_address}, which matches no signing role")]
    OwnershipMismatch {
        input_index: u32,
        owner_address: String,
    },

    #[error("input {input_index} would be authorized by more than one signer")]
    DoubleAuthorized { input_index: u32 },
}

#[derive(Debug, Error)]
pub enum PsbtError {
    #[error("invalid {role} public key: {message}")]
    InvalidPublicKey { role: AddressRole, message: String },

    #[error("{role} public key does not control address {address}")]
    PublicKeyMismatch { role: AddressRole, address: String },

    #[error("address {address} has an unsupported script type for {role} inputs")]
    UnsupportedAddressType { role: AddressRole, address: String },

    #[error("address '{address}' is not valid on {network}: {message}")]
    InvalidAddress {
        network: Network,
        address: String,
        message: String,
    },

    #[error("input {input_index} is owned by {address}, which matches no signing role")]
    UnknownOwner { input_index: u32, address: String },

    #[error("invalid base64 PSBT: {0}")]
    Base64(String),

    #[error("PSBT error: {0}")]
    Psbt(#[from] bitcoin::psbt::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("wallet did not return a {0} address")]
    MissingPurpose(AddressPurpose),

    #[error("invalid public key hex for {purpose} address: {message}")]
    InvalidPublicKey {
        purpose: AddressPurpose,
        message: String,
    },
}

/// Failures that stop a swap before or while the signing request is built.
///
/// Signer verdicts (finished, cancelled, rejected, transport failure) are not errors; they are
/// returned as [`crate::SwapResult`].
#[derive(Debug, Error)]
pub enum SwapError {
    #[error("UTXO source unreachable, try again: {}", join_failures(.0))]
    Network(Vec<UtxoError>),

    /// Invalid addresses or malformed listings; repeating the fetch gives the same answer.
    #[error("cannot list spendable outputs: {}", join_failures(.0))]
    UtxoLookup(Vec<UtxoError>),

    #[error(transparent)]
    Assemble(#[from] AssembleError),

    #[error("internal authorization fault: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error(transparent)]
    Psbt(#[from] PsbtError),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error("no compatible signer found, please install one")]
    CapabilityMissing,

    #[error("capability check was dismissed in the wallet")]
    CapabilityCancelled,

    #[error("capability check has not finished yet")]
    CapabilityPending,

    #[error("connected signer does not support '{0}'")]
    CapabilityUnsupported(Capability),

    #[error(transparent)]
    Capability(#[from] CapabilityError),
}

impl SwapError {
    /// Whether the failure is transient and the action may simply be repeated.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::CapabilityPending)
    }

    /// Whether the failure is a programming fault rather than a user or environment condition.
    #[must_use]
    pub const fn is_internal_fault(&self) -> bool {
        matches!(self, Self::Authorization(_))
    }
}

impl SwapError {
    /// Fold UTXO failures into one error.
    ///
    /// Transport failures only stand alone: once any failure is not one, the fetch is not
    /// worth repeating and only the non-transport failures are reported.
    #[must_use]
    pub fn from_utxo_failures(failures: Vec<UtxoError>) -> Self {
        if failures.iter().all(UtxoError::is_transport) {
            Self::Network(failures)
        } else {
            Self::UtxoLookup(
                failures
                    .into_iter()
                    .filter(|failure| !failure.is_transport())
                    .collect(),
            )
        }
    }
}

impl From<UtxoError> for SwapError {
    fn from(value: UtxoError) -> Self {
        Self::from_utxo_failures(vec![value])
    }
}

fn join_failures(failures: &[UtxoError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
