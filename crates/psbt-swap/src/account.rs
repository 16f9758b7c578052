//! Wallet addresses and the two signing roles a swap is built from.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AccountError;

/// One of the two independently controlled addresses taking part in a swap.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AddressRole {
    Payment,
    Ordinals,
}

impl fmt::Display for AddressRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Payment => f.write_str("payment"),
            Self::Ordinals => f.write_str("ordinals"),
        }
    }
}

/// Address purpose as reported by the wallet.
///
/// Only `payment` and `ordinals` carry meaning here; anything else (`stacks`, ...) is kept
/// verbatim so it can be handed back to whoever asked for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AddressPurpose {
    Payment,
    Ordinals,
    Other(String),
}

impl AddressPurpose {
    #[must_use]
    pub const fn role(&self) -> Option<AddressRole> {
        match self {
            Self::Payment => Some(AddressRole::Payment),
            Self::Ordinals => Some(AddressRole::Ordinals),
            Self::Other(_) => None,
        }
    }
}

impl From<String> for AddressPurpose {
    fn from(value: String) -> Self {
        match value.as_str() {
            "payment" => Self::Payment,
            "ordinals" => Self::Ordinals,
            _ => Self::Other(value),
        }
    }
}

impl From<AddressPurpose> for String {
    fn from(value: AddressPurpose) -> Self {
        match value {
            AddressPurpose::Payment => "payment".to_string(),
            AddressPurpose::Ordinals => "ordinals".to_string(),
            AddressPurpose::Other(other) => other,
        }
    }
}

impl From<AddressRole> for AddressPurpose {
    fn from(value: AddressRole) -> Self {
        match value {
            AddressRole::Payment => Self::Payment,
            AddressRole::Ordinals => Self::Ordinals,
        }
    }
}

impl fmt::Display for AddressPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Payment => f.write_str("payment"),
            Self::Ordinals => f.write_str("ordinals"),
            Self::Other(other) => f.write_str(other),
        }
    }
}

/// Address entry of a `getAddresses` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAddress {
    pub address: String,
    pub public_key: String,
    pub purpose: AddressPurpose,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_type: Option<String>,
}

/// Address and public key of one signing role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleKey {
    pub role: AddressRole,
    pub address: String,
    #[serde(with = "hex::serde")]
    pub public_key: Vec<u8>,
}

impl RoleKey {
    /// Build a role key from the wallet's hex-encoded public key.
    ///
    /// Accepts 33-byte compressed keys and 32-byte x-only keys.
    pub fn from_hex(
        role: AddressRole,
        address: impl Into<String>,
        public_key_hex: &str,
    ) -> Result<Self, AccountError> {
        let public_key =
            hex::decode(public_key_hex.trim()).map_err(|e| AccountError::InvalidPublicKey {
                purpose: role.into(),
                message: e.to_string(),
            })?;

        if public_key.len() != 32 && public_key.len() != 33 {
            return Err(AccountError::InvalidPublicKey {
                purpose: role.into(),
                message: format!("expected 32 or 33 bytes, got {}", public_key.len()),
            });
        }

        Ok(Self {
            role,
            address: address.into(),
            public_key,
        })
    }
}

/// The payment and ordinals keys a swap is assembled and authorized against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningRoles {
    pub payment: RoleKey,
    pub ordinals: RoleKey,
}

impl SigningRoles {
    #[must_use]
    pub const fn get(&self, role: AddressRole) -> &RoleKey {
        match role {
            AddressRole::Payment => &self.payment,
            AddressRole::Ordinals => &self.ordinals,
        }
    }

    /// Resolve which role controls `address`, payment first.
    #[must_use]
    pub fn role_of(&self, address: &str) -> Option<AddressRole> {
        if self.payment.address == address {
            Some(AddressRole::Payment)
        } else if self.ordinals.address == address {
            Some(AddressRole::Ordinals)
        } else {
            None
        }
    }
}

/// Addresses a wallet shared with us, split into the two signing roles and pass-through extras.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAccount {
    pub roles: SigningRoles,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other: Vec<WalletAddress>,
}

impl WalletAccount {
    /// Pick the first payment and first ordinals address out of a `getAddresses` reply.
    pub fn from_addresses(addresses: Vec<WalletAddress>) -> Result<Self, AccountError> {
        let mut payment = None;
        let mut ordinals = None;
        let mut other = Vec::new();

        for entry in addresses {
            match entry.purpose.role() {
                Some(AddressRole::Payment) if payment.is_none() => {
                    payment = Some(RoleKey::from_hex(
                        AddressRole::Payment,
                        entry.address,
                        &entry.public_key,
                    )?);
                }
                Some(AddressRole::Ordinals) if ordinals.is_none() => {
                    ordinals = Some(RoleKey::from_hex(
                        AddressRole::Ordinals,
                        entry.address,
                        &entry.public_key,
                    )?);
                }
                _ => other.push(entry),
            }
        }

        let payment = payment.ok_or(AccountError::MissingPurpose(AddressPurpose::Payment))?;
        let ordinals = ordinals.ok_or(AccountError::MissingPurpose(AddressPurpose::Ordinals))?;

        Ok(Self {
            roles: SigningRoles { payment, ordinals },
            other,
        })
    }
}
