use std::fmt;
use std::ops::BitOr;

use bitcoin::psbt::PsbtSighashType;
use serde::{Deserialize, Serialize};

const BASE_MASK: u8 = 0x1f;

/// Signature-hash flags as carried in a signing request.
///
/// Values match the consensus encoding, so `SINGLE | ANYONE_CAN_PAY` is `0x83`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SigHashMode(u8);

impl SigHashMode {
    pub const ALL: Self = Self(0x01);
    pub const NONE: Self = Self(0x02);
    pub const SINGLE: Self = Self(0x03);
    pub const ANYONE_CAN_PAY: Self = Self(0x80);

    /// Commits to the signer's own input and the output at the same index only.
    pub const SINGLE_ANYONE_CAN_PAY: Self = Self(0x83);

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Accepts a base mode (`ALL`, `NONE`, `SINGLE`) with or without `ANYONE_CAN_PAY`.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits & !Self::ANYONE_CAN_PAY.0 {
            0x01..=0x03 => Some(Self(bits)),
            _ => None,
        }
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        if other.0 & BASE_MASK != 0 && self.0 & BASE_MASK != other.0 & BASE_MASK {
            return false;
        }
        self.0 & other.0 & !BASE_MASK == other.0 & !BASE_MASK
    }

    #[must_use]
    pub const fn anyone_can_pay(self) -> bool {
        self.0 & Self::ANYONE_CAN_PAY.0 != 0
    }

    #[must_use]
    pub fn to_psbt_sighash_type(self) -> PsbtSighashType {
        PsbtSighashType::from_u32(u32::from(self.0))
    }
}

impl BitOr for SigHashMode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl From<SigHashMode> for u8 {
    fn from(value: SigHashMode) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid signature hash flags 0x{0:02x}")]
pub struct InvalidSigHash(pub u8);

impl TryFrom<u8> for SigHashMode {
    type Error = InvalidSigHash;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_bits(value).ok_or(InvalidSigHash(value))
    }
}

impl fmt::Display for SigHashMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = match self.0 & BASE_MASK {
            0x01 => "ALL",
            0x02 => "NONE",
            0x03 => "SINGLE",
            _ => return write!(f, "0x{:02x}", self.0),
        };
        f.write_str(base)?;
        if self.anyone_can_pay() {
            f.write_str("|ANYONECANPAY")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::TapSighashType;

    use super::*;

    #[test]
    fn single_anyone_can_pay_matches_consensus_value() {
        let combined = SigHashMode::SINGLE | SigHashMode::ANYONE_CAN_PAY;

        assert_eq!(combined, SigHashMode::SINGLE_ANYONE_CAN_PAY);
        assert_eq!(combined.bits(), 0x83);
        assert!(combined.anyone_can_pay());
        assert!(combined.contains(SigHashMode::SINGLE));
        assert!(!combined.contains(SigHashMode::ALL));
        assert_eq!(combined.to_string(), "SINGLE|ANYONECANPAY");
        assert_eq!(
            combined
                .to_psbt_sighash_type()
                .taproot_hash_ty()
                .expect("valid taproot flags"),
            TapSighashType::SinglePlusAnyoneCanPay
        );
    }

    #[test]
    fn rejects_unknown_base_modes() {
        assert_eq!(SigHashMode::from_bits(0x00), None);
        assert_eq!(SigHashMode::from_bits(0x84), None);
        assert!(serde_json::from_str::<SigHashMode>("5").is_err());
        assert_eq!(
            serde_json::from_str::<SigHashMode>("131").expect("0x83"),
            SigHashMode::SINGLE_ANYONE_CAN_PAY
        );
    }
}
