use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Bitcoin network every address, UTXO and signing request is scoped to.
///
/// Serialized with the names wallets use on the wire (`Mainnet`, `Testnet`, `Signet`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Network {
    Mainnet,
    Testnet,
    Signet,
}

impl Network {
    #[must_use]
    pub const fn to_bitcoin_network(self) -> bitcoin::Network {
        match self {
            Self::Mainnet => bitcoin::Network::Bitcoin,
            Self::Testnet => bitcoin::Network::Testnet,
            Self::Signet => bitcoin::Network::Signet,
        }
    }

    #[must_use]
    pub const fn default_esplora_url(self) -> &'static str {
        match self {
            Self::Mainnet => "https://mempool.space/api",
            Self::Testnet => "https://mempool.space/testnet/api",
            Self::Signet => "https://mempool.space/signet/api",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mainnet => "Mainnet",
            Self::Testnet => "Testnet",
            Self::Signet => "Signet",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown network '{0}', expected one of: mainnet, testnet, signet")]
pub struct ParseNetworkError(String);

impl FromStr for Network {
    type Err = ParseNetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "bitcoin" => Ok(Self::Mainnet),
            "testnet" | "testnet3" => Ok(Self::Testnet),
            "signet" => Ok(Self::Signet),
            _ => Err(ParseNetworkError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("TESTNET".parse::<Network>(), Ok(Network::Testnet));
        assert_eq!(" Mainnet ".parse::<Network>(), Ok(Network::Mainnet));
        assert!("liquid".parse::<Network>().is_err());
    }

    #[test]
    fn serializes_with_wallet_names() {
        let json = serde_json::to_string(&Network::Signet).expect("serialize");
        assert_eq!(json, "\"Signet\"");
    }
}
