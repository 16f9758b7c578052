//! Keys, addresses and outputs shared by unit tests.

use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};

use bitcoin::key::Secp256k1;
use bitcoin::secp256k1::XOnlyPublicKey;
use bitcoin::{Address, CompressedPublicKey, Txid};
use serde_json::Value;

use crate::account::{AddressRole, RoleKey, SigningRoles};
use crate::network::Network;
use crate::outcome::RawReply;
use crate::rpc::{RpcErrorCode, RpcResponse};
use crate::signer::ExternalSigner;
use crate::utxo::UnspentOutput;

/// Generator point, compressed.
pub const PAYMENT_PUBKEY: &str =
    "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
/// `2G`, x-only.
pub const ORDINALS_PUBKEY: &str =
    "c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5";

pub const PAYMENT_RECIPIENT: &str = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";

pub fn payment_address(network: Network) -> String {
    let key = CompressedPublicKey::from_str(PAYMENT_PUBKEY).expect("compressed key");
    Address::p2shwpkh(&key, network.to_bitcoin_network()).to_string()
}

pub fn ordinals_address(network: Network) -> String {
    let secp = Secp256k1::verification_only();
    let key = XOnlyPublicKey::from_str(ORDINALS_PUBKEY).expect("x-only key");
    Address::p2tr(&secp, key, None, network.to_bitcoin_network()).to_string()
}

pub fn roles(network: Network) -> SigningRoles {
    SigningRoles {
        payment: RoleKey::from_hex(AddressRole::Payment, payment_address(network), PAYMENT_PUBKEY)
            .expect("payment key"),
        ordinals: RoleKey::from_hex(
            AddressRole::Ordinals,
            ordinals_address(network),
            ORDINALS_PUBKEY,
        )
        .expect("ordinals key"),
    }
}

pub fn txid(seed: u8) -> Txid {
    Txid::from_str(&format!("{seed:02x}").repeat(32)).expect("txid")
}

pub fn utxo(network: Network, address: &str, seed: u8, value_sats: u64) -> UnspentOutput {
    UnspentOutput::from_parts(network, address, txid(seed), u32::from(seed), value_sats)
        .expect("utxo")
}

type Handler = dyn Fn(&str, Option<&Value>) -> RawReply + Send + Sync;

/// Signer whose replies are computed by a closure, counting every call.
pub struct FnSigner {
    handler: Box<Handler>,
    calls: AtomicU32,
}

impl FnSigner {
    pub fn new(handler: impl Fn(&str, Option<&Value>) -> RawReply + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            calls: AtomicU32::new(0),
        }
    }

    pub fn ok(result: Value) -> RawReply {
        Self::reply(&RpcResponse::ok("test", result))
    }

    pub fn error(code: i64, message: &str) -> RawReply {
        Self::reply(&RpcResponse::error(
            "test",
            RpcErrorCode::from_code(code),
            message,
        ))
    }

    fn reply(response: &RpcResponse) -> RawReply {
        RawReply::Json(serde_json::to_value(response).expect("response serializes"))
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ExternalSigner for FnSigner {
    async fn call(&self, method: &str, params: Option<Value>) -> RawReply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.handler)(method, params.as_ref())
    }
}

/// Network named in a request's `{"network": {"type": ..}}` params.
pub fn requested_network(params: Option<&Value>) -> Option<Network> {
    params
        .and_then(|params| params.pointer("/network/type"))
        .and_then(|network| serde_json::from_value(network.clone()).ok())
}
