//! JSON-RPC 2.0 envelopes and the payloads exchanged with the wallet signer.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::account::{AddressPurpose, WalletAddress};
use crate::authorization::SigningAuthorization;
use crate::network::Network;
use crate::sighash::SigHashMode;

pub const JSONRPC_VERSION: &str = "2.0";

pub mod method {
    pub const GET_CAPABILITIES: &str = "getCapabilities";
    pub const GET_ADDRESSES: &str = "getAddresses";
    pub const SIGN_TRANSACTION: &str = "signTransaction";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcRequest {
    /// New request with a fresh UUIDv4 id.
    #[must_use]
    pub fn new(method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Uuid::new_v4().to_string(),
            method: method.to_string(),
            params,
        }
    }
}

/// Response envelope. A well-formed reply carries exactly one of `result` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<String>,
    /// `Some(Value::Null)` when the reply carries `"result": null`.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

impl RpcResponse {
    #[must_use]
    pub fn ok(id: impl Into<String>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id.into()),
            result: Some(result),
            error: None,
        }
    }

    #[must_use]
    pub fn error(id: impl Into<String>, code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id.into()),
            result: None,
            error: Some(RpcErrorObject {
                code: code.code(),
                message: message.into(),
                data: None,
            }),
        }
    }
}

fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    /// The user dismissed the prompt in the wallet.
    UserRejection,
    MethodNotSupported,
    AccessDenied,
    Other(i64),
}

impl RpcErrorCode {
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            -32700 => Self::ParseError,
            -32600 => Self::InvalidRequest,
            -32601 => Self::MethodNotFound,
            -32602 => Self::InvalidParams,
            -32603 => Self::InternalError,
            -32000 => Self::UserRejection,
            -32001 => Self::MethodNotSupported,
            -32002 => Self::AccessDenied,
            other => Self::Other(other),
        }
    }

    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::UserRejection => -32000,
            Self::MethodNotSupported => -32001,
            Self::AccessDenied => -32002,
            Self::Other(code) => code,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParam {
    #[serde(rename = "type")]
    pub network_type: Network,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetCapabilitiesParams {
    pub network: NetworkParam,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAddressesParams {
    pub purposes: Vec<AddressPurpose>,
    pub message: String,
}

impl GetAddressesParams {
    /// Ask for both swap roles.
    #[must_use]
    pub fn swap_roles(message: impl Into<String>) -> Self {
        Self {
            purposes: vec![AddressPurpose::Ordinals, AddressPurpose::Payment],
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAddressesResult {
    pub addresses: Vec<WalletAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputToSign {
    pub address: String,
    pub signing_indexes: Vec<u32>,
    pub sig_hash: SigHashMode,
}

impl From<&SigningAuthorization> for InputToSign {
    fn from(value: &SigningAuthorization) -> Self {
        Self {
            address: value.signer_address.clone(),
            signing_indexes: value.input_indexes.iter().copied().collect(),
            sig_hash: value.sig_hash,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignTransactionPayload {
    pub network: NetworkParam,
    pub message: String,
    pub psbt_base64: String,
    pub broadcast: bool,
    pub inputs_to_sign: Vec<InputToSign>,
}

impl SignTransactionPayload {
    /// Payload asking the signer to sign without broadcasting.
    #[must_use]
    pub fn new(
        network: Network,
        message: impl Into<String>,
        psbt_base64: String,
        authorizations: &[SigningAuthorization],
    ) -> Self {
        Self {
            network: NetworkParam {
                network_type: network,
            },
            message: message.into(),
            psbt_base64,
            broadcast: false,
            inputs_to_sign: authorizations.iter().map(InputToSign::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignTransactionResult {
    pub psbt_base64: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
}
