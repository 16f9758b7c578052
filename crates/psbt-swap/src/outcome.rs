//! Classification of raw signer replies into one closed set of outcomes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::rpc::{JSONRPC_VERSION, RpcErrorCode, RpcResponse};

/// Whatever came back from one signer call, before interpretation.
#[derive(Debug, Clone, PartialEq)]
pub enum RawReply {
    /// A decoded JSON body.
    Json(Value),
    /// A body that has not been decoded yet.
    Text(String),
    /// The wallet prompt was closed without a structured answer.
    Dismissed,
    /// The call itself failed: unreachable signer, bad status, thrown error.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum SignerOutcome<T = Value> {
    Finished(T),
    UserCancelled,
    Rejected { code: i64, message: String },
    TransportError(String),
}

impl<T> SignerOutcome<T> {
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self, Self::Finished(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SignerOutcome<U> {
        match self {
            Self::Finished(value) => SignerOutcome::Finished(f(value)),
            Self::UserCancelled => SignerOutcome::UserCancelled,
            Self::Rejected { code, message } => SignerOutcome::Rejected { code, message },
            Self::TransportError(message) => SignerOutcome::TransportError(message),
        }
    }
}

/// Classify a raw reply. Every input maps to exactly one outcome.
#[must_use]
pub fn classify(raw: RawReply) -> SignerOutcome {
    let value = match raw {
        RawReply::Json(value) => value,
        RawReply::Text(text) => match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => return SignerOutcome::TransportError(format!("undecodable reply: {e}")),
        },
        RawReply::Dismissed => return SignerOutcome::UserCancelled,
        RawReply::Failed(message) => return SignerOutcome::TransportError(message),
    };

    let response: RpcResponse = match serde_json::from_value(value) {
        Ok(response) => response,
        Err(e) => return SignerOutcome::TransportError(format!("malformed reply: {e}")),
    };

    if response.jsonrpc != JSONRPC_VERSION {
        return SignerOutcome::TransportError(format!(
            "unsupported jsonrpc version '{}'",
            response.jsonrpc
        ));
    }

    match (response.result, response.error) {
        (Some(result), None) => SignerOutcome::Finished(result),
        (None, Some(error))
            if RpcErrorCode::from_code(error.code) == RpcErrorCode::UserRejection =>
        {
            debug!(message = %error.message, "signer request dismissed by user");
            SignerOutcome::UserCancelled
        }
        (None, Some(error)) => {
            warn!(code = error.code, message = %error.message, "signer rejected request");
            SignerOutcome::Rejected {
                code: error.code,
                message: error.message,
            }
        }
        (Some(_), Some(_)) => {
            SignerOutcome::TransportError("reply carries both result and error".to_string())
        }
        (None, None) => {
            SignerOutcome::TransportError("reply carries neither result nor error".to_string())
        }
    }
}

/// Classify and decode a `Finished` payload into `T`; a payload of the wrong shape is a
/// transport error.
#[must_use]
pub fn classify_as<T: DeserializeOwned>(raw: RawReply) -> SignerOutcome<T> {
    match classify(raw) {
        SignerOutcome::Finished(value) => match serde_json::from_value(value) {
            Ok(decoded) => SignerOutcome::Finished(decoded),
            Err(e) => SignerOutcome::TransportError(format!("unexpected result shape: {e}")),
        },
        SignerOutcome::UserCancelled => SignerOutcome::UserCancelled,
        SignerOutcome::Rejected { code, message } => SignerOutcome::Rejected { code, message },
        SignerOutcome::TransportError(message) => SignerOutcome::TransportError(message),
    }
}
