//! JSON-RPC over HTTP transport to a wallet bridge.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::outcome::RawReply;
use crate::rpc::RpcRequest;
use crate::signer::ExternalSigner;

#[derive(Debug, Clone)]
pub struct HttpSigner {
    client: Client,
    endpoint: String,
}

impl HttpSigner {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            endpoint: endpoint.into(),
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ExternalSigner for HttpSigner {
    async fn call(&self, method: &str, params: Option<Value>) -> RawReply {
        let request = RpcRequest::new(method, params);
        debug!(method, id = %request.id, endpoint = %self.endpoint, "posting signer request");

        let response = match self.client.post(&self.endpoint).json(&request).send().await {
            Ok(response) => response,
            Err(e) => return RawReply::Failed(format!("signer bridge unreachable: {e}")),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return RawReply::Failed(format!("failed to read signer reply: {e}")),
        };

        if !status.is_success() {
            return RawReply::Failed(format!(
                "signer bridge returned HTTP {status}: {}",
                body.trim()
            ));
        }

        reply_for(&request.id, body)
    }
}

/// A decodable reply must echo the request id; undecodable bodies are left to the classifier.
fn reply_for(request_id: &str, body: String) -> RawReply {
    let Ok(value) = serde_json::from_str::<Value>(&body) else {
        return RawReply::Text(body);
    };

    match value.get("id").and_then(Value::as_str) {
        Some(id) if id != request_id => {
            RawReply::Failed(format!("reply id {id} does not match request {request_id}"))
        }
        _ => RawReply::Json(value),
    }
}
