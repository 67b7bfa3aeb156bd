use async_trait::async_trait;
use bitcoin::Txid;
use reqwest::{Client, StatusCode, header::CONTENT_TYPE};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use super::{TransactionRecord, TransactionSource};
use crate::settings::NodeSettings;

const JSONRPC_VERSION: &str = "1.0";
const REQUEST_ID: &str = "tx-verifier";
/// bitcoind's RPC_INVALID_ADDRESS_OR_KEY, returned for unknown wallet transactions.
const RPC_INVALID_ADDRESS_OR_KEY: i64 = -5;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("node rejected credentials (HTTP {0})")]
    Unauthorized(StatusCode),
    #[error("node answered HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },
    #[error("invalid JSON-RPC payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("node error {code}: {message}")]
    Node { code: i64, message: String },
    #[error("transaction {0} not found or not visible to the wallet")]
    TransactionNotFound(Txid),
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'a str,
    params: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC client for a single node endpoint.
pub struct NodeClient {
    client: Client,
    endpoint: String,
    user: String,
    password: String,
}

impl NodeClient {
    pub fn new(settings: &NodeSettings) -> Result<Self, RpcError> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(RpcError::Client)?;

        Ok(Self {
            client,
            endpoint: settings.endpoint(),
            user: settings.user.clone(),
            password: settings.password.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Issues one JSON-RPC call. A null `result` comes back as `Ok(None)`.
    ///
    /// The body is declared `text/plain`, which bitcoind accepts for JSON-RPC.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Option<T>, RpcError> {
        let request = RpcRequest {
            jsonrpc: JSONRPC_VERSION,
            id: REQUEST_ID,
            method,
            params,
        };
        let body = serde_json::to_string(&request)?;

        debug!(method, endpoint = %self.endpoint, "Sending RPC request");
        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.user, Some(&self.password))
            .header(CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await
            .map_err(|source| RpcError::Transport {
                endpoint: self.endpoint.clone(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RpcError::Unauthorized(status));
        }

        let text = response.text().await.map_err(|source| RpcError::Transport {
            endpoint: self.endpoint.clone(),
            source,
        })?;

        // bitcoind reports RPC errors with HTTP 500 and a regular envelope.
        let envelope: RpcResponse<T> = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(RpcError::Http { status, body: text });
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(error) = envelope.error {
            warn!(method, code = error.code, message = %error.message, "Node returned an error");
            return Err(RpcError::Node {
                code: error.code,
                message: error.message,
            });
        }

        Ok(envelope.result)
    }

    /// `gettransaction <txid> null true`
    pub async fn get_transaction(&self, txid: &Txid) -> Result<TransactionRecord, RpcError> {
        let params = vec![json!(txid.to_string()), Value::Null, json!(true)];

        match self.call("gettransaction", params).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(RpcError::TransactionNotFound(*txid)),
            Err(RpcError::Node { code, .. }) if code == RPC_INVALID_ADDRESS_OR_KEY => {
                Err(RpcError::TransactionNotFound(*txid))
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl TransactionSource for NodeClient {
    async fn get_transaction(&self, txid: &Txid) -> Result<TransactionRecord, RpcError> {
        NodeClient::get_transaction(self, txid).await
    }
}
