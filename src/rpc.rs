//! Chain node JSON-RPC client
//!
//! The remote node is consumed read-only and trusted as ground truth; every
//! call here is an idempotent read that the gateway may retry freely.
//!
//! `ChainRpc` is the seam the scanner depends on, so tests drive the whole
//! pipeline against an in-memory implementation instead of a live node.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::types::Participant;

#[derive(Debug, Clone, PartialEq)]
pub enum RpcError {
    /// Connection refused, DNS failure, timeout, 5xx — worth retrying.
    Transport(String),
    /// Application-level JSON-RPC error from the node.
    Rpc { code: i64, message: String },
    /// Response body did not match the expected shape.
    Decode(String),
}

impl RpcError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RpcError::Transport(_))
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcError::Transport(msg) => write!(f, "rpc transport error: {}", msg),
            RpcError::Rpc { code, message } => write!(f, "rpc error {}: {}", code, message),
            RpcError::Decode(msg) => write!(f, "rpc decode error: {}", msg),
        }
    }
}

impl std::error::Error for RpcError {}

impl From<reqwest::Error> for RpcError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RpcError::Decode(e.to_string())
        } else {
            // Timeouts, connect failures, and body errors all read as
            // transient from the scanner's point of view.
            RpcError::Transport(e.to_string())
        }
    }
}

/// One input of a transaction as the node reports it. Coinbase inputs
/// carry no previous outpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcTxInput {
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub vout: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcTxOutput {
    /// Output value in minor units.
    pub value: i64,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcTransaction {
    pub txid: String,
    #[serde(default)]
    pub inputs: Vec<RpcTxInput>,
    #[serde(default)]
    pub outputs: Vec<RpcTxOutput>,
}

/// A block with its transactions fully expanded (verbosity 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcBlock {
    pub height: u64,
    pub hash: String,
    pub time: i64,
    /// "minted" for proof-of-stake blocks, "mined" for proof-of-work.
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub difficulty: f64,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub transactions: Vec<RpcTransaction>,
}

impl RpcBlock {
    pub fn is_proof_of_stake(&self) -> bool {
        self.block_type == "minted"
    }
}

/// Read-only operations the pipeline needs from the remote node.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn get_chain_height(&self) -> Result<u64, RpcError>;
    async fn get_block_hash(&self, height: u64) -> Result<String, RpcError>;
    async fn get_block(&self, hash: &str) -> Result<RpcBlock, RpcError>;
    async fn get_raw_transaction(&self, txid: &str) -> Result<RpcTransaction, RpcError>;
    async fn list_participants(&self) -> Result<Vec<Participant>, RpcError>;
    async fn get_participant(&self, address: &str) -> Result<Participant, RpcError>;
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorBody {
    code: i64,
    message: String,
}

/// HTTP JSON-RPC client for the chain node.
pub struct JsonRpcClient {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: &str) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::json!({
            "jsonrpc": "1.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self.client.post(&self.url).json(&body).send().await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(RpcError::Transport(format!("node returned {}", status)));
        }

        let parsed: JsonRpcResponse<T> = response
            .json()
            .await
            .map_err(|e| RpcError::Decode(e.to_string()))?;

        if let Some(err) = parsed.error {
            return Err(RpcError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        parsed
            .result
            .ok_or_else(|| RpcError::Decode(format!("{}: empty result", method)))
    }
}

#[async_trait]
impl ChainRpc for JsonRpcClient {
    async fn get_chain_height(&self) -> Result<u64, RpcError> {
        self.call("getblockcount", serde_json::json!([])).await
    }

    async fn get_block_hash(&self, height: u64) -> Result<String, RpcError> {
        self.call("getblockhash", serde_json::json!([height])).await
    }

    async fn get_block(&self, hash: &str) -> Result<RpcBlock, RpcError> {
        // Verbosity 2 expands every transaction in place.
        self.call("getblock", serde_json::json!([hash, 2])).await
    }

    async fn get_raw_transaction(&self, txid: &str) -> Result<RpcTransaction, RpcError> {
        self.call("getrawtransaction", serde_json::json!([txid, true]))
            .await
    }

    async fn list_participants(&self) -> Result<Vec<Participant>, RpcError> {
        self.call("listparticipants", serde_json::json!([])).await
    }

    async fn get_participant(&self, address: &str) -> Result<Participant, RpcError> {
        self.call("getparticipant", serde_json::json!([address]))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_type_detection() {
        let block = RpcBlock {
            height: 10,
            hash: "abc".into(),
            time: 1_700_000_000,
            block_type: "minted".into(),
            difficulty: 1.5,
            size: 400,
            transactions: vec![],
        };
        assert!(block.is_proof_of_stake());

        let mined = RpcBlock {
            block_type: "mined".into(),
            ..block
        };
        assert!(!mined.is_proof_of_stake());
    }

    #[test]
    fn test_block_deserializes_type_field() {
        let raw = r#"{
            "height": 5,
            "hash": "00ff",
            "time": 1700000000,
            "type": "minted",
            "transactions": [
                {"txid": "t1", "inputs": [{"txid": "t0", "vout": 0}],
                 "outputs": [{"value": 0, "address": null},
                             {"value": 105000000, "address": "addr1"}]}
            ]
        }"#;
        let block: RpcBlock = serde_json::from_str(raw).unwrap();
        assert_eq!(block.block_type, "minted");
        assert_eq!(block.transactions[0].outputs[1].value, 105_000_000);
        assert_eq!(block.difficulty, 0.0);
    }

    #[test]
    fn test_transport_errors_are_transient() {
        assert!(RpcError::Transport("connection refused".into()).is_transient());
        assert!(!RpcError::Rpc { code: -5, message: "not found".into() }.is_transient());
        assert!(!RpcError::Decode("bad json".into()).is_transient());
    }
}
