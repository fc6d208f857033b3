//! Ledger RPC client with timeout and failover handling.
//!
//! # Responsibilities
//! - Speak JSON-RPC 2.0 over HTTP to the configured endpoints
//! - Fetch recent blockhashes, block height and signature statuses
//! - Submit signed transactions
//! - Fail over to the next endpoint on transport errors and timeouts

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::timeout;
use url::Url;

use crate::config::schema::RpcConfig;
use crate::solana::transaction::Transaction;
use crate::solana::types::{
    Commitment, Hash, LatestBlockhash, LedgerError, LedgerResult, SendOptions, Signature,
    SignatureStatus,
};

/// Network operations the resubmitter needs from a ledger node.
pub trait LedgerClient: Send + Sync {
    /// Fetch a recent blockhash at the given commitment.
    fn latest_blockhash(
        &self,
        commitment: Commitment,
    ) -> impl Future<Output = LedgerResult<LatestBlockhash>> + Send;

    /// Submit a fully signed transaction, returning its signature.
    fn send_transaction(
        &self,
        transaction: &Transaction,
        options: SendOptions,
    ) -> impl Future<Output = LedgerResult<Signature>> + Send;

    /// Current status of a signature, `None` if the node has not seen it.
    fn signature_status(
        &self,
        signature: &Signature,
    ) -> impl Future<Output = LedgerResult<Option<SignatureStatus>>> + Send;

    /// Current block height at the given commitment.
    fn block_height(&self, commitment: Commitment) -> impl Future<Output = LedgerResult<u64>> + Send;
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockhashValue {
    blockhash: String,
    last_valid_block_height: u64,
}

/// JSON-RPC client with failover support.
#[derive(Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    /// Primary endpoint followed by failovers.
    endpoints: Vec<Url>,
    timeout_duration: Duration,
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    /// Create a new RPC client.
    ///
    /// No request is made here; unreachable endpoints surface on first use.
    pub fn new(config: &RpcConfig) -> LedgerResult<Self> {
        let mut endpoints = Vec::new();

        let primary: Url = config.url.parse().map_err(|e| {
            LedgerError::Rpc(format!("Invalid RPC URL '{}': {}", config.url, e))
        })?;
        endpoints.push(primary);

        for url_str in &config.failover_urls {
            match url_str.parse() {
                Ok(url) => endpoints.push(url),
                Err(_) => tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL"),
            }
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| LedgerError::Rpc(format!("Failed to build HTTP client: {}", e)))?;

        tracing::debug!(
            rpc_url = %config.url,
            failovers = endpoints.len() - 1,
            timeout_secs = config.timeout_secs,
            "RPC client initialized"
        );

        Ok(Self {
            http,
            endpoints,
            timeout_duration: Duration::from_secs(config.timeout_secs),
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Issue a JSON-RPC call, trying each endpoint in order.
    ///
    /// Error objects returned by a node are final; only transport errors
    /// and timeouts move on to the next endpoint.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> LedgerResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let mut last_error = None;
        for (i, endpoint) in self.endpoints.iter().enumerate() {
            let fut = self.post::<T>(endpoint, &body);
            match timeout(self.timeout_duration, fut).await {
                Ok(Ok(response)) => return Self::unwrap_response(method, response),
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, method, error = %e, "RPC error, trying next provider");
                    last_error = Some(e);
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, method, "RPC timeout, trying next provider");
                    last_error = Some(LedgerError::Timeout(self.timeout_duration.as_secs()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LedgerError::Rpc("All RPC providers failed".to_string())))
    }

    async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &Url,
        body: &Value,
    ) -> LedgerResult<RpcResponse<T>> {
        let response = self
            .http
            .post(endpoint.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::Rpc(format!("HTTP status {}", status)));
        }

        response
            .json::<RpcResponse<T>>()
            .await
            .map_err(|e| LedgerError::Rpc(format!("Malformed RPC response: {}", e)))
    }

    fn unwrap_response<T>(method: &str, response: RpcResponse<T>) -> LedgerResult<T> {
        if let Some(err) = response.error {
            return Err(LedgerError::RpcResponse {
                code: err.code,
                message: err.message,
            });
        }
        response
            .result
            .ok_or_else(|| LedgerError::Rpc(format!("{} returned neither result nor error", method)))
    }

    /// Endpoints in failover order.
    pub fn endpoints(&self) -> &[Url] {
        &self.endpoints
    }
}

impl LedgerClient for RpcClient {
    async fn latest_blockhash(&self, commitment: Commitment) -> LedgerResult<LatestBlockhash> {
        let response: WithContext<BlockhashValue> = self
            .call("getLatestBlockhash", json!([{ "commitment": commitment.as_str() }]))
            .await?;
        Ok(LatestBlockhash {
            blockhash: response.value.blockhash.parse::<Hash>()?,
            last_valid_block_height: response.value.last_valid_block_height,
        })
    }

    async fn send_transaction(
        &self,
        transaction: &Transaction,
        options: SendOptions,
    ) -> LedgerResult<Signature> {
        let encoded = transaction.to_base64()?;
        let signature: String = self
            .call(
                "sendTransaction",
                json!([
                    encoded,
                    {
                        "encoding": "base64",
                        "skipPreflight": options.skip_preflight,
                        "preflightCommitment": options.preflight_commitment.as_str(),
                    }
                ]),
            )
            .await?;
        signature.parse()
    }

    async fn signature_status(&self, signature: &Signature) -> LedgerResult<Option<SignatureStatus>> {
        let response: WithContext<Vec<Option<SignatureStatus>>> = self
            .call(
                "getSignatureStatuses",
                json!([[signature.to_string()], { "searchTransactionHistory": false }]),
            )
            .await?;
        Ok(response.value.into_iter().next().flatten())
    }

    async fn block_height(&self, commitment: Commitment) -> LedgerResult<u64> {
        self.call("getBlockHeight", json!([{ "commitment": commitment.as_str() }]))
            .await
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("endpoints", &self.endpoints.iter().map(Url::as_str).collect::<Vec<_>>())
            .field("timeout_secs", &self.timeout_duration.as_secs())
            .finish()
    }
}
