//! JSON-RPC deploy backend for Ethereum-compatible nodes.
//!
//! Sends a contract-creation transaction (`eth_sendTransaction`) and polls
//! the receipt until the node reports a contract address. Constructor
//! arguments are encoded as static 32-byte words; dynamic types are rejected,
//! which covers the address/uint constructors this tool targets.

use std::time::Duration;

use alloy_core::primitives::{Address, B256, U256};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use url::Url;

use crate::artifact::ArtifactRef;
use crate::backend::DeployBackend;
use crate::resolve::Environment;
use crate::value::{ArgValue, ResolvedOutput};

/// Timeout for a single JSON-RPC request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
/// How long to wait between receipt polls.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Give up waiting for a receipt after this many polls.
const RECEIPT_POLL_ATTEMPTS: u32 = 60;

/// JSON-RPC response wrapper.
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// The subset of a transaction receipt this backend cares about.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Receipt {
    contract_address: Option<Address>,
    status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TransactionRequest {
    from: Address,
    data: String,
}

/// Deploy backend talking to a node over HTTP JSON-RPC.
#[derive(Debug, Clone)]
pub struct RpcBackend {
    client: reqwest::Client,
    url: Url,
    from: Address,
}

impl RpcBackend {
    /// Create a backend sending transactions from the given unlocked account.
    pub fn new(url: Url, from: Address) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client, url, from })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&serde_json::json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": 1
            }))
            .send()
            .await
            .with_context(|| format!("Failed to send {method} request"))?;

        let body: JsonRpcResponse<T> = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {method} response"))?;

        if let Some(error) = body.error {
            bail!("{} returned error {}: {}", method, error.code, error.message);
        }
        Ok(body.result)
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<Receipt> {
        for _ in 0..RECEIPT_POLL_ATTEMPTS {
            if let Some(receipt) = self
                .call::<Receipt>("eth_getTransactionReceipt", serde_json::json!([tx_hash]))
                .await?
            {
                return Ok(receipt);
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
        bail!("Timed out waiting for receipt of transaction {tx_hash}")
    }
}

/// Encode constructor arguments as static 32-byte words.
fn encode_args(args: &[ArgValue]) -> Result<Vec<u8>> {
    let mut encoded = Vec::with_capacity(args.len() * 32);
    for arg in args {
        match arg {
            ArgValue::Address(a) => {
                encoded.extend_from_slice(&[0u8; 12]);
                encoded.extend_from_slice(a.as_slice());
            }
            ArgValue::Bytes32(b) => encoded.extend_from_slice(b.as_slice()),
            ArgValue::Uint(u) => encoded.extend_from_slice(&u.to_be_bytes::<32>()),
            ArgValue::Bool(b) => {
                encoded.extend_from_slice(&U256::from(*b as u8).to_be_bytes::<32>())
            }
            ArgValue::String(s) => {
                bail!("dynamic constructor argument `{s}` is not supported by the RPC backend")
            }
        }
    }
    Ok(encoded)
}

impl DeployBackend for RpcBackend {
    async fn deploy(
        &self,
        artifact: &ArtifactRef,
        args: &[ArgValue],
        _env: &Environment,
    ) -> Result<ResolvedOutput> {
        let mut data = artifact.bytecode.to_vec();
        data.extend(encode_args(args)?);

        let request = TransactionRequest {
            from: self.from,
            data: format!("0x{}", hex::encode(data)),
        };

        let tx_hash: B256 = self
            .call("eth_sendTransaction", serde_json::json!([request]))
            .await?
            .context("eth_sendTransaction returned no transaction hash")?;

        tracing::debug!(contract = %artifact.contract, %tx_hash, "Deployment transaction sent");

        let receipt = self.wait_for_receipt(tx_hash).await?;
        if receipt.status.as_deref() == Some("0x0") {
            bail!("deployment transaction {tx_hash} reverted");
        }
        let address = receipt
            .contract_address
            .context("receipt carries no contract address")?;

        Ok(ResolvedOutput::new(address).with_tx_hash(tx_hash))
    }
}
