//! [`WalletProvider`] over an HTTP JSON-RPC wallet endpoint (EIP-1193 methods).

use crate::{
    abi,
    provider::{
        Confirmation,
        ContractCall,
        ContractCapability,
        NetworkId,
        Payload,
        ProviderError,
        ProviderResult,
        SessionChanged,
        SubmissionId,
        WalletProvider,
    },
};
use alloy_primitives::{
    Address,
    Bytes,
    U64,
    U256,
};
use serde::{
    Deserialize,
    Serialize,
    de::DeserializeOwned,
};
use serde_json::json;
use std::{
    sync::{
        Arc,
        atomic::{
            AtomicU64,
            Ordering,
        },
    },
    time::Duration,
};
use tokio::{
    sync::broadcast,
    time,
};
use tracing::{
    debug,
    info,
};

#[derive(Clone)]
pub struct JsonRpcWallet {
    inner: Arc<Inner>,
}

struct Inner {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
    events: broadcast::Sender<SessionChanged>,
    poll_interval: Duration,
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

#[derive(Debug, Serialize)]
struct TransactionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<Address>,
    to: Address,
    data: Bytes,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<U256>,
}

#[derive(Debug, Deserialize)]
struct Receipt {
    status: Option<U64>,
}

impl Receipt {
    fn confirmation(&self) -> Confirmation {
        match self.status {
            Some(status) if status.is_zero() => Confirmation::Reverted,
            _ => Confirmation::Confirmed,
        }
    }
}

/// Extracts `result` from a JSON-RPC response body. A `null` result is `None`.
fn parse_response<T: DeserializeOwned>(body: &[u8]) -> ProviderResult<Option<T>> {
    let response: RpcResponse<T> = serde_json::from_slice(body)
        .map_err(|e| ProviderError::Decoding(format!("invalid JSON-RPC response: {e}")))?;
    match response.error {
        Some(err) => Err(ProviderError::from_rpc(err.code, err.message)),
        None => Ok(response.result),
    }
}

impl JsonRpcWallet {
    pub fn new(url: impl Into<String>, poll_interval: Duration) -> ProviderResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        let (events, _) = broadcast::channel(16);
        Ok(Self {
            inner: Arc::new(Inner {
                url: url.into(),
                http,
                next_id: AtomicU64::new(1),
                events,
                poll_interval,
            }),
        })
    }

    async fn request_optional<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> ProviderResult<Option<T>> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, "wallet request");
        let res = self
            .inner
            .http
            .post(&self.inner.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("{}: {e}", self.inner.url)))?;
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            return Err(ProviderError::Unavailable(format!(
                "wallet endpoint responded with {status}: {body}"
            )));
        }
        parse_response(&bytes)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> ProviderResult<T> {
        self.request_optional(method, params).await?.ok_or_else(|| {
            ProviderError::Decoding(format!("{method} returned no result"))
        })
    }
}

impl WalletProvider for JsonRpcWallet {
    type Capability = RpcCapability;

    async fn request_accounts(&self) -> ProviderResult<Vec<Address>> {
        self.request("eth_requestAccounts", json!([])).await
    }

    async fn get_network(&self) -> ProviderResult<NetworkId> {
        let chain_id: U64 = self.request("eth_chainId", json!([])).await?;
        Ok(chain_id.to::<u64>())
    }

    async fn request_network_switch(&self, network: NetworkId) -> ProviderResult<()> {
        let chain_id = format!("{:#x}", network);
        self.request_optional::<serde_json::Value>(
            "wallet_switchEthereumChain",
            json!([{ "chainId": chain_id }]),
        )
        .await?;
        info!(network, "wallet accepted network switch");
        let _ = self
            .inner
            .events
            .send(SessionChanged::NetworkChanged(network));
        Ok(())
    }

    fn signer(&self, account: Address) -> Option<RpcCapability> {
        Some(RpcCapability {
            wallet: self.clone(),
            from: Some(account),
        })
    }

    fn read_only_capability(&self) -> Option<RpcCapability> {
        Some(RpcCapability {
            wallet: self.clone(),
            from: None,
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChanged> {
        self.inner.events.subscribe()
    }
}

#[derive(Clone)]
pub struct RpcCapability {
    wallet: JsonRpcWallet,
    from: Option<Address>,
}

impl std::fmt::Debug for RpcCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcCapability")
            .field("url", &self.wallet.inner.url)
            .field("from", &self.from)
            .finish()
    }
}

impl ContractCapability for RpcCapability {
    async fn read(&self, call: &ContractCall) -> ProviderResult<Payload> {
        let function = abi::parse_function(&call.method)?;
        let tx = TransactionRequest {
            from: self.from,
            to: call.target,
            data: abi::encode_call(&function, &call.args)?,
            value: None,
        };
        let output: Bytes = self.wallet.request("eth_call", json!([tx, "latest"])).await?;
        abi::decode_output(&function, &output)
    }

    async fn write(&self, call: &ContractCall, value: U256) -> ProviderResult<SubmissionId> {
        let from = self.from.ok_or_else(|| {
            ProviderError::Unsupported("read-only capability cannot send transactions".into())
        })?;
        let function = abi::parse_function(&call.method)?;
        let tx = TransactionRequest {
            from: Some(from),
            to: call.target,
            data: abi::encode_call(&function, &call.args)?,
            value: (!value.is_zero()).then_some(value),
        };
        self.wallet.request("eth_sendTransaction", json!([tx])).await
    }

    async fn await_confirmation(
        &self,
        submission: SubmissionId,
    ) -> ProviderResult<Confirmation> {
        let mut ticker = time::interval(self.wallet.inner.poll_interval);
        loop {
            ticker.tick().await;
            let receipt: Option<Receipt> = self
                .wallet
                .request_optional("eth_getTransactionReceipt", json!([submission]))
                .await?;
            if let Some(receipt) = receipt {
                return Ok(receipt.confirmation());
            }
            debug!(%submission, "receipt not available yet");
        }
    }
}
