//! The wallet provider boundary.
//!
//! Everything the orchestration core knows about a wallet goes through
//! [`WalletProvider`] and the [`ContractCapability`] it hands out once an account is
//! connected. Implementations translate their transport failures into
//! [`ProviderError`]; the core never sees anything rawer than that.

use alloy_primitives::{
    Address,
    Bytes,
    TxHash,
    U256,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;
use tokio::sync::broadcast;

/// Numeric chain id (EIP-155).
pub type NetworkId = u64;

/// Tracking identifier returned when a write is accepted by the network.
pub type SubmissionId = TxHash;

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// EIP-1193 "User Rejected Request".
pub const USER_REJECTED_CODE: i64 = 4001;
/// EIP-1193 "Unauthorized".
pub const UNAUTHORIZED_CODE: i64 = 4100;
/// EIP-1193 "Unsupported Method".
pub const UNSUPPORTED_METHOD_CODE: i64 = 4200;
/// MetaMask "Unrecognized chain id".
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("wallet provider unavailable: {0}")]
    Unavailable(String),
    #[error("request rejected by the user: {0}")]
    UserRejected(String),
    #[error("request not supported by the wallet: {0}")]
    Unsupported(String),
    #[error("provider returned error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("failed to encode call: {0}")]
    Encoding(String),
    #[error("failed to decode response: {0}")]
    Decoding(String),
}

impl ProviderError {
    /// Maps a JSON-RPC / EIP-1193 error object onto the provider error kinds.
    pub fn from_rpc(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            USER_REJECTED_CODE | UNAUTHORIZED_CODE => Self::UserRejected(message),
            UNSUPPORTED_METHOD_CODE | UNRECOGNIZED_CHAIN_CODE | -32601 => {
                Self::Unsupported(message)
            }
            _ => Self::Rpc { code, message },
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        matches!(self, Self::UserRejected(_))
    }
}

/// Command-line spelling of [`Value::SessionAccount`].
pub const SESSION_ACCOUNT_TOKEN: &str = "@account";

/// A primitive argument or return value of a contract call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Uint(U256),
    Bool(bool),
    Address(Address),
    String(String),
    Bytes(Bytes),
    /// Placeholder for the connected account, bound right before dispatch.
    SessionAccount,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Uint(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Address(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
            Value::Bytes(v) => write!(f, "{v}"),
            Value::SessionAccount => f.write_str(SESSION_ACCOUNT_TOKEN),
        }
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Uint(U256::from(value))
    }
}

impl From<U256> for Value {
    fn from(value: U256) -> Self {
        Value::Uint(value)
    }
}

impl From<Address> for Value {
    fn from(value: Address) -> Self {
        Value::Address(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

/// Decoded return values of a read.
pub type Payload = Vec<Value>;

/// A single contract method invocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCall {
    pub target: Address,
    /// Solidity signature, e.g. `balls(uint256) returns (address,uint256,string)`.
    pub method: String,
    pub args: Vec<Value>,
}

impl ContractCall {
    pub fn new(target: Address, method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            target,
            method: method.into(),
            args,
        }
    }

    /// The bare function name, without parameter list.
    pub fn method_name(&self) -> &str {
        method_name(&self.method)
    }

    /// Copy of the call with every [`Value::SessionAccount`] replaced by `account`.
    pub fn bind_account(&self, account: Address) -> Self {
        let args = self
            .args
            .iter()
            .map(|arg| match arg {
                Value::SessionAccount => Value::Address(account),
                other => other.clone(),
            })
            .collect();
        Self {
            target: self.target,
            method: self.method.clone(),
            args,
        }
    }
}

pub fn method_name(signature: &str) -> &str {
    let signature = signature.trim();
    let signature = signature.strip_prefix("function ").unwrap_or(signature);
    signature
        .split_once('(')
        .map(|(name, _)| name)
        .unwrap_or(signature)
        .trim()
}

/// Terminal state of a submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confirmation {
    Confirmed,
    Reverted,
}

/// Provider-originated change to the session it handed out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionChanged {
    AccountsChanged(Vec<Address>),
    NetworkChanged(NetworkId),
    Disconnected,
}

/// A wallet agent able to authorize accounts and switch networks.
pub trait WalletProvider {
    type Capability: ContractCapability + Clone;

    /// Asks the wallet for account access. May block on a user prompt.
    fn request_accounts(&self) -> impl Future<Output = ProviderResult<Vec<Address>>>;

    fn get_network(&self) -> impl Future<Output = ProviderResult<NetworkId>>;

    /// Asks the wallet to move to `network`. May block on a user prompt.
    fn request_network_switch(
        &self,
        network: NetworkId,
    ) -> impl Future<Output = ProviderResult<()>>;

    /// Signing handle for an authorized account, if the wallet grants one.
    fn signer(&self, account: Address) -> Option<Self::Capability>;

    /// Handle usable for reads when no signer is available.
    fn read_only_capability(&self) -> Option<Self::Capability> {
        None
    }

    /// New subscription to account/network change notifications.
    fn subscribe(&self) -> broadcast::Receiver<SessionChanged>;
}

/// Contract access obtained from a connected wallet.
pub trait ContractCapability {
    fn read(&self, call: &ContractCall) -> impl Future<Output = ProviderResult<Payload>>;

    fn write(
        &self,
        call: &ContractCall,
        value: U256,
    ) -> impl Future<Output = ProviderResult<SubmissionId>>;

    /// Suspends until the submission is final.
    fn await_confirmation(
        &self,
        submission: SubmissionId,
    ) -> impl Future<Output = ProviderResult<Confirmation>>;
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn from_rpc__user_rejection_codes__classified_as_rejection() {
        assert!(ProviderError::from_rpc(4001, "denied").is_user_rejection());
        assert!(ProviderError::from_rpc(4100, "locked").is_user_rejection());
    }

    #[test]
    fn from_rpc__unknown_chain__classified_as_unsupported() {
        let err = ProviderError::from_rpc(4902, "Unrecognized chain ID");
        assert_eq!(err, ProviderError::Unsupported("Unrecognized chain ID".into()));
    }

    #[test]
    fn from_rpc__other_codes__kept_as_rpc_error() {
        let err = ProviderError::from_rpc(-32000, "execution reverted");
        assert!(matches!(err, ProviderError::Rpc { code: -32000, .. }));
    }

    #[test]
    fn bind_account__placeholder_argument__replaced_with_account() {
        // given
        let account = Address::repeat_byte(0x42);
        let call = ContractCall::new(
            Address::repeat_byte(1),
            "userPoints(address,string) returns (uint256)",
            vec![Value::SessionAccount, "atlantis".into()],
        );

        // when
        let bound = call.bind_account(account);

        // then
        assert_eq!(bound.args, vec![Value::Address(account), "atlantis".into()]);
        assert_eq!(bound.method, call.method);
    }

    #[test]
    fn method_name__full_signature__returns_bare_name() {
        assert_eq!(
            method_name("balls(uint256) returns (address,uint256,string)"),
            "balls"
        );
        assert_eq!(method_name("function claimBall(uint256,string)"), "claimBall");
        assert_eq!(method_name("noParens"), "noParens");
    }
}
