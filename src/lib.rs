pub use crate::{
    executor::{
        ExecutorConfig,
        OperationExecutor,
    },
    network::{
        GuardError,
        NetworkGuard,
    },
    operation::{
        FailureKind,
        FailureStage,
        OperationKind,
        OperationOutcome,
        OperationRequest,
        Refreshed,
    },
    provider::{
        ContractCapability,
        NetworkId,
        SessionChanged,
        Value,
        WalletProvider,
    },
    session::{
        Session,
        SessionError,
        SessionManager,
    },
};

pub mod abi;
pub mod config;
pub mod executor;
pub mod network;
pub mod operation;
pub mod panels;
pub mod provider;
pub mod rpc;
pub mod session;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
