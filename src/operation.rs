use crate::{
    network::GuardError,
    provider::{
        ContractCall,
        Payload,
        SubmissionId,
        Value,
    },
    session::SessionError,
};
use alloy_primitives::{
    Address,
    U256,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Read,
    Write,
}

/// One user-triggered contract interaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRequest {
    pub kind: OperationKind,
    pub call: ContractCall,
    /// Wei sent along with a write.
    pub attached_value: Option<U256>,
    /// Reads re-run, in order, once a write is confirmed.
    pub refresh: Vec<ContractCall>,
}

impl OperationRequest {
    pub fn read(target: Address, method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            kind: OperationKind::Read,
            call: ContractCall::new(target, method, args),
            attached_value: None,
            refresh: Vec::new(),
        }
    }

    pub fn write(target: Address, method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            kind: OperationKind::Write,
            call: ContractCall::new(target, method, args),
            attached_value: None,
            refresh: Vec::new(),
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.attached_value = Some(value);
        self
    }

    /// Re-query `read` after the write confirms. Chainable; reads run in call order.
    pub fn then_read(mut self, read: OperationRequest) -> Self {
        self.refresh.push(read.call);
        self
    }
}

/// Where in the lifecycle an operation failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// Connecting or aligning the network; nothing was dispatched.
    Precondition,
    Dispatch,
    Confirmation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    NoProvider,
    UserRejected,
    NetworkQuery,
    NetworkSwitchRejected,
    NetworkSwitchUnsupported,
    NetworkMismatch,
    RemoteQuery,
    Submission,
    Reverted,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureKind::NoProvider => "no wallet found",
            FailureKind::UserRejected => "request rejected in wallet",
            FailureKind::NetworkQuery => "could not read wallet network",
            FailureKind::NetworkSwitchRejected => "network switch declined",
            FailureKind::NetworkSwitchUnsupported => "network switch not supported",
            FailureKind::NetworkMismatch => "wallet on the wrong network",
            FailureKind::RemoteQuery => "contract query failed",
            FailureKind::Submission => "transaction submission failed",
            FailureKind::Reverted => "transaction reverted",
        };
        f.write_str(text)
    }
}

impl From<&SessionError> for FailureKind {
    fn from(err: &SessionError) -> Self {
        match err {
            SessionError::NoProvider(_) => FailureKind::NoProvider,
            SessionError::UserRejected(_) => FailureKind::UserRejected,
            SessionError::NetworkQuery(_) => FailureKind::NetworkQuery,
        }
    }
}

impl From<&GuardError> for FailureKind {
    fn from(err: &GuardError) -> Self {
        match err {
            GuardError::Session(inner) => inner.into(),
            GuardError::SwitchRejected { .. } => FailureKind::NetworkSwitchRejected,
            GuardError::SwitchUnsupported { .. } => FailureKind::NetworkSwitchUnsupported,
            GuardError::Mismatch { .. } => FailureKind::NetworkMismatch,
        }
    }
}

/// Result of one post-confirmation read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Refreshed {
    Fresh {
        method: String,
        payload: Payload,
    },
    /// The write stands; only the follow-up view is stale.
    Failed {
        method: String,
        kind: FailureKind,
        message: String,
    },
}

impl Refreshed {
    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Self::Fresh { payload, .. } => Some(payload),
            Self::Failed { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OperationOutcome {
    /// `payload` holds a read's result and is empty for writes.
    Success {
        payload: Payload,
        submission: Option<SubmissionId>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        refreshed: Vec<Refreshed>,
    },
    /// Write accepted, confirmation outstanding. Only sent as progress.
    Pending { submission: SubmissionId },
    Failure {
        stage: FailureStage,
        kind: FailureKind,
        message: String,
    },
}

impl OperationOutcome {
    pub fn failure(stage: FailureStage, kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure {
            stage,
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Failure { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn refreshed(&self) -> &[Refreshed] {
        match self {
            Self::Success { refreshed, .. } => refreshed,
            _ => &[],
        }
    }
}

/// Lifecycle of a single `execute` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationState {
    Idle,
    Guarding,
    Dispatching,
    AwaitingConfirmation,
    Done,
    Confirmed,
    Reverted,
    Failed,
}

impl OperationState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Done | Self::Confirmed | Self::Reverted | Self::Failed
        )
    }

    pub fn can_advance_to(self, next: OperationState) -> bool {
        use OperationState::*;
        matches!(
            (self, next),
            (Idle, Guarding)
                | (Guarding, Dispatching)
                | (Dispatching, Done)
                | (Dispatching, AwaitingConfirmation)
                | (AwaitingConfirmation, Confirmed)
                | (AwaitingConfirmation, Reverted)
                | (Guarding | Dispatching | AwaitingConfirmation, Failed)
        )
    }
}
