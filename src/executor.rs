//! Runs an [`OperationRequest`] through guard, dispatch and confirmation.

use crate::{
    network::NetworkGuard,
    operation::{
        FailureKind,
        FailureStage,
        OperationKind,
        OperationOutcome,
        OperationRequest,
        OperationState,
        Refreshed,
    },
    provider::{
        Confirmation,
        ContractCall,
        ContractCapability,
        NetworkId,
        ProviderError,
        WalletProvider,
    },
    session::{
        Session,
        SessionManager,
    },
};
use alloy_primitives::U256;
use std::time::Duration;
use tokio::{
    sync::mpsc,
    time,
};
use tracing::{
    debug,
    error,
    info,
    warn,
};

#[cfg(test)]
mod tests;

#[derive(Clone, Copy, Debug, Default)]
pub struct ExecutorConfig {
    /// Upper bound on the confirmation wait. `None` waits indefinitely.
    pub confirmation_timeout: Option<Duration>,
}

pub struct OperationExecutor<'s, P: WalletProvider> {
    session: &'s SessionManager<P>,
    required_network: NetworkId,
    config: ExecutorConfig,
}

/// Per-call state tracker; logs each transition.
struct Run {
    state: OperationState,
}

impl Run {
    fn new() -> Self {
        Self {
            state: OperationState::Idle,
        }
    }

    fn advance(&mut self, next: OperationState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal transition {:?} -> {next:?}",
            self.state
        );
        debug!(from = ?self.state, to = ?next, "operation state");
        self.state = next;
    }

    fn fail(
        &mut self,
        stage: FailureStage,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> OperationOutcome {
        let message = message.into();
        let next = if kind == FailureKind::Reverted {
            OperationState::Reverted
        } else {
            OperationState::Failed
        };
        self.advance(next);
        warn!(?stage, ?kind, %message, "operation failed");
        OperationOutcome::failure(stage, kind, message)
    }
}

impl<'s, P: WalletProvider> OperationExecutor<'s, P> {
    pub fn new(session: &'s SessionManager<P>, required_network: NetworkId) -> Self {
        Self::with_config(session, required_network, ExecutorConfig::default())
    }

    pub fn with_config(
        session: &'s SessionManager<P>,
        required_network: NetworkId,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            session,
            required_network,
            config,
        }
    }

    pub async fn execute(&self, request: &OperationRequest) -> OperationOutcome {
        self.run(request, None).await
    }

    /// Same as [`Self::execute`], additionally sending `Pending` once a write is
    /// accepted.
    pub async fn execute_with_progress(
        &self,
        request: &OperationRequest,
        progress: &mpsc::UnboundedSender<OperationOutcome>,
    ) -> OperationOutcome {
        self.run(request, Some(progress)).await
    }

    async fn run(
        &self,
        request: &OperationRequest,
        progress: Option<&mpsc::UnboundedSender<OperationOutcome>>,
    ) -> OperationOutcome {
        let mut run = Run::new();
        info!(
            kind = ?request.kind,
            method = %request.call.method,
            target = %request.call.target,
            "executing operation"
        );

        run.advance(OperationState::Guarding);
        let guard = NetworkGuard::new(self.session);
        let session = match guard.ensure_network(self.required_network).await {
            Ok(session) => session,
            Err(err) => {
                return run.fail(FailureStage::Precondition, (&err).into(), err.to_string());
            }
        };

        run.advance(OperationState::Dispatching);
        match request.kind {
            OperationKind::Read => self.read(&mut run, &session, &request.call).await,
            OperationKind::Write => {
                self.write(&mut run, &session, request, progress).await
            }
        }
    }

    fn capability(&self, session: &Session<P::Capability>) -> Option<P::Capability> {
        session.capability.clone().or_else(|| {
            self.session
                .provider()
                .ok()
                .and_then(|provider| provider.read_only_capability())
        })
    }

    async fn read(
        &self,
        run: &mut Run,
        session: &Session<P::Capability>,
        call: &ContractCall,
    ) -> OperationOutcome {
        let Some(capability) = self.capability(session) else {
            return run.fail(
                FailureStage::Dispatch,
                FailureKind::RemoteQuery,
                "no capability available for reads",
            );
        };
        let call = call.bind_account(session.account);
        match capability.read(&call).await {
            Ok(payload) => {
                run.advance(OperationState::Done);
                OperationOutcome::Success {
                    payload,
                    submission: None,
                    refreshed: Vec::new(),
                }
            }
            Err(err) => run.fail(
                FailureStage::Dispatch,
                FailureKind::RemoteQuery,
                format!("{} failed: {err}", call.method_name()),
            ),
        }
    }

    async fn write(
        &self,
        run: &mut Run,
        session: &Session<P::Capability>,
        request: &OperationRequest,
        progress: Option<&mpsc::UnboundedSender<OperationOutcome>>,
    ) -> OperationOutcome {
        let Some(capability) = session.capability.clone() else {
            return run.fail(
                FailureStage::Dispatch,
                FailureKind::Submission,
                format!("account {} has no signer", session.account),
            );
        };
        let value = request.attached_value.unwrap_or(U256::ZERO);
        let call = request.call.bind_account(session.account);
        let submission = match capability.write(&call, value).await {
            Ok(submission) => submission,
            Err(ProviderError::UserRejected(reason)) => {
                return run.fail(FailureStage::Dispatch, FailureKind::UserRejected, reason);
            }
            Err(err) => {
                return run.fail(
                    FailureStage::Dispatch,
                    FailureKind::Submission,
                    format!("{} failed: {err}", request.call.method_name()),
                );
            }
        };

        run.advance(OperationState::AwaitingConfirmation);
        info!(%submission, "transaction submitted; awaiting confirmation");
        if let Some(progress) = progress {
            // A dropped receiver only means nobody is watching progress.
            let _ = progress.send(OperationOutcome::Pending { submission });
        }

        let waited = match self.config.confirmation_timeout {
            Some(limit) => {
                match time::timeout(limit, capability.await_confirmation(submission)).await {
                    Ok(result) => result,
                    Err(_) => {
                        return run.fail(
                            FailureStage::Confirmation,
                            FailureKind::Submission,
                            format!(
                                "no confirmation for {submission} within {}s",
                                limit.as_secs()
                            ),
                        );
                    }
                }
            }
            None => capability.await_confirmation(submission).await,
        };

        match waited {
            Ok(Confirmation::Confirmed) => {
                run.advance(OperationState::Confirmed);
                info!(%submission, "transaction confirmed");
            }
            Ok(Confirmation::Reverted) => {
                return run.fail(
                    FailureStage::Confirmation,
                    FailureKind::Reverted,
                    format!("{submission} reverted"),
                );
            }
            Err(err) => {
                return run.fail(
                    FailureStage::Confirmation,
                    FailureKind::Submission,
                    format!("waiting for {submission} failed: {err}"),
                );
            }
        }

        let mut refreshed = Vec::with_capacity(request.refresh.len());
        for read in &request.refresh {
            let read = read.bind_account(session.account);
            let method = read.method_name().to_owned();
            refreshed.push(match capability.read(&read).await {
                Ok(payload) => Refreshed::Fresh { method, payload },
                Err(err) => {
                    error!(%submission, %method, %err, "refresh after confirmed write failed");
                    Refreshed::Failed {
                        method,
                        kind: FailureKind::RemoteQuery,
                        message: err.to_string(),
                    }
                }
            });
        }
        OperationOutcome::Success {
            payload: Vec::new(),
            submission: Some(submission),
            refreshed,
        }
    }
}
