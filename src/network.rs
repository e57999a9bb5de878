use crate::{
    provider::{
        NetworkId,
        ProviderError,
        WalletProvider,
    },
    session::{
        Session,
        SessionError,
        SessionManager,
    },
};
use tracing::{
    info,
    warn,
};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("switch to network {required} declined: {reason}")]
    SwitchRejected { required: NetworkId, reason: String },
    #[error("wallet cannot switch to network {required}: {reason}")]
    SwitchUnsupported { required: NetworkId, reason: String },
    #[error("wallet is on network {actual}, expected {expected}")]
    Mismatch {
        expected: NetworkId,
        actual: NetworkId,
    },
}

/// Checks the wallet network before every operation, switching it when needed.
pub struct NetworkGuard<'s, P: WalletProvider> {
    session: &'s SessionManager<P>,
}

impl<'s, P: WalletProvider> NetworkGuard<'s, P> {
    pub fn new(session: &'s SessionManager<P>) -> Self {
        Self { session }
    }

    /// Connects on demand, then makes sure the wallet sits on `required`. At most one
    /// switch request is issued per call.
    pub async fn ensure_network(
        &self,
        required: NetworkId,
    ) -> Result<Session<P::Capability>, GuardError> {
        let mut session = self.session.ensure_connected().await?;
        let current = self.session.current_network().await?;
        if current == required {
            session.network = Some(current);
            return Ok(session);
        }

        warn!(current, required, "wallet on wrong network; requesting switch");
        let provider = self.session.provider()?;
        if let Err(err) = provider.request_network_switch(required).await {
            return Err(match err {
                ProviderError::UserRejected(reason) => {
                    GuardError::SwitchRejected { required, reason }
                }
                other => GuardError::SwitchUnsupported {
                    required,
                    reason: other.to_string(),
                },
            });
        }

        let actual = self.session.current_network().await?;
        if actual != required {
            return Err(GuardError::Mismatch {
                expected: required,
                actual,
            });
        }
        info!(network = actual, "wallet switched network");
        session.network = Some(actual);
        Ok(session)
    }
}
