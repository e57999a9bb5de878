//! Ownership of the single wallet connection.

use crate::provider::{
    NetworkId,
    ProviderError,
    SessionChanged,
    WalletProvider,
};
use alloy_primitives::Address;
use futures::{
    Stream,
    StreamExt,
    future,
    stream,
};
use std::sync::Mutex as SyncMutex;
use tokio::sync::{
    Mutex,
    broadcast::{
        self,
        error::TryRecvError,
    },
};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{
    debug,
    info,
    warn,
};

#[derive(Clone, Debug)]
pub struct Session<C> {
    pub account: Address,
    /// Last network id reported by the wallet, if it has been queried.
    pub network: Option<NetworkId>,
    pub capability: Option<C>,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("no wallet provider available: {0}")]
    NoProvider(String),
    #[error("wallet access rejected: {0}")]
    UserRejected(String),
    #[error("failed to query wallet network: {0}")]
    NetworkQuery(String),
}

impl SessionError {
    fn from_connect(err: ProviderError) -> Self {
        match err {
            ProviderError::UserRejected(message) => Self::UserRejected(message),
            other => Self::NoProvider(other.to_string()),
        }
    }
}

/// Owns the wallet session. Guard and executor borrow it; nothing else mutates it.
pub struct SessionManager<P: WalletProvider> {
    provider: Option<P>,
    /// Held for the length of an account prompt; `session` is only locked briefly.
    connecting: Mutex<()>,
    session: Mutex<Option<Session<P::Capability>>>,
    events: SyncMutex<Option<broadcast::Receiver<SessionChanged>>>,
}

impl<P: WalletProvider> SessionManager<P> {
    pub fn new(provider: P) -> Self {
        let events = provider.subscribe();
        Self {
            provider: Some(provider),
            connecting: Mutex::new(()),
            session: Mutex::new(None),
            events: SyncMutex::new(Some(events)),
        }
    }

    /// A manager for an environment with no wallet installed.
    pub fn without_provider() -> Self {
        Self {
            provider: None,
            connecting: Mutex::new(()),
            session: Mutex::new(None),
            events: SyncMutex::new(None),
        }
    }

    pub(crate) fn provider(&self) -> Result<&P, SessionError> {
        self.provider.as_ref().ok_or_else(|| {
            SessionError::NoProvider("no wallet provider is installed".to_string())
        })
    }

    /// Requests account access, replacing any existing session.
    pub async fn connect(&self) -> Result<Session<P::Capability>, SessionError> {
        let provider = self.provider()?;
        let _connecting = self.connecting.lock().await;
        let session = Self::open_session(provider).await?;
        *self.session.lock().await = Some(session.clone());
        Ok(session)
    }

    /// Returns the cached session or connects. Concurrent callers wait on the first
    /// caller's connect instead of raising a second prompt.
    pub async fn ensure_connected(&self) -> Result<Session<P::Capability>, SessionError> {
        let provider = self.provider()?;
        if self.drain_events() && self.session.lock().await.take().is_some() {
            info!("wallet session changed; reconnecting");
        }
        if let Some(session) = self.session().await {
            return Ok(session);
        }
        let _connecting = self.connecting.lock().await;
        // Another caller may have finished connecting while this one waited.
        if let Some(session) = self.session().await {
            return Ok(session);
        }
        let session = Self::open_session(provider).await?;
        *self.session.lock().await = Some(session.clone());
        Ok(session)
    }

    pub async fn current_network(&self) -> Result<NetworkId, SessionError> {
        let provider = self.provider()?;
        let network = provider
            .get_network()
            .await
            .map_err(|e| SessionError::NetworkQuery(e.to_string()))?;
        if let Some(session) = self.session.lock().await.as_mut() {
            session.network = Some(network);
        }
        Ok(network)
    }

    pub async fn session(&self) -> Option<Session<P::Capability>> {
        self.session.lock().await.clone()
    }

    pub async fn disconnect(&self) {
        if self.session.lock().await.take().is_some() {
            info!("wallet session dropped");
        }
    }

    /// Stream of provider session changes. Each call starts a fresh subscription; lagged
    /// notifications are skipped.
    pub fn session_changes(&self) -> impl Stream<Item = SessionChanged> + use<P> {
        let subscription = self
            .provider
            .as_ref()
            .map(|provider| BroadcastStream::new(provider.subscribe()));
        stream::iter(subscription)
            .flatten()
            .filter_map(|item| future::ready(item.ok()))
    }

    async fn open_session(provider: &P) -> Result<Session<P::Capability>, SessionError> {
        info!("requesting wallet account access");
        let accounts = provider
            .request_accounts()
            .await
            .map_err(SessionError::from_connect)?;
        let account = accounts.first().copied().ok_or_else(|| {
            SessionError::UserRejected("wallet returned no accounts".to_string())
        })?;
        let capability = provider.signer(account);
        if capability.is_none() {
            warn!(%account, "wallet granted no signer for account");
        }
        info!(%account, "wallet connected");
        Ok(Session {
            account,
            network: None,
            capability,
        })
    }

    /// Consumes pending provider notifications; true if any arrived.
    fn drain_events(&self) -> bool {
        let mut guard = match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(receiver) = guard.as_mut() else {
            return false;
        };
        let mut changed = false;
        let mut closed = false;
        loop {
            match receiver.try_recv() {
                Ok(event) => {
                    debug!(?event, "wallet reported session change");
                    changed = true;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "missed wallet session notifications");
                    changed = true;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Closed) => {
                    closed = true;
                    break;
                }
            }
        }
        if closed {
            *guard = None;
        }
        changed
    }
}
