//! Scriptable in-memory wallet for exercising the orchestration core.

use crate::provider::{
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
};
use alloy_primitives::{
    Address,
    B256,
    U256,
};
use std::{
    collections::{
        HashMap,
        HashSet,
    },
    sync::{
        Arc,
        Mutex,
        MutexGuard,
    },
};
use tokio::sync::{
    broadcast,
    watch,
};

pub const HOLESKY: NetworkId = 17000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwitchBehavior {
    Accept,
    /// Accepts the request but ends up on the given network.
    LandOn(NetworkId),
    Reject,
    Unsupported,
}

#[derive(Clone, Debug)]
pub struct FakeSubmission {
    pub id: SubmissionId,
    pub call: ContractCall,
    pub value: U256,
    pub result: Confirmation,
}

struct FakeState {
    account: Address,
    network: NetworkId,
    switch: SwitchBehavior,
    reject_accounts: bool,
    failing_network_queries: bool,
    grant_signer: bool,
    read_only: bool,
    reads: HashMap<String, Payload>,
    fees: HashMap<String, U256>,
    reverting: HashSet<String>,
    write_error: Option<ProviderError>,
    account_requests: usize,
    switch_requests: usize,
    read_calls: Vec<ContractCall>,
    submissions: Vec<FakeSubmission>,
}

/// Cloning shares the underlying state so a test can keep a handle for inspection.
#[derive(Clone)]
pub struct FakeWallet {
    state: Arc<Mutex<FakeState>>,
    events: broadcast::Sender<SessionChanged>,
    account_gate: watch::Sender<bool>,
    confirmation_gate: watch::Sender<bool>,
}

impl FakeWallet {
    pub fn new(network: NetworkId) -> Self {
        let (events, _) = broadcast::channel(16);
        let (account_gate, _) = watch::channel(true);
        let (confirmation_gate, _) = watch::channel(true);
        Self {
            state: Arc::new(Mutex::new(FakeState {
                account: Address::repeat_byte(0xa1),
                network,
                switch: SwitchBehavior::Accept,
                reject_accounts: false,
                failing_network_queries: false,
                grant_signer: true,
                read_only: false,
                reads: HashMap::new(),
                fees: HashMap::new(),
                reverting: HashSet::new(),
                write_error: None,
                account_requests: 0,
                switch_requests: 0,
                read_calls: Vec::new(),
                submissions: Vec::new(),
            })),
            events,
            account_gate,
            confirmation_gate,
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn with_switch(self, behavior: SwitchBehavior) -> Self {
        self.state().switch = behavior;
        self
    }

    pub fn rejecting_accounts(self) -> Self {
        self.state().reject_accounts = true;
        self
    }

    pub fn failing_network_queries(self) -> Self {
        self.state().failing_network_queries = true;
        self
    }

    pub fn without_signer(self) -> Self {
        self.state().grant_signer = false;
        self
    }

    pub fn with_read_only(self) -> Self {
        self.state().read_only = true;
        self
    }

    /// Response for reads of `method` (bare function name).
    pub fn with_read(self, method: &str, payload: Payload) -> Self {
        self.state().reads.insert(method.to_owned(), payload);
        self
    }

    /// Writes to `method` revert unless at least `fee` wei is attached.
    pub fn with_fee(self, method: &str, fee: U256) -> Self {
        self.state().fees.insert(method.to_owned(), fee);
        self
    }

    pub fn reverting(self, method: &str) -> Self {
        self.state().reverting.insert(method.to_owned());
        self
    }

    pub fn failing_writes(self, error: ProviderError) -> Self {
        self.state().write_error = Some(error);
        self
    }

    /// Account prompts stay open until [`Self::release_account_prompt`].
    pub fn holding_account_prompt(self) -> Self {
        self.account_gate.send_replace(false);
        self
    }

    /// Confirmation waits stay open until [`Self::release_confirmations`].
    pub fn holding_confirmations(self) -> Self {
        self.confirmation_gate.send_replace(false);
        self
    }

    pub fn release_account_prompt(&self) {
        self.account_gate.send_replace(true);
    }

    pub fn release_confirmations(&self) {
        self.confirmation_gate.send_replace(true);
    }

    pub fn emit(&self, event: SessionChanged) {
        let _ = self.events.send(event);
    }

    pub fn account(&self) -> Address {
        self.state().account
    }

    pub fn network(&self) -> NetworkId {
        self.state().network
    }

    pub fn account_requests(&self) -> usize {
        self.state().account_requests
    }

    pub fn switch_requests(&self) -> usize {
        self.state().switch_requests
    }

    pub fn read_calls(&self) -> Vec<ContractCall> {
        self.state().read_calls.clone()
    }

    pub fn submissions(&self) -> Vec<FakeSubmission> {
        self.state().submissions.clone()
    }

    fn read(&self, call: &ContractCall) -> ProviderResult<Payload> {
        let mut state = self.state();
        state.read_calls.push(call.clone());
        state.reads.get(call.method_name()).cloned().ok_or_else(|| {
            ProviderError::Decoding(format!("no data returned for {}", call.method))
        })
    }

    fn submit(&self, call: &ContractCall, value: U256) -> ProviderResult<SubmissionId> {
        let mut state = self.state();
        if let Some(err) = state.write_error.clone() {
            return Err(err);
        }
        let name = call.method_name();
        let underpaid = state.fees.get(name).is_some_and(|fee| value < *fee);
        let result = if underpaid || state.reverting.contains(name) {
            Confirmation::Reverted
        } else {
            Confirmation::Confirmed
        };
        let id = B256::from(U256::from(state.submissions.len() + 1));
        state.submissions.push(FakeSubmission {
            id,
            call: call.clone(),
            value,
            result,
        });
        Ok(id)
    }

    fn confirmation(&self, id: SubmissionId) -> ProviderResult<Confirmation> {
        self.state()
            .submissions
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.result)
            .ok_or_else(|| ProviderError::Rpc {
                code: -32000,
                message: format!("unknown transaction {id}"),
            })
    }
}

async fn wait_open(gate: &watch::Sender<bool>) {
    let mut receiver = gate.subscribe();
    let _ = receiver.wait_for(|open| *open).await;
}

impl WalletProvider for FakeWallet {
    type Capability = FakeCapability;

    async fn request_accounts(&self) -> ProviderResult<Vec<Address>> {
        let (account, reject) = {
            let mut state = self.state();
            state.account_requests += 1;
            (state.account, state.reject_accounts)
        };
        wait_open(&self.account_gate).await;
        if reject {
            return Err(ProviderError::UserRejected("User denied account access".into()));
        }
        Ok(vec![account])
    }

    async fn get_network(&self) -> ProviderResult<NetworkId> {
        let state = self.state();
        if state.failing_network_queries {
            return Err(ProviderError::Unavailable("network query failed".into()));
        }
        Ok(state.network)
    }

    async fn request_network_switch(&self, network: NetworkId) -> ProviderResult<()> {
        let landed = {
            let mut state = self.state();
            state.switch_requests += 1;
            match state.switch {
                SwitchBehavior::Accept => network,
                SwitchBehavior::LandOn(other) => other,
                SwitchBehavior::Reject => {
                    return Err(ProviderError::UserRejected(
                        "User rejected the request".into(),
                    ));
                }
                SwitchBehavior::Unsupported => {
                    return Err(ProviderError::Unsupported("Unrecognized chain ID".into()));
                }
            }
        };
        self.state().network = landed;
        self.emit(SessionChanged::NetworkChanged(landed));
        Ok(())
    }

    fn signer(&self, account: Address) -> Option<FakeCapability> {
        self.state().grant_signer.then(|| FakeCapability {
            wallet: self.clone(),
            from: Some(account),
        })
    }

    fn read_only_capability(&self) -> Option<FakeCapability> {
        self.state().read_only.then(|| FakeCapability {
            wallet: self.clone(),
            from: None,
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChanged> {
        self.events.subscribe()
    }
}

#[derive(Clone)]
pub struct FakeCapability {
    wallet: FakeWallet,
    from: Option<Address>,
}

impl std::fmt::Debug for FakeCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeCapability")
            .field("from", &self.from)
            .finish()
    }
}

impl ContractCapability for FakeCapability {
    async fn read(&self, call: &ContractCall) -> ProviderResult<Payload> {
        self.wallet.read(call)
    }

    async fn write(&self, call: &ContractCall, value: U256) -> ProviderResult<SubmissionId> {
        if self.from.is_none() {
            return Err(ProviderError::Unsupported("read-only capability".into()));
        }
        self.wallet.submit(call, value)
    }

    async fn await_confirmation(
        &self,
        submission: SubmissionId,
    ) -> ProviderResult<Confirmation> {
        wait_open(&self.wallet.confirmation_gate).await;
        self.wallet.confirmation(submission)
    }
}
