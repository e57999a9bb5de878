#![allow(non_snake_case)]

use super::*;
use crate::{
    provider::Value,
    test_helpers::{
        FakeWallet,
        HOLESKY,
        SwitchBehavior,
    },
};
use alloy_primitives::Address;
use std::cell::Cell;
use tokio::task::yield_now;

const GET_STATS: &str = "getStats(string) returns (uint256,uint256)";
const CREATE_NATION: &str = "createNation(string)";
const PROVIDE_POINTS: &str = "providePoints(uint256,uint256)";

fn target() -> Address {
    Address::repeat_byte(0xed)
}

fn stats_payload() -> Vec<Value> {
    vec![12u64.into(), 3u64.into()]
}

fn get_stats() -> OperationRequest {
    OperationRequest::read(target(), GET_STATS, vec!["atlantis".into()])
}

fn create_nation(fee: U256) -> OperationRequest {
    OperationRequest::write(target(), CREATE_NATION, vec!["atlantis".into()])
        .with_value(fee)
}

fn fee() -> U256 {
    U256::from(20_000_000_000_000_000u64)
}

#[tokio::test]
async fn execute__read_on_required_network__returns_payload() {
    // given
    let wallet = FakeWallet::new(HOLESKY).with_read("getStats", stats_payload());
    let manager = SessionManager::new(wallet.clone());
    let executor = OperationExecutor::new(&manager, HOLESKY);

    // when
    let outcome = executor.execute(&get_stats()).await;

    // then
    assert_eq!(
        outcome,
        OperationOutcome::Success {
            payload: stats_payload(),
            submission: None,
            refreshed: vec![],
        }
    );
    assert_eq!(wallet.read_calls(), vec![get_stats().call]);
}

#[tokio::test]
async fn execute__no_provider__fails_precondition_with_no_provider() {
    // given
    let manager = SessionManager::<FakeWallet>::without_provider();
    let executor = OperationExecutor::new(&manager, HOLESKY);

    // when
    let outcome = executor.execute(&get_stats()).await;

    // then
    assert!(matches!(
        outcome,
        OperationOutcome::Failure {
            stage: FailureStage::Precondition,
            kind: FailureKind::NoProvider,
            ..
        }
    ));
}

#[tokio::test]
async fn execute__wrong_network_accepted__switches_once_then_dispatches() {
    // given
    let wallet = FakeWallet::new(1).with_read("getStats", stats_payload());
    let manager = SessionManager::new(wallet.clone());
    let executor = OperationExecutor::new(&manager, HOLESKY);

    // when
    let outcome = executor.execute(&get_stats()).await;

    // then
    assert!(outcome.is_success());
    assert_eq!(wallet.switch_requests(), 1);
    assert_eq!(wallet.read_calls().len(), 1);
}

#[tokio::test]
async fn execute__switch_declined__never_dispatches() {
    // given
    let wallet = FakeWallet::new(1)
        .with_switch(SwitchBehavior::Reject)
        .with_read("getStats", stats_payload());
    let manager = SessionManager::new(wallet.clone());
    let executor = OperationExecutor::new(&manager, HOLESKY);

    // when
    let outcome = executor.execute(&get_stats()).await;

    // then
    assert_eq!(
        outcome.failure_kind(),
        Some(FailureKind::NetworkSwitchRejected)
    );
    assert!(wallet.read_calls().is_empty());
}

#[tokio::test]
async fn execute__account_access_declined__fails_with_user_rejected() {
    // given
    let wallet = FakeWallet::new(HOLESKY).rejecting_accounts();
    let manager = SessionManager::new(wallet);
    let executor = OperationExecutor::new(&manager, HOLESKY);

    // when
    let outcome = executor.execute(&create_nation(fee())).await;

    // then
    assert_eq!(outcome.failure_kind(), Some(FailureKind::UserRejected));
}

#[tokio::test]
async fn execute__read_of_unknown_method__fails_with_remote_query() {
    // given
    let wallet = FakeWallet::new(HOLESKY);
    let manager = SessionManager::new(wallet);
    let executor = OperationExecutor::new(&manager, HOLESKY);

    // when
    let outcome = executor.execute(&get_stats()).await;

    // then
    assert!(matches!(
        outcome,
        OperationOutcome::Failure {
            stage: FailureStage::Dispatch,
            kind: FailureKind::RemoteQuery,
            ..
        }
    ));
}

#[tokio::test]
async fn execute__read_without_signer__uses_read_only_fallback() {
    // given
    let wallet = FakeWallet::new(HOLESKY)
        .without_signer()
        .with_read_only()
        .with_read("getStats", stats_payload());
    let manager = SessionManager::new(wallet);
    let executor = OperationExecutor::new(&manager, HOLESKY);

    // when
    let outcome = executor.execute(&get_stats()).await;

    // then
    assert!(outcome.is_success());
}

#[tokio::test]
async fn execute__write_without_signer__fails_with_submission() {
    // given
    let wallet = FakeWallet::new(HOLESKY).without_signer().with_read_only();
    let manager = SessionManager::new(wallet.clone());
    let executor = OperationExecutor::new(&manager, HOLESKY);

    // when
    let outcome = executor.execute(&create_nation(fee())).await;

    // then
    assert_eq!(outcome.failure_kind(), Some(FailureKind::Submission));
    assert!(wallet.submissions().is_empty());
}

#[tokio::test]
async fn execute__write_confirmed__returns_refresh_payload() {
    // given
    let wallet = FakeWallet::new(HOLESKY)
        .with_fee("createNation", fee())
        .with_read("getStats", stats_payload());
    let manager = SessionManager::new(wallet.clone());
    let executor = OperationExecutor::new(&manager, HOLESKY);
    let request = create_nation(fee()).then_read(get_stats());

    // when
    let outcome = executor.execute(&request).await;

    // then
    let submitted = wallet.submissions();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].value, fee());
    assert_eq!(
        outcome,
        OperationOutcome::Success {
            payload: vec![],
            submission: Some(submitted[0].id),
            refreshed: vec![Refreshed::Fresh {
                method: "getStats".into(),
                payload: stats_payload(),
            }],
        }
    );
}

#[tokio::test]
async fn execute__refresh_read_fails__write_succeeds_with_failed_refresh() {
    // given
    let wallet = FakeWallet::new(HOLESKY).with_fee("createNation", fee());
    let manager = SessionManager::new(wallet.clone());
    let executor = OperationExecutor::new(&manager, HOLESKY);
    let request = create_nation(fee()).then_read(get_stats());

    // when
    let outcome = executor.execute(&request).await;

    // then
    assert!(outcome.is_success());
    assert_eq!(wallet.read_calls(), vec![get_stats().call]);
    assert!(matches!(
        outcome.refreshed(),
        [Refreshed::Failed {
            kind: FailureKind::RemoteQuery,
            ..
        }]
    ));
}

#[tokio::test]
async fn execute__session_account_argument__bound_before_dispatch() {
    // given
    let wallet = FakeWallet::new(HOLESKY).with_read("userPoints", vec![25u64.into()]);
    let manager = SessionManager::new(wallet.clone());
    let executor = OperationExecutor::new(&manager, HOLESKY);
    let request = OperationRequest::read(
        target(),
        "userPoints(address,string) returns (uint256)",
        vec![Value::SessionAccount, "atlantis".into()],
    );

    // when
    let outcome = executor.execute(&request).await;

    // then
    assert!(outcome.is_success());
    assert_eq!(
        wallet.read_calls()[0].args,
        vec![Value::Address(wallet.account()), "atlantis".into()]
    );
}

#[tokio::test]
async fn execute__write_reverted__fails_with_reverted() {
    // given
    let wallet = FakeWallet::new(HOLESKY).reverting("providePoints");
    let manager = SessionManager::new(wallet);
    let executor = OperationExecutor::new(&manager, HOLESKY);
    let request =
        OperationRequest::write(target(), PROVIDE_POINTS, vec![4u64.into(), 10u64.into()]);

    // when
    let outcome = executor.execute(&request).await;

    // then
    assert!(matches!(
        outcome,
        OperationOutcome::Failure {
            stage: FailureStage::Confirmation,
            kind: FailureKind::Reverted,
            ..
        }
    ));
}

#[tokio::test]
async fn execute__payable_write_with_zero_value__is_not_success() {
    // given
    let wallet = FakeWallet::new(HOLESKY).with_fee("createNation", fee());
    let manager = SessionManager::new(wallet);
    let executor = OperationExecutor::new(&manager, HOLESKY);

    // when
    let outcome = executor.execute(&create_nation(U256::ZERO)).await;

    // then
    assert!(matches!(
        outcome.failure_kind(),
        Some(FailureKind::Reverted | FailureKind::Submission)
    ));
}

#[tokio::test]
async fn execute__signature_declined__fails_with_user_rejected() {
    // given
    let wallet = FakeWallet::new(HOLESKY)
        .failing_writes(ProviderError::UserRejected("User denied signature".into()));
    let manager = SessionManager::new(wallet);
    let executor = OperationExecutor::new(&manager, HOLESKY);

    // when
    let outcome = executor.execute(&create_nation(fee())).await;

    // then
    assert_eq!(outcome.failure_kind(), Some(FailureKind::UserRejected));
}

#[tokio::test]
async fn execute__submission_error__fails_with_submission() {
    // given
    let wallet = FakeWallet::new(HOLESKY).failing_writes(ProviderError::Rpc {
        code: -32000,
        message: "insufficient funds for gas".into(),
    });
    let manager = SessionManager::new(wallet);
    let executor = OperationExecutor::new(&manager, HOLESKY);

    // when
    let outcome = executor.execute(&create_nation(fee())).await;

    // then
    assert!(matches!(
        outcome,
        OperationOutcome::Failure {
            stage: FailureStage::Dispatch,
            kind: FailureKind::Submission,
            ..
        }
    ));
}

#[tokio::test]
async fn execute__write__success_not_observable_before_confirmation() {
    // given
    let wallet = FakeWallet::new(HOLESKY).holding_confirmations();
    let manager = SessionManager::new(wallet.clone());
    let executor = OperationExecutor::new(&manager, HOLESKY);
    let request =
        OperationRequest::write(target(), PROVIDE_POINTS, vec![4u64.into(), 10u64.into()]);
    let finished = Cell::new(false);

    // when
    let (outcome, ()) = tokio::join!(
        async {
            let outcome = executor.execute(&request).await;
            finished.set(true);
            outcome
        },
        async {
            while wallet.submissions().is_empty() {
                yield_now().await;
            }
            for _ in 0..16 {
                yield_now().await;
            }
            assert!(!finished.get(), "outcome reported before confirmation");
            wallet.release_confirmations();
        }
    );

    // then
    assert!(outcome.is_success());
}

#[tokio::test]
async fn execute_with_progress__write__reports_pending_then_success() {
    // given
    let wallet = FakeWallet::new(HOLESKY);
    let manager = SessionManager::new(wallet.clone());
    let executor = OperationExecutor::new(&manager, HOLESKY);
    let (progress, mut updates) = mpsc::unbounded_channel();

    // when
    let outcome = executor
        .execute_with_progress(&create_nation(fee()), &progress)
        .await;

    // then
    let submission = wallet.submissions()[0].id;
    assert_eq!(
        updates.try_recv().unwrap(),
        OperationOutcome::Pending { submission }
    );
    assert!(updates.try_recv().is_err());
    assert!(outcome.is_success());
}

#[tokio::test]
async fn execute__confirmation_timeout__fails_with_submission() {
    // given
    let wallet = FakeWallet::new(HOLESKY).holding_confirmations();
    let manager = SessionManager::new(wallet);
    let config = ExecutorConfig {
        confirmation_timeout: Some(Duration::from_millis(20)),
    };
    let executor = OperationExecutor::with_config(&manager, HOLESKY, config);

    // when
    let outcome = executor.execute(&create_nation(fee())).await;

    // then
    assert!(matches!(
        outcome,
        OperationOutcome::Failure {
            stage: FailureStage::Confirmation,
            kind: FailureKind::Submission,
            ..
        }
    ));
}

#[tokio::test]
async fn execute__concurrent_calls_while_disconnected__share_one_prompt() {
    // given
    let wallet = FakeWallet::new(HOLESKY)
        .with_read("getStats", stats_payload())
        .holding_account_prompt();
    let manager = SessionManager::new(wallet.clone());
    let executor = OperationExecutor::new(&manager, HOLESKY);
    let request = get_stats();

    // when
    let (first, second, ()) = tokio::join!(
        executor.execute(&request),
        executor.execute(&request),
        async {
            while wallet.account_requests() == 0 {
                yield_now().await;
            }
            for _ in 0..16 {
                yield_now().await;
            }
            wallet.release_account_prompt();
        }
    );

    // then
    assert_eq!(wallet.account_requests(), 1);
    assert!(first.is_success());
    assert!(second.is_success());
}
