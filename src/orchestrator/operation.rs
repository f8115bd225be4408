//! Operation state machine and sequential pipeline runner

use super::action::{
    Action, ActionKind, ActionSnapshot, FailureCause, Status, StepFailure, StepOutcome,
    ValidationReject,
};
use super::context::{PipelineContext, PipelineEnv};
use super::pipeline::{OperationParams, TransferType};
use crate::adapter::{ChainSide, ProgressNote};
use crate::error::{BridgeError, BridgeResult};

use chrono::{DateTime, Utc};
use ethers::types::{Address, H256};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// One end-to-end cross-chain transfer request and its execution state
///
/// The action list is fixed at construction and owned exclusively by the
/// operation; only the runner advances statuses. Construction is separate
/// from execution: [`Operation::run`] is the explicit entry point and
/// resolves to the final status, so callers control scheduling and can await
/// completion instead of polling.
#[derive(Debug)]
pub struct Operation {
    id: Uuid,
    transfer_type: TransferType,
    source_address: Address,
    destination_address: Address,
    amount: String,
    created_at: DateTime<Utc>,
    state: RwLock<OperationState>,
}

#[derive(Debug)]
struct OperationState {
    status: Status,
    actions: Vec<Action>,
    failure: Option<StepFailure>,
}

impl Operation {
    pub(crate) fn new(params: &OperationParams, actions: Vec<Action>) -> Self {
        Self {
            id: Uuid::new_v4(),
            transfer_type: params.transfer_type,
            source_address: params.source_address,
            destination_address: params.destination_address,
            amount: params.amount.clone(),
            created_at: Utc::now(),
            state: RwLock::new(OperationState {
                status: Status::Waiting,
                actions,
                failure: None,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn transfer_type(&self) -> TransferType {
        self.transfer_type
    }

    pub fn amount(&self) -> &str {
        &self.amount
    }

    pub async fn status(&self) -> Status {
        self.state.read().await.status
    }

    pub async fn failure(&self) -> Option<StepFailure> {
        self.state.read().await.failure.clone()
    }

    /// Immutable view of the operation suitable for serialization
    pub async fn snapshot(&self) -> OperationSnapshot {
        let state = self.state.read().await;
        OperationSnapshot {
            id: self.id,
            transfer_type: self.transfer_type,
            status: state.status,
            amount: self.amount.clone(),
            source_address: self.source_address,
            destination_address: self.destination_address,
            created_at: self.created_at,
            failure: state.failure.clone(),
            actions: state.actions.iter().map(Action::snapshot).collect(),
        }
    }

    /// Drive the pipeline to completion, strictly in order
    ///
    /// Step N+1 never begins before step N reports success; the first
    /// non-completed outcome terminates the pipeline and no later step is
    /// attempted. Returns the final status. Calling `run` a second time once
    /// execution has begun is a no-op returning the current status.
    pub async fn run(&self, env: &PipelineEnv) -> Status {
        let total = {
            let mut state = self.state.write().await;

            // Idempotent start guard: decline if execution already began,
            // e.g. on a duplicate start for the same operation.
            if state.status != Status::Waiting
                || state.actions.iter().any(|a| a.status != Status::Waiting)
            {
                debug!("Operation {} already started, declining to run again", self.id);
                return state.status;
            }

            state.status = Status::InProgress;
            state.actions.len()
        };

        info!(
            "Operation {} ({}) started with {} actions",
            self.id, self.transfer_type, total
        );

        let started = std::time::Instant::now();
        let mut ctx = PipelineContext::default();

        for index in 0..total {
            let (kind, chain, pending_tx, progress) = {
                let mut state = self.state.write().await;
                let action = &mut state.actions[index];
                action.status = Status::InProgress;
                (
                    action.kind,
                    action.chain,
                    action.transaction_hash,
                    action.progress.clone(),
                )
            };

            debug!("Operation {} executing step {}", self.id, kind);

            // State lock is never held across the adapter await.
            let outcome = self
                .execute_step(kind, chain, pending_tx, progress, env, &mut ctx)
                .await;

            let mut state = self.state.write().await;
            match outcome {
                Ok(StepOutcome::Completed {
                    payload,
                    transaction_hash,
                }) => {
                    let action = &mut state.actions[index];
                    action.status = Status::Success;
                    action.payload = payload;
                    if let Some(tx_hash) = transaction_hash {
                        action.transaction_hash = Some(tx_hash);
                    }
                    crate::metrics::record_step(kind.as_str(), "completed");
                    info!("Operation {} step {} completed", self.id, kind);
                }
                Ok(StepOutcome::Unconfirmed { transaction_hash }) => {
                    let failure = StepFailure {
                        action: kind,
                        cause: FailureCause::Unconfirmed { transaction_hash },
                    };
                    warn!("Operation {} failed: {}", self.id, failure);
                    crate::metrics::record_step(kind.as_str(), "unconfirmed");
                    return self.settle_error(state, index, failure, started);
                }
                Ok(StepOutcome::Rejected(reject)) => {
                    let failure = StepFailure {
                        action: kind,
                        cause: FailureCause::ValidationRejected { reject },
                    };
                    warn!("Operation {} rejected: {}", self.id, failure);
                    crate::metrics::record_validation_rejected(kind.as_str());
                    crate::metrics::record_step(kind.as_str(), "rejected");
                    return self.settle_error(state, index, failure, started);
                }
                Err(e) => {
                    let failure = StepFailure {
                        action: kind,
                        cause: FailureCause::Adapter {
                            message: e.to_string(),
                        },
                    };
                    error!("Operation {} adapter failure: {}", self.id, failure);
                    crate::metrics::record_step(kind.as_str(), "adapter_error");
                    return self.settle_error(state, index, failure, started);
                }
            }
        }

        let mut state = self.state.write().await;
        state.status = Status::Success;
        info!("Operation {} completed successfully", self.id);
        crate::metrics::record_operation_settled(self.transfer_type.as_str(), "success");
        crate::metrics::record_operation_duration(
            self.transfer_type.as_str(),
            "success",
            started.elapsed().as_secs_f64(),
        );
        Status::Success
    }

    fn settle_error(
        &self,
        mut state: tokio::sync::RwLockWriteGuard<'_, OperationState>,
        index: usize,
        failure: StepFailure,
        started: std::time::Instant,
    ) -> Status {
        state.actions[index].status = Status::Error;
        state.failure = Some(failure);
        state.status = Status::Error;
        crate::metrics::record_operation_settled(self.transfer_type.as_str(), "error");
        crate::metrics::record_operation_duration(
            self.transfer_type.as_str(),
            "error",
            started.elapsed().as_secs_f64(),
        );
        Status::Error
    }

    /// Execute one step against the adapters, reading and extending the
    /// pipeline context
    async fn execute_step(
        &self,
        kind: ActionKind,
        chain: ChainSide,
        pending_tx: Option<H256>,
        progress: ProgressNote,
        env: &PipelineEnv,
        ctx: &mut PipelineContext,
    ) -> BridgeResult<StepOutcome> {
        match kind {
            ActionKind::ApproveManager | ActionKind::LockToken | ActionKind::BurnToken => {
                let tx_hash = pending_tx.ok_or_else(|| {
                    BridgeError::Internal(format!("{} has no pending transaction hash", kind))
                })?;

                match env.adapters.side(chain).get_confirmed_receipt(tx_hash).await? {
                    Some(receipt) => {
                        let payload = serde_json::to_value(&receipt)
                            .map_err(|e| BridgeError::Internal(e.to_string()))?;
                        if kind == ActionKind::ApproveManager {
                            ctx.approval_receipt = Some(receipt);
                        } else {
                            ctx.transfer_receipt = Some(receipt);
                        }
                        Ok(StepOutcome::Completed {
                            payload: Some(payload),
                            transaction_hash: None,
                        })
                    }
                    None => Ok(StepOutcome::Unconfirmed {
                        transaction_hash: tx_hash,
                    }),
                }
            }

            ActionKind::WaitForBlock => {
                let receipt = ctx.transfer_receipt.as_ref().ok_or_else(|| {
                    BridgeError::Internal("lock receipt missing from pipeline context".to_string())
                })?;
                let target_block = receipt.block_number + env.confirmation_blocks;

                env.adapters
                    .side(chain)
                    .wait_for_block(target_block, progress)
                    .await?;

                Ok(StepOutcome::Completed {
                    payload: Some(json!({ "target_block": target_block })),
                    transaction_hash: None,
                })
            }

            ActionKind::MintToken | ActionKind::UnlockToken => {
                // Logs live on the chain the user interacted with, opposite
                // the chain performing the value transfer. The spender must
                // be the destination-chain manager in both directions: it
                // receives the locked asset for a mint and holds the burn
                // approval for an unlock.
                let decode_side = match kind {
                    ActionKind::MintToken => ChainSide::Source,
                    _ => ChainSide::Destination,
                };
                let expected_spender = env.managers.destination;
                let decoder = env.adapters.side(decode_side);

                let approval_receipt = ctx.approval_receipt.as_ref().ok_or_else(|| {
                    BridgeError::Internal(
                        "approval receipt missing from pipeline context".to_string(),
                    )
                })?;
                let transfer_receipt = ctx.transfer_receipt.as_ref().ok_or_else(|| {
                    BridgeError::Internal(
                        "lock/burn receipt missing from pipeline context".to_string(),
                    )
                })?;

                let approval = decoder.decode_approval_log(approval_receipt)?;
                if approval.spender != expected_spender {
                    return Ok(StepOutcome::Rejected(ValidationReject::SpenderMismatch {
                        expected: expected_spender,
                        actual: approval.spender,
                    }));
                }

                let transfer = decoder.decode_transfer_log(transfer_receipt)?;
                if transfer.amount != approval.value {
                    return Ok(StepOutcome::Rejected(ValidationReject::AmountMismatch {
                        approved: approval.value,
                        transferred: transfer.amount,
                    }));
                }

                let submitter = env.adapters.side(chain);
                let source_tx_hash = transfer_receipt.transaction_hash;
                let tx_hash = match kind {
                    ActionKind::MintToken => {
                        submitter
                            .mint(transfer.recipient, transfer.amount, source_tx_hash)
                            .await?
                    }
                    _ => {
                        submitter
                            .unlock(transfer.recipient, transfer.amount, source_tx_hash)
                            .await?
                    }
                };

                Ok(StepOutcome::Completed {
                    payload: Some(json!({ "submitted_tx": tx_hash })),
                    transaction_hash: Some(tx_hash),
                })
            }
        }
    }
}

/// Immutable, serializable view of an operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationSnapshot {
    pub id: Uuid,
    pub transfer_type: TransferType,
    pub status: Status,
    pub amount: String,
    pub source_address: Address,
    pub destination_address: Address,
    pub created_at: DateTime<Utc>,
    pub failure: Option<StepFailure>,
    pub actions: Vec<ActionSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{ApprovalLog, MockChainAdapter, Receipt, TransferLog};
    use crate::orchestrator::context::{AdapterPair, ManagerAddresses};
    use crate::orchestrator::pipeline::PipelineRegistry;

    use ethers::types::U256;
    use mockall::predicate::eq;
    use std::collections::HashMap;
    use std::sync::Arc;

    const APPROVE_TX: H256 = H256::repeat_byte(0xa1);
    const LOCK_TX: H256 = H256::repeat_byte(0xa2);
    const BURN_TX: H256 = H256::repeat_byte(0xb2);
    const MINT_TX: H256 = H256::repeat_byte(0xfe);
    const UNLOCK_TX: H256 = H256::repeat_byte(0xfd);

    const CONFIRMATIONS: u64 = 13;

    fn source_manager() -> Address {
        Address::repeat_byte(0xcc)
    }

    fn destination_manager() -> Address {
        Address::repeat_byte(0xdd)
    }

    fn recipient() -> Address {
        Address::repeat_byte(0x42)
    }

    fn receipt(tx_hash: H256, block_number: u64) -> Receipt {
        Receipt {
            transaction_hash: tx_hash,
            block_number,
            logs: vec![],
        }
    }

    fn env(source: MockChainAdapter, destination: MockChainAdapter) -> PipelineEnv {
        PipelineEnv {
            adapters: AdapterPair {
                source: Arc::new(source),
                destination: Arc::new(destination),
            },
            managers: ManagerAddresses {
                source: source_manager(),
                destination: destination_manager(),
            },
            confirmation_blocks: CONFIRMATIONS,
        }
    }

    fn params(transfer_type: TransferType) -> OperationParams {
        let transactions = match transfer_type {
            TransferType::LockMint => HashMap::from([
                (ActionKind::ApproveManager, APPROVE_TX),
                (ActionKind::LockToken, LOCK_TX),
            ]),
            TransferType::BurnUnlock => HashMap::from([
                (ActionKind::ApproveManager, APPROVE_TX),
                (ActionKind::BurnToken, BURN_TX),
            ]),
        };

        OperationParams {
            transfer_type,
            source_address: Address::repeat_byte(0x01),
            destination_address: Address::repeat_byte(0x02),
            amount: "100".to_string(),
            transactions,
        }
    }

    fn operation(transfer_type: TransferType) -> Operation {
        let params = params(transfer_type);
        let actions = PipelineRegistry::standard().build(&params).unwrap();
        Operation::new(&params, actions)
    }

    /// Source mock confirming approve and lock receipts for the happy path
    fn confirming_source(lock_block: u64) -> MockChainAdapter {
        let mut source = MockChainAdapter::new();
        source
            .expect_get_confirmed_receipt()
            .with(eq(APPROVE_TX))
            .times(1)
            .returning(|tx| Ok(Some(receipt(tx, 90))));
        source
            .expect_get_confirmed_receipt()
            .with(eq(LOCK_TX))
            .times(1)
            .returning(move |tx| Ok(Some(receipt(tx, lock_block))));
        source
            .expect_wait_for_block()
            .withf(move |target, _| *target == lock_block + CONFIRMATIONS)
            .times(1)
            .returning(|_, _| Ok(()));
        source
    }

    #[tokio::test]
    async fn lock_mint_happy_path_mints_once() {
        let mut source = confirming_source(100);
        source
            .expect_decode_approval_log()
            .times(1)
            .returning(|_| {
                Ok(ApprovalLog {
                    spender: destination_manager(),
                    value: U256::from(100),
                })
            });
        source
            .expect_decode_transfer_log()
            .times(1)
            .returning(|_| {
                Ok(TransferLog {
                    recipient: recipient(),
                    amount: U256::from(100),
                })
            });

        let mut destination = MockChainAdapter::new();
        destination
            .expect_mint()
            .withf(|to, amount, src_tx| {
                *to == recipient() && *amount == U256::from(100) && *src_tx == LOCK_TX
            })
            .times(1)
            .returning(|_, _, _| Ok(MINT_TX));

        let op = operation(TransferType::LockMint);
        let status = op.run(&env(source, destination)).await;

        assert_eq!(status, Status::Success);
        assert!(op.failure().await.is_none());

        let snapshot = op.snapshot().await;
        assert_eq!(snapshot.status, Status::Success);
        assert!(snapshot.actions.iter().all(|a| a.status == Status::Success));
        // Mint action picked up the submitted tx hash
        assert_eq!(snapshot.actions[3].transaction_hash, Some(MINT_TX));
    }

    #[tokio::test]
    async fn amount_mismatch_never_mints() {
        let mut source = confirming_source(100);
        source
            .expect_decode_approval_log()
            .times(1)
            .returning(|_| {
                Ok(ApprovalLog {
                    spender: destination_manager(),
                    value: U256::from(100),
                })
            });
        source
            .expect_decode_transfer_log()
            .times(1)
            .returning(|_| {
                Ok(TransferLog {
                    recipient: recipient(),
                    amount: U256::from(90),
                })
            });

        let mut destination = MockChainAdapter::new();
        destination.expect_mint().times(0);

        let op = operation(TransferType::LockMint);
        let status = op.run(&env(source, destination)).await;

        assert_eq!(status, Status::Error);
        let failure = op.failure().await.unwrap();
        assert_eq!(failure.action, ActionKind::MintToken);
        assert!(matches!(
            failure.cause,
            FailureCause::ValidationRejected {
                reject: ValidationReject::AmountMismatch { .. }
            }
        ));
    }

    #[tokio::test]
    async fn spender_mismatch_rejects_before_decoding_transfer() {
        let mut source = confirming_source(100);
        source
            .expect_decode_approval_log()
            .times(1)
            .returning(|_| {
                Ok(ApprovalLog {
                    spender: Address::repeat_byte(0xee),
                    value: U256::from(100),
                })
            });
        source.expect_decode_transfer_log().times(0);

        let mut destination = MockChainAdapter::new();
        destination.expect_mint().times(0);

        let op = operation(TransferType::LockMint);
        let status = op.run(&env(source, destination)).await;

        assert_eq!(status, Status::Error);
        let failure = op.failure().await.unwrap();
        assert!(matches!(
            failure.cause,
            FailureCause::ValidationRejected {
                reject: ValidationReject::SpenderMismatch { .. }
            }
        ));
    }

    #[tokio::test]
    async fn unconfirmed_approve_stops_the_pipeline() {
        let mut source = MockChainAdapter::new();
        source
            .expect_get_confirmed_receipt()
            .with(eq(APPROVE_TX))
            .times(1)
            .returning(|_| Ok(None));
        source
            .expect_get_confirmed_receipt()
            .with(eq(LOCK_TX))
            .times(0);
        source.expect_wait_for_block().times(0);

        let mut destination = MockChainAdapter::new();
        destination.expect_mint().times(0);

        let op = operation(TransferType::LockMint);
        let status = op.run(&env(source, destination)).await;

        assert_eq!(status, Status::Error);
        let failure = op.failure().await.unwrap();
        assert_eq!(failure.action, ActionKind::ApproveManager);
        assert!(matches!(
            failure.cause,
            FailureCause::Unconfirmed { transaction_hash } if transaction_hash == APPROVE_TX
        ));

        // Later actions were never started
        let snapshot = op.snapshot().await;
        assert_eq!(snapshot.actions[0].status, Status::Error);
        assert!(snapshot.actions[1..]
            .iter()
            .all(|a| a.status == Status::Waiting));
    }

    #[tokio::test]
    async fn adapter_failure_is_distinguishable_from_rejection() {
        let mut source = MockChainAdapter::new();
        source
            .expect_get_confirmed_receipt()
            .with(eq(APPROVE_TX))
            .times(1)
            .returning(|tx| Ok(Some(receipt(tx, 90))));
        source
            .expect_get_confirmed_receipt()
            .with(eq(LOCK_TX))
            .times(1)
            .returning(|_| {
                Err(BridgeError::Chain {
                    chain: "ethereum".to_string(),
                    message: "all providers failed".to_string(),
                })
            });

        let destination = MockChainAdapter::new();

        let op = operation(TransferType::LockMint);
        let status = op.run(&env(source, destination)).await;

        assert_eq!(status, Status::Error);
        let failure = op.failure().await.unwrap();
        assert_eq!(failure.action, ActionKind::LockToken);
        assert!(matches!(failure.cause, FailureCause::Adapter { .. }));
    }

    #[tokio::test]
    async fn burn_unlock_happy_path_unlocks_once() {
        let mut destination = MockChainAdapter::new();
        destination
            .expect_get_confirmed_receipt()
            .with(eq(APPROVE_TX))
            .times(1)
            .returning(|tx| Ok(Some(receipt(tx, 50))));
        destination
            .expect_get_confirmed_receipt()
            .with(eq(BURN_TX))
            .times(1)
            .returning(|tx| Ok(Some(receipt(tx, 51))));
        // A real burn approval names the burn-chain manager as spender
        destination
            .expect_decode_approval_log()
            .times(1)
            .returning(|_| {
                Ok(ApprovalLog {
                    spender: destination_manager(),
                    value: U256::from(100),
                })
            });
        destination
            .expect_decode_transfer_log()
            .times(1)
            .returning(|_| {
                Ok(TransferLog {
                    recipient: recipient(),
                    amount: U256::from(100),
                })
            });

        let mut source = MockChainAdapter::new();
        source
            .expect_unlock()
            .withf(|to, amount, src_tx| {
                *to == recipient() && *amount == U256::from(100) && *src_tx == BURN_TX
            })
            .times(1)
            .returning(|_, _, _| Ok(UNLOCK_TX));
        // No block-wait step in this direction
        source.expect_wait_for_block().times(0);

        let op = operation(TransferType::BurnUnlock);
        let status = op.run(&env(source, destination)).await;

        assert_eq!(status, Status::Success);
        let snapshot = op.snapshot().await;
        assert_eq!(snapshot.actions.len(), 3);
        assert!(snapshot.actions.iter().all(|a| a.status == Status::Success));
        assert_eq!(snapshot.actions[2].transaction_hash, Some(UNLOCK_TX));
    }

    #[tokio::test]
    async fn unlock_rejects_approval_naming_the_wrong_manager() {
        let mut destination = MockChainAdapter::new();
        destination
            .expect_get_confirmed_receipt()
            .with(eq(APPROVE_TX))
            .times(1)
            .returning(|tx| Ok(Some(receipt(tx, 50))));
        destination
            .expect_get_confirmed_receipt()
            .with(eq(BURN_TX))
            .times(1)
            .returning(|tx| Ok(Some(receipt(tx, 51))));
        // Approval authorizes the lock-chain manager, not the burn-chain
        // manager the burn flow requires
        destination
            .expect_decode_approval_log()
            .times(1)
            .returning(|_| {
                Ok(ApprovalLog {
                    spender: source_manager(),
                    value: U256::from(100),
                })
            });
        destination.expect_decode_transfer_log().times(0);

        let mut source = MockChainAdapter::new();
        source.expect_unlock().times(0);

        let op = operation(TransferType::BurnUnlock);
        let status = op.run(&env(source, destination)).await;

        assert_eq!(status, Status::Error);
        let failure = op.failure().await.unwrap();
        assert_eq!(failure.action, ActionKind::UnlockToken);
        assert!(matches!(
            failure.cause,
            FailureCause::ValidationRejected {
                reject: ValidationReject::SpenderMismatch { expected, .. }
            } if expected == destination_manager()
        ));
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let mut source = confirming_source(100);
        source
            .expect_decode_approval_log()
            .times(1)
            .returning(|_| {
                Ok(ApprovalLog {
                    spender: destination_manager(),
                    value: U256::from(100),
                })
            });
        source
            .expect_decode_transfer_log()
            .times(1)
            .returning(|_| {
                Ok(TransferLog {
                    recipient: recipient(),
                    amount: U256::from(100),
                })
            });

        let mut destination = MockChainAdapter::new();
        destination
            .expect_mint()
            .times(1)
            .returning(|_, _, _| Ok(MINT_TX));

        let op = operation(TransferType::LockMint);
        let env = env(source, destination);

        assert_eq!(op.run(&env).await, Status::Success);
        // The times(1) expectations above verify no adapter is re-invoked.
        assert_eq!(op.run(&env).await, Status::Success);
    }

    #[tokio::test]
    async fn snapshot_preserves_pipeline_order() {
        let op = operation(TransferType::LockMint);
        let snapshot = op.snapshot().await;

        assert_eq!(snapshot.status, Status::Waiting);
        assert_eq!(snapshot.amount, "100");
        let kinds: Vec<_> = snapshot.actions.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ActionKind::ApproveManager,
                ActionKind::LockToken,
                ActionKind::WaitForBlock,
                ActionKind::MintToken,
            ]
        );
        assert!(snapshot
            .actions
            .iter()
            .all(|a| a.status == Status::Waiting));
    }
}
