//! Pipeline actions and their status lifecycle

use crate::adapter::{ChainSide, ProgressNote};

use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One step kind of an operation pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    ApproveManager,
    LockToken,
    WaitForBlock,
    MintToken,
    BurnToken,
    UnlockToken,
}

impl ActionKind {
    /// Step name for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::ApproveManager => "approve_manager",
            ActionKind::LockToken => "lock_token",
            ActionKind::WaitForBlock => "wait_for_block",
            ActionKind::MintToken => "mint_token",
            ActionKind::BurnToken => "burn_token",
            ActionKind::UnlockToken => "unlock_token",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status shared by operations and their actions
///
/// Transitions are monotonic: WAITING → IN_PROGRESS → {SUCCESS, ERROR}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Waiting,
    InProgress,
    Success,
    Error,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Success | Status::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Waiting => "waiting",
            Status::InProgress => "in_progress",
            Status::Success => "success",
            Status::Error => "error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ordered step of an operation pipeline
///
/// Actions carry no behavior of their own; the runner dispatches on `kind`
/// and threads data between steps through the pipeline context, so an action
/// is purely the observable record of a step.
#[derive(Debug)]
pub struct Action {
    pub kind: ActionKind,
    /// Which adapter this step primarily talks to
    pub chain: ChainSide,
    pub await_confirmation: bool,
    pub status: Status,
    /// User-submitted tx for confirmation steps; orchestrator-submitted tx
    /// for value-transfer steps
    pub transaction_hash: Option<H256>,
    /// Decoded result of the step, stored on success
    pub payload: Option<serde_json::Value>,
    pub progress: ProgressNote,
}

impl Action {
    /// A step that waits for chain-level confirmation of `tx_hash`
    pub fn awaiting(kind: ActionKind, chain: ChainSide, tx_hash: H256) -> Self {
        Self {
            kind,
            chain,
            await_confirmation: true,
            status: Status::Waiting,
            transaction_hash: Some(tx_hash),
            payload: None,
            progress: ProgressNote::new(),
        }
    }

    /// A step that invokes its chain interaction directly
    pub fn immediate(kind: ActionKind, chain: ChainSide) -> Self {
        Self {
            kind,
            chain,
            await_confirmation: false,
            status: Status::Waiting,
            transaction_hash: None,
            payload: None,
            progress: ProgressNote::new(),
        }
    }

    pub fn snapshot(&self) -> ActionSnapshot {
        ActionSnapshot {
            kind: self.kind,
            chain: self.chain,
            await_confirmation: self.await_confirmation,
            status: self.status,
            transaction_hash: self.transaction_hash,
            payload: self.payload.clone(),
            message: self.progress.get(),
        }
    }
}

/// Immutable, serializable view of an action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSnapshot {
    pub kind: ActionKind,
    pub chain: ChainSide,
    pub await_confirmation: bool,
    pub status: Status,
    pub transaction_hash: Option<H256>,
    pub payload: Option<serde_json::Value>,
    pub message: Option<String>,
}

/// Result of executing a single step
///
/// Adapter/chain faults travel separately as `Err(BridgeError)`, keeping the
/// three failure categories distinguishable at the operation level.
#[derive(Debug)]
pub enum StepOutcome {
    Completed {
        payload: Option<serde_json::Value>,
        transaction_hash: Option<H256>,
    },
    /// The adapter reported no receipt or a failure receipt
    Unconfirmed { transaction_hash: H256 },
    /// Decoded log data failed validation; the value transfer was never
    /// attempted
    Rejected(ValidationReject),
}

/// Why a mint/unlock validation rejected the decoded logs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ValidationReject {
    SpenderMismatch { expected: Address, actual: Address },
    AmountMismatch { approved: U256, transferred: U256 },
}

impl fmt::Display for ValidationReject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationReject::SpenderMismatch { expected, actual } => write!(
                f,
                "approval spender {:?} does not match manager contract {:?}",
                actual, expected
            ),
            ValidationReject::AmountMismatch {
                approved,
                transferred,
            } => write!(
                f,
                "transferred amount {} does not match approved amount {}",
                transferred, approved
            ),
        }
    }
}

/// Typed record of why an operation ended in ERROR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailure {
    pub action: ActionKind,
    pub cause: FailureCause,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureCause {
    ValidationRejected { reject: ValidationReject },
    Unconfirmed { transaction_hash: H256 },
    Adapter { message: String },
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            FailureCause::ValidationRejected { reject } => {
                write!(f, "{} rejected: {}", self.action, reject)
            }
            FailureCause::Unconfirmed { transaction_hash } => write!(
                f,
                "{} could not confirm transaction {:?}",
                self.action, transaction_hash
            ),
            FailureCause::Adapter { message } => {
                write!(f, "{} adapter failure: {}", self.action, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_note_is_shared_between_clones() {
        let note = ProgressNote::new();
        let clone = note.clone();
        clone.set("waiting for block 42");
        assert_eq!(note.get().as_deref(), Some("waiting for block 42"));
    }

    #[test]
    fn awaiting_action_carries_the_pending_hash() {
        let hash = H256::repeat_byte(0x01);
        let action = Action::awaiting(ActionKind::LockToken, ChainSide::Source, hash);
        assert!(action.await_confirmation);
        assert_eq!(action.transaction_hash, Some(hash));
        assert_eq!(action.status, Status::Waiting);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&Status::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn failure_cause_is_tagged() {
        let failure = StepFailure {
            action: ActionKind::MintToken,
            cause: FailureCause::ValidationRejected {
                reject: ValidationReject::AmountMismatch {
                    approved: U256::from(100),
                    transferred: U256::from(90),
                },
            },
        };
        let value = serde_json::to_value(&failure).unwrap();
        assert_eq!(value["cause"]["kind"], "validation_rejected");
        assert_eq!(value["cause"]["reject"]["reason"], "amount_mismatch");
    }
}
