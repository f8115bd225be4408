//! Chain adapter interface consumed by the orchestration core
//!
//! Everything that actually talks to a blockchain lives behind the
//! [`ChainAdapter`] trait: receipt confirmation, log decoding, block-height
//! polling, and the mint/unlock value-transfer calls. The orchestrator only
//! ever sees this interface, so operations can be driven against any chain
//! implementation (or a mock in tests).

pub mod evm;

pub use evm::EvmAdapter;

use crate::error::BridgeResult;

use async_trait::async_trait;
use ethers::types::{Address, Log, H256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Which side of the bridge a step talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainSide {
    /// Chain where the asset natively lives (lock/unlock side)
    Source,
    /// Chain carrying the wrapped asset (mint/burn side)
    Destination,
}

impl fmt::Display for ChainSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainSide::Source => write!(f, "source"),
            ChainSide::Destination => write!(f, "destination"),
        }
    }
}

/// A finalized transaction receipt, as reported by an adapter
///
/// Adapters only return receipts for transactions that reached the chain's
/// confirmation depth with a success status; anything else surfaces as `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub transaction_hash: H256,
    pub block_number: u64,
    pub logs: Vec<Log>,
}

/// Decoded ERC-20 style approval event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalLog {
    pub spender: Address,
    pub value: U256,
}

/// Decoded lock/burn event (the value-transfer leg on the user's chain)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferLog {
    pub recipient: Address,
    pub amount: U256,
}

/// Shared progress note for long-running steps
///
/// Cloned into the adapter so block-height polling can publish human-readable
/// progress while the action it belongs to is still in flight.
#[derive(Clone, Debug, Default)]
pub struct ProgressNote(Arc<Mutex<Option<String>>>);

impl ProgressNote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, message: impl Into<String>) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = Some(message.into());
        }
    }

    pub fn get(&self) -> Option<String> {
        self.0.lock().ok().and_then(|slot| slot.clone())
    }
}

/// Per-chain capability set consumed by pipeline steps
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Block until `tx_hash` is finalized or determined failed.
    ///
    /// Returns `Ok(None)` for a transaction that reverted; a transaction the
    /// chain never mines keeps this call pending (no timeout in this
    /// version).
    async fn get_confirmed_receipt(&self, tx_hash: H256) -> BridgeResult<Option<Receipt>>;

    /// Decode the approval event out of a confirmed receipt
    fn decode_approval_log(&self, receipt: &Receipt) -> BridgeResult<ApprovalLog>;

    /// Decode the lock/burn event out of a confirmed receipt
    fn decode_transfer_log(&self, receipt: &Receipt) -> BridgeResult<TransferLog>;

    /// Poll the chain head until it passes `target_block`, publishing
    /// progress through `progress`
    async fn wait_for_block(&self, target_block: u64, progress: ProgressNote)
        -> BridgeResult<()>;

    /// Submit a mint of the wrapped asset, returning the submitted tx hash
    async fn mint(
        &self,
        recipient: Address,
        amount: U256,
        source_tx_hash: H256,
    ) -> BridgeResult<H256>;

    /// Submit an unlock of the native asset, returning the submitted tx hash
    async fn unlock(
        &self,
        recipient: Address,
        amount: U256,
        source_tx_hash: H256,
    ) -> BridgeResult<H256>;
}
