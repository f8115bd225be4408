//! Pipeline templates and the transfer-type registry
//!
//! Each supported transfer direction maps to a builder producing the fixed,
//! ordered action list for that direction. Builders are registered in a
//! [`PipelineRegistry`] so new directions can be added without touching a
//! central switch.

use super::action::{Action, ActionKind};
use crate::adapter::ChainSide;
use crate::error::{BridgeError, BridgeResult};

use ethers::types::{Address, H256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Supported transfer directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferType {
    /// Lock on the source chain, mint the wrapped asset on the destination
    LockMint,
    /// Burn the wrapped asset on the destination chain, unlock on the source
    BurnUnlock,
}

impl TransferType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferType::LockMint => "lock_mint",
            TransferType::BurnUnlock => "burn_unlock",
        }
    }
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters supplied when an operation is created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationParams {
    pub transfer_type: TransferType,
    pub source_address: Address,
    pub destination_address: Address,
    /// Exact-precision decimal string; never a floating type
    pub amount: String,
    /// User-submitted transaction hashes consumed by confirmation steps
    pub transactions: HashMap<ActionKind, H256>,
}

impl OperationParams {
    /// Check the amount is a plain decimal integer string
    pub fn validate(&self) -> BridgeResult<()> {
        if self.amount.is_empty() || !self.amount.bytes().all(|b| b.is_ascii_digit()) {
            return Err(BridgeError::InvalidAmount(self.amount.clone()));
        }
        Ok(())
    }

    fn pending_tx(&self, kind: ActionKind) -> BridgeResult<H256> {
        self.transactions
            .get(&kind)
            .copied()
            .ok_or(BridgeError::MissingTransaction {
                action: kind.as_str(),
            })
    }
}

/// Builds the fixed action list for one transfer direction
pub type PipelineBuilder = fn(&OperationParams) -> BridgeResult<Vec<Action>>;

/// Strategy table mapping transfer type to pipeline builder
pub struct PipelineRegistry {
    builders: HashMap<TransferType, PipelineBuilder>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// Registry with both stock transfer directions
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(TransferType::LockMint, lock_mint_pipeline);
        registry.register(TransferType::BurnUnlock, burn_unlock_pipeline);
        registry
    }

    pub fn register(&mut self, transfer_type: TransferType, builder: PipelineBuilder) {
        self.builders.insert(transfer_type, builder);
    }

    /// Build the action list for `params`, failing fast on an unregistered
    /// type, a malformed amount, or a missing pending transaction hash
    pub fn build(&self, params: &OperationParams) -> BridgeResult<Vec<Action>> {
        params.validate()?;

        let builder = self
            .builders
            .get(&params.transfer_type)
            .ok_or_else(|| BridgeError::UnknownTransferType(params.transfer_type.to_string()))?;

        let actions = builder(params)?;
        if actions.is_empty() {
            return Err(BridgeError::Internal(format!(
                "{} builder produced an empty pipeline",
                params.transfer_type
            )));
        }
        Ok(actions)
    }
}

impl Default for PipelineRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Lock on source, mint on destination
///
/// The extra block-wait step gives the source chain a finality margin before
/// the wrapped asset is minted.
fn lock_mint_pipeline(params: &OperationParams) -> BridgeResult<Vec<Action>> {
    Ok(vec![
        Action::awaiting(
            ActionKind::ApproveManager,
            ChainSide::Source,
            params.pending_tx(ActionKind::ApproveManager)?,
        ),
        Action::awaiting(
            ActionKind::LockToken,
            ChainSide::Source,
            params.pending_tx(ActionKind::LockToken)?,
        ),
        Action::immediate(ActionKind::WaitForBlock, ChainSide::Source),
        Action::immediate(ActionKind::MintToken, ChainSide::Destination),
    ])
}

/// Burn on destination, unlock on source
///
/// No block-wait step in this direction; the asymmetry is carried over from
/// the deployed pipelines.
fn burn_unlock_pipeline(params: &OperationParams) -> BridgeResult<Vec<Action>> {
    Ok(vec![
        Action::awaiting(
            ActionKind::ApproveManager,
            ChainSide::Destination,
            params.pending_tx(ActionKind::ApproveManager)?,
        ),
        Action::awaiting(
            ActionKind::BurnToken,
            ChainSide::Destination,
            params.pending_tx(ActionKind::BurnToken)?,
        ),
        Action::immediate(ActionKind::UnlockToken, ChainSide::Source),
    ])
}
