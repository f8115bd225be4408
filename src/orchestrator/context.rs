//! Explicit cross-step data flow for pipeline execution

use crate::adapter::{ChainAdapter, ChainSide, Receipt};
use crate::config::Settings;
use crate::error::BridgeResult;

use ethers::types::Address;
use std::sync::Arc;

/// Data threaded between the steps of one pipeline run
///
/// Earlier steps deposit their confirmed receipts here; later steps read
/// them. The context is owned by the runner and passed by `&mut`, so step
/// dependencies are visible in one place instead of being captured inside
/// per-step closures.
#[derive(Debug, Default)]
pub struct PipelineContext {
    /// Confirmed receipt of the user's manager approval
    pub approval_receipt: Option<Receipt>,
    /// Confirmed receipt of the user's lock/burn transaction
    pub transfer_receipt: Option<Receipt>,
}

/// Source and destination adapters for one bridge deployment
#[derive(Clone)]
pub struct AdapterPair {
    pub source: Arc<dyn ChainAdapter>,
    pub destination: Arc<dyn ChainAdapter>,
}

impl AdapterPair {
    pub fn side(&self, side: ChainSide) -> &Arc<dyn ChainAdapter> {
        match side {
            ChainSide::Source => &self.source,
            ChainSide::Destination => &self.destination,
        }
    }
}

/// Manager contract addresses, one per chain
///
/// Passed into the core explicitly; the orchestrator never reads ambient
/// process state for validation inputs.
#[derive(Debug, Clone, Copy)]
pub struct ManagerAddresses {
    pub source: Address,
    pub destination: Address,
}

/// Everything a pipeline run needs besides the operation itself
#[derive(Clone)]
pub struct PipelineEnv {
    pub adapters: AdapterPair,
    pub managers: ManagerAddresses,
    /// Finality margin applied by the block-wait step on the source chain
    pub confirmation_blocks: u64,
}

impl PipelineEnv {
    /// Assemble the environment from parsed settings and wired adapters
    pub fn from_settings(settings: &Settings, adapters: AdapterPair) -> BridgeResult<Self> {
        Ok(Self {
            adapters,
            managers: ManagerAddresses {
                source: settings.source.manager_address()?,
                destination: settings.destination.manager_address()?,
            },
            confirmation_blocks: settings.source.confirmation_blocks,
        })
    }
}
