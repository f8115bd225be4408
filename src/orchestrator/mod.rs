//! Orchestration core for cross-chain transfer operations
//!
//! The orchestrator:
//! 1. Builds a fixed action pipeline for each supported transfer direction
//! 2. Executes the pipeline strictly in order, one step at a time
//! 3. Validates decoded approval/transfer logs before any value transfer
//! 4. Settles every operation to exactly one of SUCCESS or ERROR

pub mod action;
pub mod context;
pub mod engine;
pub mod operation;
pub mod pipeline;

pub use action::{Action, ActionKind, ActionSnapshot, FailureCause, Status, StepFailure};
pub use context::{AdapterPair, ManagerAddresses, PipelineContext, PipelineEnv};
pub use engine::OrchestratorEngine;
pub use operation::{Operation, OperationSnapshot};
pub use pipeline::{OperationParams, PipelineRegistry, TransferType};
