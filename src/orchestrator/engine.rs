//! Engine tying the registry, adapters, and store together

use super::context::PipelineEnv;
use super::operation::Operation;
use super::pipeline::{OperationParams, PipelineRegistry};
use crate::error::BridgeResult;
use crate::orchestrator::action::Status;
use crate::store::OperationStore;

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Creates operations and drives their pipelines
///
/// Construction and execution are separate: `create` builds and stores an
/// operation in WAITING state, `start` schedules its pipeline on a tokio
/// task. Callers that need deterministic scheduling (or a final status) can
/// await the returned join handle or call [`Operation::run`] themselves.
pub struct OrchestratorEngine {
    registry: PipelineRegistry,
    env: PipelineEnv,
    store: Arc<OperationStore>,
}

impl OrchestratorEngine {
    /// Engine with the stock transfer directions registered
    pub fn new(env: PipelineEnv, store: Arc<OperationStore>) -> Self {
        Self::with_registry(PipelineRegistry::standard(), env, store)
    }

    pub fn with_registry(
        registry: PipelineRegistry,
        env: PipelineEnv,
        store: Arc<OperationStore>,
    ) -> Self {
        Self {
            registry,
            env,
            store,
        }
    }

    /// Build and store a new operation
    ///
    /// Fails fast on an unregistered transfer type, malformed amount, or a
    /// missing pending transaction hash; no operation is produced in an
    /// invalid state.
    pub fn create(&self, params: &OperationParams) -> BridgeResult<Arc<Operation>> {
        let actions = self.registry.build(params)?;
        let operation = Arc::new(Operation::new(params, actions));
        self.store.insert(operation.clone());

        info!(
            "Created operation {} ({}, amount {})",
            operation.id(),
            operation.transfer_type(),
            operation.amount()
        );
        crate::metrics::record_operation_created(params.transfer_type.as_str());

        Ok(operation)
    }

    /// Schedule an operation's pipeline on a background task
    pub fn start(&self, operation: Arc<Operation>) -> JoinHandle<Status> {
        let env = self.env.clone();
        tokio::spawn(async move { operation.run(&env).await })
    }

    /// Create an operation and immediately schedule it
    pub fn create_and_start(&self, params: &OperationParams) -> BridgeResult<Arc<Operation>> {
        let operation = self.create(params)?;
        self.start(operation.clone());
        Ok(operation)
    }

    pub fn store(&self) -> &Arc<OperationStore> {
        &self.store
    }
}
