//! In-memory operation store
//!
//! Operations live for the lifetime of the process; durable persistence is a
//! collaborator's responsibility and stays outside this service.

use crate::orchestrator::{Operation, OperationSnapshot, Status};

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Keeps every operation created by this process, indexed by id
pub struct OperationStore {
    operations: DashMap<Uuid, Arc<Operation>>,
}

impl OperationStore {
    pub fn new() -> Self {
        Self {
            operations: DashMap::new(),
        }
    }

    pub fn insert(&self, operation: Arc<Operation>) {
        self.operations.insert(operation.id(), operation);
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<Operation>> {
        self.operations.get(id).map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Snapshot every stored operation, newest first
    pub async fn snapshots(&self) -> Vec<OperationSnapshot> {
        let operations: Vec<Arc<Operation>> = self
            .operations
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut snapshots = Vec::with_capacity(operations.len());
        for operation in operations {
            snapshots.push(operation.snapshot().await);
        }
        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        snapshots
    }

    /// Count operations by status
    pub async fn stats(&self) -> OperationStats {
        let operations: Vec<Arc<Operation>> = self
            .operations
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut stats = OperationStats::default();
        for operation in operations {
            match operation.status().await {
                Status::Waiting => stats.waiting += 1,
                Status::InProgress => stats.in_progress += 1,
                Status::Success => stats.success += 1,
                Status::Error => stats.error += 1,
            }
        }
        stats
    }
}

impl Default for OperationStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Operation counts by status
#[derive(Debug, Clone, Default, Serialize)]
pub struct OperationStats {
    pub waiting: u64,
    pub in_progress: u64,
    pub success: u64,
    pub error: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{ActionKind, OperationParams, PipelineRegistry, TransferType};

    use ethers::types::{Address, H256};
    use std::collections::HashMap;

    fn sample_operation() -> Arc<Operation> {
        let params = OperationParams {
            transfer_type: TransferType::BurnUnlock,
            source_address: Address::repeat_byte(0x01),
            destination_address: Address::repeat_byte(0x02),
            amount: "7".to_string(),
            transactions: HashMap::from([
                (ActionKind::ApproveManager, H256::repeat_byte(0xb1)),
                (ActionKind::BurnToken, H256::repeat_byte(0xb2)),
            ]),
        };
        let actions = PipelineRegistry::standard().build(&params).unwrap();
        Arc::new(Operation::new(&params, actions))
    }

    #[tokio::test]
    async fn stores_and_counts_operations() {
        let store = OperationStore::new();
        assert!(store.is_empty());

        let operation = sample_operation();
        store.insert(operation.clone());

        assert_eq!(store.len(), 1);
        assert!(store.get(&operation.id()).is_some());

        let stats = store.stats().await;
        assert_eq!(stats.waiting, 1);
        assert_eq!(stats.success, 0);

        let snapshots = store.snapshots().await;
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].id, operation.id());
    }
}
