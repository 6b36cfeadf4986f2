//! Batch processing with user-based partitioning
//!
//! This module provides the `BatchProcessor` struct, which replays a batch
//! of operations against a shared [`Wallet`]. Wallet calls block on the
//! ledger lock, so each user's partition runs on tokio's blocking pool.
//!
//! # Ordering
//!
//! Registrations in a batch are applied first, sequentially and in file
//! order, so later operations in the same batch can see the new users. The
//! remaining operations are partitioned by acting user: one user's
//! operations run sequentially in file order, while different users run
//! concurrently with no ordering between them.
//!
//! # Thread Safety
//!
//! The processor is cloneable and shares the wallet through an `Arc`. All
//! balance changes still serialize on the ledger's account-mutation lock.

use crate::core::wallet::Wallet;
use crate::types::{OperationRecord, WalletError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, warn};

/// Result of replaying a single operation
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub record: OperationRecord,
    pub result: Result<(), WalletError>,
}

/// Batch processor with user-based partitioning
#[derive(Clone)]
pub struct BatchProcessor {
    wallet: Arc<Wallet>,
}

impl BatchProcessor {
    pub fn new(wallet: Arc<Wallet>) -> Self {
        Self { wallet }
    }

    /// Split a batch into registrations and per-user partitions
    ///
    /// Every record lands in exactly one place and keeps its relative order.
    pub fn partition_by_user(
        &self,
        batch: Vec<OperationRecord>,
    ) -> (Vec<OperationRecord>, HashMap<String, Vec<OperationRecord>>) {
        let mut registrations = Vec::new();
        let mut user_batches: HashMap<String, Vec<OperationRecord>> = HashMap::new();

        for record in batch {
            if record.operation.is_registration() {
                registrations.push(record);
            } else {
                user_batches
                    .entry(record.operation.actor().to_string())
                    .or_default()
                    .push(record);
            }
        }

        (registrations, user_batches)
    }

    /// Apply records one after another, logging failures
    pub fn process_sequential(&self, records: Vec<OperationRecord>) -> Vec<ProcessingResult> {
        records
            .into_iter()
            .map(|record| {
                let result = self.wallet.apply(&record.operation);
                if let Err(e) = &result {
                    warn!(line = record.line, error = %e, "operation failed");
                }
                ProcessingResult { record, result }
            })
            .collect()
    }

    /// Replay a batch: registrations first, then users in parallel
    ///
    /// Results of different users may come back in any order.
    pub async fn process_batch(&self, batch: Vec<OperationRecord>) -> Vec<ProcessingResult> {
        let (registrations, user_batches) = self.partition_by_user(batch);

        let mut results = self.process_sequential(registrations);

        let mut tasks = Vec::with_capacity(user_batches.len());
        for (_user, records) in user_batches {
            let processor = self.clone();
            tasks.push(tokio::task::spawn_blocking(move || {
                processor.process_sequential(records)
            }));
        }

        for task in tasks {
            match task.await {
                Ok(user_results) => results.extend(user_results),
                Err(e) => error!(error = %e, "operation task panicked"),
            }
        }

        results
    }
}
