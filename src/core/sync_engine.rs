//! Offline sync engine
//!
//! This module provides the `OfflineSyncEngine`, which reconciles a batch of
//! client-submitted offline transactions with the authoritative ledger.
//!
//! # Sync Pass
//!
//! One call is one pass with no retries:
//! 1. An empty batch succeeds immediately; an unknown user fails.
//! 2. The user's sync lock is taken, so two syncs for the same user never
//!    interleave. Syncs for different users run in parallel.
//! 3. The batch is replayed in `clientTimestamp` order. Each item must pass
//!    the integrity check and be a TRANSFER; it is then replayed through the
//!    [`TransactionEngine`] with the full fraud and ledger pipeline.
//! 4. Item failures are collected without aborting the pass. An internal
//!    fault aborts it. The outcome feeds the offline fraud detector's
//!    failed-sync counter.
//!
//! # Replays
//!
//! The ledger keeps a persisted record of every offline transaction it
//! replayed, keyed by sender and `clientTransactionId`. Submitting the same
//! transaction again, even after a restart, does not move money a second
//! time; the original mapping is echoed back as synced. A known client id
//! whose signature differs is a different transaction and fails with
//! "Duplicate client transaction id".

use crate::core::engine::TransactionEngine;
use crate::core::ledger::AccountLedger;
use crate::core::offline_fraud_detector::OfflineFraudDetector;
use crate::core::offline_limits::OfflineTransactionManager;
use crate::core::traits::UserDirectory;
use crate::types::{
    ErrorKind, OfflineTransaction, SyncFailure, SyncResult, SyncedTransaction, TransactionType,
    UserId, WalletError,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

type PassOutcome = Result<(Vec<SyncedTransaction>, Vec<SyncFailure>), WalletError>;

/// Reconciles offline batches against the ledger
pub struct OfflineSyncEngine {
    engine: Arc<TransactionEngine>,
    ledger: Arc<AccountLedger>,
    offline_limits: Arc<OfflineTransactionManager>,
    offline_fraud: Arc<OfflineFraudDetector>,
    locks: DashMap<UserId, Arc<Mutex<()>>>,
}

impl OfflineSyncEngine {
    pub fn new(
        engine: Arc<TransactionEngine>,
        ledger: Arc<AccountLedger>,
        offline_limits: Arc<OfflineTransactionManager>,
        offline_fraud: Arc<OfflineFraudDetector>,
    ) -> Self {
        OfflineSyncEngine {
            engine,
            ledger,
            offline_limits,
            offline_fraud,
            locks: DashMap::new(),
        }
    }

    /// Replay a batch of offline transactions for `user_id`
    ///
    /// Never returns an error: every outcome, including per-item failures,
    /// is reported through the [`SyncResult`].
    pub fn sync(&self, user_id: &str, mut batch: Vec<OfflineTransaction>) -> SyncResult {
        if batch.is_empty() {
            return SyncResult::success("No transactions to sync");
        }

        if self.ledger.get_user(user_id).is_none() {
            return SyncResult::failure(WalletError::user_not_found(user_id).to_string());
        }

        let lock = self.user_lock(user_id);
        let _guard = lock.lock();

        // Stable sort keeps submission order for equal timestamps
        batch.sort_by_key(|txn| txn.client_timestamp);

        let outcome = self.run_pass(user_id, &batch, |txn| self.replay(user_id, txn));
        self.conclude(user_id, outcome)
    }

    /// Whether this client transaction was already replayed for the user
    pub fn is_replayed(&self, user_id: &str, client_transaction_id: &str) -> bool {
        self.ledger
            .offline_replay(user_id, client_transaction_id)
            .is_some()
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// Replay every item in order with `replay`
    ///
    /// Only internal faults abort the pass; everything else becomes a
    /// per-item failure.
    fn run_pass<F>(&self, user_id: &str, batch: &[OfflineTransaction], mut replay: F) -> PassOutcome
    where
        F: FnMut(&OfflineTransaction) -> Result<SyncedTransaction, WalletError>,
    {
        let mut synced = Vec::new();
        let mut failures = Vec::new();

        for txn in batch {
            match replay(txn) {
                Ok(entry) => synced.push(entry),
                Err(e) if e.kind() == ErrorKind::InternalFailure => return Err(e),
                Err(e) => {
                    debug!(
                        user_id,
                        client_transaction_id = %txn.client_transaction_id,
                        reason = %e,
                        "offline transaction not synced"
                    );
                    failures.push(SyncFailure::of(txn, e.to_string()));
                }
            }
        }

        Ok((synced, failures))
    }

    /// Turn a pass outcome into the caller's result and feed the breaker
    fn conclude(&self, user_id: &str, outcome: PassOutcome) -> SyncResult {
        match outcome {
            Ok((synced, failures)) => {
                if failures.is_empty() {
                    self.offline_fraud.record_sync_success(user_id);
                } else {
                    self.offline_fraud.record_sync_failure(user_id);
                }
                info!(
                    user_id,
                    synced = synced.len(),
                    failed = failures.len(),
                    "offline sync finished"
                );
                SyncResult::from_pass(synced, failures)
            }
            Err(e) => {
                warn!(user_id, error = %e, "offline sync aborted");
                self.offline_fraud.record_sync_failure(user_id);
                SyncResult::failure(format!("Sync failed: {}", e))
            }
        }
    }

    fn replay(
        &self,
        user_id: &str,
        txn: &OfflineTransaction,
    ) -> Result<SyncedTransaction, WalletError> {
        if !txn.verify_integrity() {
            warn!(
                user_id,
                client_transaction_id = %txn.client_transaction_id,
                "offline transaction failed integrity check"
            );
            return Err(WalletError::IntegrityFailure {
                client_transaction_id: txn.client_transaction_id.clone(),
            });
        }

        if txn.tx_type != TransactionType::Transfer {
            return Err(WalletError::UnsupportedOfflineType {
                client_transaction_id: txn.client_transaction_id.clone(),
            });
        }

        if let Some(previous) = self.ledger.offline_replay(user_id, &txn.client_transaction_id) {
            if !previous.matches(txn) {
                warn!(
                    user_id,
                    client_transaction_id = %txn.client_transaction_id,
                    "client transaction id reused for a different transaction"
                );
                return Err(WalletError::DuplicateClientTransaction {
                    client_transaction_id: txn.client_transaction_id.clone(),
                });
            }
            debug!(
                user_id,
                client_transaction_id = %txn.client_transaction_id,
                server_transaction_id = %previous.synced.server_transaction_id,
                "offline transaction already synced"
            );
            return Ok(previous.synced);
        }

        let entry = self.engine.replay_offline_transfer(user_id, txn)?;
        self.offline_limits
            .mark_synced(user_id, &txn.client_transaction_id);

        debug!(
            user_id,
            client_transaction_id = %entry.client_transaction_id,
            server_transaction_id = %entry.server_transaction_id,
            "offline transaction synced"
        );
        Ok(entry)
    }
}
