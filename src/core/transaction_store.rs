//! Transaction log
//!
//! This module provides the `TransactionStore` struct, the append-only audit
//! log of every transaction attempt the engine created, successful or not.
//! It also allocates transaction identities.
//!
//! # Identity
//!
//! Transaction ids have the form `TXN_<epochMillis>_<counter>`. The counter
//! is process-wide and monotonic; after a restart it resumes past the
//! highest counter found in the loaded log, so ids stay unique across runs.
//!
//! # Thread Safety
//!
//! The log uses `DashMap` for storage and an atomic counter for ids, so it
//! can be read from any thread. Appends happen under the ledger's
//! account-mutation lock.

use crate::types::{Transaction, TransactionId};
use dashmap::DashMap;
use std::cmp::Reverse;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe transaction log
#[derive(Debug, Default)]
pub struct TransactionStore {
    /// Transactions by id
    transactions: DashMap<TransactionId, Transaction>,

    /// Last issued id counter
    counter: AtomicU64,
}

impl TransactionStore {
    /// Create an empty transaction log
    pub fn new() -> Self {
        Self {
            transactions: DashMap::new(),
            counter: AtomicU64::new(0),
        }
    }

    /// Allocate a fresh transaction id stamped with `now_millis`
    pub fn next_id(&self, now_millis: i64) -> TransactionId {
        let counter = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("TXN_{}_{}", now_millis, counter)
    }

    /// Append a transaction to the log
    ///
    /// If a transaction with the same id already exists it is kept and the
    /// new one is ignored.
    pub fn record(&self, transaction: Transaction) {
        self.transactions
            .entry(transaction.transaction_id.clone())
            .or_insert(transaction);
    }

    /// Get a copy of a transaction by id
    pub fn get(&self, transaction_id: &str) -> Option<Transaction> {
        self.transactions
            .get(transaction_id)
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// All transactions where the user is sender or receiver, newest first
    ///
    /// Transactions created in the same millisecond are ordered by their id
    /// counter, newest first.
    pub fn for_user(&self, user_id: &str) -> Vec<Transaction> {
        let mut list: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|entry| entry.value().involves(user_id))
            .map(|entry| entry.value().clone())
            .collect();
        list.sort_by_key(|txn| Reverse((txn.created_at, id_counter(&txn.transaction_id))));
        list
    }

    /// All transactions ordered by creation, oldest first
    pub fn all(&self) -> Vec<Transaction> {
        let mut list: Vec<Transaction> = self
            .transactions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        list.sort_by_key(|txn| (txn.created_at, id_counter(&txn.transaction_id)));
        list
    }

    /// Load a persisted log and resume the id counter past it
    pub fn restore(&self, transactions: Vec<Transaction>) {
        for txn in transactions {
            let counter = id_counter(&txn.transaction_id);
            self.counter.fetch_max(counter, Ordering::SeqCst);
            self.record(txn);
        }
    }
}

/// Counter part of a `<PREFIX>_<millis>_<counter>` id, 0 if malformed
pub(crate) fn id_counter(id: &str) -> u64 {
    id.rsplit('_')
        .next()
        .and_then(|part| part.parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Account, TransactionType};
    use rust_decimal::Decimal;

    fn account(id: &str) -> Account {
        Account::new(id.to_string(), id.to_lowercase(), String::new(), Decimal::ZERO, 0)
    }

    fn txn(store: &TransactionStore, now: i64, sender: &str, receiver: Option<&str>) -> Transaction {
        let sender = account(sender);
        let receiver = receiver.map(account);
        let tx_type = if receiver.is_some() {
            TransactionType::Transfer
        } else {
            TransactionType::AddMoney
        };
        Transaction::new(
            store.next_id(now),
            tx_type,
            &sender,
            receiver.as_ref(),
            Decimal::ONE,
            now,
        )
        .unwrap()
    }

    #[test]
    fn test_next_id_format_and_monotonic_counter() {
        let store = TransactionStore::new();
        assert_eq!(store.next_id(1_000), "TXN_1000_1");
        assert_eq!(store.next_id(1_000), "TXN_1000_2");
        assert_eq!(store.next_id(2_000), "TXN_2000_3");
    }

    #[test]
    fn test_record_keeps_first_occurrence() {
        let store = TransactionStore::new();
        let first = txn(&store, 1, "A", None);
        let mut duplicate = first.clone();
        duplicate.created_at = 99;

        store.record(first.clone());
        store.record(duplicate);

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&first.transaction_id), Some(first));
    }

    #[test]
    fn test_for_user_newest_first_and_filters() {
        let store = TransactionStore::new();
        let t1 = txn(&store, 10, "A", None);
        let t2 = txn(&store, 20, "B", Some("A"));
        let t3 = txn(&store, 20, "A", Some("B"));
        let t4 = txn(&store, 30, "C", None);
        for t in [&t1, &t2, &t3, &t4] {
            store.record(t.clone());
        }

        let ids: Vec<String> = store
            .for_user("A")
            .into_iter()
            .map(|t| t.transaction_id)
            .collect();
        assert_eq!(ids, vec![t3.transaction_id, t2.transaction_id, t1.transaction_id]);
    }

    #[test]
    fn test_restore_resumes_counter() {
        let source = TransactionStore::new();
        let loaded = vec![txn(&source, 5, "A", None), txn(&source, 6, "A", None)];

        let store = TransactionStore::new();
        store.restore(loaded);

        assert_eq!(store.len(), 2);
        assert_eq!(store.next_id(7), "TXN_7_3");
    }

    #[test]
    fn test_id_counter_parsing() {
        assert_eq!(id_counter("TXN_1700_42"), 42);
        assert_eq!(id_counter("USR_1_7"), 7);
        assert_eq!(id_counter("garbage"), 0);
    }
}
