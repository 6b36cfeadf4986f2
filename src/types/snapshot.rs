//! Persisted ledger snapshot schema
//!
//! The snapshot is an explicit, versioned record of everything the ledger
//! must survive a restart with: accounts, the username index, the
//! transaction log and the offline replays already applied. Fraud histories
//! and offline admission records are volatile and are not part of it.
//!
//! # Versions
//!
//! - 1: accounts, username index, transaction log
//! - 2: adds `offlineReplays`; a version 1 snapshot loads with none

use super::account::{Account, UserId};
use super::offline::OfflineReplay;
use super::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current snapshot schema version
pub const SNAPSHOT_VERSION: u32 = 2;

/// Full persisted state of the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    /// Schema version the snapshot was written with
    pub version: u32,

    /// Accounts ordered by user id
    pub accounts: Vec<Account>,

    /// Username → user id
    pub username_index: BTreeMap<String, UserId>,

    /// Transaction log ordered by transaction id
    pub transactions: Vec<Transaction>,

    /// Replayed offline transactions ordered by user, then client id
    #[serde(default)]
    pub offline_replays: Vec<OfflineReplay>,
}

impl LedgerSnapshot {
    /// Snapshot at the current schema version
    pub fn new(
        accounts: Vec<Account>,
        username_index: BTreeMap<String, UserId>,
        transactions: Vec<Transaction>,
        offline_replays: Vec<OfflineReplay>,
    ) -> Self {
        LedgerSnapshot {
            version: SNAPSHOT_VERSION,
            accounts,
            username_index,
            transactions,
            offline_replays,
        }
    }

    /// An empty snapshot at the current schema version
    pub fn empty() -> Self {
        Self::new(Vec::new(), BTreeMap::new(), Vec::new(), Vec::new())
    }
}
