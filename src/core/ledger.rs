//! Account ledger
//!
//! This module provides the `AccountLedger`, which owns every account, the
//! username index and the transaction log, and persists them as one
//! snapshot.
//!
//! # Account-Mutation Lock
//!
//! All account state sits behind a single ledger-wide mutex. Every balance
//! change runs its whole check-then-mutate sequence inside [`AccountLedger::commit`],
//! so no reader or writer can observe a transfer half applied. Reads through
//! [`UserDirectory`] take the same lock and return copies.
//!
//! # Persistence
//!
//! The ledger writes a full [`LedgerSnapshot`] through the injected
//! [`SnapshotStore`] while the lock is still held. Persistence is
//! best-effort: a failed save is logged and the in-memory commit stands.
//!
//! # Offline Replays
//!
//! Every replayed offline transaction is recorded in the same commit as its
//! balance change and is part of the snapshot. The record lives as long as
//! the transaction it produced, since the transaction log is never pruned.
//! It lets the sync engine recognise a resubmitted batch across restarts.

use crate::core::traits::{SnapshotStore, UserDirectory};
use crate::core::transaction_store::{id_counter, TransactionStore};
use crate::types::{Account, LedgerSnapshot, OfflineReplay, UserId, WalletError, SNAPSHOT_VERSION};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

/// Accounts, username index and offline replays, only reachable under the
/// ledger lock
#[derive(Debug, Default)]
pub struct LedgerState {
    accounts: HashMap<UserId, Account>,
    username_index: HashMap<String, UserId>,
    offline_replays: HashMap<UserId, HashMap<String, OfflineReplay>>,
}

impl LedgerState {
    pub fn account(&self, user_id: &str) -> Option<&Account> {
        self.accounts.get(user_id)
    }

    pub fn user_id_for(&self, username: &str) -> Option<&UserId> {
        self.username_index.get(username)
    }

    pub fn contains_username(&self, username: &str) -> bool {
        self.username_index.contains_key(username)
    }

    /// Add a newly registered account
    ///
    /// # Errors
    ///
    /// Returns `UsernameTaken` if the username is already registered.
    pub fn insert(&mut self, account: Account) -> Result<(), WalletError> {
        if self.username_index.contains_key(&account.username) {
            return Err(WalletError::UsernameTaken {
                username: account.username,
            });
        }
        self.username_index
            .insert(account.username.clone(), account.user_id.clone());
        self.accounts.insert(account.user_id.clone(), account);
        Ok(())
    }

    /// Apply a change to one account, all or nothing
    ///
    /// The closure works on a copy; the copy replaces the stored account
    /// only if the closure succeeds.
    pub fn update<F, R>(&mut self, user_id: &str, f: F) -> Result<R, WalletError>
    where
        F: FnOnce(&mut Account) -> Result<R, WalletError>,
    {
        let mut account = self
            .accounts
            .get(user_id)
            .cloned()
            .ok_or_else(|| WalletError::user_not_found(user_id))?;
        let result = f(&mut account)?;
        self.accounts.insert(account.user_id.clone(), account);
        Ok(result)
    }

    /// Apply a change to two distinct accounts, all or nothing
    pub fn update_pair<F, R>(&mut self, first: &str, second: &str, f: F) -> Result<R, WalletError>
    where
        F: FnOnce(&mut Account, &mut Account) -> Result<R, WalletError>,
    {
        if first == second {
            return Err(WalletError::SelfTransfer);
        }
        let mut a = self
            .accounts
            .get(first)
            .cloned()
            .ok_or_else(|| WalletError::user_not_found(first))?;
        let mut b = self
            .accounts
            .get(second)
            .cloned()
            .ok_or_else(|| WalletError::user_not_found(second))?;
        let result = f(&mut a, &mut b)?;
        self.accounts.insert(a.user_id.clone(), a);
        self.accounts.insert(b.user_id.clone(), b);
        Ok(result)
    }

    /// Replay record of the user's offline transaction `client_transaction_id`
    pub fn offline_replay(&self, user_id: &str, client_transaction_id: &str) -> Option<&OfflineReplay> {
        self.offline_replays
            .get(user_id)
            .and_then(|replays| replays.get(client_transaction_id))
    }

    /// Remember a replayed offline transaction, replacing any earlier record
    /// with the same user and client id
    pub fn record_offline_replay(&mut self, replay: OfflineReplay) {
        self.offline_replays
            .entry(replay.user_id.clone())
            .or_default()
            .insert(replay.client_transaction_id().to_string(), replay);
    }

    fn sorted_offline_replays(&self) -> Vec<OfflineReplay> {
        let mut replays: Vec<OfflineReplay> = self
            .offline_replays
            .values()
            .flat_map(|replays| replays.values().cloned())
            .collect();
        replays.sort_by(|a, b| {
            a.user_id
                .cmp(&b.user_id)
                .then_with(|| a.client_transaction_id().cmp(b.client_transaction_id()))
        });
        replays
    }

    fn sorted_accounts(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        accounts
    }
}

/// Ledger-wide account state with its transaction log and snapshot store
pub struct AccountLedger {
    state: Mutex<LedgerState>,
    transactions: TransactionStore,
    store: Arc<dyn SnapshotStore>,
}

impl AccountLedger {
    /// Create an empty ledger backed by `store`
    ///
    /// Nothing is loaded; use [`AccountLedger::open`] to resume from a snapshot.
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        AccountLedger {
            state: Mutex::new(LedgerState::default()),
            transactions: TransactionStore::new(),
            store,
        }
    }

    /// Create a ledger and load the stored snapshot, if any
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the stored snapshot cannot be read or was
    /// written by a newer schema version.
    pub fn open(store: Arc<dyn SnapshotStore>) -> Result<Self, WalletError> {
        let ledger = Self::new(store);
        if let Some(snapshot) = ledger.store.load()? {
            ledger.restore(snapshot)?;
        }
        Ok(ledger)
    }

    fn restore(&self, snapshot: LedgerSnapshot) -> Result<(), WalletError> {
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(WalletError::persistence(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }

        let mut state = self.state.lock();
        let account_count = snapshot.accounts.len();
        for account in snapshot.accounts {
            state.accounts.insert(account.user_id.clone(), account);
        }
        state.username_index.extend(snapshot.username_index);
        let replay_count = snapshot.offline_replays.len();
        for replay in snapshot.offline_replays {
            state.record_offline_replay(replay);
        }
        let transaction_count = snapshot.transactions.len();
        self.transactions.restore(snapshot.transactions);

        info!(
            version = snapshot.version,
            accounts = account_count,
            transactions = transaction_count,
            offline_replays = replay_count,
            "ledger snapshot loaded"
        );
        Ok(())
    }

    /// Run `f` while holding the account-mutation lock
    ///
    /// This is the only way to change balances. The closure also receives
    /// the transaction log so it can append the transaction it commits.
    pub fn commit<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut LedgerState, &TransactionStore) -> R,
    {
        let mut state = self.state.lock();
        f(&mut state, &self.transactions)
    }

    /// Save a snapshot of `state` and the transaction log
    ///
    /// Meant to be called from inside [`AccountLedger::commit`]. Failures are
    /// logged and swallowed.
    pub fn persist(&self, state: &LedgerState) {
        let snapshot = self.snapshot_of(state);
        if let Err(e) = self.store.save(&snapshot) {
            warn!(error = %e, "failed to persist ledger snapshot");
        }
    }

    /// Current snapshot of the whole ledger
    pub fn snapshot(&self) -> LedgerSnapshot {
        let state = self.state.lock();
        self.snapshot_of(&state)
    }

    fn snapshot_of(&self, state: &LedgerState) -> LedgerSnapshot {
        let username_index: BTreeMap<String, UserId> = state
            .username_index
            .iter()
            .map(|(name, id)| (name.clone(), id.clone()))
            .collect();
        LedgerSnapshot::new(
            state.sorted_accounts(),
            username_index,
            self.transactions.all(),
            state.sorted_offline_replays(),
        )
    }

    pub fn transactions(&self) -> &TransactionStore {
        &self.transactions
    }

    /// Copies of all accounts, ordered by user id
    pub fn accounts(&self) -> Vec<Account> {
        self.state.lock().sorted_accounts()
    }

    /// Copy of the replay record for the user's offline transaction
    pub fn offline_replay(&self, user_id: &str, client_transaction_id: &str) -> Option<OfflineReplay> {
        self.state
            .lock()
            .offline_replay(user_id, client_transaction_id)
            .cloned()
    }

    /// Highest user-id counter currently registered
    pub fn max_user_counter(&self) -> u64 {
        self.state
            .lock()
            .accounts
            .keys()
            .map(|id| id_counter(id))
            .max()
            .unwrap_or(0)
    }
}

impl UserDirectory for AccountLedger {
    fn get_user(&self, user_id: &str) -> Option<Account> {
        self.state.lock().account(user_id).cloned()
    }

    fn get_user_by_username(&self, username: &str) -> Option<Account> {
        let state = self.state.lock();
        state
            .user_id_for(username)
            .and_then(|id| state.account(id))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::snapshot_store::MemoryStore;
    use crate::types::{OfflineTransaction, SyncedTransaction};
    use rust_decimal::Decimal;

    fn account(id: &str, name: &str, bank: i64) -> Account {
        Account::new(id.to_string(), name.to_string(), String::new(), Decimal::from(bank), 0)
    }

    fn ledger() -> AccountLedger {
        AccountLedger::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_insert_and_lookup() {
        let ledger = ledger();
        ledger
            .commit(|state, _| state.insert(account("USR_1_1", "alice", 100)))
            .unwrap();

        assert_eq!(ledger.get_user("USR_1_1").unwrap().username, "alice");
        assert_eq!(ledger.get_user_by_username("alice").unwrap().user_id, "USR_1_1");
        assert!(ledger.get_user("USR_9_9").is_none());
        assert!(ledger.get_user_by_username("bob").is_none());
    }

    #[test]
    fn test_insert_duplicate_username_rejected() {
        let ledger = ledger();
        ledger
            .commit(|state, _| state.insert(account("USR_1_1", "alice", 100)))
            .unwrap();
        let result = ledger.commit(|state, _| state.insert(account("USR_1_2", "alice", 100)));

        assert!(matches!(result, Err(WalletError::UsernameTaken { .. })));
        assert_eq!(ledger.accounts().len(), 1);
    }

    #[test]
    fn test_update_is_all_or_nothing() {
        let ledger = ledger();
        ledger
            .commit(|state, _| state.insert(account("USR_1_1", "alice", 100)))
            .unwrap();

        let result = ledger.commit(|state, _| {
            state.update("USR_1_1", |acc| {
                acc.debit_bank(Decimal::from(60))?;
                acc.credit_wallet(Decimal::from(60))?;
                acc.debit_bank(Decimal::from(60))
            })
        });

        assert!(result.is_err());
        let alice = ledger.get_user("USR_1_1").unwrap();
        assert_eq!(alice.bank_balance(), Decimal::from(100));
        assert_eq!(alice.wallet_balance(), Decimal::ZERO);
    }

    #[test]
    fn test_update_pair_rejects_same_account() {
        let ledger = ledger();
        ledger
            .commit(|state, _| state.insert(account("USR_1_1", "alice", 100)))
            .unwrap();
        let result = ledger.commit(|state, _| state.update_pair("USR_1_1", "USR_1_1", |_, _| Ok(())));
        assert_eq!(result, Err(WalletError::SelfTransfer));
    }

    #[test]
    fn test_persist_and_reopen() {
        let store = Arc::new(MemoryStore::new());
        let ledger = AccountLedger::new(store.clone());
        ledger.commit(|state, _| {
            state.insert(account("USR_1_4", "alice", 100)).unwrap();
            ledger.persist(state);
        });

        let reopened = AccountLedger::open(store).unwrap();
        assert_eq!(reopened.get_user_by_username("alice").unwrap().user_id, "USR_1_4");
        assert_eq!(reopened.max_user_counter(), 4);
    }

    #[test]
    fn test_open_rejects_newer_snapshot_version() {
        let store = Arc::new(MemoryStore::new());
        let mut snapshot = LedgerSnapshot::empty();
        snapshot.version = SNAPSHOT_VERSION + 1;
        store.save(&snapshot).unwrap();

        assert!(matches!(
            AccountLedger::open(store),
            Err(WalletError::Persistence { .. })
        ));
    }

    #[test]
    fn test_offline_replays_survive_reopen() {
        let store = Arc::new(MemoryStore::new());
        let ledger = AccountLedger::new(store.clone());
        let offline = OfflineTransaction::signed_transfer("C1", "USR_1_2", Decimal::from(100), 1);
        let replay = OfflineReplay::new(
            "USR_1_1",
            &offline,
            SyncedTransaction::of(&offline, "TXN_1_1", Decimal::from(900)),
        );
        ledger.commit(|state, _| {
            state.record_offline_replay(replay.clone());
            ledger.persist(state);
        });

        let saved = store.last_saved().unwrap();
        assert_eq!(saved.version, SNAPSHOT_VERSION);
        assert_eq!(saved.offline_replays, vec![replay.clone()]);

        let reopened = AccountLedger::open(store).unwrap();
        assert_eq!(reopened.offline_replay("USR_1_1", "C1"), Some(replay));
        assert!(reopened.offline_replay("USR_1_2", "C1").is_none());
    }
}
