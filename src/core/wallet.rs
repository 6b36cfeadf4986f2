//! Wallet service facade
//!
//! `Wallet` wires the ledger, the online and offline fraud detectors,
//! offline admission control, the transaction engine and the sync engine
//! together, and is the single entry point callers use.
//!
//! # Lifecycle
//!
//! [`WalletBuilder::build`] loads the stored snapshot once, then every
//! component is created around the loaded ledger. Fraud histories, offline
//! admission records and sessions are process-lifetime state and start empty.
//!
//! # Offline Activity
//!
//! Admitting an offline transaction records an `OFFLINE_TRANSACTION`
//! activity. An online withdrawal by a user who still has unsynced offline
//! transactions records an `ONLINE_WITHDRAW_AFTER_OFFLINE` activity. Both
//! feed the offline fraud detector's pattern rule.

use crate::core::clock::SystemClock;
use crate::core::engine::TransactionEngine;
use crate::core::fraud_detector::FraudDetector;
use crate::core::ledger::AccountLedger;
use crate::core::offline_fraud_detector::OfflineFraudDetector;
use crate::core::offline_limits::OfflineTransactionManager;
use crate::core::security::Sha256Security;
use crate::core::sync_engine::OfflineSyncEngine;
use crate::core::traits::{Clock, SecurityProvider, SnapshotStore, UserDirectory};
use crate::core::user_manager::{Session, UserManager};
use crate::io::snapshot_store::MemoryStore;
use crate::types::{
    Account, OfflineActivityType, OfflineTransaction, Operation, SyncResult, Transaction,
    TransactionReceipt, UserId, WalletError,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Wallet and bank balance of one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub wallet_balance: Decimal,
    pub bank_balance: Decimal,
}

/// Injected collaborators of a [`Wallet`]
#[derive(Clone)]
pub struct WalletConfig {
    pub clock: Arc<dyn Clock>,
    pub store: Arc<dyn SnapshotStore>,
    /// Defaults to [`Sha256Security`] on the configured clock
    pub security: Option<Arc<dyn SecurityProvider>>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        WalletConfig {
            clock: Arc::new(SystemClock),
            store: Arc::new(MemoryStore::new()),
            security: None,
        }
    }
}

/// Builder for [`Wallet`]
#[derive(Default)]
pub struct WalletBuilder {
    config: WalletConfig,
}

impl WalletBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.config.clock = clock;
        self
    }

    pub fn store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.config.store = store;
        self
    }

    pub fn security(mut self, security: Arc<dyn SecurityProvider>) -> Self {
        self.config.security = Some(security);
        self
    }

    /// Load the stored snapshot and assemble the wallet
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the snapshot exists but cannot be loaded.
    pub fn build(self) -> Result<Wallet, WalletError> {
        Wallet::with_config(self.config)
    }
}

/// Digital wallet service
pub struct Wallet {
    ledger: Arc<AccountLedger>,
    users: UserManager,
    engine: Arc<TransactionEngine>,
    offline_limits: Arc<OfflineTransactionManager>,
    offline_fraud: Arc<OfflineFraudDetector>,
    sync: OfflineSyncEngine,
}

impl Wallet {
    pub fn builder() -> WalletBuilder {
        WalletBuilder::default()
    }

    /// Assemble a wallet from explicit collaborators
    pub fn with_config(config: WalletConfig) -> Result<Self, WalletError> {
        let clock = config.clock;
        let security: Arc<dyn SecurityProvider> = match config.security {
            Some(security) => security,
            None => Arc::new(Sha256Security::new(clock.clone())),
        };

        let ledger = Arc::new(AccountLedger::open(config.store)?);
        let fraud = Arc::new(FraudDetector::new(clock.clone()));
        let engine = Arc::new(TransactionEngine::new(ledger.clone(), fraud, clock.clone()));
        let offline_limits = Arc::new(OfflineTransactionManager::new(clock.clone()));
        let offline_fraud = Arc::new(OfflineFraudDetector::new(clock.clone()));
        let sync = OfflineSyncEngine::new(
            engine.clone(),
            ledger.clone(),
            offline_limits.clone(),
            offline_fraud.clone(),
        );
        let users = UserManager::new(ledger.clone(), security, clock);

        info!(
            accounts = ledger.accounts().len(),
            transactions = ledger.transactions().len(),
            "wallet started"
        );

        Ok(Wallet {
            ledger,
            users,
            engine,
            offline_limits,
            offline_fraud,
            sync,
        })
    }

    pub fn register(&self, username: &str, pin: &str) -> Result<Account, WalletError> {
        self.users.register(username, pin)
    }

    pub fn register_with_bank_balance(
        &self,
        username: &str,
        pin: &str,
        bank_balance: Decimal,
    ) -> Result<Account, WalletError> {
        self.users.register_with_bank_balance(username, pin, bank_balance)
    }

    pub fn login(&self, username: &str, pin: &str) -> Result<Session, WalletError> {
        self.users.login(username, pin)
    }

    /// Resolve a session token to its user
    pub fn authenticate(&self, token: &str) -> Result<UserId, WalletError> {
        self.users.authenticate(token)
    }

    /// Check `pin` against the user behind `token`
    ///
    /// # Errors
    ///
    /// `Unauthorized` for a bad token, `InvalidCredentials` for a wrong PIN.
    pub fn verify_pin(&self, token: &str, pin: &str) -> Result<(), WalletError> {
        self.users.verify_pin(token, pin)
    }

    pub fn logout(&self, token: &str) {
        self.users.logout(token);
    }

    pub fn add_money(&self, user_id: &str, amount: Decimal) -> Result<TransactionReceipt, WalletError> {
        self.engine.add_money_from_bank(user_id, amount)
    }

    pub fn withdraw(&self, user_id: &str, amount: Decimal) -> Result<TransactionReceipt, WalletError> {
        let receipt = self.engine.withdraw_to_bank(user_id, amount)?;
        if self.offline_limits.unsynced_count(user_id) > 0 {
            self.offline_fraud.record_activity(
                user_id,
                amount,
                OfflineActivityType::OnlineWithdrawAfterOffline,
            );
        }
        Ok(receipt)
    }

    pub fn transfer(
        &self,
        sender_id: &str,
        receiver_id: &str,
        amount: Decimal,
    ) -> Result<TransactionReceipt, WalletError> {
        self.engine.transfer(sender_id, receiver_id, amount)
    }

    /// Transfer to the user registered under `receiver_username`
    pub fn transfer_to_username(
        &self,
        sender_id: &str,
        receiver_username: &str,
        amount: Decimal,
    ) -> Result<TransactionReceipt, WalletError> {
        let receiver = self.resolve_username(receiver_username)?;
        self.engine.transfer(sender_id, &receiver.user_id, amount)
    }

    pub fn balance(&self, user_id: &str) -> Result<Balance, WalletError> {
        let account = self
            .ledger
            .get_user(user_id)
            .ok_or_else(|| WalletError::user_not_found(user_id))?;
        Ok(Balance {
            wallet_balance: account.wallet_balance(),
            bank_balance: account.bank_balance(),
        })
    }

    /// The user's transactions, newest first
    pub fn transactions(&self, user_id: &str) -> Vec<Transaction> {
        self.engine.user_transactions(user_id)
    }

    /// Ask whether the client may queue an offline transaction
    ///
    /// Runs the offline fraud checks, then the offline limits. On success the
    /// transaction is remembered as waiting for sync.
    ///
    /// # Errors
    ///
    /// - `UserNotFound` for an unknown user
    /// - `FraudBlocked` from the offline fraud detector
    /// - `InvalidAmount` or `OfflineLimit` from admission control
    pub fn admit_offline_transaction(
        &self,
        user_id: &str,
        client_transaction_id: &str,
        amount: Decimal,
        shadow_balance: Decimal,
        last_known_backend_balance: Decimal,
    ) -> Result<(), WalletError> {
        if self.ledger.get_user(user_id).is_none() {
            return Err(WalletError::user_not_found(user_id));
        }

        self.offline_fraud
            .check(user_id, amount, shadow_balance, last_known_backend_balance)?;
        self.offline_limits
            .admit(user_id, client_transaction_id, amount, shadow_balance)?;
        self.offline_fraud
            .record_activity(user_id, amount, OfflineActivityType::OfflineTransaction);
        Ok(())
    }

    pub fn sync_offline(&self, user_id: &str, batch: Vec<OfflineTransaction>) -> SyncResult {
        self.sync.sync(user_id, batch)
    }

    /// Lift an offline-mode block and reset the failed-sync count
    pub fn enable_offline_mode(&self, user_id: &str) {
        self.offline_fraud.enable(user_id);
    }

    pub fn is_offline_mode_disabled(&self, user_id: &str) -> bool {
        self.offline_fraud.is_disabled(user_id)
    }

    /// Number of admitted offline transactions not yet synced
    pub fn pending_offline_count(&self, user_id: &str) -> usize {
        self.offline_limits.unsynced_count(user_id)
    }

    /// Purge synced admission records older than `older_than_ms`
    pub fn purge_synced_offline(&self, user_id: &str, older_than_ms: i64) -> usize {
        self.offline_limits.clear_synced(user_id, older_than_ms)
    }

    /// Apply one replayed operation, resolving usernames to users
    pub fn apply(&self, operation: &Operation) -> Result<(), WalletError> {
        match operation {
            Operation::Register {
                username,
                pin,
                bank_balance,
            } => {
                match bank_balance {
                    Some(balance) => self.register_with_bank_balance(username, pin, *balance)?,
                    None => self.register(username, pin)?,
                };
            }
            Operation::AddMoney { username, amount } => {
                let user = self.resolve_username(username)?;
                self.add_money(&user.user_id, *amount)?;
            }
            Operation::Withdraw { username, amount } => {
                let user = self.resolve_username(username)?;
                self.withdraw(&user.user_id, *amount)?;
            }
            Operation::Transfer {
                sender,
                receiver,
                amount,
            } => {
                let sender = self.resolve_username(sender)?;
                self.transfer_to_username(&sender.user_id, receiver, *amount)?;
            }
        }
        Ok(())
    }

    fn resolve_username(&self, username: &str) -> Result<Account, WalletError> {
        self.ledger
            .get_user_by_username(username)
            .ok_or_else(|| WalletError::user_not_found(username))
    }

    pub fn get_user_by_username(&self, username: &str) -> Option<Account> {
        self.ledger.get_user_by_username(username)
    }

    /// Copies of all accounts, ordered by user id
    pub fn accounts(&self) -> Vec<Account> {
        self.ledger.accounts()
    }
}
