//! Core business logic module
//!
//! This module contains the wallet ledger components:
//! - `traits` - Capabilities injected into the core (directory, storage, security, clock)
//! - `clock` - System and manual clocks
//! - `ledger` - Account state behind the account-mutation lock, plus persistence
//! - `transaction_store` - Append-only transaction log and id allocation
//! - `security` - Default PIN hashing and session tokens
//! - `user_manager` - Registration and login
//! - `fraud_detector` - Online sliding-window fraud checks
//! - `offline_limits` - Offline admission control
//! - `offline_fraud_detector` - Offline fraud checks and circuit breaker
//! - `engine` - Online transaction processing
//! - `sync_engine` - Offline batch reconciliation
//! - `wallet` - Service facade composing all of the above
//! - `batch_processor` - Parallel replay of operation batches

pub mod batch_processor;
pub mod clock;
pub mod engine;
pub mod fraud_detector;
pub mod ledger;
pub mod offline_fraud_detector;
pub mod offline_limits;
pub mod security;
pub mod sync_engine;
pub mod traits;
pub mod transaction_store;
pub mod user_manager;
pub mod wallet;

pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use clock::{ManualClock, SystemClock};
pub use engine::TransactionEngine;
pub use fraud_detector::FraudDetector;
pub use ledger::AccountLedger;
pub use offline_fraud_detector::OfflineFraudDetector;
pub use offline_limits::OfflineTransactionManager;
pub use security::Sha256Security;
pub use sync_engine::OfflineSyncEngine;
pub use traits::{Clock, SecurityProvider, SnapshotStore, UserDirectory};
pub use transaction_store::TransactionStore;
pub use user_manager::{Session, UserManager};
pub use wallet::{Balance, Wallet, WalletBuilder, WalletConfig};
