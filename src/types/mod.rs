//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `money`: Currency rounding and limits
//! - `account`: Account identity and balances
//! - `transaction`: Transaction records, types and receipts
//! - `offline`: Offline transaction wire types and sync results
//! - `operation`: Operations replayed from CSV input
//! - `snapshot`: Persisted ledger schema
//! - `error`: Error types for the wallet ledger

pub mod account;
pub mod error;
pub mod money;
pub mod offline;
pub mod operation;
pub mod snapshot;
pub mod transaction;

pub use account::{Account, UserId};
pub use error::{BalanceKind, ErrorKind, FraudReason, OfflineLimitReason, WalletError};
pub use offline::{
    OfflineActivityType, OfflineReplay, OfflineTransaction, SyncFailure, SyncResult,
    SyncedTransaction,
};
pub use operation::{Operation, OperationRecord};
pub use snapshot::{LedgerSnapshot, SNAPSHOT_VERSION};
pub use transaction::{
    Transaction, TransactionId, TransactionReceipt, TransactionStatus, TransactionType,
};
