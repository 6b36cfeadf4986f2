//! Wallet Ledger Library
//! # Overview
//!
//! A digital wallet ledger: users hold a wallet balance and a linked bank
//! balance, move money between them and to each other online, and settle
//! transfers made while offline through an integrity-checked sync.
//!
//! # Architecture
//!
//! - [`types`] - Core data types (Account, Transaction, OfflineTransaction, errors)
//! - [`core`] - Business logic components:
//!   - [`core::wallet`] - Service facade and the only public entry point
//!   - [`core::engine`] - Online add-money, withdraw and transfer
//!   - [`core::sync_engine`] - Offline batch reconciliation
//!   - [`core::ledger`] - Account state behind one account-mutation lock
//!   - [`core::fraud_detector`] and [`core::offline_fraud_detector`] - Fraud rules
//!   - [`core::offline_limits`] - Offline admission control
//! - [`io`] - CSV replay input, balance output, snapshot stores
//! - [`strategy`] - Sequential and async batch replay of CSV operations
//! - [`cli`] - CLI arguments parsing
//! - [`logging`] - tracing subscriber setup
//!
//! # Money
//!
//! Amounts are `rust_decimal::Decimal` values rounded half-up to two
//! decimal places before any validation. A rounded amount must be positive.
//!
//! # Transaction Types
//!
//! - **ADD_MONEY**: Move funds from the user's bank balance to the wallet
//! - **WITHDRAW**: Move funds from the wallet back to the bank balance
//! - **TRANSFER**: Move funds from one wallet to another
//!
//! A transaction refused for insufficient funds is still recorded, with
//! status FAILED.

pub mod cli;
pub mod core;
pub mod io;
pub mod logging;
pub mod strategy;
pub mod types;

pub use core::{Balance, Wallet, WalletBuilder, WalletConfig};
pub use io::{write_balances_csv, JsonFileStore, MemoryStore};
pub use types::{
    Account, ErrorKind, OfflineTransaction, SyncResult, Transaction, TransactionId,
    TransactionReceipt, TransactionStatus, TransactionType, UserId, WalletError,
};
