//! Error types for the wallet ledger
//!
//! This module defines every failure the ledger can report. The `Display`
//! text of each variant is the human-readable reason handed back to callers,
//! so the strings here are part of the public contract.
//!
//! # Error Categories
//!
//! - **Input errors**: non-positive or over-limit amounts, bad usernames/PINs
//! - **Lookup errors**: unknown users, unknown or expired sessions
//! - **Policy rejections**: fraud blocks and offline limit blocks
//! - **Funds errors**: insufficient wallet or bank balance
//! - **Offline integrity errors**: signature mismatch, unsupported offline
//!   types, client ids reused for a different transaction
//! - **System errors**: persistence and internal failures

use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

/// Which balance of an account an operation touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceKind {
    Wallet,
    Bank,
}

impl fmt::Display for BalanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceKind::Wallet => f.write_str("wallet"),
            BalanceKind::Bank => f.write_str("bank"),
        }
    }
}

/// Reasons the online or offline fraud detector blocks a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FraudReason {
    #[error("Amount exceeds allowed limit")]
    AmountLimit,

    #[error("Too many transactions in a short period")]
    Velocity,

    #[error("Suspicious rapid top-up and withdrawal")]
    RapidTopupWithdraw,

    #[error("Offline mode disabled due to suspicious activity")]
    OfflineModeDisabled,

    #[error("Shadow balance tampering detected")]
    ShadowBalanceTampering,

    #[error("Too many offline transactions in a short period")]
    OfflineVelocity,

    #[error("Suspicious offline/online pattern detected. Offline mode disabled.")]
    OfflineOnlinePattern,

    #[error("Multiple failed sync attempts. Please contact support.")]
    RepeatedSyncFailures,
}

/// Reasons offline admission control refuses to queue a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OfflineLimitReason {
    #[error("Exceeds offline transaction limit")]
    PerTransactionLimit,

    #[error("Insufficient shadow balance")]
    InsufficientShadowBalance,

    #[error("Exceeds daily offline spend limit")]
    DailySpendLimit,

    #[error("Maximum offline transactions reached. Please sync with server.")]
    PendingCountLimit,
}

/// Coarse classification of a [`WalletError`]
///
/// Callers that only care about the category of a failure (for example to
/// choose a response status) match on this instead of the full error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    UserNotFound,
    Unauthorized,
    FraudBlocked,
    InsufficientFunds,
    IntegrityFailure,
    UnsupportedOperation,
    PersistenceFailure,
    InternalFailure,
}

/// Main error type for the wallet ledger
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WalletError {
    /// Amount is zero, negative, or above the per-operation maximum
    #[error("Invalid amount")]
    InvalidAmount {
        /// The rejected amount
        amount: Decimal,
    },

    /// Sender and receiver of a transfer are the same user
    #[error("Cannot transfer to yourself")]
    SelfTransfer,

    #[error("Invalid username")]
    InvalidUsername,

    #[error("PIN must be exactly 6 digits")]
    InvalidPin,

    #[error("Username already exists")]
    UsernameTaken {
        /// The username that is already registered
        username: String,
    },

    #[error("Invalid PIN")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound {
        /// User id or username that failed to resolve
        user: String,
    },

    /// Session token is unknown or expired
    #[error("Invalid token")]
    Unauthorized,

    /// Balance below the requested debit
    #[error("Insufficient {kind} balance")]
    InsufficientFunds {
        /// Balance that was too low
        kind: BalanceKind,
        /// Balance at the time of the check
        available: Decimal,
        /// Amount that was requested
        requested: Decimal,
    },

    /// Policy rejection by one of the fraud detectors
    #[error("{0}")]
    FraudBlocked(#[from] FraudReason),

    /// Policy rejection by offline admission control
    #[error("{0}")]
    OfflineLimit(#[from] OfflineLimitReason),

    /// Offline transaction signature does not match its fields
    #[error("Integrity check failed")]
    IntegrityFailure {
        /// Client-side id of the offending offline transaction
        client_transaction_id: String,
    },

    /// Offline transaction type that cannot be replayed
    #[error("Unsupported offline transaction")]
    UnsupportedOfflineType {
        /// Client-side id of the offending offline transaction
        client_transaction_id: String,
    },

    /// Client id already replayed for a transaction with different fields
    #[error("Duplicate client transaction id")]
    DuplicateClientTransaction {
        /// The reused client-side id
        client_transaction_id: String,
    },

    /// Status of a transaction was changed after it already completed
    #[error("Transaction {transaction_id} already completed")]
    InvalidStatusTransition {
        /// Transaction whose status was already final
        transaction_id: String,
    },

    /// Snapshot could not be written or read
    #[error("Persistence error: {message}")]
    Persistence {
        /// Description of the storage failure
        message: String,
    },

    /// Unexpected failure during commit
    #[error("{message}")]
    Internal {
        /// Description of the failure
        message: String,
    },
}

impl From<std::io::Error> for WalletError {
    fn from(error: std::io::Error) -> Self {
        WalletError::Persistence {
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(error: serde_json::Error) -> Self {
        WalletError::Persistence {
            message: error.to_string(),
        }
    }
}

impl WalletError {
    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: Decimal) -> Self {
        WalletError::InvalidAmount { amount }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(kind: BalanceKind, available: Decimal, requested: Decimal) -> Self {
        WalletError::InsufficientFunds {
            kind,
            available,
            requested,
        }
    }

    /// Create a UserNotFound error
    pub fn user_not_found(user: &str) -> Self {
        WalletError::UserNotFound {
            user: user.to_string(),
        }
    }

    /// Create a Persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        WalletError::Persistence {
            message: message.into(),
        }
    }

    /// Create an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        WalletError::Internal {
            message: message.into(),
        }
    }

    /// Classify this error into its taxonomy category
    pub fn kind(&self) -> ErrorKind {
        match self {
            WalletError::InvalidAmount { .. }
            | WalletError::SelfTransfer
            | WalletError::InvalidUsername
            | WalletError::InvalidPin
            | WalletError::UsernameTaken { .. } => ErrorKind::InvalidInput,
            WalletError::InvalidCredentials | WalletError::Unauthorized => ErrorKind::Unauthorized,
            WalletError::UserNotFound { .. } => ErrorKind::UserNotFound,
            WalletError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            WalletError::FraudBlocked(_) | WalletError::OfflineLimit(_) => ErrorKind::FraudBlocked,
            WalletError::IntegrityFailure { .. }
            | WalletError::DuplicateClientTransaction { .. } => ErrorKind::IntegrityFailure,
            WalletError::UnsupportedOfflineType { .. } => ErrorKind::UnsupportedOperation,
            WalletError::Persistence { .. } => ErrorKind::PersistenceFailure,
            WalletError::InvalidStatusTransition { .. } | WalletError::Internal { .. } => {
                ErrorKind::InternalFailure
            }
        }
    }
}
