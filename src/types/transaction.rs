//! Transaction-related types for the wallet ledger
//!
//! This module defines the transaction record kept in the ledger's audit log,
//! its type and status enums, and the receipt returned to callers when a
//! money movement commits.

use super::account::{Account, UserId};
use super::error::WalletError;
use super::money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transaction identifier (`TXN_<epochMillis>_<counter>`)
pub type TransactionId = String;

/// Kinds of money movement supported by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Bank balance → wallet balance of the same user
    AddMoney,

    /// Wallet balance → bank balance of the same user
    Withdraw,

    /// Wallet of the sender → wallet of the receiver
    Transfer,
}

impl TransactionType {
    /// Wire name of the type, as used in offline payloads and signatures
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::AddMoney => "ADD_MONEY",
            TransactionType::Withdraw => "WITHDRAW",
            TransactionType::Transfer => "TRANSFER",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADD_MONEY" => Ok(TransactionType::AddMoney),
            "WITHDRAW" => Ok(TransactionType::Withdraw),
            "TRANSFER" => Ok(TransactionType::Transfer),
            other => Err(format!("Unknown transaction type '{}'", other)),
        }
    }
}

/// Lifecycle state of a transaction
///
/// Transitions only `Pending → Success` or `Pending → Failed`, exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

/// A recorded money movement attempt
///
/// Created by the transaction engine at the start of every attempt that
/// passes the fraud pre-check, and kept in the transaction log whether it
/// succeeded or failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub transaction_id: TransactionId,

    #[serde(rename = "type")]
    pub tx_type: TransactionType,

    pub sender_id: UserId,

    pub sender_username: String,

    /// Present only for transfers
    pub receiver_id: Option<UserId>,

    /// Present only for transfers
    pub receiver_username: Option<String>,

    amount: Decimal,

    status: TransactionStatus,

    /// Creation time in epoch milliseconds
    pub created_at: i64,

    /// Completion time in epoch milliseconds, set when the status becomes final
    completed_at: Option<i64>,
}

impl Transaction {
    /// Create a pending transaction
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` if `amount` is not positive.
    pub fn new(
        transaction_id: TransactionId,
        tx_type: TransactionType,
        sender: &Account,
        receiver: Option<&Account>,
        amount: Decimal,
        created_at: i64,
    ) -> Result<Self, WalletError> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::invalid_amount(amount));
        }

        Ok(Transaction {
            transaction_id,
            tx_type,
            sender_id: sender.user_id.clone(),
            sender_username: sender.username.clone(),
            receiver_id: receiver.map(|r| r.user_id.clone()),
            receiver_username: receiver.map(|r| r.username.clone()),
            amount: money::round(amount),
            status: TransactionStatus::Pending,
            created_at,
            completed_at: None,
        })
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn completed_at(&self) -> Option<i64> {
        self.completed_at
    }

    /// Mark the transaction as committed
    pub fn mark_success(&mut self, now: i64) -> Result<(), WalletError> {
        self.complete(TransactionStatus::Success, now)
    }

    /// Mark the transaction as failed
    pub fn mark_failed(&mut self, now: i64) -> Result<(), WalletError> {
        self.complete(TransactionStatus::Failed, now)
    }

    /// Whether the user took part in this transaction as sender or receiver
    pub fn involves(&self, user_id: &str) -> bool {
        self.sender_id == user_id || self.receiver_id.as_deref() == Some(user_id)
    }

    fn complete(&mut self, status: TransactionStatus, now: i64) -> Result<(), WalletError> {
        if self.status != TransactionStatus::Pending {
            return Err(WalletError::InvalidStatusTransition {
                transaction_id: self.transaction_id.clone(),
            });
        }
        self.status = status;
        self.completed_at = Some(now);
        Ok(())
    }
}

/// Outcome of a committed money movement
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    /// Identifier of the committed transaction
    pub transaction_id: TransactionId,

    /// Wallet balance of the acting user after the commit
    #[serde(with = "rust_decimal::serde::float")]
    pub new_balance: Decimal,
}
