//! Ledger operation records replayed by the CLI
//!
//! An operation is one row of the operations CSV after validation. Users
//! are referenced by username; the processing strategies resolve them to
//! user ids through the user directory.

use rust_decimal::Decimal;

/// A single validated ledger operation
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Register a new user
    Register {
        username: String,
        pin: String,
        /// Explicit initial bank balance; random when absent
        bank_balance: Option<Decimal>,
    },

    /// Move money from the user's bank balance into the wallet
    AddMoney { username: String, amount: Decimal },

    /// Move money from the user's wallet back to the bank balance
    Withdraw { username: String, amount: Decimal },

    /// Move money between two wallets
    Transfer {
        sender: String,
        receiver: String,
        amount: Decimal,
    },
}

impl Operation {
    /// Username of the user performing the operation
    pub fn actor(&self) -> &str {
        match self {
            Operation::Register { username, .. }
            | Operation::AddMoney { username, .. }
            | Operation::Withdraw { username, .. } => username,
            Operation::Transfer { sender, .. } => sender,
        }
    }

    pub fn is_registration(&self) -> bool {
        matches!(self, Operation::Register { .. })
    }
}

/// An operation together with its position in the input
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRecord {
    /// 1-based data line of the operation in its source file
    pub line: usize,
    pub operation: Operation,
}
