//! CSV format handling for ledger operations and balance output
//!
//! This module centralizes all CSV format concerns, providing:
//! - CsvRecord structure for deserialization
//! - Conversion from CSV records to ledger operations
//! - Balance output serialization
//!
//! All functions are pure (no I/O beyond the given writer) for easy testing.
//!
//! # Input Format
//!
//! ```text
//! type,user,peer,amount
//! register,alice,123456,60000
//! add_money,alice,,1000
//! transfer,alice,bob,250.50
//! withdraw,alice,,100
//! ```
//!
//! For `register` the `peer` column carries the PIN and `amount` the
//! optional initial bank balance.

use crate::types::{money, Account, Operation, OperationRecord};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// CSV record structure for deserialization
///
/// Matches the input CSV format with columns: type, user, peer, amount.
/// `peer` and `amount` are optional because not every operation uses them.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CsvRecord {
    #[serde(rename = "type")]
    pub op_type: String,
    pub user: String,
    pub peer: Option<String>,
    pub amount: Option<String>,
}

/// Convert a CsvRecord found on data line `line` to an OperationRecord
///
/// This function:
/// - Parses the operation type case-insensitively
/// - Parses the amount into a Decimal (if present)
/// - Checks that every column the operation needs is present
///
/// # Returns
///
/// * `Ok(OperationRecord)` - Successfully converted record
/// * `Err(String)` - Error message describing the conversion failure
pub fn convert_csv_record(csv_record: CsvRecord, line: usize) -> Result<OperationRecord, String> {
    let user = csv_record.user.trim().to_string();
    if user.is_empty() {
        return Err(format!("Missing user on line {}", line));
    }

    let peer = csv_record
        .peer
        .map(|peer| peer.trim().to_string())
        .filter(|peer| !peer.is_empty());

    let amount = match csv_record.amount {
        Some(amount_str) if !amount_str.trim().is_empty() => {
            match Decimal::from_str(amount_str.trim()) {
                Ok(decimal) => Some(decimal),
                Err(_) => {
                    return Err(format!(
                        "Invalid amount '{}' on line {}",
                        amount_str, line
                    ))
                }
            }
        }
        _ => None,
    };

    let require_amount = |op: &str| {
        amount.ok_or_else(|| format!("{} on line {} requires an amount", op, line))
    };

    let operation = match csv_record.op_type.trim().to_lowercase().as_str() {
        "register" => Operation::Register {
            username: user,
            pin: peer.ok_or_else(|| format!("register on line {} requires a PIN", line))?,
            bank_balance: amount,
        },
        "add_money" => Operation::AddMoney {
            username: user,
            amount: require_amount("add_money")?,
        },
        "withdraw" => Operation::Withdraw {
            username: user,
            amount: require_amount("withdraw")?,
        },
        "transfer" => Operation::Transfer {
            sender: user,
            receiver: peer
                .ok_or_else(|| format!("transfer on line {} requires a receiver", line))?,
            amount: require_amount("transfer")?,
        },
        other => {
            return Err(format!(
                "Invalid operation type: '{}' on line {}",
                other, line
            ))
        }
    };

    Ok(OperationRecord { line, operation })
}

/// Write balances to CSV format
///
/// Writes accounts in CSV format with columns: username, wallet, bank.
/// Accounts are sorted by username for deterministic output and amounts
/// carry exactly two decimal places.
///
/// # Returns
///
/// * `Ok(())` if writing succeeded
/// * `Err(String)` if a write error occurred
pub fn write_balances_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["username", "wallet", "bank"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted_accounts: Vec<&Account> = accounts.iter().collect();
    sorted_accounts.sort_by(|a, b| a.username.cmp(&b.username));

    for account in sorted_accounts {
        writer
            .write_record(&[
                account.username.clone(),
                money::format(account.wallet_balance()),
                money::format(account.bank_balance()),
            ])
            .map_err(|e| format!("Failed to write balance record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}
