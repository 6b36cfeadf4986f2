//! Account-related types for the wallet ledger
//!
//! This module defines the Account structure: a user's identity together
//! with the wallet balance held by the ledger and the simulated bank
//! balance used as the source and sink of top-ups and withdrawals.

use super::error::{BalanceKind, WalletError};
use super::money::{self, MAX_TRANSACTION_AMOUNT};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// User identifier (`USR_<epochMillis>_<counter>`)
pub type UserId = String;

/// A registered user and their balances
///
/// Balances are private: the only way to change them is through the four
/// credit/debit operations, each of which validates the amount, refuses to
/// go negative and rounds the result to two decimal places.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Stable user identifier
    pub user_id: UserId,

    /// Unique login name
    pub username: String,

    /// Opaque PIN hash produced by the security capability
    pub pin_hash: String,

    wallet_balance: Decimal,

    bank_balance: Decimal,

    /// Registration time in epoch milliseconds
    pub created_at: i64,
}

impl Account {
    /// Create a new account with an empty wallet
    ///
    /// The initial bank balance is rounded; negative values are clamped to zero.
    pub fn new(
        user_id: UserId,
        username: String,
        pin_hash: String,
        initial_bank_balance: Decimal,
        created_at: i64,
    ) -> Self {
        Account {
            user_id,
            username,
            pin_hash,
            wallet_balance: Decimal::ZERO,
            bank_balance: money::round(initial_bank_balance.max(Decimal::ZERO)),
            created_at,
        }
    }

    pub fn wallet_balance(&self) -> Decimal {
        self.wallet_balance
    }

    pub fn bank_balance(&self) -> Decimal {
        self.bank_balance
    }

    /// Add funds to the wallet, returning the new wallet balance
    pub fn credit_wallet(&mut self, amount: Decimal) -> Result<Decimal, WalletError> {
        Self::validate_amount(amount)?;
        self.wallet_balance = money::round(self.wallet_balance + amount);
        Ok(self.wallet_balance)
    }

    /// Remove funds from the wallet, returning the new wallet balance
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount` is not in `(0, MAX_TRANSACTION_AMOUNT]`
    /// - `InsufficientFunds` if the wallet holds less than `amount`
    pub fn debit_wallet(&mut self, amount: Decimal) -> Result<Decimal, WalletError> {
        Self::validate_amount(amount)?;
        if self.wallet_balance < amount {
            return Err(WalletError::insufficient_funds(
                BalanceKind::Wallet,
                self.wallet_balance,
                amount,
            ));
        }
        self.wallet_balance = money::round(self.wallet_balance - amount);
        Ok(self.wallet_balance)
    }

    /// Add funds to the bank balance, returning the new bank balance
    pub fn credit_bank(&mut self, amount: Decimal) -> Result<Decimal, WalletError> {
        Self::validate_amount(amount)?;
        self.bank_balance = money::round(self.bank_balance + amount);
        Ok(self.bank_balance)
    }

    /// Remove funds from the bank balance, returning the new bank balance
    pub fn debit_bank(&mut self, amount: Decimal) -> Result<Decimal, WalletError> {
        Self::validate_amount(amount)?;
        if self.bank_balance < amount {
            return Err(WalletError::insufficient_funds(
                BalanceKind::Bank,
                self.bank_balance,
                amount,
            ));
        }
        self.bank_balance = money::round(self.bank_balance - amount);
        Ok(self.bank_balance)
    }

    fn validate_amount(amount: Decimal) -> Result<(), WalletError> {
        if amount <= Decimal::ZERO || amount > MAX_TRANSACTION_AMOUNT {
            return Err(WalletError::invalid_amount(amount));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;

    fn account_with(wallet: &str, bank: &str) -> Account {
        let mut account = Account::new(
            "USR_1_1".to_string(),
            "alice".to_string(),
            "hash".to_string(),
            Decimal::from_str(bank).unwrap(),
            0,
        );
        account.wallet_balance = Decimal::from_str(wallet).unwrap();
        account
    }

    #[test]
    fn test_new_account_has_empty_wallet() {
        let account = Account::new(
            "USR_1_1".to_string(),
            "alice".to_string(),
            "hash".to_string(),
            Decimal::from_str("60000.456").unwrap(),
            42,
        );
        assert_eq!(account.wallet_balance(), Decimal::ZERO);
        assert_eq!(account.bank_balance(), Decimal::from_str("60000.46").unwrap());
        assert_eq!(account.created_at, 42);
    }

    #[rstest]
    #[case::zero("0")]
    #[case::negative("-5")]
    #[case::above_max("1000000.01")]
    fn test_invalid_amounts_rejected(#[case] amount: &str) {
        let mut account = account_with("100", "100");
        let amount = Decimal::from_str(amount).unwrap();

        assert!(matches!(account.credit_wallet(amount), Err(WalletError::InvalidAmount { .. })));
        assert!(matches!(account.debit_wallet(amount), Err(WalletError::InvalidAmount { .. })));
        assert!(matches!(account.credit_bank(amount), Err(WalletError::InvalidAmount { .. })));
        assert!(matches!(account.debit_bank(amount), Err(WalletError::InvalidAmount { .. })));
        assert_eq!(account, account_with("100", "100"));
    }

    #[test]
    fn test_max_amount_is_accepted() {
        let mut account = account_with("0", "0");
        assert_eq!(
            account.credit_wallet(MAX_TRANSACTION_AMOUNT).unwrap(),
            MAX_TRANSACTION_AMOUNT
        );
    }

    #[test]
    fn test_debit_wallet_insufficient_funds() {
        let mut account = account_with("10.00", "0");
        let err = account.debit_wallet(Decimal::from_str("10.01").unwrap()).unwrap_err();
        assert_eq!(err.to_string(), "Insufficient wallet balance");
        assert_eq!(account.wallet_balance(), Decimal::from_str("10.00").unwrap());
    }

    #[test]
    fn test_debit_bank_insufficient_funds() {
        let mut account = account_with("0", "5");
        let err = account.debit_bank(Decimal::from(6)).unwrap_err();
        assert_eq!(err.to_string(), "Insufficient bank balance");
        assert_eq!(account.bank_balance(), Decimal::from(5));
    }

    #[rstest]
    #[case("0.005", "0.01")]
    #[case("0.004", "0.00")]
    #[case("1.111", "1.11")]
    fn test_fractional_cent_credit_is_rounded(#[case] amount: &str, #[case] expected: &str) {
        let mut account = account_with("0", "0");
        let balance = account.credit_wallet(Decimal::from_str(amount).unwrap()).unwrap();
        assert_eq!(balance, Decimal::from_str(expected).unwrap());
        assert_eq!(money::round(balance), balance);
    }

    #[test]
    fn test_debit_to_exactly_zero() {
        let mut account = account_with("25.50", "0");
        assert_eq!(
            account.debit_wallet(Decimal::from_str("25.50").unwrap()).unwrap(),
            Decimal::ZERO
        );
    }
}
