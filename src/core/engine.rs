//! Transaction processing engine
//!
//! This module provides the TransactionEngine that orchestrates online money
//! movements by coordinating the AccountLedger, the transaction log and the
//! online FraudDetector.
//!
//! Every operation follows the same protocol:
//! 1. Validate the amount (and, for transfers, that sender and receiver differ)
//! 2. Resolve the users involved
//! 3. Run the fraud pre-check; a block returns early and records nothing
//! 4. Allocate a transaction id and build a PENDING transaction
//! 5. Under the account-mutation lock: check funds, apply the paired
//!    debit/credit, mark the transaction, append it to the log, persist and
//!    feed the fraud history
//!
//! A failure in step 5 leaves balances untouched, marks the transaction
//! FAILED and still records it for audit.
//!
//! Offline transfers replayed by the sync engine take the same path; their
//! replay record is written in the step 5 commit, so the balance change and
//! the record persist together.

use crate::core::fraud_detector::FraudDetector;
use crate::core::ledger::{AccountLedger, LedgerState};
use crate::core::traits::{Clock, UserDirectory};
use crate::types::{
    money, Account, OfflineReplay, OfflineTransaction, SyncedTransaction, Transaction,
    TransactionReceipt, TransactionType, WalletError,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

/// Transaction processing engine
///
/// Cheap to share behind an `Arc`; all state lives in the ledger and the
/// fraud detector.
pub struct TransactionEngine {
    ledger: Arc<AccountLedger>,
    fraud: Arc<FraudDetector>,
    clock: Arc<dyn Clock>,
}

impl TransactionEngine {
    pub fn new(ledger: Arc<AccountLedger>, fraud: Arc<FraudDetector>, clock: Arc<dyn Clock>) -> Self {
        TransactionEngine {
            ledger,
            fraud,
            clock,
        }
    }

    /// Move money from the user's bank balance into their wallet
    ///
    /// # Returns
    ///
    /// A receipt carrying the new transaction id and the wallet balance
    /// after the top-up.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount` is not positive
    /// - `UserNotFound` if the user is not registered
    /// - `FraudBlocked` if the fraud pre-check rejects the top-up
    /// - `InsufficientFunds` if the bank balance is too low
    pub fn add_money_from_bank(
        &self,
        user_id: &str,
        amount: Decimal,
    ) -> Result<TransactionReceipt, WalletError> {
        let amount = validate_amount(amount)?;
        let user = self.resolve(user_id)?;

        self.execute(TransactionType::AddMoney, &user, None, amount, |state, _| {
            state.update(&user.user_id, |account| {
                account.debit_bank(amount)?;
                account.credit_wallet(amount)
            })
        })
    }

    /// Move money from the user's wallet back to their bank balance
    ///
    /// # Errors
    ///
    /// Same as [`TransactionEngine::add_money_from_bank`], with the wallet as
    /// the balance that must cover the amount.
    pub fn withdraw_to_bank(
        &self,
        user_id: &str,
        amount: Decimal,
    ) -> Result<TransactionReceipt, WalletError> {
        let amount = validate_amount(amount)?;
        let user = self.resolve(user_id)?;

        self.execute(TransactionType::Withdraw, &user, None, amount, |state, _| {
            state.update(&user.user_id, |account| {
                let new_balance = account.debit_wallet(amount)?;
                account.credit_bank(amount)?;
                Ok(new_balance)
            })
        })
    }

    /// Move money between two wallets
    ///
    /// The receipt carries the sender's wallet balance after the transfer.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount` is not positive
    /// - `SelfTransfer` if sender and receiver are the same user
    /// - `UserNotFound` if either user is not registered
    /// - `FraudBlocked` if the fraud pre-check rejects the sender
    /// - `InsufficientFunds` if the sender's wallet is too low
    pub fn transfer(
        &self,
        sender_id: &str,
        receiver_id: &str,
        amount: Decimal,
    ) -> Result<TransactionReceipt, WalletError> {
        self.transfer_inner(sender_id, receiver_id, amount, None)
    }

    /// Replay an offline transfer on behalf of `sender_id`
    ///
    /// Runs the full [`TransactionEngine::transfer`] pipeline and records an
    /// [`OfflineReplay`] in the same commit.
    ///
    /// # Errors
    ///
    /// - Every error [`TransactionEngine::transfer`] can return
    /// - `Internal` if the client id already has a replay record for the
    ///   sender; callers look the record up first, so this means two replays
    ///   of one transaction raced
    pub fn replay_offline_transfer(
        &self,
        sender_id: &str,
        offline: &OfflineTransaction,
    ) -> Result<SyncedTransaction, WalletError> {
        let receiver_id = offline.receiver_id.as_deref().unwrap_or_default();
        let receipt = self.transfer_inner(sender_id, receiver_id, offline.amount, Some(offline))?;
        Ok(SyncedTransaction::of(
            offline,
            receipt.transaction_id,
            receipt.new_balance,
        ))
    }

    fn transfer_inner(
        &self,
        sender_id: &str,
        receiver_id: &str,
        amount: Decimal,
        offline: Option<&OfflineTransaction>,
    ) -> Result<TransactionReceipt, WalletError> {
        let amount = validate_amount(amount)?;
        if sender_id == receiver_id {
            return Err(WalletError::SelfTransfer);
        }

        let sender = self.resolve(sender_id)?;
        let receiver = self.resolve(receiver_id)?;

        self.execute(
            TransactionType::Transfer,
            &sender,
            Some(&receiver),
            amount,
            |state, transaction_id| {
                if let Some(offline) = offline {
                    if state
                        .offline_replay(&sender.user_id, &offline.client_transaction_id)
                        .is_some()
                    {
                        return Err(WalletError::internal(format!(
                            "offline transaction {} was already replayed",
                            offline.client_transaction_id
                        )));
                    }
                }

                let new_balance =
                    state.update_pair(&sender.user_id, &receiver.user_id, |from, to| {
                        let new_balance = from.debit_wallet(amount)?;
                        to.credit_wallet(amount)?;
                        Ok(new_balance)
                    })?;

                if let Some(offline) = offline {
                    let synced = SyncedTransaction::of(offline, transaction_id, new_balance);
                    state.record_offline_replay(OfflineReplay::new(&sender.user_id, offline, synced));
                }
                Ok(new_balance)
            },
        )
    }

    /// All transactions the user took part in, newest first
    pub fn user_transactions(&self, user_id: &str) -> Vec<Transaction> {
        self.ledger.transactions().for_user(user_id)
    }

    fn resolve(&self, user_id: &str) -> Result<Account, WalletError> {
        self.ledger
            .get_user(user_id)
            .ok_or_else(|| WalletError::user_not_found(user_id))
    }

    /// Fraud check, then commit `apply` under the account-mutation lock
    ///
    /// `apply` receives the id of the transaction being committed and returns
    /// the acting user's wallet balance after the change.
    fn execute<F>(
        &self,
        tx_type: TransactionType,
        sender: &Account,
        receiver: Option<&Account>,
        amount: Decimal,
        apply: F,
    ) -> Result<TransactionReceipt, WalletError>
    where
        F: FnOnce(&mut LedgerState, &str) -> Result<Decimal, WalletError>,
    {
        // Pre-check blocks never create a transaction row
        self.fraud.check(&sender.user_id, amount, tx_type)?;

        let created_at = self.clock.now_millis();
        let transaction_id = self.ledger.transactions().next_id(created_at);
        let mut txn = Transaction::new(
            transaction_id,
            tx_type,
            sender,
            receiver,
            amount,
            created_at,
        )?;

        self.ledger.commit(|state, log| {
            let outcome = apply(state, &txn.transaction_id);
            let completed_at = self.clock.now_millis();

            match outcome {
                Ok(new_balance) => {
                    txn.mark_success(completed_at)?;
                    let receipt = TransactionReceipt {
                        transaction_id: txn.transaction_id.clone(),
                        new_balance,
                    };
                    log.record(txn);
                    self.ledger.persist(state);
                    self.fraud.record(&sender.user_id, amount, tx_type);

                    info!(
                        transaction_id = %receipt.transaction_id,
                        %tx_type,
                        user_id = %sender.user_id,
                        %amount,
                        new_balance = %receipt.new_balance,
                        "transaction committed"
                    );
                    Ok(receipt)
                }
                Err(e) => {
                    txn.mark_failed(completed_at)?;
                    debug!(
                        transaction_id = %txn.transaction_id,
                        %tx_type,
                        user_id = %sender.user_id,
                        error = %e,
                        "transaction failed"
                    );
                    log.record(txn);
                    self.ledger.persist(state);
                    Err(e)
                }
            }
        })
    }
}

/// Round the amount to cents and require it to be positive
fn validate_amount(amount: Decimal) -> Result<Decimal, WalletError> {
    let rounded = money::round(amount);
    if rounded <= Decimal::ZERO {
        return Err(WalletError::invalid_amount(amount));
    }
    Ok(rounded)
}
