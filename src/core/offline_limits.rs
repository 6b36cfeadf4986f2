//! Offline admission control
//!
//! Before a client queues a transaction locally it asks the server whether
//! the transaction fits the offline limits. This module keeps one admission
//! record per queued transaction and enforces:
//!
//! - at most 5,000 per transaction
//! - the client's shadow balance must cover the amount
//! - at most 15,000 admitted in the trailing 24 hours
//! - at most 20 admitted transactions waiting for sync
//!
//! Records are flagged synced once the sync engine replays them and can be
//! purged after a retention period.

use crate::core::traits::Clock;
use crate::types::{OfflineLimitReason, UserId, WalletError};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;

pub const MAX_OFFLINE_AMOUNT: Decimal = Decimal::from_parts(5_000, 0, 0, false, 0);

pub const DAILY_OFFLINE_LIMIT: Decimal = Decimal::from_parts(15_000, 0, 0, false, 0);

pub const MAX_PENDING_OFFLINE: usize = 20;

pub const DAILY_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;

/// A transaction admitted for offline queuing
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionRecord {
    pub amount: Decimal,
    pub client_transaction_id: String,
    pub timestamp: i64,
    pub synced: bool,
}

/// Per-user offline spend limits
pub struct OfflineTransactionManager {
    records: DashMap<UserId, Vec<AdmissionRecord>>,
    clock: Arc<dyn Clock>,
}

impl OfflineTransactionManager {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        OfflineTransactionManager {
            records: DashMap::new(),
            clock,
        }
    }

    /// Check whether a new offline transaction may be queued
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount` is not positive
    /// - `OfflineLimit` with the first limit the transaction breaks
    pub fn validate(
        &self,
        user_id: &str,
        amount: Decimal,
        shadow_balance: Decimal,
    ) -> Result<(), WalletError> {
        check_single(amount, shadow_balance)?;
        match self.records.get(user_id) {
            Some(records) => check_window(&records, amount, self.clock.now_millis()),
            None => Ok(()),
        }
    }

    /// Validate and record an offline transaction as one step
    ///
    /// The user's records stay locked between the check and the insert, so
    /// concurrent admissions for one user cannot overshoot the daily or
    /// pending limits.
    ///
    /// # Errors
    ///
    /// Same as [`OfflineTransactionManager::validate`]; nothing is recorded
    /// on error.
    pub fn admit(
        &self,
        user_id: &str,
        client_transaction_id: &str,
        amount: Decimal,
        shadow_balance: Decimal,
    ) -> Result<(), WalletError> {
        check_single(amount, shadow_balance)?;

        let now = self.clock.now_millis();
        let mut records = self.records.entry(user_id.to_string()).or_default();
        check_window(&records, amount, now)?;
        records.push(AdmissionRecord {
            amount,
            client_transaction_id: client_transaction_id.to_string(),
            timestamp: now,
            synced: false,
        });
        Ok(())
    }

    /// Flag the first record with this client id as synced
    ///
    /// Returns `false` if no such record exists.
    pub fn mark_synced(&self, user_id: &str, client_transaction_id: &str) -> bool {
        let Some(mut records) = self.records.get_mut(user_id) else {
            return false;
        };
        match records
            .iter_mut()
            .find(|r| r.client_transaction_id == client_transaction_id)
        {
            Some(record) => {
                record.synced = true;
                true
            }
            None => false,
        }
    }

    /// Drop synced records older than `older_than_ms`, returning how many went
    pub fn clear_synced(&self, user_id: &str, older_than_ms: i64) -> usize {
        let cutoff = self.clock.now_millis() - older_than_ms;
        let Some(mut records) = self.records.get_mut(user_id) else {
            return 0;
        };
        let before = records.len();
        records.retain(|r| !(r.synced && r.timestamp < cutoff));
        before - records.len()
    }

    /// Number of admitted transactions not yet synced
    pub fn unsynced_count(&self, user_id: &str) -> usize {
        self.records
            .get(user_id)
            .map_or(0, |records| records.iter().filter(|r| !r.synced).count())
    }

    /// Copies of the user's admission records, oldest first
    pub fn records(&self, user_id: &str) -> Vec<AdmissionRecord> {
        self.records
            .get(user_id)
            .map(|records| records.value().clone())
            .unwrap_or_default()
    }
}

fn check_single(amount: Decimal, shadow_balance: Decimal) -> Result<(), WalletError> {
    if amount <= Decimal::ZERO {
        return Err(WalletError::invalid_amount(amount));
    }
    if amount > MAX_OFFLINE_AMOUNT {
        return Err(OfflineLimitReason::PerTransactionLimit.into());
    }
    if shadow_balance < amount {
        return Err(OfflineLimitReason::InsufficientShadowBalance.into());
    }
    Ok(())
}

/// Daily spend and pending-count limits over the user's existing records
fn check_window(records: &[AdmissionRecord], amount: Decimal, now: i64) -> Result<(), WalletError> {
    let since = now - DAILY_WINDOW_MS;
    let daily_spend: Decimal = records
        .iter()
        .filter(|r| r.timestamp >= since)
        .map(|r| r.amount)
        .sum();
    if daily_spend + amount > DAILY_OFFLINE_LIMIT {
        return Err(OfflineLimitReason::DailySpendLimit.into());
    }

    let pending = records.iter().filter(|r| !r.synced).count();
    if pending >= MAX_PENDING_OFFLINE {
        return Err(OfflineLimitReason::PendingCountLimit.into());
    }

    Ok(())
}
