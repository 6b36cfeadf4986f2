//! Online fraud detection
//!
//! This module provides the `FraudDetector`, which screens online money
//! movements against a user's recently completed transactions.
//!
//! # Rules
//!
//! Checked in order, first match wins:
//! 1. A single amount above 50,000 is blocked.
//! 2. Ten or more completed transactions in the trailing 60 seconds block
//!    any further transaction.
//! 3. A withdrawal of at least 90% of the top-ups made in the trailing
//!    5 minutes is blocked.
//!
//! Only committed transactions are recorded, so the history reflects
//! completed activity rather than attempts. Records older than one hour are
//! pruned whenever a new one is appended.

use crate::core::traits::Clock;
use crate::types::{FraudReason, TransactionType, UserId};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::warn;

/// Largest single online amount allowed
pub const MAX_SINGLE_AMOUNT: Decimal = Decimal::from_parts(50_000, 0, 0, false, 0);

/// Transactions allowed per velocity window before blocking
pub const VELOCITY_LIMIT: usize = 10;

pub const VELOCITY_WINDOW_MS: i64 = 60_000;

pub const RAPID_TOPUP_WINDOW_MS: i64 = 5 * 60_000;

/// History retention
pub const RETENTION_MS: i64 = 60 * 60_000;

/// Share of recent top-ups a withdrawal may not reach (0.9)
const RAPID_TOPUP_RATIO: Decimal = Decimal::from_parts(9, 0, 0, false, 1);

#[derive(Debug, Clone)]
struct FraudRecord {
    amount: Decimal,
    tx_type: TransactionType,
    timestamp: i64,
}

/// Sliding-window screening of online transactions
pub struct FraudDetector {
    history: DashMap<UserId, Vec<FraudRecord>>,
    clock: Arc<dyn Clock>,
}

impl FraudDetector {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        FraudDetector {
            history: DashMap::new(),
            clock,
        }
    }

    /// Screen a transaction the user is about to make
    pub fn check(
        &self,
        user_id: &str,
        amount: Decimal,
        tx_type: TransactionType,
    ) -> Result<(), FraudReason> {
        let result = self.evaluate(user_id, amount, tx_type);
        if let Err(reason) = result {
            warn!(user_id, %amount, %tx_type, %reason, "online transaction blocked");
        }
        result
    }

    fn evaluate(
        &self,
        user_id: &str,
        amount: Decimal,
        tx_type: TransactionType,
    ) -> Result<(), FraudReason> {
        if amount > MAX_SINGLE_AMOUNT {
            return Err(FraudReason::AmountLimit);
        }

        let Some(records) = self.history.get(user_id) else {
            return Ok(());
        };
        let now = self.clock.now_millis();

        let recent = records
            .iter()
            .filter(|r| now - r.timestamp < VELOCITY_WINDOW_MS)
            .count();
        if recent >= VELOCITY_LIMIT {
            return Err(FraudReason::Velocity);
        }

        if tx_type == TransactionType::Withdraw {
            let recent_topups: Decimal = records
                .iter()
                .filter(|r| {
                    r.tx_type == TransactionType::AddMoney
                        && now - r.timestamp < RAPID_TOPUP_WINDOW_MS
                })
                .map(|r| r.amount)
                .sum();
            if recent_topups > Decimal::ZERO && amount >= recent_topups * RAPID_TOPUP_RATIO {
                return Err(FraudReason::RapidTopupWithdraw);
            }
        }

        Ok(())
    }

    /// Record a committed transaction
    pub fn record(&self, user_id: &str, amount: Decimal, tx_type: TransactionType) {
        let now = self.clock.now_millis();
        let mut records = self.history.entry(user_id.to_string()).or_default();
        records.push(FraudRecord {
            amount,
            tx_type,
            timestamp: now,
        });
        records.retain(|r| now - r.timestamp <= RETENTION_MS);
    }

    /// Number of retained records for the user
    pub fn history_len(&self, user_id: &str) -> usize {
        self.history.get(user_id).map_or(0, |records| records.len())
    }
}
