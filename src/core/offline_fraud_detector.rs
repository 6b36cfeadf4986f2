//! Offline fraud detection and the offline-mode circuit breaker
//!
//! This module provides the `OfflineFraudDetector`. It screens offline
//! admissions against recent offline activity and keeps, per user, a count
//! of consecutive failed syncs plus an offline-mode-disabled flag.
//!
//! # Checks
//!
//! In order, first match wins:
//! 1. Offline mode disabled for the user.
//! 2. Shadow balance more than 1% above the last known backend balance.
//! 3. Five or more offline activities in the trailing 60 seconds.
//! 4. In the trailing 10 minutes the user both spent offline and withdrew
//!    online with offline transactions pending, and the new amount is at
//!    least 80% of that offline spend. This also disables offline mode.
//! 5. Three or more consecutive failed syncs.
//!
//! A disabled user stays disabled until [`OfflineFraudDetector::enable`]
//! is called explicitly.

use crate::core::traits::Clock;
use crate::types::{FraudReason, OfflineActivityType, UserId};
use dashmap::{DashMap, DashSet};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::warn;

/// Consecutive failed syncs that trip the circuit breaker
pub const MAX_FAILED_SYNCS: u32 = 3;

pub const OFFLINE_VELOCITY_LIMIT: usize = 5;

pub const OFFLINE_VELOCITY_WINDOW_MS: i64 = 60_000;

pub const PATTERN_WINDOW_MS: i64 = 10 * 60_000;

/// Activity retention
pub const ACTIVITY_RETENTION_MS: i64 = 60 * 60_000;

/// Allowed shadow balance drift above the backend balance (1.01)
const SHADOW_TOLERANCE: Decimal = Decimal::from_parts(101, 0, 0, false, 2);

/// Share of recent offline spend that triggers the pattern rule (0.8)
const PATTERN_RATIO: Decimal = Decimal::from_parts(8, 0, 0, false, 1);

#[derive(Debug, Clone)]
struct ActivityRecord {
    amount: Decimal,
    activity: OfflineActivityType,
    timestamp: i64,
}

/// Offline screening with a per-user circuit breaker
pub struct OfflineFraudDetector {
    activity: DashMap<UserId, Vec<ActivityRecord>>,
    failed_syncs: DashMap<UserId, u32>,
    disabled: DashSet<UserId>,
    clock: Arc<dyn Clock>,
}

impl OfflineFraudDetector {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        OfflineFraudDetector {
            activity: DashMap::new(),
            failed_syncs: DashMap::new(),
            disabled: DashSet::new(),
            clock,
        }
    }

    /// Screen an offline transaction the client wants to queue
    pub fn check(
        &self,
        user_id: &str,
        amount: Decimal,
        shadow_balance: Decimal,
        last_known_backend_balance: Decimal,
    ) -> Result<(), FraudReason> {
        let result = self.evaluate(user_id, amount, shadow_balance, last_known_backend_balance);
        if let Err(reason) = result {
            warn!(user_id, %amount, %reason, "offline transaction blocked");
        }
        result
    }

    fn evaluate(
        &self,
        user_id: &str,
        amount: Decimal,
        shadow_balance: Decimal,
        last_known_backend_balance: Decimal,
    ) -> Result<(), FraudReason> {
        if self.is_disabled(user_id) {
            return Err(FraudReason::OfflineModeDisabled);
        }

        if shadow_balance > last_known_backend_balance * SHADOW_TOLERANCE {
            return Err(FraudReason::ShadowBalanceTampering);
        }

        let now = self.clock.now_millis();
        let (recent_count, offline_spend, online_withdrawals) = match self.activity.get(user_id) {
            Some(records) => {
                let recent_count = records
                    .iter()
                    .filter(|r| now - r.timestamp < OFFLINE_VELOCITY_WINDOW_MS)
                    .count();
                let in_pattern_window = records
                    .iter()
                    .filter(|r| now - r.timestamp < PATTERN_WINDOW_MS);
                let mut offline_spend = Decimal::ZERO;
                let mut online_withdrawals = 0usize;
                for record in in_pattern_window {
                    match record.activity {
                        OfflineActivityType::OfflineTransaction => offline_spend += record.amount,
                        OfflineActivityType::OnlineWithdrawAfterOffline => online_withdrawals += 1,
                    }
                }
                (recent_count, offline_spend, online_withdrawals)
            }
            None => (0, Decimal::ZERO, 0),
        };

        if recent_count >= OFFLINE_VELOCITY_LIMIT {
            return Err(FraudReason::OfflineVelocity);
        }

        if offline_spend > Decimal::ZERO
            && online_withdrawals > 0
            && amount >= offline_spend * PATTERN_RATIO
        {
            self.disable(user_id);
            return Err(FraudReason::OfflineOnlinePattern);
        }

        if self.failed_sync_count(user_id) >= MAX_FAILED_SYNCS {
            return Err(FraudReason::RepeatedSyncFailures);
        }

        Ok(())
    }

    /// Append an activity record, pruning records past retention
    pub fn record_activity(&self, user_id: &str, amount: Decimal, activity: OfflineActivityType) {
        let now = self.clock.now_millis();
        let mut records = self.activity.entry(user_id.to_string()).or_default();
        records.push(ActivityRecord {
            amount,
            activity,
            timestamp: now,
        });
        records.retain(|r| now - r.timestamp <= ACTIVITY_RETENTION_MS);
    }

    /// Count a failed sync; trips the breaker at [`MAX_FAILED_SYNCS`]
    pub fn record_sync_failure(&self, user_id: &str) {
        let count = {
            let mut count = self.failed_syncs.entry(user_id.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        if count >= MAX_FAILED_SYNCS && !self.is_disabled(user_id) {
            warn!(user_id, failed_syncs = count, "offline mode disabled after failed syncs");
            self.disable(user_id);
        }
    }

    /// Reset the consecutive failed-sync count
    pub fn record_sync_success(&self, user_id: &str) {
        self.failed_syncs.insert(user_id.to_string(), 0);
    }

    pub fn disable(&self, user_id: &str) {
        if self.disabled.insert(user_id.to_string()) {
            warn!(user_id, "offline mode disabled");
        }
    }

    /// Re-enable offline mode and clear the failed-sync count
    pub fn enable(&self, user_id: &str) {
        self.disabled.remove(user_id);
        self.failed_syncs.insert(user_id.to_string(), 0);
    }

    pub fn is_disabled(&self, user_id: &str) -> bool {
        self.disabled.contains(user_id)
    }

    pub fn failed_sync_count(&self, user_id: &str) -> u32 {
        self.failed_syncs.get(user_id).map_or(0, |count| *count)
    }
}
