//! Offline transaction wire types
//!
//! Offline transactions are produced by a client while it has no
//! connectivity and are submitted later as a batch for reconciliation.
//! They are untrusted: each one carries an integrity tag over its fields
//! that the sync engine recomputes before replaying it.
//!
//! # Integrity Tag
//!
//! The tag is the lowercase hex SHA-256 of the pipe-joined fields
//!
//! ```text
//! clientTransactionId|TYPE|amount|clientTimestamp|receiverId
//! ```
//!
//! where `amount` is printed the way a client prints a double (`500.0`,
//! `25.5`, `0.01`) and `receiverId` is the empty string when absent.

use super::account::UserId;
use super::money;
use super::transaction::{TransactionId, TransactionType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Client-submitted offline transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineTransaction {
    pub client_transaction_id: String,

    #[serde(rename = "type")]
    pub tx_type: TransactionType,

    #[serde(default)]
    pub receiver_id: Option<UserId>,

    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,

    /// Client clock at creation, epoch milliseconds; defines replay order
    pub client_timestamp: i64,

    pub signature: String,
}

impl OfflineTransaction {
    /// Build an offline transfer and sign it the way a client does
    pub fn signed_transfer(
        client_transaction_id: impl Into<String>,
        receiver_id: impl Into<UserId>,
        amount: Decimal,
        client_timestamp: i64,
    ) -> Self {
        let mut txn = OfflineTransaction {
            client_transaction_id: client_transaction_id.into(),
            tx_type: TransactionType::Transfer,
            receiver_id: Some(receiver_id.into()),
            amount,
            client_timestamp,
            signature: String::new(),
        };
        txn.signature = txn.compute_signature();
        txn
    }

    /// Canonical field concatenation covered by the integrity tag
    pub fn canonical_payload(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.client_transaction_id,
            self.tx_type.as_str(),
            money::format_shortest(self.amount),
            self.client_timestamp,
            self.receiver_id.as_deref().unwrap_or("")
        )
    }

    /// Hex-encoded SHA-256 of the canonical payload
    pub fn compute_signature(&self) -> String {
        let digest = Sha256::digest(self.canonical_payload().as_bytes());
        hex::encode(digest)
    }

    /// Whether the supplied signature matches the recomputed tag
    pub fn verify_integrity(&self) -> bool {
        self.compute_signature() == self.signature
    }
}

/// Kinds of activity tracked by the offline fraud detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfflineActivityType {
    /// A transaction admitted for offline queuing
    OfflineTransaction,

    /// An online withdrawal made while offline transactions were still unsynced
    OnlineWithdrawAfterOffline,
}

/// An offline transaction that was replayed into the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedTransaction {
    pub client_transaction_id: String,

    pub server_transaction_id: TransactionId,

    #[serde(rename = "type")]
    pub tx_type: TransactionType,

    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,

    /// Sender wallet balance right after the replay
    #[serde(with = "rust_decimal::serde::float")]
    pub new_balance: Decimal,
}

impl SyncedTransaction {
    /// Entry for `offline` replayed as server transaction `server_transaction_id`
    ///
    /// The amount is echoed at cents, the way the ledger applied it.
    pub fn of(
        offline: &OfflineTransaction,
        server_transaction_id: impl Into<TransactionId>,
        new_balance: Decimal,
    ) -> Self {
        SyncedTransaction {
            client_transaction_id: offline.client_transaction_id.clone(),
            server_transaction_id: server_transaction_id.into(),
            tx_type: offline.tx_type,
            amount: money::round(offline.amount),
            new_balance,
        }
    }
}

/// Ledger record of an offline transaction that was replayed
///
/// Kept in the snapshot so a batch resubmitted after a restart is still
/// recognised. The signature ties the client id to the exact fields that
/// were applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineReplay {
    /// Sender the offline transaction was replayed for
    pub user_id: UserId,

    pub signature: String,

    pub synced: SyncedTransaction,
}

impl OfflineReplay {
    pub fn new(user_id: &str, offline: &OfflineTransaction, synced: SyncedTransaction) -> Self {
        OfflineReplay {
            user_id: user_id.to_string(),
            signature: offline.signature.clone(),
            synced,
        }
    }

    pub fn client_transaction_id(&self) -> &str {
        &self.synced.client_transaction_id
    }

    /// Whether `offline` is the same transaction that was replayed
    pub fn matches(&self, offline: &OfflineTransaction) -> bool {
        self.signature == offline.signature
    }
}

/// An offline transaction that could not be replayed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    pub client_transaction_id: String,

    #[serde(rename = "type")]
    pub tx_type: TransactionType,

    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,

    pub reason: String,
}

impl SyncFailure {
    /// Failure entry for an offline transaction with the given reason
    pub fn of(txn: &OfflineTransaction, reason: impl Into<String>) -> Self {
        SyncFailure {
            client_transaction_id: txn.client_transaction_id.clone(),
            tx_type: txn.tx_type,
            amount: txn.amount,
            reason: reason.into(),
        }
    }
}

/// Aggregate outcome of one sync call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub success: bool,
    pub message: String,
    pub synced_transactions: Vec<SyncedTransaction>,
    pub failures: Vec<SyncFailure>,
}

impl SyncResult {
    /// A successful result with no per-item entries
    pub fn success(message: impl Into<String>) -> Self {
        SyncResult {
            success: true,
            message: message.into(),
            synced_transactions: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// A failed result with no per-item entries
    pub fn failure(message: impl Into<String>) -> Self {
        SyncResult {
            success: false,
            message: message.into(),
            synced_transactions: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Result of a completed pass
    ///
    /// Succeeds when nothing failed, or when at least one item synced.
    pub fn from_pass(synced: Vec<SyncedTransaction>, failures: Vec<SyncFailure>) -> Self {
        let (success, message) = if failures.is_empty() {
            (true, "All transactions synced")
        } else {
            (!synced.is_empty(), "Partial sync")
        };
        SyncResult {
            success,
            message: message.to_string(),
            synced_transactions: synced,
            failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_canonical_payload_layout() {
        let txn = OfflineTransaction::signed_transfer(
            "OFFLINE_1700000000000_ab12",
            "USR_1_2",
            Decimal::from(500),
            1_700_000_000_000,
        );
        assert_eq!(
            txn.canonical_payload(),
            "OFFLINE_1700000000000_ab12|TRANSFER|500.0|1700000000000|USR_1_2"
        );
        assert_eq!(
            txn.signature,
            "379f045afa0e622d07944c01ecfbb1a368abea7e8cf6d54b568f7aa424107a28"
        );
    }

    #[test]
    fn test_client_signed_fractional_amount_verifies() {
        let json = r#"{
            "clientTransactionId": "C9",
            "type": "TRANSFER",
            "receiverId": "USR_1_2",
            "amount": 25.5,
            "clientTimestamp": 1000,
            "signature": "e2a06d4ca87ff8db2738375d5549249a8cd1e64f822bee1c534040a2e4f40157"
        }"#;
        let txn: OfflineTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(txn.canonical_payload(), "C9|TRANSFER|25.5|1000|USR_1_2");
        assert!(txn.verify_integrity());
    }

    #[test]
    fn test_missing_receiver_renders_empty() {
        let mut txn =
            OfflineTransaction::signed_transfer("C1", "USR_1_2", Decimal::from_str("1.5").unwrap(), 7);
        txn.receiver_id = None;
        assert_eq!(txn.canonical_payload(), "C1|TRANSFER|1.5|7|");
    }

    #[test]
    fn test_signature_is_sha256_hex() {
        let txn = OfflineTransaction::signed_transfer("C1", "USR_1_2", Decimal::ONE, 1);
        assert_eq!(txn.signature.len(), 64);
        assert!(txn.signature.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(txn.verify_integrity());
    }

    #[test]
    fn test_tampered_amount_fails_integrity() {
        let mut txn = OfflineTransaction::signed_transfer("C1", "USR_1_2", Decimal::ONE, 1);
        txn.amount = Decimal::from(1000);
        assert!(!txn.verify_integrity());
    }

    #[test]
    fn test_wire_shape_deserializes() {
        let json = r#"{
            "clientTransactionId": "C9",
            "type": "TRANSFER",
            "receiverId": "USR_1_2",
            "amount": 25.5,
            "clientTimestamp": 1000,
            "signature": "abc"
        }"#;
        let txn: OfflineTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(txn.tx_type, TransactionType::Transfer);
        assert_eq!(txn.amount, Decimal::from_str("25.5").unwrap());
        assert_eq!(txn.receiver_id.as_deref(), Some("USR_1_2"));
    }

    #[test]
    fn test_sync_result_wire_shape() {
        let result = SyncResult::from_pass(
            vec![],
            vec![SyncFailure {
                client_transaction_id: "C1".to_string(),
                tx_type: TransactionType::Transfer,
                amount: Decimal::from(5),
                reason: "Integrity check failed".to_string(),
            }],
        );
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["message"], "Partial sync");
        assert_eq!(value["syncedTransactions"].as_array().unwrap().len(), 0);
        assert_eq!(value["failures"][0]["clientTransactionId"], "C1");
        assert_eq!(value["failures"][0]["type"], "TRANSFER");
        assert_eq!(value["failures"][0]["amount"], 5.0);
        assert_eq!(value["failures"][0]["reason"], "Integrity check failed");
    }

    #[test]
    fn test_synced_entry_echoes_rounded_amount() {
        let txn = OfflineTransaction::signed_transfer(
            "C1",
            "USR_1_2",
            Decimal::from_str("100.004").unwrap(),
            1,
        );
        let synced = SyncedTransaction::of(&txn, "TXN_1_1", Decimal::from(900));
        assert_eq!(synced.amount, Decimal::from_str("100.00").unwrap());
        assert_eq!(synced.server_transaction_id, "TXN_1_1");
    }
}
