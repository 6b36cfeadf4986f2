//! Capability traits consumed by the ledger core
//!
//! The core never talks to disks, credential stores or the wall clock
//! directly. Each of those collaborators is injected behind one of the
//! traits below so tests can substitute deterministic implementations.

use crate::types::{Account, LedgerSnapshot, UserId, WalletError};

/// Lookup of registered users
pub trait UserDirectory: Send + Sync {
    /// Get a copy of the account with the given user id
    fn get_user(&self, user_id: &str) -> Option<Account>;

    /// Get a copy of the account registered under the given username
    fn get_user_by_username(&self, username: &str) -> Option<Account>;
}

/// Durable storage of ledger snapshots
///
/// The format is opaque to the core. `save` is called synchronously after
/// every committed mutation, so implementations must complete in bounded
/// time.
pub trait SnapshotStore: Send + Sync {
    /// Replace the stored snapshot
    fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), WalletError>;

    /// Load the stored snapshot, `None` if nothing was saved yet
    fn load(&self) -> Result<Option<LedgerSnapshot>, WalletError>;
}

/// Credential hashing and session tokens
pub trait SecurityProvider: Send + Sync {
    fn hash_pin(&self, pin: &str) -> String;

    fn verify_pin(&self, pin: &str, hash: &str) -> bool;

    /// Start a session for the user and return its token
    fn issue_token(&self, user_id: &str) -> String;

    /// Resolve a token to its user, `None` if unknown or expired
    fn validate_token(&self, token: &str) -> Option<UserId>;

    fn invalidate_token(&self, token: &str);
}

/// Source of the current time in epoch milliseconds
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}
