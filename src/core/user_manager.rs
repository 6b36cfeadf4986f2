//! User registration and login
//!
//! This module provides the `UserManager`, which creates accounts in the
//! ledger and starts sessions through the security capability.
//!
//! # Registration Rules
//!
//! - Usernames must be non-blank (surrounding whitespace is trimmed) and unique
//! - PINs must be exactly six ASCII digits
//! - New accounts start with an empty wallet and a simulated bank balance,
//!   random in `[50,000, 100,000)` unless one is given explicitly
//!
//! User ids have the form `USR_<epochMillis>_<counter>`; the counter resumes
//! past the highest id already in the ledger.

use crate::core::ledger::AccountLedger;
use crate::core::traits::{Clock, SecurityProvider, UserDirectory};
use crate::types::{money, Account, UserId, WalletError};
use rand::Rng;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Required PIN length
pub const PIN_LENGTH: usize = 6;

/// Lower bound of the random initial bank balance (inclusive, in cents)
const MIN_INITIAL_BANK_CENTS: i64 = 5_000_000;

/// Upper bound of the random initial bank balance (exclusive, in cents)
const MAX_INITIAL_BANK_CENTS: i64 = 10_000_000;

/// An authenticated session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub token: String,
}

/// Account registration and credential checks
pub struct UserManager {
    ledger: Arc<AccountLedger>,
    security: Arc<dyn SecurityProvider>,
    clock: Arc<dyn Clock>,
    counter: AtomicU64,
}

impl UserManager {
    pub fn new(
        ledger: Arc<AccountLedger>,
        security: Arc<dyn SecurityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let counter = AtomicU64::new(ledger.max_user_counter());
        UserManager {
            ledger,
            security,
            clock,
            counter,
        }
    }

    /// Register a user with a random initial bank balance
    ///
    /// # Errors
    ///
    /// - `InvalidUsername` if the username is blank
    /// - `InvalidPin` if the PIN is not six digits
    /// - `UsernameTaken` if the username is already registered
    pub fn register(&self, username: &str, pin: &str) -> Result<Account, WalletError> {
        let cents = rand::thread_rng().gen_range(MIN_INITIAL_BANK_CENTS..MAX_INITIAL_BANK_CENTS);
        self.register_with_bank_balance(username, pin, Decimal::new(cents, 2))
    }

    /// Register a user with an explicit initial bank balance
    pub fn register_with_bank_balance(
        &self,
        username: &str,
        pin: &str,
        bank_balance: Decimal,
    ) -> Result<Account, WalletError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(WalletError::InvalidUsername);
        }
        if !is_valid_pin(pin) {
            return Err(WalletError::InvalidPin);
        }

        let pin_hash = self.security.hash_pin(pin);
        let now = self.clock.now_millis();

        self.ledger.commit(|state, _| {
            if state.contains_username(username) {
                return Err(WalletError::UsernameTaken {
                    username: username.to_string(),
                });
            }
            let counter = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            let account = Account::new(
                format!("USR_{}_{}", now, counter),
                username.to_string(),
                pin_hash,
                money::round(bank_balance),
                now,
            );
            state.insert(account.clone())?;
            self.ledger.persist(state);

            info!(
                user_id = %account.user_id,
                username = %account.username,
                "user registered"
            );
            Ok(account)
        })
    }

    /// Check credentials and start a session
    ///
    /// # Errors
    ///
    /// - `UserNotFound` for an unknown username
    /// - `InvalidCredentials` if the PIN does not match
    pub fn login(&self, username: &str, pin: &str) -> Result<Session, WalletError> {
        let account = self
            .ledger
            .get_user_by_username(username.trim())
            .ok_or_else(|| WalletError::user_not_found(username))?;

        if !self.security.verify_pin(pin, &account.pin_hash) {
            warn!(username = %account.username, "login rejected: invalid PIN");
            return Err(WalletError::InvalidCredentials);
        }

        let token = self.security.issue_token(&account.user_id);
        Ok(Session {
            user_id: account.user_id,
            token,
        })
    }

    /// Resolve a session token to its user id
    pub fn authenticate(&self, token: &str) -> Result<UserId, WalletError> {
        self.security
            .validate_token(token)
            .ok_or(WalletError::Unauthorized)
    }

    /// Re-check the PIN of the user behind a live session
    ///
    /// Used to confirm sensitive actions without starting a new session.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if the token is unknown or expired
    /// - `UserNotFound` if the session's user no longer exists
    /// - `InvalidCredentials` if the PIN does not match
    pub fn verify_pin(&self, token: &str, pin: &str) -> Result<(), WalletError> {
        let user_id = self.authenticate(token)?;
        let account = self
            .ledger
            .get_user(&user_id)
            .ok_or_else(|| WalletError::user_not_found(&user_id))?;

        if !self.security.verify_pin(pin, &account.pin_hash) {
            warn!(user_id = %account.user_id, "PIN verification failed");
            return Err(WalletError::InvalidCredentials);
        }
        Ok(())
    }

    /// End a session
    pub fn logout(&self, token: &str) {
        self.security.invalidate_token(token);
    }
}

fn is_valid_pin(pin: &str) -> bool {
    pin.len() == PIN_LENGTH && pin.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::security::Sha256Security;
    use crate::io::snapshot_store::MemoryStore;
    use rstest::rstest;

    fn manager() -> UserManager {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let ledger = Arc::new(AccountLedger::new(Arc::new(MemoryStore::new())));
        UserManager::new(ledger, Arc::new(Sha256Security::new(clock.clone())), clock)
    }

    #[test]
    fn test_register_creates_account() {
        let manager = manager();
        let account = manager
            .register_with_bank_balance("alice", "123456", Decimal::from(60_000))
            .unwrap();

        assert_eq!(account.user_id, "USR_1700000000000_1");
        assert_eq!(account.username, "alice");
        assert_eq!(account.wallet_balance(), Decimal::ZERO);
        assert_eq!(account.bank_balance(), Decimal::from(60_000));
        assert_ne!(account.pin_hash, "123456");
    }

    #[test]
    fn test_register_random_bank_balance_in_range() {
        let manager = manager();
        for i in 0..20 {
            let account = manager.register(&format!("user{}", i), "000000").unwrap();
            assert!(account.bank_balance() >= Decimal::from(50_000));
            assert!(account.bank_balance() < Decimal::from(100_000));
        }
    }

    #[rstest]
    #[case::blank_username("   ", "123456", WalletError::InvalidUsername)]
    #[case::short_pin("alice", "12345", WalletError::InvalidPin)]
    #[case::long_pin("alice", "1234567", WalletError::InvalidPin)]
    #[case::non_digit_pin("alice", "12a456", WalletError::InvalidPin)]
    fn test_register_rejects_bad_input(
        #[case] username: &str,
        #[case] pin: &str,
        #[case] expected: WalletError,
    ) {
        assert_eq!(manager().register(username, pin).unwrap_err(), expected);
    }

    #[test]
    fn test_register_duplicate_username() {
        let manager = manager();
        manager.register("alice", "123456").unwrap();
        let err = manager.register(" alice ", "654321").unwrap_err();
        assert_eq!(err.to_string(), "Username already exists");
    }

    #[test]
    fn test_login_and_authenticate() {
        let manager = manager();
        let account = manager.register("alice", "123456").unwrap();

        let session = manager.login("alice", "123456").unwrap();
        assert_eq!(session.user_id, account.user_id);
        assert_eq!(manager.authenticate(&session.token).unwrap(), account.user_id);

        manager.logout(&session.token);
        assert_eq!(
            manager.authenticate(&session.token),
            Err(WalletError::Unauthorized)
        );
    }

    #[test]
    fn test_login_failures() {
        let manager = manager();
        manager.register("alice", "123456").unwrap();

        assert_eq!(
            manager.login("alice", "000000"),
            Err(WalletError::InvalidCredentials)
        );
        assert!(matches!(
            manager.login("bob", "123456"),
            Err(WalletError::UserNotFound { .. })
        ));
    }

    #[test]
    fn test_verify_pin_for_session() {
        let manager = manager();
        manager.register("alice", "123456").unwrap();
        let session = manager.login("alice", "123456").unwrap();

        assert_eq!(manager.verify_pin(&session.token, "123456"), Ok(()));
        assert_eq!(
            manager.verify_pin(&session.token, "654321"),
            Err(WalletError::InvalidCredentials)
        );
        assert_eq!(
            manager.verify_pin("bogus", "123456"),
            Err(WalletError::Unauthorized)
        );

        manager.logout(&session.token);
        assert_eq!(
            manager.verify_pin(&session.token, "123456"),
            Err(WalletError::Unauthorized)
        );
    }

    #[test]
    fn test_user_counter_resumes_after_reopen() {
        let clock = Arc::new(ManualClock::new(5));
        let store = Arc::new(MemoryStore::new());
        let security = Arc::new(Sha256Security::new(clock.clone()));

        let ledger = Arc::new(AccountLedger::new(store.clone()));
        let first = UserManager::new(ledger, security.clone(), clock.clone());
        first.register("alice", "123456").unwrap();
        first.register("bob", "123456").unwrap();

        let reopened = Arc::new(AccountLedger::open(store).unwrap());
        let second = UserManager::new(reopened, security, clock);
        let carol = second.register("carol", "123456").unwrap();
        assert_eq!(carol.user_id, "USR_5_3");
    }
}
