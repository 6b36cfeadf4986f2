//! Default security capability
//!
//! `Sha256Security` hashes PINs with SHA-256 and hands out random session
//! tokens that expire after 24 hours. Expired sessions are pruned whenever a
//! new token is issued and are rejected on validation.

use super::traits::{Clock, SecurityProvider};
use crate::types::UserId;
use dashmap::DashMap;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Session lifetime in milliseconds
pub const TOKEN_EXPIRY_MS: i64 = 24 * 60 * 60 * 1000;

const TOKEN_LENGTH: usize = 32;

#[derive(Debug, Clone)]
struct Session {
    user_id: UserId,
    expires_at: i64,
}

/// SHA-256 PIN hashing with in-memory sessions
pub struct Sha256Security {
    sessions: DashMap<String, Session>,
    clock: Arc<dyn Clock>,
}

impl Sha256Security {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Sha256Security {
            sessions: DashMap::new(),
            clock,
        }
    }

    fn prune_expired(&self, now: i64) {
        self.sessions.retain(|_, session| session.expires_at >= now);
    }
}

impl SecurityProvider for Sha256Security {
    fn hash_pin(&self, pin: &str) -> String {
        hex::encode(Sha256::digest(pin.as_bytes()))
    }

    fn verify_pin(&self, pin: &str, hash: &str) -> bool {
        self.hash_pin(pin) == hash
    }

    fn issue_token(&self, user_id: &str) -> String {
        let mut bytes = [0u8; TOKEN_LENGTH];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        let now = self.clock.now_millis();
        self.sessions.insert(
            token.clone(),
            Session {
                user_id: user_id.to_string(),
                expires_at: now + TOKEN_EXPIRY_MS,
            },
        );
        self.prune_expired(now);
        token
    }

    fn validate_token(&self, token: &str) -> Option<UserId> {
        let now = self.clock.now_millis();
        let session = self.sessions.get(token).map(|entry| entry.value().clone())?;
        if now > session.expires_at {
            self.sessions.remove(token);
            return None;
        }
        Some(session.user_id)
    }

    fn invalidate_token(&self, token: &str) {
        self.sessions.remove(token);
    }
}
