//! C3 — Wallet Session Store.
//!
//! Records which skills a wallet has already paid for, so a wallet that
//! settled a payment once is not asked to pay again, per `spec.md` §4.3.
//! Wallet addresses are normalized to lowercase on every lookup and insert —
//! EVM addresses are case-insensitive but checksummed addresses vary in
//! case, and the spec requires a single canonical key.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::model::session::Session;

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn restore(sessions: HashMap<String, Session>) -> Self {
        SessionStore {
            sessions: RwLock::new(sessions),
        }
    }

    /// Marks `skill_id` as paid-for by `wallet`, from this moment on.
    pub async fn record_payment(&self, wallet: &str, skill_id: &str) {
        let key = wallet.to_lowercase();
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(key).or_insert_with(|| Session {
            paid_skills: Default::default(),
            last_payment_at: Utc::now(),
        });
        session.paid_skills.insert(skill_id.to_string());
        session.last_payment_at = Utc::now();
    }

    /// Whether `wallet` has already paid for `skill_id` in a prior session.
    pub async fn has_paid(&self, wallet: &str, skill_id: &str) -> bool {
        let key = wallet.to_lowercase();
        let sessions = self.sessions.read().await;
        sessions.get(&key).is_some_and(|s| s.paid_skills.contains(skill_id))
    }

    pub async fn snapshot(&self) -> HashMap<String, Session> {
        self.sessions.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unpaid_wallet_has_not_paid() {
        let store = SessionStore::new();
        assert!(!store.has_paid("0xABC", "screenshot").await);
    }

    #[tokio::test]
    async fn paying_normalizes_wallet_case_on_both_write_and_read() {
        let store = SessionStore::new();
        store.record_payment("0xABCDEF", "screenshot").await;
        assert!(store.has_paid("0xabcdef", "screenshot").await);
        assert!(!store.has_paid("0xabcdef", "markdown-to-pdf").await);
    }
}
