//! Wallet-session records: a prior settlement entitles free future access.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Wire shape matches `spec.md` §6.4's persisted-snapshot format
/// (`{ skills, lastPayment }`), not the `paidSkills`/`lastPaymentAt` naming
/// used in prose elsewhere in the spec — the snapshot file is the only place
/// this type is ever serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "skills")]
    pub paid_skills: HashSet<String>,
    #[serde(rename = "lastPayment")]
    pub last_payment_at: DateTime<Utc>,
}
