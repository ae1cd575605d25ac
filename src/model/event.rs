//! Payment event log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    PaymentRequired,
    PaymentReceived,
    PaymentVerified,
    PaymentSettled,
    PaymentRejected,
    SiwxAccess,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub kind: EventKind,
    pub task_id: String,
    pub skill: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(
        kind: EventKind,
        task_id: impl Into<String>,
        skill: impl Into<String>,
        wallet: Option<String>,
        network: Option<String>,
    ) -> Self {
        Event {
            kind,
            task_id: task_id.into(),
            skill: skill.into(),
            wallet,
            network,
            timestamp: Utc::now(),
        }
    }
}
