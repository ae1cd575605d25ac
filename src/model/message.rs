//! Message schema for the JSON-RPC surface.
//!
//! Per the Design Notes in `spec.md` §9, message parts are modeled as a
//! tagged variant rather than the source's free-form metadata bag, and
//! unknown metadata keys are preserved in a pass-through map so round-trip
//! equality holds for fields this gateway doesn't interpret.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::payment::PaymentPayload;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Part {
    Text { text: String },
    Data { data: Value },
    File { name: String, mime: String, bytes: String },
}

impl Part {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// The six x402 payment substates a task can be tagged with, per `spec.md` §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentStatus {
    PaymentRequired,
    PaymentSubmitted,
    PaymentVerified,
    PaymentCompleted,
    PaymentFailed,
    PaymentRejected,
}

/// Typed payment fields lifted out of `message.metadata`, serialized back
/// onto the same flat wire keys the x402 JSON-RPC extension expects
/// (`x402.payment.status`, `x402.payment.payload`, `x402.siwx.wallet`,
/// `x402.payer`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentMetadata {
    #[serde(rename = "x402.payment.status", skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
    #[serde(rename = "x402.payment.payload", skip_serializing_if = "Option::is_none")]
    pub payload: Option<PaymentPayload>,
    #[serde(rename = "x402.siwx.wallet", skip_serializing_if = "Option::is_none")]
    pub siwx_wallet: Option<String>,
    #[serde(rename = "x402.payer", skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    /// Unrecognized metadata keys, preserved verbatim for round-trip fidelity.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PaymentMetadata {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(v) => serde_json::from_value(v.clone()).unwrap_or_default(),
            None => PaymentMetadata::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.payload.is_none()
            && self.siwx_wallet.is_none()
            && self.payer.is_none()
            && self.extra.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_id: String,
    pub role: Role,
    #[serde(default = "default_kind")]
    pub kind: String,
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

fn default_kind() -> String {
    "message".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

impl Message {
    pub fn first_text(&self) -> Option<&str> {
        self.parts.iter().find_map(Part::as_text)
    }

    pub fn payment_metadata(&self) -> PaymentMetadata {
        PaymentMetadata::from_value(self.metadata.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_metadata_keys_round_trip() {
        let raw = serde_json::json!({
            "x402.payment.status": "payment-submitted",
            "caller.trace_id": "abc-123",
        });
        let metadata: PaymentMetadata = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(metadata.status, Some(PaymentStatus::PaymentSubmitted));
        let back = serde_json::to_value(&metadata).unwrap();
        assert_eq!(back["caller.trace_id"], "abc-123");
    }

    #[test]
    fn first_text_finds_the_text_part() {
        let message = Message {
            message_id: "m1".into(),
            role: Role::User,
            kind: "message".into(),
            parts: vec![
                Part::Data { data: serde_json::json!({}) },
                Part::Text { text: "hello".into() },
            ],
            task_id: None,
            context_id: None,
            metadata: None,
        };
        assert_eq!(message.first_text(), Some("hello"));
    }
}
