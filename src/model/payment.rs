//! Payment wire types: requirements, payloads, and receipts.
//!
//! Field shapes are grounded on the teacher's `types.rs`/`proto/v1.rs`
//! (`PaymentRequirements`, `PaymentPayload`, `VerifyResponse`/`SettleResponse`),
//! narrowed to the single `exact` scheme and the fields `spec.md` §3/§6.3
//! actually puts on the wire.

use serde::{Deserialize, Serialize};

use crate::model::network::ChainId;
use crate::model::skill::Skill;

/// Maximum time, in seconds, a client has to submit payment after requirements
/// are issued. Fixed per `spec.md` §3.
pub const MAX_TIMEOUT_SECONDS: u64 = 600;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptEntry {
    pub scheme: &'static str,
    pub network: String,
    pub asset: String,
    pub pay_to: String,
    pub max_amount_required: String,
    pub max_timeout_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gasless: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionsDescriptor {
    pub session_auth: SessionAuthExtension,
    pub idempotent_payment: IdempotentPaymentExtension,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAuthExtension {
    pub supported: bool,
    pub description: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdempotentPaymentExtension {
    pub supported: bool,
    pub description: &'static str,
}

impl Default for ExtensionsDescriptor {
    fn default() -> Self {
        ExtensionsDescriptor {
            session_auth: SessionAuthExtension {
                supported: true,
                description: "A wallet that has already paid for a skill is not charged again.",
            },
            idempotent_payment: IdempotentPaymentExtension {
                supported: true,
                description: "Resubmitting the same task-id with a payment is a no-op past completion.",
            },
        }
    }
}

/// The canonical payment-requirements object for a priced skill.
///
/// Built deterministically from a skill and the enabled network catalogue —
/// see [`crate::requirements::build`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    pub version: &'static str,
    pub accepts: Vec<AcceptEntry>,
    pub resource: String,
    pub extensions: ExtensionsDescriptor,
}

impl PaymentRequirements {
    pub fn for_skill(skill: &Skill) -> Option<Self> {
        crate::requirements::build(skill)
    }
}

/// Client-supplied payment payload, attached to a submission's metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    pub network: String,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
    pub from: String,
}

fn default_scheme() -> String {
    "exact".to_string()
}

impl PaymentPayload {
    pub fn chain_id(&self) -> Result<ChainId, crate::model::network::ChainIdError> {
        ChainId::parse(&self.network)
    }
}

/// Settlement outcome, emitted on task completion or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    pub network: String,
    pub payer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

impl Receipt {
    pub fn success(transaction: String, network: String, payer: String) -> Self {
        Receipt {
            success: true,
            transaction: Some(transaction),
            network,
            payer,
            error_reason: None,
        }
    }

    pub fn failure(network: String, payer: String, error_reason: String) -> Self {
        Receipt {
            success: false,
            transaction: None,
            network,
            payer,
            error_reason: Some(error_reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::skill;

    #[test]
    fn priced_skill_requirements_list_every_network() {
        let skill = skill::by_id("screenshot").unwrap();
        let requirements = PaymentRequirements::for_skill(skill).expect("priced skill");
        assert_eq!(
            requirements.accepts.len(),
            crate::model::network::enabled_networks().len()
        );
        assert_eq!(requirements.resource, "/screenshot");
    }

    #[test]
    fn free_skill_has_no_requirements() {
        let skill = skill::by_id("markdown-to-html").unwrap();
        assert!(PaymentRequirements::for_skill(skill).is_none());
    }
}
