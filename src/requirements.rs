//! C2 — Payment-Requirements Builder.
//!
//! Deterministic construction of a [`PaymentRequirements`] for a priced
//! skill, listing every enabled network. Grounded on the teacher's
//! `Facilitator::supported` style of deriving wire objects from static
//! catalogues (`networks.rs`).

use crate::model::network::enabled_networks;
use crate::model::payment::{AcceptEntry, ExtensionsDescriptor, PaymentRequirements, MAX_TIMEOUT_SECONDS};
use crate::model::skill::Skill;

/// Builds the `accepts` list and wraps it with the fixed extensions
/// descriptor, or returns `None` for a free skill (caller takes the
/// free-execution path).
pub fn build(skill: &Skill) -> Option<PaymentRequirements> {
    if !skill.requires_payment() {
        return None;
    }
    let accepts = enabled_networks()
        .iter()
        .map(|network| AcceptEntry {
            scheme: "exact",
            network: network.caip2_id.as_str().to_string(),
            asset: network.asset_address.to_string(),
            pay_to: network.payee_address.to_string(),
            max_amount_required: skill.price_smallest_unit.to_string(),
            max_timeout_seconds: MAX_TIMEOUT_SECONDS,
            gasless: network.gasless.then_some(true),
        })
        .collect();
    Some(PaymentRequirements {
        version: "2.0",
        accepts,
        resource: format!("/{}", skill.id),
        extensions: ExtensionsDescriptor::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::skill;

    #[test]
    fn gasless_flag_only_on_gasless_network() {
        let s = skill::by_id("ai-analysis").unwrap();
        let requirements = build(s).unwrap();
        let gasless_entries: Vec<_> = requirements
            .accepts
            .iter()
            .filter(|a| a.gasless == Some(true))
            .collect();
        assert_eq!(gasless_entries.len(), 1);
        assert_eq!(gasless_entries[0].network, "eip155:84532");
    }

    #[test]
    fn amount_is_decimal_smallest_unit_string() {
        let s = skill::by_id("screenshot").unwrap();
        let requirements = build(s).unwrap();
        for accept in &requirements.accepts {
            assert_eq!(accept.max_amount_required, "10000");
        }
    }
}
