//! C11 — Facilitator Adapter.
//!
//! Narrow interface to an external payment facilitator. Grounded on the
//! teacher's `Facilitator` trait (`facilitator.rs`): a small async interface
//! with an associated error type, kept deliberately narrow so a production
//! implementation (an out-of-process call to a real facilitator) can swap
//! in without touching the state machine.

use rand::RngCore;

use crate::model::payment::{PaymentPayload, PaymentRequirements};

#[derive(Debug, thiserror::Error)]
pub enum FacilitatorError {
    #[error("payment network {0} is not among the accepted requirements")]
    NetworkMismatch(String),
}

/// Verifies and settles a payment payload, returning a settlement
/// transaction id.
///
/// `spec.md` §1 treats on-chain signature verification and settlement as an
/// external collaborator: a submitted payment payload is assumed
/// cryptographically valid, and this adapter only needs to synthesise a
/// receipt identifier (or, in a real deployment, call out to a facilitator
/// service).
pub trait Facilitator: Send + Sync {
    fn verify_and_settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<String, FacilitatorError>;
}

/// Default in-process facilitator used when no external facilitator is
/// configured (test mode, per `spec.md` §4.10). Accepts any payload whose
/// network matches one of the requirements' accepted networks, and returns a
/// freshly generated opaque 32-byte identifier rendered as `0x`-prefixed hex.
#[derive(Debug, Default, Clone, Copy)]
pub struct TestModeFacilitator;

impl Facilitator for TestModeFacilitator {
    fn verify_and_settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<String, FacilitatorError> {
        let accepted = requirements.accepts.iter().any(|a| a.network == payload.network);
        if !accepted {
            return Err(FacilitatorError::NetworkMismatch(payload.network.clone()));
        }
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        Ok(format!("0x{}", hex::encode(bytes)))
    }
}
