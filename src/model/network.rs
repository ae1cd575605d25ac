//! Known blockchain networks and CAIP-2 chain ID handling.
//!
//! Mirrors the teacher's `networks.rs`/`known.rs` registry pattern, scoped to
//! the EVM (`eip155`) namespace this gateway actually settles on.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A CAIP-2 chain identifier of the form `eip155:<chain-number>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(String);

#[derive(Debug, thiserror::Error)]
pub enum ChainIdError {
    #[error("chain id {0:?} is not of the form eip155:<chain-number>")]
    BadFormat(String),
}

impl ChainId {
    pub fn new(reference: u64) -> Self {
        ChainId(format!("eip155:{reference}"))
    }

    pub fn parse(raw: &str) -> Result<Self, ChainIdError> {
        let reference = raw
            .strip_prefix("eip155:")
            .filter(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()));
        match reference {
            Some(_) => Ok(ChainId(raw.to_string())),
            None => Err(ChainIdError::BadFormat(raw.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One network this gateway accepts payment on.
#[derive(Debug, Clone, Serialize)]
pub struct Network {
    /// Short alias used only for internal bookkeeping (logs, stats).
    pub key: &'static str,
    /// CAIP-2 chain identifier, e.g. `eip155:8453`.
    pub caip2_id: ChainId,
    /// Stablecoin contract address accepted on this network.
    pub asset_address: &'static str,
    /// Whether settlement on this network is sponsored (no gas for the payer).
    pub gasless: bool,
    /// Wallet address this server controls, that receives settled payments.
    pub payee_address: &'static str,
}

/// The three enabled networks, in the order payment-requirements are listed.
///
/// Grounded on the teacher's `KNOWN_NETWORKS` static table (`networks.rs`),
/// narrowed to the three networks this gateway is configured for: Base
/// mainnet, Base Sepolia (gasless test network), and Polygon.
pub static NETWORKS: once_cell::sync::Lazy<Vec<Network>> = once_cell::sync::Lazy::new(|| {
    vec![
        Network {
            key: "base",
            caip2_id: ChainId::new(8453),
            asset_address: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
            gasless: false,
            payee_address: "0x000000000000000000000000000000000000A1",
        },
        Network {
            key: "base-sepolia",
            caip2_id: ChainId::new(84532),
            asset_address: "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
            gasless: true,
            payee_address: "0x000000000000000000000000000000000000A1",
        },
        Network {
            key: "polygon",
            caip2_id: ChainId::new(137),
            asset_address: "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359",
            gasless: false,
            payee_address: "0x000000000000000000000000000000000000A1",
        },
    ]
});

pub fn enabled_networks() -> &'static [Network] {
    &NETWORKS
}

pub fn by_chain_id(chain_id: &ChainId) -> Option<&'static Network> {
    NETWORKS.iter().find(|n| &n.caip2_id == chain_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_chain_ids() {
        assert!(ChainId::parse("eip155:8453").is_ok());
        assert!(ChainId::parse("eip155:1").is_ok());
    }

    #[test]
    fn rejects_malformed_chain_ids() {
        assert!(ChainId::parse("eip155:").is_err());
        assert!(ChainId::parse("solana:8453").is_err());
        assert!(ChainId::parse("8453").is_err());
    }

    #[test]
    fn enabled_networks_has_three_entries_with_one_gasless() {
        let networks = enabled_networks();
        assert_eq!(networks.len(), 3);
        assert_eq!(networks.iter().filter(|n| n.gasless).count(), 1);
    }

    #[test]
    fn looks_up_network_by_chain_id() {
        let base_sepolia = ChainId::new(84532);
        let network = by_chain_id(&base_sepolia).expect("known network");
        assert_eq!(network.key, "base-sepolia");
        assert!(network.gasless);
    }
}
