//! Pay-per-request agent gateway.
//!
//! Mediates between calling agents and skill executors over two parallel
//! surfaces — a JSON-RPC envelope modeled on the A2A task protocol, and a
//! plain HTTP-402 REST surface per skill — pricing access in stablecoin on
//! a handful of EVM-compatible networks. A wallet that has already settled
//! a payment is not asked to pay again for the same skill.

pub mod config;
pub mod discovery;
pub mod executor;
pub mod extensions;
pub mod facilitator;
pub mod model;
pub mod parser;
pub mod requirements;
pub mod rest;
pub mod rpc;
pub mod sig_down;
pub mod state;
pub mod state_machine;
pub mod telemetry;
