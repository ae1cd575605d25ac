//! Wire and domain types for the gateway: skills, networks, payments,
//! messages, tasks, events, and sessions.

pub mod event;
pub mod message;
pub mod network;
pub mod payment;
pub mod session;
pub mod skill;
pub mod task;
