//! A2 — Telemetry.
//!
//! The teacher's `telemetry.rs` wires a full OpenTelemetry OTLP exporter
//! stack behind an env-driven on/off switch. This gateway has no metrics or
//! trace-export requirement, so that stack is dropped (see `DESIGN.md`) in
//! favor of the teacher's fallback branch: a plain `tracing_subscriber`
//! registry with an `EnvFilter`, defaulting to `info` when `RUST_LOG` is
//! unset.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes the global `tracing` subscriber. Call once, at process start.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(tracing_subscriber::fmt::layer()).init();
}
