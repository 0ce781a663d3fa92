//! Crossplay Combat Library
//!
//! Per-participant combat-mode selection for mixed client populations.
//! Fast-client participants get a high attack speed outside of fights and are
//! forced onto traditional combat while inside a PvP window.
//!
//! # Features
//!
//! - `metrics_server` - Serve Prometheus/JSON metrics over HTTP from the binary (enabled by default)

pub mod config;
pub mod util;
pub mod combat;
pub mod host;
pub mod events;
pub mod console;
pub mod metrics;
