//! Combat-mode state machine
//!
//! Per-participant category preference, PvP window detection with a debounced
//! timeout, and death-triggered proximity propagation. All mutation goes
//! through [`controller::CombatModeController`].

pub mod category;
pub mod controller;
pub mod proximity;
pub mod registry;
pub mod session;
pub mod timeout;

/// Stable participant identity for the lifetime of a connection
pub type ParticipantId = uuid::Uuid;

pub use category::Category;
pub use controller::{CombatModeController, StatusSnapshot};
