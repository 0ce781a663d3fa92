//! Host collaborators the combat core calls into
//!
//! The core never talks to the host simulation directly; everything it needs
//! (attribute changes, zone rules, presence and proximity, player notices,
//! client detection) goes through these traits.

pub mod detection;
pub mod world;

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::combat::category::Category;
use crate::combat::ParticipantId;
use crate::config::CombatConfig;
use crate::util::vec3::Vec3;

pub use detection::Detection;

/// Zone (world/region) identifier
pub type ZoneId = String;

/// Participants near a point, inline for the common small case
pub type Nearby = SmallVec<[ParticipantId; 8]>;

/// Where a participant is
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub zone: ZoneId,
    pub position: Vec3,
}

impl Location {
    pub fn new(zone: impl Into<ZoneId>, position: Vec3) -> Self {
        Self {
            zone: zone.into(),
            position,
        }
    }

    /// Same zone and within `radius`
    pub fn is_near(&self, other: &Location, radius: f64) -> bool {
        self.zone == other.zone && self.position.within(other.position, radius)
    }
}

/// Failures while realizing a category on the host
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApplyError {
    #[error("Participant {0} is not present on the host")]
    NotPresent(ParticipantId),
    #[error("Attack speed attribute unavailable: {0}")]
    AttributeUnavailable(String),
}

/// Failures while asking the companion integration about a client
#[derive(Debug, Clone, thiserror::Error)]
pub enum DetectError {
    #[error("Companion integration unavailable: {0}")]
    Unavailable(String),
    #[error("Participant {0} unknown to companion integration")]
    UnknownParticipant(ParticipantId),
}

/// Realizes a category on a participant (attack speed, indicator)
pub trait AttributeApplier: Send + Sync {
    fn apply(&self, id: ParticipantId, category: Category) -> Result<(), ApplyError>;
}

/// Whether PvP is allowed in a zone
pub trait ZonePolicy: Send + Sync {
    fn is_pvp_permitted(&self, zone: &str) -> bool;

    /// Pick up a reloaded configuration. Policies not backed by config ignore it.
    fn reload(&self, _config: &CombatConfig) {}
}

/// Connection state and proximity snapshots
pub trait PresenceQuery: Send + Sync {
    fn is_connected(&self, id: ParticipantId) -> bool;

    /// Connected participants within `radius` of `location`, at call time
    fn nearby_connected(&self, location: &Location, radius: f64) -> Nearby;

    /// Every connected participant
    fn connected(&self) -> Vec<ParticipantId>;
}

/// Player-facing notices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// Fast combat enabled on join
    Welcome,
    /// Forced onto traditional combat for a fair fight
    PvpEntered,
    /// Fight window over, preferred combat restored
    PvpExited,
    /// A nearby death re-armed this participant's fight window
    BystanderRefreshed,
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::Welcome => write!(f, "Controller-friendly combat enabled"),
            Notice::PvpEntered => write!(f, "PvP Mode > Temporary traditional combat for fair PvP"),
            Notice::PvpExited => write!(f, "PvE Mode > Controller-friendly combat restored"),
            Notice::BystanderRefreshed => write!(f, "PvP Mode > Fight window extended"),
        }
    }
}

/// Fire-and-forget delivery of notices
pub trait Notifier: Send + Sync {
    fn notify(&self, id: ParticipantId, notice: Notice);
}

/// Optional companion integration that knows each participant's client type
pub trait CompanionLookup: Send + Sync {
    fn is_fast_client(&self, id: ParticipantId) -> Result<bool, DetectError>;
}

/// Config-backed zone rules: per-zone overrides, then the default
#[derive(Debug)]
pub struct ZoneRules {
    table: RwLock<ZoneTable>,
}

#[derive(Debug)]
struct ZoneTable {
    default_enabled: bool,
    overrides: HashMap<String, bool>,
}

impl ZoneTable {
    fn from_config(config: &CombatConfig) -> Self {
        Self {
            default_enabled: config.pvp_default_enabled,
            overrides: config.pvp_zones.clone(),
        }
    }
}

impl ZoneRules {
    pub fn from_config(config: &CombatConfig) -> Self {
        Self {
            table: RwLock::new(ZoneTable::from_config(config)),
        }
    }
}

impl ZonePolicy for ZoneRules {
    fn is_pvp_permitted(&self, zone: &str) -> bool {
        let table = self.table.read();
        table
            .overrides
            .get(zone)
            .copied()
            .unwrap_or(table.default_enabled)
    }

    fn reload(&self, config: &CombatConfig) {
        *self.table.write() = ZoneTable::from_config(config);
    }
}

/// Everything the controller needs from the host, resolved once at startup
#[derive(Clone)]
pub struct Collaborators {
    pub applier: Arc<dyn AttributeApplier>,
    pub zones: Arc<dyn ZonePolicy>,
    pub presence: Arc<dyn PresenceQuery>,
    pub notifier: Arc<dyn Notifier>,
    pub detection: Detection,
}

impl Collaborators {
    /// Wire every collaborator to one in-memory world
    pub fn from_world(world: Arc<world::InMemoryWorld>, config: &CombatConfig) -> Self {
        Self {
            applier: world.clone(),
            zones: Arc::new(ZoneRules::from_config(config)),
            presence: world.clone(),
            notifier: world,
            detection: Detection::resolve(None, config),
        }
    }
}
