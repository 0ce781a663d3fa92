use crate::combat::session::PvpSessionTracker;
use crate::combat::ParticipantId;
use crate::config::CombatConfig;
use crate::host::{Location, Nearby, PresenceQuery};

/// Finds bystanders whose fight window must be re-armed when someone dies.
///
/// A death ends the victim's window immediately, but survivors nearby may
/// still be fighting a third party; they get a full timeout reset instead of
/// reading the death as the end of their own fight.
#[derive(Debug, Clone, Copy)]
pub struct ProximityNotifier {
    pub radius: f64,
    pub notify_bystanders: bool,
}

impl ProximityNotifier {
    pub fn new(radius: f64, notify_bystanders: bool) -> Self {
        Self {
            radius,
            notify_bystanders,
        }
    }

    pub fn from_config(config: &CombatConfig) -> Self {
        Self::new(config.death_radius, config.notify_bystanders)
    }

    /// Connected participants within radius of the death, excluding the
    /// victim, that are currently inside a PvP window
    pub fn bystanders(
        &self,
        victim: ParticipantId,
        location: &Location,
        presence: &dyn PresenceQuery,
        sessions: &PvpSessionTracker,
    ) -> Nearby {
        presence
            .nearby_connected(location, self.radius)
            .into_iter()
            .filter(|id| *id != victim && sessions.is_active(*id))
            .collect()
    }
}
