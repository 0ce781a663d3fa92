//! In-memory host world
//!
//! Stands in for the host simulation: tracks who is connected and where,
//! what attack speed each participant currently has, and every notice sent.

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::combat::category::Category;
use crate::combat::ParticipantId;
use crate::config::CombatConfig;
use crate::host::{ApplyError, AttributeApplier, Location, Nearby, Notice, Notifier, PresenceQuery};

/// A participant as the host sees it
#[derive(Debug, Clone)]
pub struct WorldParticipant {
    pub id: ParticipantId,
    pub name: String,
    pub location: Location,
    pub connected: bool,
    /// Attack speed attribute base value
    pub attack_speed: f64,
    pub indicator_visible: bool,
    /// Last category realized on this participant
    pub applied: Option<Category>,
}

/// Host world kept in memory
pub struct InMemoryWorld {
    config: RwLock<CombatConfig>,
    participants: RwLock<HashMap<ParticipantId, WorldParticipant>>,
    notices: Mutex<Vec<(ParticipantId, Notice)>>,
}

impl InMemoryWorld {
    pub fn new(config: CombatConfig) -> Self {
        Self {
            config: RwLock::new(config),
            participants: RwLock::new(HashMap::new()),
            notices: Mutex::new(Vec::new()),
        }
    }

    /// Connect a participant (or reconnect a known one) at `location`
    pub fn connect(&self, id: ParticipantId, name: impl Into<String>, location: Location) {
        let name = name.into();
        let mut participants = self.participants.write();
        match participants.get_mut(&id) {
            Some(existing) => {
                existing.name = name;
                existing.location = location;
                existing.connected = true;
            }
            None => {
                participants.insert(
                    id,
                    WorldParticipant {
                        id,
                        name,
                        location,
                        connected: true,
                        attack_speed: self.config.read().traditional_attack_speed,
                        indicator_visible: true,
                        applied: None,
                    },
                );
            }
        }
    }

    /// Mark a participant offline. Their host record stays for a later rejoin.
    pub fn disconnect(&self, id: ParticipantId) -> bool {
        match self.participants.write().get_mut(&id) {
            Some(participant) if participant.connected => {
                participant.connected = false;
                true
            }
            _ => false,
        }
    }

    pub fn move_to(&self, id: ParticipantId, location: Location) -> bool {
        if let Some(participant) = self.participants.write().get_mut(&id) {
            participant.location = location;
            true
        } else {
            false
        }
    }

    pub fn participant(&self, id: ParticipantId) -> Option<WorldParticipant> {
        self.participants.read().get(&id).cloned()
    }

    pub fn location_of(&self, id: ParticipantId) -> Option<Location> {
        self.participants.read().get(&id).map(|p| p.location.clone())
    }

    /// Look up a participant by display name
    pub fn id_by_name(&self, name: &str) -> Option<ParticipantId> {
        self.participants
            .read()
            .values()
            .find(|p| p.name == name)
            .map(|p| p.id)
    }

    /// Swap in reloaded attack speeds and indicator settings. Takes effect
    /// on the next apply.
    pub fn reload_config(&self, config: CombatConfig) {
        *self.config.write() = config;
    }

    /// Notices delivered to one participant, oldest first
    pub fn notices_for(&self, id: ParticipantId) -> Vec<Notice> {
        self.notices
            .lock()
            .iter()
            .filter(|(target, _)| *target == id)
            .map(|(_, notice)| *notice)
            .collect()
    }
}

impl AttributeApplier for InMemoryWorld {
    fn apply(&self, id: ParticipantId, category: Category) -> Result<(), ApplyError> {
        let mut participants = self.participants.write();
        let participant = participants
            .get_mut(&id)
            .filter(|p| p.connected)
            .ok_or(ApplyError::NotPresent(id))?;

        let config = self.config.read();
        participant.attack_speed = category.attack_speed(&config);
        participant.indicator_visible = category.shows_indicator(&config);
        participant.applied = Some(category);

        debug!(
            "Applied {} combat to {} (attack speed {})",
            category, participant.name, participant.attack_speed
        );
        Ok(())
    }
}

impl PresenceQuery for InMemoryWorld {
    fn is_connected(&self, id: ParticipantId) -> bool {
        self.participants
            .read()
            .get(&id)
            .map(|p| p.connected)
            .unwrap_or(false)
    }

    fn nearby_connected(&self, location: &Location, radius: f64) -> Nearby {
        self.participants
            .read()
            .values()
            .filter(|p| p.connected && p.location.is_near(location, radius))
            .map(|p| p.id)
            .collect()
    }

    fn connected(&self) -> Vec<ParticipantId> {
        self.participants
            .read()
            .values()
            .filter(|p| p.connected)
            .map(|p| p.id)
            .collect()
    }
}

impl Notifier for InMemoryWorld {
    fn notify(&self, id: ParticipantId, notice: Notice) {
        if let Some(participant) = self.participants.read().get(&id) {
            info!("[{}] {}", participant.name, notice);
        }
        self.notices.lock().push((id, notice));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::vec3::Vec3;
    use uuid::Uuid;

    fn at(x: f64) -> Location {
        Location::new("overworld", Vec3::new(x, 64.0, 0.0))
    }

    #[test]
    fn test_connect_and_disconnect() {
        let world = InMemoryWorld::new(CombatConfig::default());
        let id = Uuid::new_v4();

        world.connect(id, "Steve", at(0.0));
        assert!(world.is_connected(id));
        assert_eq!(world.id_by_name("Steve"), Some(id));

        assert!(world.disconnect(id));
        assert!(!world.disconnect(id));
        assert!(!world.is_connected(id));
        assert!(world.connected().is_empty());

        world.connect(id, "Steve", at(5.0));
        assert!(world.is_connected(id));
    }

    #[test]
    fn test_apply_sets_attack_speed() {
        let world = InMemoryWorld::new(CombatConfig::default());
        let id = Uuid::new_v4();
        world.connect(id, ".Steve", at(0.0));

        world.apply(id, Category::Fast).unwrap();
        let p = world.participant(id).unwrap();
        assert_eq!(p.attack_speed, 1024.0);
        assert!(!p.indicator_visible);
        assert_eq!(p.applied, Some(Category::Fast));

        world.apply(id, Category::Traditional).unwrap();
        let p = world.participant(id).unwrap();
        assert_eq!(p.attack_speed, 4.0);
        assert!(p.indicator_visible);
    }

    #[test]
    fn test_apply_to_offline_fails() {
        let world = InMemoryWorld::new(CombatConfig::default());
        let id = Uuid::new_v4();

        assert!(matches!(
            world.apply(id, Category::Fast),
            Err(ApplyError::NotPresent(_))
        ));

        world.connect(id, "Alex", at(0.0));
        world.disconnect(id);
        assert!(world.apply(id, Category::Fast).is_err());
    }

    #[test]
    fn test_nearby_connected() {
        let world = InMemoryWorld::new(CombatConfig::default());
        let near = Uuid::new_v4();
        let far = Uuid::new_v4();
        let offline = Uuid::new_v4();
        let elsewhere = Uuid::new_v4();

        world.connect(near, "near", at(10.0));
        world.connect(far, "far", at(50.0));
        world.connect(offline, "offline", at(1.0));
        world.disconnect(offline);
        world.connect(
            elsewhere,
            "elsewhere",
            Location::new("nether", Vec3::new(0.0, 64.0, 0.0)),
        );

        let nearby = world.nearby_connected(&at(0.0), 20.0);
        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0], near);
    }

    #[test]
    fn test_notices_recorded() {
        let world = InMemoryWorld::new(CombatConfig::default());
        let id = Uuid::new_v4();
        world.connect(id, "Steve", at(0.0));

        world.notify(id, Notice::PvpEntered);
        world.notify(id, Notice::PvpExited);

        assert_eq!(world.notices_for(id), vec![Notice::PvpEntered, Notice::PvpExited]);
        assert!(world.notices_for(Uuid::new_v4()).is_empty());
    }

    #[test]
    fn test_reload_changes_next_apply() {
        let world = InMemoryWorld::new(CombatConfig::default());
        let id = Uuid::new_v4();
        world.connect(id, ".Steve", at(0.0));
        world.apply(id, Category::Fast).unwrap();

        let mut config = CombatConfig::default();
        config.fast_attack_speed = 16.0;
        world.reload_config(config);
        assert_eq!(world.participant(id).unwrap().attack_speed, 1024.0);

        world.apply(id, Category::Fast).unwrap();
        assert_eq!(world.participant(id).unwrap().attack_speed, 16.0);
    }
}
