use hashbrown::HashMap;

use crate::combat::category::Category;
use crate::combat::ParticipantId;

/// Preferred combat category per participant, independent of PvP state.
///
/// Entries survive disconnects so a participant who rejoins keeps their
/// preference; only administrative removal or shutdown drops them.
#[derive(Debug, Default)]
pub struct ModeRegistry {
    preferences: HashMap<ParticipantId, Category>,
}

impl ModeRegistry {
    pub fn new() -> Self {
        Self {
            preferences: HashMap::new(),
        }
    }

    /// Store a preference. Does not apply anything.
    pub fn set_preference(&mut self, id: ParticipantId, category: Category) {
        self.preferences.insert(id, category);
    }

    /// Stored preference, `Traditional` when the participant is unknown
    pub fn preference(&self, id: ParticipantId) -> Category {
        self.preferences.get(&id).copied().unwrap_or_default()
    }

    /// Administrative removal
    pub fn remove(&mut self, id: ParticipantId) -> Option<Category> {
        self.preferences.remove(&id)
    }

    /// Number of stored preferences
    pub fn count(&self) -> usize {
        self.preferences.len()
    }

    /// Number of participants preferring the fast category
    pub fn fast_count(&self) -> usize {
        self.preferences.values().filter(|c| c.is_fast()).count()
    }

    pub fn clear(&mut self) {
        self.preferences.clear();
    }
}
