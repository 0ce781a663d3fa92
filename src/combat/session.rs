use hashbrown::HashMap;
use tokio::time::Instant;

use crate::combat::ParticipantId;

/// An open PvP window for one participant
#[derive(Debug, Clone)]
pub struct PvpSession {
    /// Most recent participant who damaged this one
    pub last_attacker: Option<ParticipantId>,
    /// When the window first opened
    pub entered_at: Instant,
}

impl PvpSession {
    fn new(last_attacker: Option<ParticipantId>) -> Self {
        Self {
            last_attacker,
            entered_at: Instant::now(),
        }
    }

    /// Time since the window first opened
    pub fn age(&self) -> std::time::Duration {
        self.entered_at.elapsed()
    }
}

/// Tracks which participants are inside an active PvP window.
///
/// A participant is Active exactly while it has an entry; `exit` removes it.
#[derive(Debug, Default)]
pub struct PvpSessionTracker {
    sessions: HashMap<ParticipantId, PvpSession>,
}

impl PvpSessionTracker {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }

    /// Mark a participant Active. Returns true only for a fresh Idle -> Active transition.
    ///
    /// A provided attacker overwrites the previous one; `None` keeps it.
    pub fn enter(&mut self, id: ParticipantId, attacker: Option<ParticipantId>) -> bool {
        match self.sessions.get_mut(&id) {
            Some(session) => {
                if attacker.is_some() {
                    session.last_attacker = attacker;
                }
                false
            }
            None => {
                self.sessions.insert(id, PvpSession::new(attacker));
                true
            }
        }
    }

    /// Back to Idle. Idempotent; returns whether the participant was Active.
    pub fn exit(&mut self, id: ParticipantId) -> bool {
        self.sessions.remove(&id).is_some()
    }

    pub fn is_active(&self, id: ParticipantId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn last_attacker(&self, id: ParticipantId) -> Option<ParticipantId> {
        self.sessions.get(&id).and_then(|s| s.last_attacker)
    }

    pub fn get(&self, id: ParticipantId) -> Option<&PvpSession> {
        self.sessions.get(&id)
    }

    /// Drop a departing participant from every other session's attacker slot
    pub fn forget_attacker(&mut self, attacker: ParticipantId) -> usize {
        let mut cleared = 0;
        for session in self.sessions.values_mut() {
            if session.last_attacker == Some(attacker) {
                session.last_attacker = None;
                cleared += 1;
            }
        }
        cleared
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_enter_reports_fresh_entry_once() {
        let mut tracker = PvpSessionTracker::new();
        let id = Uuid::new_v4();

        assert!(tracker.enter(id, None));
        assert!(!tracker.enter(id, None));
        assert!(tracker.is_active(id));
        assert_eq!(tracker.active_count(), 1);
    }

    #[test]
    fn test_most_recent_attacker_wins() {
        let mut tracker = PvpSessionTracker::new();
        let victim = Uuid::new_v4();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        tracker.enter(victim, Some(first));
        assert_eq!(tracker.last_attacker(victim), Some(first));

        tracker.enter(victim, Some(second));
        assert_eq!(tracker.last_attacker(victim), Some(second));

        // Entering as an attacker does not erase who hit us last
        tracker.enter(victim, None);
        assert_eq!(tracker.last_attacker(victim), Some(second));
    }

    #[test]
    fn test_exit_is_idempotent() {
        let mut tracker = PvpSessionTracker::new();
        let id = Uuid::new_v4();

        assert!(!tracker.exit(id));
        tracker.enter(id, Some(Uuid::new_v4()));
        assert!(tracker.exit(id));
        assert!(!tracker.exit(id));
        assert!(!tracker.is_active(id));
        assert!(tracker.last_attacker(id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_age_measured_from_first_entry() {
        let mut tracker = PvpSessionTracker::new();
        let id = Uuid::new_v4();
        assert!(tracker.get(id).is_none());

        tracker.enter(id, None);
        tokio::time::advance(std::time::Duration::from_secs(4)).await;
        tracker.enter(id, Some(Uuid::new_v4()));
        tokio::time::advance(std::time::Duration::from_secs(3)).await;

        let age = tracker.get(id).map(|s| s.age()).unwrap();
        assert_eq!(age, std::time::Duration::from_secs(7));
    }

    #[test]
    fn test_forget_attacker() {
        let mut tracker = PvpSessionTracker::new();
        let attacker = Uuid::new_v4();
        let v1 = Uuid::new_v4();
        let v2 = Uuid::new_v4();
        let other = Uuid::new_v4();

        tracker.enter(v1, Some(attacker));
        tracker.enter(v2, Some(attacker));
        tracker.enter(other, Some(v1));

        assert_eq!(tracker.forget_attacker(attacker), 2);
        assert!(tracker.last_attacker(v1).is_none());
        assert!(tracker.last_attacker(v2).is_none());
        assert_eq!(tracker.last_attacker(other), Some(v1));
        // Sessions stay open
        assert_eq!(tracker.active_count(), 3);
    }
}
