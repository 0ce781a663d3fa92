//! Combat-mode controller
//!
//! Single owner of the mode registry, the PvP session table and the timeout
//! handles. Tick-loop events and timer firings both serialize on one mutex, so
//! no two threads ever observe or mutate the same participant's state at once.
//! Host collaborators are called while the lock is held, which keeps the order
//! of applied categories identical to the order of state transitions; they
//! must not call back into the controller.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::combat::category::Category;
use crate::combat::proximity::ProximityNotifier;
use crate::combat::registry::ModeRegistry;
use crate::combat::session::PvpSessionTracker;
use crate::combat::timeout::{TimeoutScheduler, TimeoutTicket};
use crate::combat::ParticipantId;
use crate::config::CombatConfig;
use crate::events::CombatEvent;
use crate::host::{Collaborators, Detection, Location, Notice};
use crate::metrics::Metrics;

/// Everything the controller owns, behind one lock
#[derive(Debug, Default)]
struct CombatState {
    registry: ModeRegistry,
    sessions: PvpSessionTracker,
    timeouts: TimeoutScheduler,
}

impl CombatState {
    /// PvP window wins over preference. Always recomputed, never stored.
    fn derived_category(&self, id: ParticipantId) -> Category {
        if self.sessions.is_active(id) {
            Category::Traditional
        } else {
            self.registry.preference(id)
        }
    }
}

/// Point-in-time view for status output
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub registered: usize,
    pub fast_preferences: usize,
    pub active_sessions: usize,
    pub armed_timeouts: usize,
    pub pvp_detection_enabled: bool,
    pub detection_source: &'static str,
    pub pvp_timeout_secs: u64,
}

struct Inner {
    config: RwLock<Arc<CombatConfig>>,
    host: Collaborators,
    metrics: Arc<Metrics>,
    state: Mutex<CombatState>,
}

/// Orchestrates category selection for every participant
#[derive(Clone)]
pub struct CombatModeController {
    inner: Arc<Inner>,
}

impl CombatModeController {
    pub fn new(config: CombatConfig, host: Collaborators, metrics: Arc<Metrics>) -> Self {
        Self::with_scheduler(config, host, metrics, TimeoutScheduler::new())
    }

    /// Controller whose timeouts run on a specific runtime
    pub fn with_scheduler(
        config: CombatConfig,
        host: Collaborators,
        metrics: Arc<Metrics>,
        timeouts: TimeoutScheduler,
    ) -> Self {
        info!(
            "Combat mode controller ready: PvP detection {}, timeout {}s, death radius {}",
            if config.pvp_detection_enabled { "ENABLED" } else { "DISABLED" },
            config.pvp_timeout.as_secs(),
            config.death_radius
        );
        Self {
            inner: Arc::new(Inner {
                config: RwLock::new(Arc::new(config)),
                host,
                metrics,
                state: Mutex::new(CombatState {
                    timeouts,
                    ..CombatState::default()
                }),
            }),
        }
    }

    /// Dispatch one inbound host event
    pub fn handle(&self, event: CombatEvent) {
        match event {
            CombatEvent::Join { id, name } => self.on_join(id, &name),
            CombatEvent::Quit { id } => self.on_quit(id),
            CombatEvent::Damage {
                attacker,
                victim,
                zone,
            } => {
                self.on_damage(attacker, victim, &zone);
            }
            CombatEvent::Death { id, location } => {
                self.on_death(id, &location);
            }
            CombatEvent::Swing { id } => {
                self.on_swing(id);
            }
        }
    }

    /// Participant joined: detect their client category and apply it
    pub fn on_join(&self, id: ParticipantId, name: &str) {
        Metrics::incr(&self.inner.metrics.joins);
        let config = self.config();

        // Detection happens outside the lock; the companion may be slow
        let detected = if config.detection_enabled {
            let detection = &self.inner.host.detection;
            let prefix = config.fast_name_prefix.as_str();
            Some(match detection.detect(id, name, prefix) {
                Ok(category) => category,
                Err(e) => {
                    warn!("Client detection failed for {}: {} - using name prefix", name, e);
                    Metrics::incr(&self.inner.metrics.detect_failures);
                    Detection::by_prefix(name, prefix)
                }
            })
        } else {
            None
        };

        let mut state = self.inner.state.lock();
        if let Some(category) = detected {
            state.registry.set_preference(id, category);
        }
        self.inner.apply_derived(&state, id);

        let preference = state.registry.preference(id);
        info!("{} joined with {} combat", name, preference);
        if preference.is_fast() && config.notifications_enabled {
            self.inner.host.notifier.notify(id, Notice::Welcome);
        }
        self.inner.refresh_gauges(&state);
    }

    /// Participant damaged another. Returns whether a PvP window was (re-)armed.
    pub fn on_damage(&self, attacker: ParticipantId, victim: ParticipantId, zone: &str) -> bool {
        if attacker == victim {
            return false;
        }

        let config = self.config();
        if !config.pvp_detection_enabled {
            return false;
        }
        if !self.inner.host.zones.is_pvp_permitted(zone) {
            debug!("PvP not permitted in zone '{}', ignoring {} -> {}", zone, attacker, victim);
            return false;
        }

        Metrics::incr(&self.inner.metrics.pvp_events);
        let mut state = self.inner.state.lock();

        for (id, attacked_by) in [(attacker, None), (victim, Some(attacker))] {
            if state.sessions.enter(id, attacked_by) {
                Metrics::incr(&self.inner.metrics.sessions_entered);
                debug!("{} entered PvP", id);
                if config.notifications_enabled && state.registry.preference(id).is_fast() {
                    self.inner.host.notifier.notify(id, Notice::PvpEntered);
                }
            }
            self.inner.apply_derived(&state, id);
            self.inner.arm_timeout(&mut state, id, config.pvp_timeout);
        }

        self.inner.refresh_gauges(&state);
        true
    }

    /// Participant died: close their window now and re-arm nearby fighters.
    /// Returns how many bystanders were re-armed.
    pub fn on_death(&self, victim: ParticipantId, location: &Location) -> usize {
        Metrics::incr(&self.inner.metrics.deaths);
        let config = self.config();
        let notifier = ProximityNotifier::from_config(&config);

        let mut state = self.inner.state.lock();
        self.inner.expire(&mut state, victim, &config);

        let bystanders = notifier.bystanders(
            victim,
            location,
            self.inner.host.presence.as_ref(),
            &state.sessions,
        );

        let mut rearmed = 0;
        for id in bystanders {
            if self.inner.arm_timeout(&mut state, id, config.pvp_timeout) {
                rearmed += 1;
                if notifier.notify_bystanders {
                    self.inner.host.notifier.notify(id, Notice::BystanderRefreshed);
                }
            }
        }

        if rearmed > 0 {
            debug!("Death of {} re-armed {} nearby fighter(s)", victim, rearmed);
            Metrics::add(&self.inner.metrics.bystanders_rearmed, rearmed as u64);
        }
        self.inner.refresh_gauges(&state);
        rearmed
    }

    /// Participant left: drop session and timer, keep the preference
    pub fn on_quit(&self, id: ParticipantId) {
        Metrics::incr(&self.inner.metrics.quits);
        let mut state = self.inner.state.lock();

        state.sessions.exit(id);
        state.timeouts.cancel(id);
        state.sessions.forget_attacker(id);

        debug!("{} quit, PvP state cleared", id);
        self.inner.refresh_gauges(&state);
    }

    /// Swing without a hit. Keeps a fast participant's window open while they
    /// keep attacking. Returns whether the timeout was re-armed.
    pub fn on_swing(&self, id: ParticipantId) -> bool {
        let config = self.config();
        if !config.pvp_detection_enabled {
            return false;
        }

        let mut state = self.inner.state.lock();
        if !state.registry.preference(id).is_fast() || !state.sessions.is_active(id) {
            return false;
        }

        Metrics::incr(&self.inner.metrics.pvp_swings);
        self.inner.arm_timeout(&mut state, id, config.pvp_timeout)
    }

    /// Administrative toggle: store a preference and re-apply if connected
    pub fn set_preference(&self, id: ParticipantId, category: Category) {
        let mut state = self.inner.state.lock();
        state.registry.set_preference(id, category);
        if self.inner.host.presence.is_connected(id) {
            self.inner.apply_derived(&state, id);
        }
        self.inner.refresh_gauges(&state);
    }

    /// Administrative removal of a stored preference
    pub fn remove_preference(&self, id: ParticipantId) -> Option<Category> {
        let mut state = self.inner.state.lock();
        let removed = state.registry.remove(id);
        if removed.is_some() && self.inner.host.presence.is_connected(id) {
            self.inner.apply_derived(&state, id);
        }
        self.inner.refresh_gauges(&state);
        removed
    }

    /// Category that applies to `id` right now
    pub fn applied_category(&self, id: ParticipantId) -> Category {
        self.inner.state.lock().derived_category(id)
    }

    pub fn preference(&self, id: ParticipantId) -> Category {
        self.inner.state.lock().registry.preference(id)
    }

    pub fn is_in_pvp(&self, id: ParticipantId) -> bool {
        self.inner.state.lock().sessions.is_active(id)
    }

    pub fn last_attacker(&self, id: ParticipantId) -> Option<ParticipantId> {
        self.inner.state.lock().sessions.last_attacker(id)
    }

    /// How long the participant has been inside their current PvP window
    pub fn pvp_duration(&self, id: ParticipantId) -> Option<Duration> {
        self.inner.state.lock().sessions.get(id).map(|s| s.age())
    }

    /// When the participant's PvP window will close, if a timeout is armed
    pub fn timeout_deadline(&self, id: ParticipantId) -> Option<Instant> {
        self.inner.state.lock().timeouts.deadline(id)
    }

    pub fn status(&self) -> StatusSnapshot {
        let config = self.config();
        let state = self.inner.state.lock();
        StatusSnapshot {
            registered: state.registry.count(),
            fast_preferences: state.registry.fast_count(),
            active_sessions: state.sessions.active_count(),
            armed_timeouts: state.timeouts.armed_count(),
            pvp_detection_enabled: config.pvp_detection_enabled,
            detection_source: self.inner.host.detection.source(),
            pvp_timeout_secs: config.pvp_timeout.as_secs(),
        }
    }

    pub fn config(&self) -> Arc<CombatConfig> {
        self.inner.config.read().clone()
    }

    /// Swap in a new configuration and re-apply every connected participant's
    /// category.
    ///
    /// Toggles, zone rules, death radius and the name prefix take effect
    /// immediately. Armed timeouts keep their old duration, stored preferences
    /// are not re-detected, and the companion integration stays as resolved at
    /// startup. Attack speeds belong to the host applier, which must be
    /// reloaded first for new speeds to show up here.
    pub fn reload_config(&self, config: CombatConfig) {
        info!(
            "Configuration reloaded: PvP detection {}, timeout {}s",
            config.pvp_detection_enabled,
            config.pvp_timeout.as_secs()
        );
        self.inner.host.zones.reload(&config);
        *self.inner.config.write() = Arc::new(config);

        let state = self.inner.state.lock();
        for id in self.inner.host.presence.connected() {
            self.inner.apply_derived(&state, id);
        }
    }

    /// Cancel every timer, put every connected participant back on
    /// traditional combat and drop all state
    pub fn shutdown(&self) {
        let mut state = self.inner.state.lock();
        let cancelled = state.timeouts.cancel_all();
        state.sessions.clear();

        for id in self.inner.host.presence.connected() {
            if let Err(e) = self.inner.host.applier.apply(id, Category::Traditional) {
                debug!("Could not reset combat for {}: {}", id, e);
            }
        }

        state.registry.clear();
        self.inner.refresh_gauges(&state);
        info!("Combat mode controller shut down ({} timeout(s) cancelled)", cancelled);
    }
}

impl Inner {
    fn config(&self) -> Arc<CombatConfig> {
        self.config.read().clone()
    }

    fn apply_derived(&self, state: &CombatState, id: ParticipantId) {
        let category = state.derived_category(id);
        if let Err(e) = self.host.applier.apply(id, category) {
            debug!("Could not apply {} combat to {}: {}", category, id, e);
            Metrics::incr(&self.metrics.apply_failures);
        }
    }

    /// Arm or re-arm the PvP timeout. On failure the session stays Active
    /// until the next qualifying event or an explicit exit.
    fn arm_timeout(
        self: &Arc<Self>,
        state: &mut CombatState,
        id: ParticipantId,
        duration: Duration,
    ) -> bool {
        let weak: Weak<Inner> = Arc::downgrade(self);
        let armed = state.timeouts.arm(id, duration, move |ticket| {
            if let Some(inner) = weak.upgrade() {
                inner.on_timeout(ticket);
            }
        });

        match armed {
            Ok(_) => true,
            Err(e) => {
                warn!("{} - participant stays in PvP until the next event", e);
                Metrics::incr(&self.metrics.schedule_failures);
                false
            }
        }
    }

    fn on_timeout(&self, ticket: TimeoutTicket) {
        let config = self.config();
        let mut state = self.state.lock();

        if !state.timeouts.claim(ticket) {
            debug!("Discarding superseded timeout for {}", ticket.id);
            Metrics::incr(&self.metrics.timeouts_superseded);
            return;
        }

        Metrics::incr(&self.metrics.timeouts_fired);
        self.expire(&mut state, ticket.id, &config);
        self.refresh_gauges(&state);
    }

    /// Close a participant's PvP window and restore their preference if they
    /// are still connected. Disconnected participants only lose the state.
    fn expire(&self, state: &mut CombatState, id: ParticipantId, config: &CombatConfig) {
        state.timeouts.cancel(id);
        let was_active = state.sessions.exit(id);

        if !self.host.presence.is_connected(id) {
            debug!("{} left before their PvP window closed, state cleared", id);
            return;
        }

        self.apply_derived(state, id);
        if was_active {
            debug!("{} left PvP", id);
            if config.notifications_enabled && state.registry.preference(id).is_fast() {
                self.host.notifier.notify(id, Notice::PvpExited);
            }
        }
    }

    fn refresh_gauges(&self, state: &CombatState) {
        self.metrics
            .set_gauges(state.sessions.active_count(), state.registry.fast_count());
    }
}
