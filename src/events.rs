//! Inbound host events
//!
//! Uses crossbeam-channel for lock-free MPSC submission from host threads to
//! the tick loop, which drains everything pending at the start of each tick
//! and hands it to the controller in arrival order.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::combat::{CombatModeController, ParticipantId};
use crate::host::{Location, ZoneId};

/// One host event the controller reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum CombatEvent {
    Join { id: ParticipantId, name: String },
    Quit { id: ParticipantId },
    Damage {
        attacker: ParticipantId,
        victim: ParticipantId,
        zone: ZoneId,
    },
    Death { id: ParticipantId, location: Location },
    /// Attack swing that hit nothing
    Swing { id: ParticipantId },
}

impl CombatEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            CombatEvent::Join { .. } => "join",
            CombatEvent::Quit { .. } => "quit",
            CombatEvent::Damage { .. } => "damage",
            CombatEvent::Death { .. } => "death",
            CombatEvent::Swing { .. } => "swing",
        }
    }
}

/// Bounded event queue between host threads and the tick loop
pub struct EventQueue {
    sender: Sender<CombatEvent>,
    receiver: Receiver<CombatEvent>,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    /// Create a new sender handle for a host thread
    pub fn sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
        }
    }

    /// Drain pending events straight into the controller
    pub fn dispatch(&self, controller: &CombatModeController) -> usize {
        let mut handled = 0;
        for event in self.receiver.try_iter() {
            debug!("Handling {} event", event.kind());
            controller.handle(event);
            handled += 1;
        }
        handled
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Clonable sender handle
#[derive(Clone)]
pub struct EventSender {
    sender: Sender<CombatEvent>,
}

impl EventSender {
    /// Submit an event (non-blocking)
    #[inline]
    pub fn try_send(&self, event: CombatEvent) -> Result<(), EventQueueError> {
        self.sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => EventQueueError::Full,
            TrySendError::Disconnected(_) => EventQueueError::Disconnected,
        })
    }
}

/// Event queue errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EventQueueError {
    #[error("Event queue is full")]
    Full,
    #[error("Event queue disconnected (tick loop stopped)")]
    Disconnected,
}

/// Start the tick loop background task
pub fn start_tick_loop(
    controller: CombatModeController,
    queue: EventQueue,
    tick: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Tick loop started every {}ms", tick.as_millis());
        let mut tick_count: u64 = 0;

        loop {
            ticker.tick().await;
            tick_count += 1;

            if queue.is_empty() {
                continue;
            }
            let backlog = queue.pending_count();
            let handled = queue.dispatch(&controller);
            debug!(
                "Tick {}: handled {} event(s), {} queued at tick start",
                tick_count, handled, backlog
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::Category;
    use crate::config::CombatConfig;
    use crate::host::world::InMemoryWorld;
    use crate::host::Collaborators;
    use crate::metrics::Metrics;
    use crate::util::vec3::Vec3;
    use std::sync::Arc;
    use uuid::Uuid;

    fn controller_with_world() -> (CombatModeController, Arc<InMemoryWorld>) {
        let config = CombatConfig::default();
        let world = Arc::new(InMemoryWorld::new(config.clone()));
        let host = Collaborators::from_world(world.clone(), &config);
        let controller = CombatModeController::new(config, host, Arc::new(Metrics::new()));
        (controller, world)
    }

    #[test]
    fn test_queue_backpressure() {
        let (controller, _world) = controller_with_world();
        let queue = EventQueue::new(2);
        let sender = queue.sender();
        let id = Uuid::new_v4();

        assert!(sender.try_send(CombatEvent::Quit { id }).is_ok());
        assert!(sender.try_send(CombatEvent::Swing { id }).is_ok());
        assert_eq!(
            sender.try_send(CombatEvent::Swing { id }),
            Err(EventQueueError::Full)
        );
        assert_eq!(queue.pending_count(), 2);

        assert_eq!(queue.dispatch(&controller), 2);
        assert!(queue.is_empty());
        assert!(sender.try_send(CombatEvent::Swing { id }).is_ok());
    }

    #[test]
    fn test_event_kind() {
        let id = Uuid::new_v4();
        assert_eq!(CombatEvent::Quit { id }.kind(), "quit");
        assert_eq!(CombatEvent::Swing { id }.kind(), "swing");
    }

    #[test]
    fn test_sender_disconnected() {
        let queue = EventQueue::new(2);
        let sender = queue.sender();
        drop(queue);

        assert_eq!(
            sender.try_send(CombatEvent::Quit { id: Uuid::new_v4() }),
            Err(EventQueueError::Disconnected)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_preserves_order() {
        let (controller, world) = controller_with_world();
        let queue = EventQueue::default();
        let sender = queue.sender();

        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let here = Location::new("overworld", Vec3::new(0.0, 64.0, 0.0));
        world.connect(a, ".Steve", here.clone());
        world.connect(b, "Alex", here);

        sender
            .try_send(CombatEvent::Join { id: a, name: ".Steve".into() })
            .unwrap();
        sender
            .try_send(CombatEvent::Join { id: b, name: "Alex".into() })
            .unwrap();
        sender
            .try_send(CombatEvent::Damage {
                attacker: a,
                victim: b,
                zone: "overworld".into(),
            })
            .unwrap();

        assert_eq!(queue.dispatch(&controller), 3);
        assert_eq!(controller.preference(a), Category::Fast);
        assert!(controller.is_in_pvp(a));
        assert_eq!(controller.applied_category(a), Category::Traditional);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_loop_drains_queue() {
        let (controller, world) = controller_with_world();
        let queue = EventQueue::default();
        let sender = queue.sender();

        let id = Uuid::new_v4();
        world.connect(id, ".Steve", Location::new("overworld", Vec3::ZERO));

        let handle = start_tick_loop(controller.clone(), queue, Duration::from_millis(50));
        sender
            .try_send(CombatEvent::Join { id, name: ".Steve".into() })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(controller.applied_category(id), Category::Fast);
        assert_eq!(world.participant(id).unwrap().applied, Some(Category::Fast));

        handle.abort();
    }
}
