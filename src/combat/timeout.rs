//! Debounced per-participant timeouts
//!
//! Every arm hands out a [`TimeoutTicket`] carrying a generation number. The
//! expiry callback must [`TimeoutScheduler::claim`] its ticket under the same
//! lock that guards `arm`/`cancel` before it touches any state; a ticket that
//! was superseded or cancelled in the meantime fails the claim and the firing
//! becomes a no-op.

use std::time::Duration;

use hashbrown::HashMap;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::combat::ParticipantId;

/// Identifies one arm cycle of one participant's timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutTicket {
    pub id: ParticipantId,
    pub generation: u64,
}

/// Scheduling failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScheduleError {
    #[error("No async runtime available to schedule timeout for {0}")]
    NoRuntime(ParticipantId),
}

#[derive(Debug)]
struct ArmedTimeout {
    generation: u64,
    deadline: Instant,
    task: JoinHandle<()>,
}

/// Owns at most one live timeout per participant
#[derive(Debug)]
pub struct TimeoutScheduler {
    runtime: Option<Handle>,
    armed: HashMap<ParticipantId, ArmedTimeout>,
    next_generation: u64,
}

impl TimeoutScheduler {
    /// Scheduler that spawns onto whichever runtime is current when arming
    pub fn new() -> Self {
        Self {
            runtime: None,
            armed: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Scheduler pinned to a specific runtime, usable from non-runtime threads
    pub fn with_runtime(runtime: Handle) -> Self {
        Self {
            runtime: Some(runtime),
            armed: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Arm (or re-arm) the timeout for `id`, replacing any previous one.
    ///
    /// The window is measured from this call. `on_expire` runs at most once,
    /// on a runtime task, and receives the ticket it must claim.
    pub fn arm<F>(
        &mut self,
        id: ParticipantId,
        duration: Duration,
        on_expire: F,
    ) -> Result<TimeoutTicket, ScheduleError>
    where
        F: FnOnce(TimeoutTicket) + Send + 'static,
    {
        self.cancel(id);

        let runtime = self
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
            .ok_or(ScheduleError::NoRuntime(id))?;

        self.next_generation = self.next_generation.wrapping_add(1);
        let ticket = TimeoutTicket {
            id,
            generation: self.next_generation,
        };
        let deadline = Instant::now() + duration;

        let task = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            on_expire(ticket);
        });

        self.armed.insert(
            id,
            ArmedTimeout {
                generation: ticket.generation,
                deadline,
                task,
            },
        );

        Ok(ticket)
    }

    /// Cancel the live timeout for `id`, if any
    pub fn cancel(&mut self, id: ParticipantId) -> bool {
        if let Some(armed) = self.armed.remove(&id) {
            armed.task.abort();
            true
        } else {
            false
        }
    }

    /// Claim a firing. True only if `ticket` is still the live arm cycle;
    /// the handle is consumed so the same ticket cannot be claimed twice.
    pub fn claim(&mut self, ticket: TimeoutTicket) -> bool {
        match self.armed.get(&ticket.id) {
            Some(armed) if armed.generation == ticket.generation => {
                self.armed.remove(&ticket.id);
                true
            }
            _ => false,
        }
    }

    /// When the live timeout for `id` will fire
    pub fn deadline(&self, id: ParticipantId) -> Option<Instant> {
        self.armed.get(&id).map(|a| a.deadline)
    }

    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }

    pub fn cancel_all(&mut self) -> usize {
        let count = self.armed.len();
        for (_, armed) in self.armed.drain() {
            armed.task.abort();
        }
        count
    }
}

impl Default for TimeoutScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimeoutScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
