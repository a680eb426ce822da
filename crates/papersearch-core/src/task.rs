//! Coordination state shared by the services and the auto-summarize queue.
//!
//! - [`PriorityGate`]: the single operation the user is actively waiting on.
//!   While it is set, the background queue starts nothing new.
//! - [`InFlight`]: a service's busy flag plus the paper it is working on.
//!
//! Both hand out RAII guards that reset the state on drop, on success and
//! failure paths alike, and fire the shared wake signal so the queue runner
//! re-checks its gates immediately instead of waiting for the next tick.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use crate::identity::PaperId;

/// Fired whenever something the queue waits on may have changed.
pub type WakeSignal = Arc<Notify>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Summarize,
    Analyze,
    Translate,
}

impl TaskKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Summarize => "summarize",
            Self::Analyze => "analyze",
            Self::Translate => "translate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityTask {
    pub kind: TaskKind,
    pub paper_id: PaperId,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Default)]
struct Slot {
    task: Option<PriorityTask>,
    generation: u64,
}

/// Single-slot holder for the current [`PriorityTask`].
#[derive(Debug)]
pub struct PriorityGate {
    slot: Mutex<Slot>,
    wake: WakeSignal,
}

impl PriorityGate {
    pub fn new(wake: WakeSignal) -> Self {
        Self {
            slot: Mutex::new(Slot::default()),
            wake,
        }
    }

    pub fn current(&self) -> Option<PriorityTask> {
        lock(&self.slot).task.clone()
    }

    pub fn is_active(&self) -> bool {
        lock(&self.slot).task.is_some()
    }

    /// Make `task` the priority task until the guard drops.
    ///
    /// A later `begin` replaces the slot; an earlier guard dropping afterwards
    /// leaves the newer task in place.
    pub fn begin(&self, task: PriorityTask) -> PriorityGuard<'_> {
        let mut slot = lock(&self.slot);
        slot.generation += 1;
        tracing::debug!(kind = task.kind.label(), paper_id = %task.paper_id, "priority task set");
        slot.task = Some(task);
        PriorityGuard {
            gate: self,
            generation: slot.generation,
        }
    }
}

#[must_use = "the priority task is cleared when the guard drops"]
pub struct PriorityGuard<'a> {
    gate: &'a PriorityGate,
    generation: u64,
}

impl Drop for PriorityGuard<'_> {
    fn drop(&mut self) {
        let mut slot = lock(&self.gate.slot);
        if slot.generation == self.generation {
            slot.task = None;
            drop(slot);
            tracing::debug!("priority task cleared");
            self.gate.wake.notify_one();
        }
    }
}

/// Busy flag for one service, with the paper being processed.
///
/// At most one operation per service is tracked; callers that start a second
/// one while the first is running simply take over the flag.
#[derive(Debug)]
pub struct InFlight {
    paper: Mutex<Option<PaperId>>,
    wake: WakeSignal,
}

impl InFlight {
    pub fn new(wake: WakeSignal) -> Self {
        Self {
            paper: Mutex::new(None),
            wake,
        }
    }

    pub fn is_active(&self) -> bool {
        lock(&self.paper).is_some()
    }

    pub fn paper(&self) -> Option<PaperId> {
        lock(&self.paper).clone()
    }

    pub fn begin(&self, id: PaperId) -> InFlightGuard<'_> {
        *lock(&self.paper) = Some(id);
        InFlightGuard { flight: self }
    }
}

#[must_use = "the in-flight flag is cleared when the guard drops"]
pub struct InFlightGuard<'a> {
    flight: &'a InFlight,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        *lock(&self.flight.paper) = None;
        self.flight.wake.notify_one();
    }
}
