//! Background quick-summary queue for the current result list.
//!
//! The queue yields to everything the user starts: while a detailed summary
//! is running or a priority task is set, no new request is issued. The runner
//! sleeps on the shared wake signal and a coarse interval tick, debounces,
//! then drains steps until a gate closes or the queue is empty.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::identity::PaperId;
use crate::services::SummaryService;
use crate::task::{PriorityGate, WakeSignal};
use crate::types::{Paper, QuickSummary};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone)]
pub struct QueueOptions {
    pub enabled: bool,
    /// Quiet period after a wake-up before the first step.
    pub debounce: Duration,
    /// Fallback poll period in case a wake-up is missed.
    pub interval: Duration,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce: DEFAULT_DEBOUNCE,
            interval: DEFAULT_INTERVAL,
        }
    }
}

/// Why a step did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferral {
    /// Another step is still in flight.
    Busy,
    /// A detailed summary is running.
    Summarizing,
    /// The user is waiting on an analysis, translation or summary.
    Priority,
}

/// Reported once per paper taken off the queue.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    Summarized {
        paper_id: PaperId,
        title: String,
        summary: Arc<QuickSummary>,
    },
    Failed {
        paper_id: PaperId,
        title: String,
        error: String,
    },
    /// Already cached or requested elsewhere.
    Skipped { paper_id: PaperId },
}

#[derive(Debug, Clone)]
pub enum StepOutcome {
    Idle,
    Deferred(Deferral),
    Done(QueueEvent),
}

#[derive(Debug, Default)]
struct Inner {
    ids: VecDeque<PaperId>,
    papers: HashMap<PaperId, Paper>,
}

/// Resets the processing flag without waking the runner, which is the one
/// holding it.
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct AutoSummarizeQueue {
    summary: Arc<SummaryService>,
    priority: Arc<PriorityGate>,
    wake: WakeSignal,
    inner: Mutex<Inner>,
    processing: AtomicBool,
    options: QueueOptions,
}

impl AutoSummarizeQueue {
    pub fn new(
        summary: Arc<SummaryService>,
        priority: Arc<PriorityGate>,
        wake: WakeSignal,
        options: QueueOptions,
    ) -> Self {
        Self {
            summary,
            priority,
            wake,
            inner: Mutex::new(Inner::default()),
            processing: AtomicBool::new(false),
            options,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn options(&self) -> &QueueOptions {
        &self.options
    }

    /// Replace the queue with every paper in `papers` that has an abstract,
    /// in order. Duplicate identities are queued once.
    pub fn rebuild(&self, papers: &[Paper]) {
        let mut seen = HashSet::new();
        let mut ids = VecDeque::new();
        let mut map = HashMap::new();
        for paper in papers.iter().filter(|p| p.has_abstract()) {
            let id = PaperId::of(paper);
            if seen.insert(id.clone()) {
                ids.push_back(id.clone());
                map.insert(id, paper.clone());
            }
        }
        let count = ids.len();
        {
            let mut inner = self.lock();
            inner.ids = ids;
            inner.papers = map;
        }
        tracing::debug!(queued = count, "auto-summarize queue rebuilt");
        self.wake.notify_one();
    }

    pub fn len(&self) -> usize {
        self.lock().ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().ids.is_empty()
    }

    pub fn pending_ids(&self) -> Vec<PaperId> {
        self.lock().ids.iter().cloned().collect()
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Try to process the head of the queue.
    pub async fn process_next(&self) -> StepOutcome {
        if self
            .processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return StepOutcome::Deferred(Deferral::Busy);
        }
        let _processing = ProcessingGuard(&self.processing);

        if self.summary.is_summarizing() {
            return StepOutcome::Deferred(Deferral::Summarizing);
        }
        if self.priority.is_active() {
            return StepOutcome::Deferred(Deferral::Priority);
        }

        let head = {
            let mut inner = self.lock();
            inner.ids.pop_front().and_then(|id| {
                let paper = inner.papers.remove(&id)?;
                Some((id, paper))
            })
        };
        let Some((paper_id, paper)) = head else {
            return StepOutcome::Idle;
        };

        if self.summary.has_quick_summary(&paper_id) || self.summary.is_quick_pending(&paper_id) {
            tracing::debug!(paper_id = %paper_id, "already summarized, skipping");
            return StepOutcome::Done(QueueEvent::Skipped { paper_id });
        }

        let event = match self.summary.quick_summary(&paper).await {
            Ok(Some(summary)) => QueueEvent::Summarized {
                paper_id,
                title: paper.title,
                summary,
            },
            Ok(None) => QueueEvent::Skipped { paper_id },
            Err(e) => {
                tracing::warn!(paper_id = %paper_id, error = %e, "auto quick summary failed");
                QueueEvent::Failed {
                    paper_id,
                    title: paper.title,
                    error: e.to_string(),
                }
            }
        };
        StepOutcome::Done(event)
    }

    /// Run steps back to back until a gate closes or the queue empties.
    async fn drain(&self, cancel: &CancellationToken, progress: &mut impl FnMut(QueueEvent)) {
        while !cancel.is_cancelled() {
            match self.process_next().await {
                StepOutcome::Done(event) => progress(event),
                StepOutcome::Idle => break,
                StepOutcome::Deferred(reason) => {
                    tracing::debug!(?reason, "auto-summarize deferred");
                    break;
                }
            }
        }
    }

    /// Wait until `debounce` passes with no further wake-up.
    async fn debounce(&self, cancel: &CancellationToken) -> bool {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = self.wake.notified() => continue,
                _ = tokio::time::sleep(self.options.debounce) => return true,
            }
        }
    }

    /// Drive the queue until `cancel` fires. Does nothing when the queue is
    /// disabled.
    pub async fn run(
        self: Arc<Self>,
        cancel: CancellationToken,
        mut progress: impl FnMut(QueueEvent) + Send,
    ) {
        if !self.options.enabled {
            tracing::debug!("auto-summarize disabled");
            return;
        }
        let mut ticker = tokio::time::interval(self.options.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.wake.notified() => {}
                _ = ticker.tick() => {}
            }
            if self.is_empty() {
                continue;
            }
            if !self.debounce(&cancel).await {
                break;
            }
            self.drain(&cancel, &mut progress).await;
        }
        tracing::debug!("auto-summarize runner stopped");
    }

    /// Process every queued paper, waiting out deferrals, then return.
    pub async fn run_until_empty(
        &self,
        cancel: &CancellationToken,
        mut progress: impl FnMut(QueueEvent) + Send,
    ) {
        loop {
            self.drain(cancel, &mut progress).await;
            if cancel.is_cancelled() || self.is_empty() {
                return;
            }
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = self.wake.notified() => {}
                _ = tokio::time::sleep(self.options.interval) => {}
            }
        }
    }
}
