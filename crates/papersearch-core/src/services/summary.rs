use std::sync::Arc;

use crate::api::{ApiError, PaperApi};
use crate::cache::{PendingSet, ResultCache};
use crate::identity::PaperId;
use crate::task::{InFlight, PriorityGate, PriorityTask, TaskKind, WakeSignal};
use crate::types::{Paper, QuickSummary, SummaryData};

/// Who asked for a detailed summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Explicit request; takes priority over background work.
    User,
    /// Background request; failures are only logged.
    Automatic,
}

/// Detailed and quick summaries, each with its own cache.
pub struct SummaryService {
    api: Arc<dyn PaperApi>,
    summaries: ResultCache<SummaryData>,
    quick: ResultCache<QuickSummary>,
    quick_pending: PendingSet,
    summarizing: InFlight,
    priority: Arc<PriorityGate>,
}

impl SummaryService {
    pub fn new(api: Arc<dyn PaperApi>, priority: Arc<PriorityGate>, wake: WakeSignal) -> Self {
        Self {
            api,
            summaries: ResultCache::new(),
            quick: ResultCache::new(),
            quick_pending: PendingSet::default(),
            summarizing: InFlight::new(wake),
            priority,
        }
    }

    /// Detailed summary of `paper` via `POST /summarize`.
    ///
    /// While this runs, [`is_summarizing`](Self::is_summarizing) is true and
    /// the auto-summarize queue stays parked.
    pub async fn summarize(
        &self,
        paper: &Paper,
        trigger: Trigger,
    ) -> Result<Arc<SummaryData>, ApiError> {
        let id = PaperId::of(paper);
        let _priority = (trigger == Trigger::User).then(|| {
            self.priority.begin(PriorityTask {
                kind: TaskKind::Summarize,
                paper_id: id.clone(),
            })
        });

        if let Some(hit) = self.summaries.get(&id) {
            tracing::debug!(paper_id = %id, "summary cache hit");
            return Ok(hit);
        }

        let text = paper.abstract_text().ok_or(ApiError::MissingAbstract)?;

        let _busy = self.summarizing.begin(id.clone());
        match self.api.summarize(&paper.title, text).await {
            Ok(data) => {
                tracing::info!(paper_id = %id, structured = data.structured.is_some(), "summary complete");
                Ok(self.summaries.insert(id, data))
            }
            Err(e) => {
                match trigger {
                    Trigger::User => tracing::debug!(paper_id = %id, error = %e, "summary failed"),
                    Trigger::Automatic => {
                        tracing::warn!(paper_id = %id, error = %e, "background summary failed")
                    }
                }
                Err(e)
            }
        }
    }

    /// One-line summary of `paper` via `POST /quick-summary`.
    ///
    /// Returns `Ok(None)` when a request for the same paper is already
    /// outstanding.
    pub async fn quick_summary(
        &self,
        paper: &Paper,
    ) -> Result<Option<Arc<QuickSummary>>, ApiError> {
        let id = PaperId::of(paper);
        if let Some(hit) = self.quick.get(&id) {
            return Ok(Some(hit));
        }
        let Some(_pending) = self.quick_pending.begin(id.clone()) else {
            tracing::debug!(paper_id = %id, "quick summary already pending");
            return Ok(None);
        };

        let abstract_text = paper.abstract_text().unwrap_or("");
        let summary = self.api.quick_summary(&paper.title, abstract_text).await?;
        tracing::debug!(paper_id = %id, keywords = summary.keywords.len(), "quick summary complete");
        Ok(Some(self.quick.insert(id, summary)))
    }

    pub fn cached_summary(&self, paper: &Paper) -> Option<Arc<SummaryData>> {
        self.summaries.get(&PaperId::of(paper))
    }

    pub fn cached_quick_summary(&self, paper: &Paper) -> Option<Arc<QuickSummary>> {
        self.quick.get(&PaperId::of(paper))
    }

    pub fn has_quick_summary(&self, id: &PaperId) -> bool {
        self.quick.contains(id)
    }

    pub fn is_quick_pending(&self, id: &PaperId) -> bool {
        self.quick_pending.contains(id)
    }

    pub fn is_summarizing(&self) -> bool {
        self.summarizing.is_active()
    }

    pub fn summarizing_paper(&self) -> Option<PaperId> {
        self.summarizing.paper()
    }
}
