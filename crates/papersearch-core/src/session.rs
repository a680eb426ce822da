//! One user session: services, shared coordination state and the queue.

use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::Config;
use crate::api::{HttpPaperApi, PaperApi};
use crate::queue::{AutoSummarizeQueue, QueueEvent, QueueOptions};
use crate::services::{
    AnalysisService, ModelSettingsService, SearchOutcome, SearchParams, SearchService,
    SortOrder, SummaryService, TranslationService,
};
use crate::storage::ModelConfigStore;
use crate::task::{PriorityGate, PriorityTask, WakeSignal};

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub queue: QueueOptions,
    pub model_store: ModelConfigStore,
    pub sort: SortOrder,
}

/// Every service wired to one backend, one priority gate and one wake signal.
///
/// Caches live as long as the session; nothing is persisted except the model
/// config mirror.
pub struct Session {
    priority: Arc<PriorityGate>,
    search: SearchService,
    analysis: AnalysisService,
    translation: TranslationService,
    summary: Arc<SummaryService>,
    models: ModelSettingsService,
    queue: Arc<AutoSummarizeQueue>,
}

impl Session {
    pub fn new(api: Arc<dyn PaperApi>, options: SessionOptions) -> Self {
        let wake: WakeSignal = Arc::new(Notify::new());
        let priority = Arc::new(PriorityGate::new(Arc::clone(&wake)));

        let search = SearchService::new(Arc::clone(&api));
        search.set_sort(options.sort);
        let analysis =
            AnalysisService::new(Arc::clone(&api), Arc::clone(&priority), Arc::clone(&wake));
        let translation =
            TranslationService::new(Arc::clone(&api), Arc::clone(&priority), Arc::clone(&wake));
        let summary = Arc::new(SummaryService::new(
            Arc::clone(&api),
            Arc::clone(&priority),
            Arc::clone(&wake),
        ));
        let models = ModelSettingsService::new(Arc::clone(&api), options.model_store);
        let queue = Arc::new(AutoSummarizeQueue::new(
            Arc::clone(&summary),
            Arc::clone(&priority),
            wake,
            options.queue,
        ));

        Self {
            priority,
            search,
            analysis,
            translation,
            summary,
            models,
            queue,
        }
    }

    /// A session talking HTTP to `config.api_base_url`.
    pub fn from_config(config: &Config) -> Self {
        let api = HttpPaperApi::new(config.api_base_url.clone()).with_timeout(config.api_timeout);
        tracing::debug!(base_url = api.base_url(), "session created");
        Self::new(Arc::new(api), config.session_options())
    }

    /// Run a search and requeue its results for background summaries.
    pub async fn search(&self, params: SearchParams) -> SearchOutcome {
        let blank = params.query.trim().is_empty();
        let outcome = self.search.search(params).await;
        if !blank {
            self.queue.rebuild(&outcome.papers);
        }
        outcome
    }

    /// Restore a search from a shared `q=..&limit=..` string.
    pub async fn open(&self, query_string: &str) -> SearchOutcome {
        self.search(SearchParams::from_query_string(query_string))
            .await
    }

    pub async fn change_limit(&self, limit: u32) -> SearchOutcome {
        let params = self.search.state().params.with_limit(limit);
        self.search(params).await
    }

    /// Reorder the results; the queue follows the new order.
    pub fn set_sort(&self, sort: SortOrder) {
        self.search.set_sort(sort);
        self.queue.rebuild(&self.search.results());
    }

    /// Start the background runner. It stops when `cancel` fires.
    pub fn spawn_queue(
        &self,
        cancel: CancellationToken,
        progress: impl FnMut(QueueEvent) + Send + 'static,
    ) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(&self.queue).run(cancel, progress))
    }

    pub fn priority_task(&self) -> Option<PriorityTask> {
        self.priority.current()
    }

    pub fn searcher(&self) -> &SearchService {
        &self.search
    }

    pub fn analysis(&self) -> &AnalysisService {
        &self.analysis
    }

    pub fn translation(&self) -> &TranslationService {
        &self.translation
    }

    pub fn summary(&self) -> &SummaryService {
        &self.summary
    }

    pub fn models(&self) -> &ModelSettingsService {
        &self.models
    }

    pub fn queue(&self) -> &AutoSummarizeQueue {
        &self.queue
    }
}
