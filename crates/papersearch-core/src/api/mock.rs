//! In-process mock of the backend for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::{ApiError, ApiFuture, ByteStream, PaperApi};
use crate::types::{
    AnalysisResult, AvailableModel, ModelConfig, ModelFunction, QuickSummary, SearchResponse,
    SummaryData,
};

/// Backend endpoints, for call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Search,
    Analyze,
    TranslateStream,
    QuickSummary,
    Summarize,
    Models,
    ModelConfig,
    UpdateModelConfig,
}

impl Endpoint {
    fn path(&self) -> &'static str {
        match self {
            Self::Search => "/search",
            Self::Analyze => "/analyze",
            Self::TranslateStream => "/translate-stream",
            Self::QuickSummary => "/quick-summary",
            Self::Summarize => "/summarize",
            Self::Models => "/models",
            Self::ModelConfig | Self::UpdateModelConfig => "/models/config",
        }
    }
}

/// A canned reply for one endpoint.
#[derive(Clone, Debug)]
pub enum MockResponse<T> {
    Ok(T),
    /// Non-2xx status with an optional `detail` body.
    Status { status: u16, detail: Option<String> },
    /// Connection-level failure.
    Fail(String),
}

impl<T: Clone> MockResponse<T> {
    fn resolve(&self, endpoint: Endpoint) -> Result<T, ApiError> {
        match self {
            MockResponse::Ok(v) => Ok(v.clone()),
            MockResponse::Status { status, detail } => Err(ApiError::Status {
                endpoint: endpoint.path(),
                status: *status,
                detail: detail.clone(),
            }),
            MockResponse::Fail(msg) => Err(ApiError::Transport(msg.clone())),
        }
    }
}

struct MockState {
    search: MockResponse<SearchResponse>,
    analysis: MockResponse<AnalysisResult>,
    /// Body chunks for `/translate-stream`; each item is delivered as one read.
    translation: MockResponse<Vec<String>>,
    /// `None` means "echo the title back" so every paper gets a distinct summary.
    quick_summary: Option<MockResponse<QuickSummary>>,
    /// Titles that fail `/quick-summary` regardless of `quick_summary`.
    failing_quick_titles: Vec<String>,
    summary: MockResponse<SummaryData>,
    models: MockResponse<Vec<AvailableModel>>,
    model_config: MockResponse<ModelConfig>,
    update: MockResponse<()>,
    calls: HashMap<Endpoint, usize>,
    quick_summary_titles: Vec<String>,
    search_args: Vec<(String, u32)>,
}

/// Hand-rolled [`PaperApi`] mock.
///
/// Supports a fixed response per endpoint, optional per-call latency, and
/// call counting via [`calls()`](MockApi::calls).
pub struct MockApi {
    state: Mutex<MockState>,
    delay: Option<Duration>,
}

impl Default for MockApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                search: MockResponse::Ok(SearchResponse::default()),
                analysis: MockResponse::Ok(AnalysisResult::default()),
                translation: MockResponse::Ok(vec![]),
                quick_summary: None,
                failing_quick_titles: vec![],
                summary: MockResponse::Ok(SummaryData::default()),
                models: MockResponse::Ok(vec![]),
                model_config: MockResponse::Ok(ModelConfig::default()),
                update: MockResponse::Ok(()),
                calls: HashMap::new(),
                quick_summary_titles: vec![],
                search_args: vec![],
            }),
            delay: None,
        }
    }

    /// Simulated network latency applied to every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_search(self, response: MockResponse<SearchResponse>) -> Self {
        self.update_state(|s| s.search = response)
    }

    pub fn with_analysis(self, response: MockResponse<AnalysisResult>) -> Self {
        self.update_state(|s| s.analysis = response)
    }

    /// Raw body chunks for `/translate-stream`, e.g. `"data: {...}\n"`.
    pub fn with_translation_chunks<I, S>(self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let chunks = chunks.into_iter().map(Into::into).collect();
        self.update_state(|s| s.translation = MockResponse::Ok(chunks))
    }

    pub fn with_translation(self, response: MockResponse<Vec<String>>) -> Self {
        self.update_state(|s| s.translation = response)
    }

    pub fn with_quick_summary(self, response: MockResponse<QuickSummary>) -> Self {
        self.update_state(|s| s.quick_summary = Some(response))
    }

    pub fn with_failing_quick_summary(self, title: impl Into<String>) -> Self {
        let title = title.into();
        self.update_state(|s| s.failing_quick_titles.push(title))
    }

    pub fn with_summary(self, response: MockResponse<SummaryData>) -> Self {
        self.update_state(|s| s.summary = response)
    }

    pub fn with_models(self, response: MockResponse<Vec<AvailableModel>>) -> Self {
        self.update_state(|s| s.models = response)
    }

    pub fn with_model_config(self, response: MockResponse<ModelConfig>) -> Self {
        self.update_state(|s| s.model_config = response)
    }

    pub fn with_update_result(self, response: MockResponse<()>) -> Self {
        self.update_state(|s| s.update = response)
    }

    /// Swap the `/search` reply on a shared mock.
    pub fn set_search(&self, response: MockResponse<SearchResponse>) {
        self.lock().search = response;
    }

    /// Swap the `/quick-summary` reply on a shared mock.
    pub fn set_quick_summary(&self, response: MockResponse<QuickSummary>) {
        self.lock().quick_summary = Some(response);
    }

    /// How many times `endpoint` has been called.
    pub fn calls(&self, endpoint: Endpoint) -> usize {
        self.lock().calls.get(&endpoint).copied().unwrap_or(0)
    }

    /// Titles sent to `/quick-summary`, in call order.
    pub fn quick_summary_titles(&self) -> Vec<String> {
        self.lock().quick_summary_titles.clone()
    }

    /// `(query, limit)` pairs sent to `/search`, in call order.
    pub fn search_args(&self) -> Vec<(String, u32)> {
        self.lock().search_args.clone()
    }

    fn update_state(self, f: impl FnOnce(&mut MockState)) -> Self {
        f(&mut self.lock());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, endpoint: Endpoint) -> std::sync::MutexGuard<'_, MockState> {
        let mut state = self.lock();
        *state.calls.entry(endpoint).or_insert(0) += 1;
        state
    }

    async fn latency(&self) {
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
    }
}

impl PaperApi for MockApi {
    fn search<'a>(&'a self, query: &'a str, limit: u32) -> ApiFuture<'a, SearchResponse> {
        let result = {
            let mut state = self.record(Endpoint::Search);
            state.search_args.push((query.to_string(), limit));
            state.search.resolve(Endpoint::Search)
        };
        Box::pin(async move {
            self.latency().await;
            result
        })
    }

    fn analyze<'a>(
        &'a self,
        _title: &'a str,
        _abstract_text: &'a str,
    ) -> ApiFuture<'a, AnalysisResult> {
        let result = self
            .record(Endpoint::Analyze)
            .analysis
            .resolve(Endpoint::Analyze);
        Box::pin(async move {
            self.latency().await;
            result
        })
    }

    fn translate_stream<'a>(&'a self, _text: &'a str) -> ApiFuture<'a, ByteStream> {
        let result = self
            .record(Endpoint::TranslateStream)
            .translation
            .resolve(Endpoint::TranslateStream);
        Box::pin(async move {
            self.latency().await;
            let chunks = result?;
            let stream = futures_util::stream::iter(
                chunks
                    .into_iter()
                    .map(|c| Ok::<_, ApiError>(c.into_bytes())),
            );
            Ok(Box::pin(stream) as ByteStream)
        })
    }

    fn quick_summary<'a>(
        &'a self,
        title: &'a str,
        _abstract_text: &'a str,
    ) -> ApiFuture<'a, QuickSummary> {
        let result = {
            let mut state = self.record(Endpoint::QuickSummary);
            state.quick_summary_titles.push(title.to_string());
            if state.failing_quick_titles.iter().any(|t| t == title) {
                Err(ApiError::Status {
                    endpoint: Endpoint::QuickSummary.path(),
                    status: 500,
                    detail: None,
                })
            } else {
                match &state.quick_summary {
                    Some(resp) => resp.resolve(Endpoint::QuickSummary),
                    None => Ok(QuickSummary {
                        what_they_did: format!("summary of {}", title),
                        keywords: vec![],
                    }),
                }
            }
        };
        Box::pin(async move {
            self.latency().await;
            result
        })
    }

    fn summarize<'a>(
        &'a self,
        _title: &'a str,
        _abstract_text: &'a str,
    ) -> ApiFuture<'a, SummaryData> {
        let result = self
            .record(Endpoint::Summarize)
            .summary
            .resolve(Endpoint::Summarize);
        Box::pin(async move {
            self.latency().await;
            result
        })
    }

    fn list_models(&self) -> ApiFuture<'_, Vec<AvailableModel>> {
        let result = self.record(Endpoint::Models).models.resolve(Endpoint::Models);
        Box::pin(async move {
            self.latency().await;
            result
        })
    }

    fn model_config(&self) -> ApiFuture<'_, ModelConfig> {
        let result = self
            .record(Endpoint::ModelConfig)
            .model_config
            .resolve(Endpoint::ModelConfig);
        Box::pin(async move {
            self.latency().await;
            result
        })
    }

    fn update_model_config<'a>(
        &'a self,
        function: ModelFunction,
        model: &'a str,
    ) -> ApiFuture<'a, ()> {
        let result = {
            let mut state = self.record(Endpoint::UpdateModelConfig);
            let result = state.update.resolve(Endpoint::UpdateModelConfig);
            // A successful update is visible to the next GET.
            if result.is_ok()
                && let MockResponse::Ok(config) = &mut state.model_config
            {
                let slot = match function {
                    ModelFunction::Analysis => &mut config.analysis_model,
                    ModelFunction::Translation => &mut config.translation_model,
                    ModelFunction::QuickSummary => &mut config.quick_summary_model,
                    ModelFunction::DetailedSummary => &mut config.detailed_summary_model,
                };
                *slot = model.to_string();
            }
            result
        };
        Box::pin(async move {
            self.latency().await;
            result
        })
    }
}
