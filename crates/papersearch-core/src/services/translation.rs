use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::StreamExt;

use crate::api::{ApiError, PaperApi};
use crate::cache::ResultCache;
use crate::identity::PaperId;
use crate::stream::{TranslationAccumulator, TranslationEvent, decode_events};
use crate::task::{InFlight, PriorityGate, PriorityTask, TaskKind, WakeSignal};
use crate::types::Paper;

#[derive(Debug, Default)]
struct Live {
    paper: Option<PaperId>,
    acc: TranslationAccumulator,
}

/// Streaming abstract translation. Only the final text is cached; the
/// partial text of the translation in progress is exposed through
/// [`streaming_text`](TranslationService::streaming_text).
pub struct TranslationService {
    api: Arc<dyn PaperApi>,
    cache: ResultCache<String>,
    in_flight: InFlight,
    priority: Arc<PriorityGate>,
    live: Mutex<Live>,
}

impl TranslationService {
    pub fn new(api: Arc<dyn PaperApi>, priority: Arc<PriorityGate>, wake: WakeSignal) -> Self {
        Self {
            api,
            cache: ResultCache::new(),
            in_flight: InFlight::new(wake),
            priority,
            live: Mutex::new(Live::default()),
        }
    }

    fn live(&self) -> MutexGuard<'_, Live> {
        self.live.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Translate the abstract of `paper`.
    ///
    /// `on_success` runs as soon as there is something to show: immediately
    /// on a cache hit, otherwise once streaming starts. `on_progress` receives
    /// the full visible text every time it changes.
    pub async fn translate(
        &self,
        paper: &Paper,
        on_success: impl FnOnce(&Paper) + Send,
        mut on_progress: impl FnMut(&str) + Send,
    ) -> Result<Arc<String>, ApiError> {
        let id = PaperId::of(paper);
        let _priority = self.priority.begin(PriorityTask {
            kind: TaskKind::Translate,
            paper_id: id.clone(),
        });

        if let Some(hit) = self.cache.get(&id) {
            tracing::debug!(paper_id = %id, "translation cache hit");
            on_success(paper);
            return Ok(hit);
        }

        let text = paper.abstract_text().ok_or(ApiError::MissingAbstract)?;

        let _busy = self.in_flight.begin(id.clone());
        on_success(paper);
        {
            let mut live = self.live();
            live.paper = Some(id.clone());
            live.acc = TranslationAccumulator::new();
        }

        match self.stream(text, &mut on_progress).await {
            Ok(final_text) => {
                tracing::info!(paper_id = %id, chars = final_text.chars().count(), "translation complete");
                Ok(self.cache.insert(id, final_text))
            }
            Err(e) => {
                self.live().acc.stop();
                tracing::warn!(paper_id = %id, error = %e, "translation failed");
                Err(e)
            }
        }
    }

    async fn stream(
        &self,
        text: &str,
        on_progress: &mut (impl FnMut(&str) + Send),
    ) -> Result<String, ApiError> {
        let body = self.api.translate_stream(text).await?;
        let mut events = std::pin::pin!(decode_events(body));

        while let Some(event) = events.next().await {
            let event = event?;
            let done = matches!(event, TranslationEvent::Complete { .. });
            let visible = {
                let mut live = self.live();
                live.acc.apply(event)?.then(|| live.acc.text().to_string())
            };
            if let Some(visible) = visible {
                on_progress(&visible);
            }
            if done {
                break;
            }
        }

        self.live().acc.finish()
    }

    pub fn result(&self, paper: &Paper) -> Option<Arc<String>> {
        self.cache.get(&PaperId::of(paper))
    }

    pub fn is_translating(&self) -> bool {
        self.in_flight.is_active()
    }

    pub fn translating_paper(&self) -> Option<PaperId> {
        self.in_flight.paper()
    }

    /// Partial (or last final) text of the most recent streamed translation.
    pub fn streaming_text(&self) -> String {
        self.live().acc.text().to_string()
    }

    pub fn is_streaming(&self) -> bool {
        self.live().acc.is_streaming()
    }

    /// The paper whose text [`streaming_text`](Self::streaming_text) belongs to.
    pub fn streaming_paper(&self) -> Option<PaperId> {
        self.live().paper.clone()
    }

    pub fn cache(&self) -> &ResultCache<String> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{Endpoint, MockApi, MockResponse};
    use tokio::sync::Notify;

    fn service(api: Arc<MockApi>) -> (TranslationService, Arc<PriorityGate>) {
        let wake = Arc::new(Notify::new());
        let gate = Arc::new(PriorityGate::new(Arc::clone(&wake)));
        (TranslationService::new(api, Arc::clone(&gate), wake), gate)
    }

    fn paper() -> Paper {
        Paper {
            url: Some("https://example.org/paper".into()),
            title: "Greetings".into(),
            r#abstract: Some("Hello there.".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn streamed_text_is_cached_on_complete() {
        let api = Arc::new(MockApi::new().with_translation_chunks([
            "data: {\"type\":\"start\"}\n",
            "data: {\"type\":\"chunk\",\"accumulated\":\"Hi\"}\n",
            "data: {\"type\":\"chunk\",\"accumulated\":\"Hi there\"}\n",
            "data: {\"type\":\"complete\",\"content\":\"Hi there.\"}\n",
        ]));
        let (svc, gate) = service(api);
        let id = PaperId::of(&paper());
        let mut seen = Vec::new();
        let result = svc
            .translate(
                &paper(),
                |_| {},
                |t| {
                    assert_eq!(svc.translating_paper().as_ref(), Some(&id));
                    seen.push(t.to_string());
                },
            )
            .await
            .unwrap();

        assert_eq!(result.as_str(), "Hi there.");
        assert_eq!(seen, vec!["Hi", "Hi there", "Hi there."]);
        assert_eq!(svc.streaming_text(), "Hi there.");
        assert_eq!(svc.streaming_paper(), Some(id));
        assert!(!svc.is_streaming());
        assert!(!svc.is_translating());
        assert!(svc.translating_paper().is_none());
        assert!(!gate.is_active());
        assert_eq!(svc.result(&paper()).unwrap().as_str(), "Hi there.");
    }

    #[tokio::test]
    async fn cache_hit_skips_network() {
        let api = Arc::new(MockApi::new().with_translation_chunks([
            "data: {\"type\":\"complete\",\"content\":\"Done\"}\n",
        ]));
        let (svc, _) = service(api.clone());
        svc.translate(&paper(), |_| {}, |_| {}).await.unwrap();
        svc.translate(&paper(), |_| {}, |_| {}).await.unwrap();
        assert_eq!(api.calls(Endpoint::TranslateStream), 1);
    }

    #[tokio::test]
    async fn missing_abstract_makes_no_request() {
        let api = Arc::new(MockApi::new());
        let (svc, gate) = service(api.clone());
        let mut p = paper();
        p.r#abstract = None;
        let err = svc.translate(&p, |_| {}, |_| {}).await.unwrap_err();
        assert!(matches!(err, ApiError::MissingAbstract));
        assert_eq!(api.calls(Endpoint::TranslateStream), 0);
        assert!(!gate.is_active());
    }

    #[tokio::test]
    async fn stream_ending_early_is_an_error_not_a_hang() {
        let api = Arc::new(MockApi::new().with_translation_chunks([
            "data: {\"type\":\"start\"}\n",
            "data: {\"type\":\"chunk\",\"accumulated\":\"Hal\"}\n",
        ]));
        let (svc, _) = service(api);
        let err = svc.translate(&paper(), |_| {}, |_| {}).await.unwrap_err();
        assert!(matches!(err, ApiError::StreamIncomplete));
        assert!(!svc.is_streaming());
        assert!(svc.cache().is_empty());
    }

    #[tokio::test]
    async fn error_event_aborts_with_message() {
        let api = Arc::new(MockApi::new().with_translation_chunks([
            "data: {\"type\":\"start\"}\n",
            "data: {\"type\":\"error\",\"content\":\"model unavailable\"}\n",
            "data: {\"type\":\"complete\",\"content\":\"never\"}\n",
        ]));
        let (svc, _) = service(api);
        let err = svc.translate(&paper(), |_| {}, |_| {}).await.unwrap_err();
        assert_eq!(err.detail(), Some("model unavailable"));
        assert!(!svc.is_streaming());
        assert!(svc.cache().is_empty());
    }

    #[tokio::test]
    async fn malformed_line_does_not_abort() {
        let api = Arc::new(MockApi::new().with_translation_chunks([
            "data: {\"type\":\"start\"}\ndata: {oops\n",
            "data: {\"type\":\"complete\",\"content\":\"ok\"}\n",
        ]));
        let (svc, _) = service(api);
        let result = svc.translate(&paper(), |_| {}, |_| {}).await.unwrap();
        assert_eq!(result.as_str(), "ok");
    }

    #[tokio::test]
    async fn http_failure_leaves_streaming_off() {
        let api = Arc::new(MockApi::new().with_translation(MockResponse::Status {
            status: 502,
            detail: None,
        }));
        let (svc, _) = service(api);
        assert!(svc.translate(&paper(), |_| {}, |_| {}).await.is_err());
        assert!(!svc.is_streaming());
        assert!(!svc.is_translating());
    }
}
