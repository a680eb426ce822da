use std::sync::Arc;

use crate::api::{ApiError, PaperApi};
use crate::cache::ResultCache;
use crate::identity::PaperId;
use crate::task::{InFlight, PriorityGate, PriorityTask, TaskKind, WakeSignal};
use crate::types::{AnalysisResult, Paper};

/// Field/method classification of a paper, cached per identity.
pub struct AnalysisService {
    api: Arc<dyn PaperApi>,
    cache: ResultCache<AnalysisResult>,
    in_flight: InFlight,
    priority: Arc<PriorityGate>,
}

impl AnalysisService {
    pub fn new(api: Arc<dyn PaperApi>, priority: Arc<PriorityGate>, wake: WakeSignal) -> Self {
        Self {
            api,
            cache: ResultCache::new(),
            in_flight: InFlight::new(wake),
            priority,
        }
    }

    /// Analyze `paper`, serving from cache when possible.
    ///
    /// `on_success` runs once a result is available (cached or fresh), so the
    /// caller can open its analysis view. The priority task is held for the
    /// whole call.
    pub async fn analyze(
        &self,
        paper: &Paper,
        on_success: impl FnOnce(&Paper) + Send,
    ) -> Result<Arc<AnalysisResult>, ApiError> {
        let id = PaperId::of(paper);
        let _priority = self.priority.begin(PriorityTask {
            kind: TaskKind::Analyze,
            paper_id: id.clone(),
        });

        if let Some(hit) = self.cache.get(&id) {
            tracing::debug!(paper_id = %id, "analysis cache hit");
            on_success(paper);
            return Ok(hit);
        }

        let _busy = self.in_flight.begin(id.clone());
        let abstract_text = paper.abstract_text().unwrap_or("");
        match self.api.analyze(&paper.title, abstract_text).await {
            Ok(result) => {
                tracing::info!(paper_id = %id, fields = result.fields.len(), "analysis complete");
                let result = self.cache.insert(id, result);
                on_success(paper);
                Ok(result)
            }
            Err(e) => {
                tracing::warn!(paper_id = %id, error = %e, "analysis failed");
                Err(e)
            }
        }
    }

    pub fn result(&self, paper: &Paper) -> Option<Arc<AnalysisResult>> {
        self.cache.get(&PaperId::of(paper))
    }

    pub fn is_analyzing(&self) -> bool {
        self.in_flight.is_active()
    }

    pub fn analyzing_paper(&self) -> Option<PaperId> {
        self.in_flight.paper()
    }

    pub fn cache(&self) -> &ResultCache<AnalysisResult> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{Endpoint, MockApi, MockResponse};
    use crate::types::{FieldScore, Label};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn service(api: Arc<MockApi>) -> (AnalysisService, Arc<PriorityGate>) {
        let wake = Arc::new(Notify::new());
        let gate = Arc::new(PriorityGate::new(Arc::clone(&wake)));
        (AnalysisService::new(api, Arc::clone(&gate), wake), gate)
    }

    fn paper() -> Paper {
        Paper {
            paper_id: Some("p1".into()),
            title: "Graph Attention Networks".into(),
            r#abstract: Some("We present GATs.".into()),
            ..Default::default()
        }
    }

    fn analysis() -> AnalysisResult {
        AnalysisResult {
            fields: vec![FieldScore {
                name: "Machine Learning".into(),
                score: 0.9,
            }],
            target: Label {
                ja: "グラフ".into(),
                en: "graphs".into(),
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn second_call_is_cache_hit() {
        let api = Arc::new(MockApi::new().with_analysis(MockResponse::Ok(analysis())));
        let (svc, _) = service(api.clone());
        let opened = AtomicUsize::new(0);

        let first = svc
            .analyze(&paper(), |_| {
                opened.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
        let second = svc
            .analyze(&paper(), |_| {
                opened.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();

        assert_eq!(api.calls(Endpoint::Analyze), 1);
        assert_eq!(opened.load(Ordering::SeqCst), 2);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(svc.result(&paper()).unwrap().target.en, "graphs");
    }

    #[tokio::test]
    async fn failure_clears_flags_and_leaves_cache_empty() {
        let api = Arc::new(MockApi::new().with_analysis(MockResponse::Status {
            status: 500,
            detail: None,
        }));
        let (svc, gate) = service(api);
        let err = svc.analyze(&paper(), |_| panic!("no success")).await;
        assert!(err.is_err());
        assert!(!svc.is_analyzing());
        assert!(svc.analyzing_paper().is_none());
        assert!(!gate.is_active());
        assert!(svc.cache().is_empty());
    }

    #[tokio::test]
    async fn missing_abstract_still_analyzes() {
        let api = Arc::new(MockApi::new());
        let (svc, _) = service(api.clone());
        let mut p = paper();
        p.r#abstract = None;
        svc.analyze(&p, |_| {}).await.unwrap();
        assert_eq!(api.calls(Endpoint::Analyze), 1);
    }
}
