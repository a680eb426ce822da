//! Session-level behavior against the in-process [`MockApi`].
//!
//! Timing-sensitive tests run on a paused clock so the queue's debounce and
//! interval are deterministic.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use papersearch_core::api::mock::{Endpoint, MockApi, MockResponse};
use papersearch_core::storage::ModelConfigStore;
use papersearch_core::types::{Author, SearchResponse, SummaryData};
use papersearch_core::{
    Paper, PaperId, QueueEvent, SearchParams, Session, SessionOptions, TaskKind, Trigger,
};
use tokio_util::sync::CancellationToken;

fn paper(title: &str, abstract_text: Option<&str>) -> Paper {
    Paper {
        paper_id: Some(format!("s2-{}", title.to_lowercase().replace(' ', "-"))),
        title: title.to_string(),
        r#abstract: abstract_text.map(String::from),
        ..Default::default()
    }
}

fn session_with(api: Arc<MockApi>) -> Session {
    Session::new(
        api,
        SessionOptions {
            model_store: ModelConfigStore::disabled(),
            ..Default::default()
        },
    )
}

fn results(papers: Vec<Paper>) -> MockResponse<SearchResponse> {
    MockResponse::Ok(SearchResponse {
        total: Some(papers.len() as u64),
        papers,
        time: Some(0.2),
    })
}

#[tokio::test]
async fn detailed_summary_requested_once_per_paper() {
    let api = Arc::new(MockApi::new().with_summary(MockResponse::Ok(SummaryData {
        summary: Some("A short summary.".into()),
        structured: None,
    })));
    let session = session_with(api.clone());
    let p = paper("Attention Is All You Need", Some("Transformers."));

    session.summary().summarize(&p, Trigger::User).await.unwrap();
    session.summary().summarize(&p, Trigger::User).await.unwrap();

    assert_eq!(api.calls(Endpoint::Summarize), 1);
    assert!(session.priority_task().is_none());
}

#[tokio::test(start_paused = true)]
async fn queue_summarizes_each_abstract_paper_once() {
    let papers = vec![
        paper("Alpha", Some("a")),
        paper("Beta", None),
        paper("Gamma", Some("g")),
        paper("Delta", Some("   ")),
        paper("Epsilon", Some("e")),
    ];
    let api = Arc::new(MockApi::new().with_search(results(papers)));
    let session = session_with(api.clone());

    let cancel = CancellationToken::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    let runner = {
        let sink = Arc::clone(&events);
        session.spawn_queue(cancel.clone(), move |e| sink.lock().unwrap().push(e))
    };

    session.search(SearchParams::new("graphs", 10)).await;
    tokio::time::sleep(Duration::from_secs(10)).await;

    let titles = api.quick_summary_titles();
    assert_eq!(titles, vec!["Alpha", "Gamma", "Epsilon"]);
    let unique: HashSet<_> = titles.iter().collect();
    assert_eq!(unique.len(), titles.len());
    assert!(
        events
            .lock()
            .unwrap()
            .iter()
            .all(|e| matches!(e, QueueEvent::Summarized { .. }))
    );

    // Re-running the same search requeues, but nothing is requested twice.
    session.search(SearchParams::new("graphs", 10)).await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(api.calls(Endpoint::QuickSummary), 3);

    cancel.cancel();
    runner.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn queue_waits_for_priority_task_then_resumes() {
    let papers = vec![paper("Alpha", Some("a")), paper("Beta", Some("b"))];
    let api = Arc::new(
        MockApi::new()
            .with_search(results(papers))
            .with_delay(Duration::from_secs(1)),
    );
    let session = Arc::new(session_with(api.clone()));
    let cancel = CancellationToken::new();
    let runner = session.spawn_queue(cancel.clone(), |_| {});

    session.search(SearchParams::new("graphs", 10)).await;

    let analysis = {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            let target = paper("Other", Some("o"));
            session.analysis().analyze(&target, |_| {}).await
        })
    };
    tokio::time::sleep(Duration::from_millis(900)).await;
    assert_eq!(
        session.priority_task().map(|t| t.kind),
        Some(TaskKind::Analyze)
    );
    assert_eq!(api.calls(Endpoint::QuickSummary), 0);

    analysis.await.unwrap().unwrap();
    assert!(session.priority_task().is_none());

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(api.calls(Endpoint::QuickSummary), 1);

    cancel.cancel();
    runner.await.unwrap();
}

#[tokio::test]
async fn streamed_translation_lands_in_cache() {
    let api = Arc::new(MockApi::new().with_translation_chunks([
        "data: {\"type\":\"start\"}\n",
        "data: {\"type\":\"chunk\",\"accumulated\":\"Hi\"}\n",
        "data: {\"type\":\"chunk\",\"accumulated\":\"Hi there\"}\n",
        "data: {\"type\":\"complete\",\"content\":\"Hi there.\"}\n",
    ]));
    let session = session_with(api);
    let p = paper("Greeting", Some("Hello there."));

    let text = session
        .translation()
        .translate(&p, |_| {}, |_| {})
        .await
        .unwrap();

    assert_eq!(text.as_str(), "Hi there.");
    assert_eq!(session.translation().streaming_text(), "Hi there.");
    assert!(!session.translation().is_streaming());
    assert_eq!(
        session.translation().result(&p).unwrap().as_str(),
        "Hi there."
    );
}

#[tokio::test]
async fn search_results_feed_queue() {
    let api = Arc::new(MockApi::new().with_search(results(vec![
        Paper {
            title: "A".into(),
            r#abstract: Some("x".into()),
            ..Default::default()
        },
        Paper {
            title: "B".into(),
            ..Default::default()
        },
    ])));
    let session = session_with(api.clone());

    let outcome = session.search(SearchParams::new("neural", 10)).await;

    assert_eq!(outcome.papers.len(), 2);
    assert_eq!(api.search_args(), vec![("neural".to_string(), 10)]);
    assert_eq!(
        session.queue().pending_ids(),
        vec![PaperId::from("A_unknown")]
    );
}

#[tokio::test]
async fn fallback_identity_shares_cache_entries() {
    let api = Arc::new(MockApi::new());
    let session = session_with(api.clone());
    let make = |abstract_text: &str| Paper {
        title: "Deep Residual Learning".into(),
        authors: vec![Author {
            name: "Kaiming He".into(),
        }],
        r#abstract: Some(abstract_text.into()),
        ..Default::default()
    };
    let first = make("Version one.");
    let second = make("Version two.");
    assert_eq!(PaperId::of(&first), PaperId::of(&second));
    assert_eq!(PaperId::of(&first).as_str(), "Deep Residual Learning_Kaiming He");

    session.summary().summarize(&first, Trigger::User).await.unwrap();
    session.summary().summarize(&second, Trigger::User).await.unwrap();
    assert_eq!(api.calls(Endpoint::Summarize), 1);
}

#[tokio::test]
async fn failed_search_clears_results_and_queue() {
    let api = Arc::new(MockApi::new().with_search(results(vec![paper("Alpha", Some("a"))])));
    let session = session_with(api.clone());
    session.search(SearchParams::new("graphs", 10)).await;
    assert_eq!(session.queue().len(), 1);

    api.set_search(MockResponse::Status {
        status: 500,
        detail: Some("index offline".into()),
    });
    let outcome = session.search(SearchParams::new("graphs", 20)).await;
    assert!(!outcome.ok);
    assert!(session.searcher().results().is_empty());
    assert!(session.queue().is_empty());
}

#[tokio::test]
async fn shared_link_restores_search() {
    let api = Arc::new(MockApi::new().with_search(results(vec![paper("Alpha", Some("a"))])));
    let session = session_with(api.clone());
    session.open("q=graph+neural%20nets&limit=20").await;
    assert_eq!(
        api.search_args(),
        vec![("graph neural nets".to_string(), 20)]
    );
    assert_eq!(
        session.searcher().state().params.to_query_string(),
        "q=graph%20neural%20nets&limit=20"
    );
}
