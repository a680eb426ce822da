//! Search state and its URL query-string form.
//!
//! Search parameters round-trip through `q=...&limit=...` so that a results
//! view can be shared or restored from a link.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::api::PaperApi;
use crate::types::Paper;

/// Page sizes offered to the user.
pub const RESULT_LIMIT_OPTIONS: [u32; 5] = [5, 10, 20, 50, 100];
pub const DEFAULT_RESULT_LIMIT: u32 = 10;

/// Snap a requested limit to one of [`RESULT_LIMIT_OPTIONS`].
pub fn normalize_limit(limit: u32) -> u32 {
    if RESULT_LIMIT_OPTIONS.contains(&limit) {
        limit
    } else {
        tracing::warn!(
            limit,
            default = DEFAULT_RESULT_LIMIT,
            "unsupported result limit, using default"
        );
        DEFAULT_RESULT_LIMIT
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    pub query: String,
    pub limit: u32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            query: String::new(),
            limit: DEFAULT_RESULT_LIMIT,
        }
    }
}

impl SearchParams {
    pub fn new(query: impl Into<String>, limit: u32) -> Self {
        Self {
            query: query.into(),
            limit: normalize_limit(limit),
        }
    }

    /// Parse `q=...&limit=...`. A leading `?` is allowed; unknown keys are
    /// kept out of the params but do not cause an error.
    pub fn from_query_string(qs: &str) -> Self {
        let mut params = Self::default();
        for pair in qs.trim_start_matches('?').split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = decode_component(value);
            match key {
                "q" => params.query = value,
                "limit" => {
                    params.limit = value
                        .parse()
                        .map(normalize_limit)
                        .unwrap_or(DEFAULT_RESULT_LIMIT)
                }
                _ => {}
            }
        }
        params
    }

    pub fn to_query_string(&self) -> String {
        format!(
            "q={}&limit={}",
            urlencoding::encode(&self.query),
            self.limit
        )
    }

    /// Shareable results link rooted at `base`.
    pub fn results_link(&self, base: &str) -> String {
        format!(
            "{}/results?{}",
            base.trim_end_matches('/'),
            self.to_query_string()
        )
    }

    pub fn with_query(&self, query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: self.limit,
        }
    }

    pub fn with_limit(&self, limit: u32) -> Self {
        Self {
            query: self.query.clone(),
            limit: normalize_limit(limit),
        }
    }
}

fn decode_component(s: &str) -> String {
    let spaced = s.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|c| c.into_owned())
        .unwrap_or(spaced)
}

/// Client-side ordering of the current result set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Server order.
    #[default]
    Relevance,
    /// Newest first.
    Date,
    /// Most cited first.
    Citations,
}

impl SortOrder {
    pub const ALL: [SortOrder; 3] = [Self::Relevance, Self::Date, Self::Citations];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relevance => "relevance",
            Self::Date => "date",
            Self::Citations => "citations",
        }
    }

    /// Reorder `papers` in place. Stable, so ties keep server order, and
    /// papers missing the sort key go last.
    pub fn apply(&self, papers: &mut [Paper]) {
        match self {
            Self::Relevance => {}
            Self::Date => papers.sort_by(|a, b| desc_none_last(date_key(a), date_key(b))),
            Self::Citations => {
                papers.sort_by(|a, b| desc_none_last(a.citation_count, b.citation_count))
            }
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|o| o.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown sort order: {}", s))
    }
}

fn date_key(paper: &Paper) -> Option<(i32, String)> {
    let date = paper.publication_date.clone().unwrap_or_default();
    let year = date
        .get(..4)
        .and_then(|y| y.parse().ok())
        .or(paper.year)?;
    Some((year, date))
}

fn desc_none_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Snapshot of the search view.
#[derive(Debug, Clone, Default)]
pub struct SearchState {
    pub params: SearchParams,
    pub results: Vec<Paper>,
    pub is_loading: bool,
    /// Client-measured wall-clock time of the last search.
    pub elapsed: Option<Duration>,
    pub sort: SortOrder,
}

#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub papers: Vec<Paper>,
    pub elapsed: Duration,
    /// `false` when the request failed and the results were cleared.
    pub ok: bool,
}

#[derive(Default)]
struct Inner {
    state: SearchState,
    /// Results in server order, kept so `Relevance` can be restored.
    server_order: Vec<Paper>,
}

pub struct SearchService {
    api: Arc<dyn PaperApi>,
    inner: Mutex<Inner>,
}

impl SearchService {
    pub fn new(api: Arc<dyn PaperApi>) -> Self {
        Self {
            api,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run one search. A blank query is ignored. Failures are logged, clear
    /// the results, and are never retried.
    pub async fn search(&self, params: SearchParams) -> SearchOutcome {
        if params.query.trim().is_empty() {
            tracing::debug!("ignoring blank search query");
            return SearchOutcome::default();
        }

        {
            let mut inner = self.lock();
            inner.state.params = params.clone();
            inner.state.is_loading = true;
        }

        let start = Instant::now();
        let result = self.api.search(&params.query, params.limit).await;
        let elapsed = start.elapsed();

        let mut inner = self.lock();
        inner.state.is_loading = false;
        match result {
            Ok(resp) => {
                tracing::info!(
                    query = %params.query,
                    limit = params.limit,
                    count = resp.papers.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "search complete"
                );
                let mut sorted = resp.papers.clone();
                inner.state.sort.apply(&mut sorted);
                inner.server_order = resp.papers;
                inner.state.results = sorted.clone();
                inner.state.elapsed = Some(elapsed);
                SearchOutcome {
                    papers: sorted,
                    elapsed,
                    ok: true,
                }
            }
            Err(e) => {
                tracing::warn!(query = %params.query, error = %e, "search failed");
                inner.server_order.clear();
                inner.state.results.clear();
                inner.state.elapsed = Some(elapsed);
                SearchOutcome {
                    papers: vec![],
                    elapsed,
                    ok: false,
                }
            }
        }
    }

    /// Restore a search from a shared query string.
    pub async fn open(&self, query_string: &str) -> SearchOutcome {
        self.search(SearchParams::from_query_string(query_string))
            .await
    }

    /// Re-run the current query with a new page size.
    pub async fn change_limit(&self, limit: u32) -> SearchOutcome {
        let params = self.lock().state.params.with_limit(limit);
        self.search(params).await
    }

    /// Reorder the current results without another request.
    pub fn set_sort(&self, sort: SortOrder) {
        let mut inner = self.lock();
        inner.state.sort = sort;
        let mut sorted = inner.server_order.clone();
        sort.apply(&mut sorted);
        inner.state.results = sorted;
    }

    pub fn state(&self) -> SearchState {
        self.lock().state.clone()
    }

    pub fn results(&self) -> Vec<Paper> {
        self.lock().state.results.clone()
    }
}
