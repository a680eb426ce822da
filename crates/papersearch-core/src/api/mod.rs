//! Backend API trait and its HTTP implementation.
//!
//! Every network operation goes through [`PaperApi`] so that services can be
//! exercised against [`mock::MockApi`] without a running backend.

pub mod http;
pub mod mock;

use std::future::Future;
use std::pin::Pin;

use futures_util::Stream;
use thiserror::Error;

use crate::types::{
    AnalysisResult, AvailableModel, ModelConfig, ModelFunction, QuickSummary, SearchResponse,
    SummaryData,
};

pub use self::http::HttpPaperApi;

/// Default backend location when nothing is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Boxed future returned by every [`PaperApi`] method.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Raw body of `POST /translate-stream`, chunked as it arrives.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, ApiError>> + Send>>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{endpoint} failed with HTTP {status}{}", detail_suffix(.detail))]
    Status {
        endpoint: &'static str,
        status: u16,
        detail: Option<String>,
    },
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("paper has no abstract")]
    MissingAbstract,
    #[error("translation failed: {0}")]
    Stream(String),
    #[error("translation stream ended before completion")]
    StreamIncomplete,
    #[error("request failed: {0}")]
    Transport(String),
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(d) => format!(": {}", d),
        None => String::new(),
    }
}

impl ApiError {
    /// The backend's `detail` message, if it sent one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Status { detail, .. } => detail.as_deref(),
            ApiError::Stream(msg) => Some(msg),
            _ => None,
        }
    }
}

/// The Paper Search backend, one method per endpoint.
///
/// Implementations make exactly one attempt per call: no retries and no
/// caching. Caching is the job of the services layer.
pub trait PaperApi: Send + Sync {
    /// `GET /search?q=&limit=`
    fn search<'a>(&'a self, query: &'a str, limit: u32) -> ApiFuture<'a, SearchResponse>;

    /// `POST /analyze`
    fn analyze<'a>(&'a self, title: &'a str, abstract_text: &'a str)
    -> ApiFuture<'a, AnalysisResult>;

    /// `POST /translate-stream`. Resolves once the response headers arrive;
    /// the body is consumed through the returned stream.
    fn translate_stream<'a>(&'a self, text: &'a str) -> ApiFuture<'a, ByteStream>;

    /// `POST /quick-summary`
    fn quick_summary<'a>(
        &'a self,
        title: &'a str,
        abstract_text: &'a str,
    ) -> ApiFuture<'a, QuickSummary>;

    /// `POST /summarize`
    fn summarize<'a>(&'a self, title: &'a str, abstract_text: &'a str)
    -> ApiFuture<'a, SummaryData>;

    /// `GET /models`
    fn list_models(&self) -> ApiFuture<'_, Vec<AvailableModel>>;

    /// `GET /models/config`
    fn model_config(&self) -> ApiFuture<'_, ModelConfig>;

    /// `POST /models/config`
    fn update_model_config<'a>(
        &'a self,
        function: ModelFunction,
        model: &'a str,
    ) -> ApiFuture<'a, ()>;
}
