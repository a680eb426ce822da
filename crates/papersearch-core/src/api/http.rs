use std::time::Duration;

use futures_util::{StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;

use super::{ApiError, ApiFuture, ByteStream, DEFAULT_BASE_URL, PaperApi};
use crate::types::{
    AnalysisResult, AvailableModel, ModelConfig, ModelFunction, ModelsResponse, QuickSummary,
    SearchResponse, SummaryData, TitleAbstractRequest, TranslateRequest, UpdateModelRequest,
};

/// [`PaperApi`] over HTTP using a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpPaperApi {
    client: reqwest::Client,
    base_url: String,
    timeout: Option<Duration>,
}

impl Default for HttpPaperApi {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl HttpPaperApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            timeout: None,
        }
    }

    /// Per-request timeout. `None` (the default) waits indefinitely, which
    /// long-running summarization calls rely on.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_timeout(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.timeout {
            Some(t) => req.timeout(t),
            None => req,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: String,
    ) -> Result<T, ApiError> {
        tracing::debug!(endpoint, %url, "GET");
        let resp = self.apply_timeout(self.client.get(&url)).send().await?;
        let resp = check_status(resp, endpoint).await?;
        decode_json(resp).await
    }

    async fn post_json<B, T>(&self, endpoint: &'static str, body: &B) -> Result<T, ApiError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        tracing::debug!(endpoint, "POST");
        let resp = self
            .apply_timeout(self.client.post(self.url(endpoint)).json(body))
            .send()
            .await?;
        let resp = check_status(resp, endpoint).await?;
        decode_json(resp).await
    }
}

/// Turn a non-2xx response into [`ApiError::Status`], pulling `detail` out of
/// a JSON error body when the backend sent one.
pub(crate) async fn check_status(
    resp: reqwest::Response,
    endpoint: &'static str,
) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let detail = resp
        .text()
        .await
        .ok()
        .and_then(|body| serde_json::from_str::<serde_json::Value>(&body).ok())
        .and_then(|v| v["detail"].as_str().map(String::from));
    tracing::debug!(endpoint, status = status.as_u16(), ?detail, "backend returned error");
    Err(ApiError::Status {
        endpoint,
        status: status.as_u16(),
        detail,
    })
}

async fn decode_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

impl PaperApi for HttpPaperApi {
    fn search<'a>(&'a self, query: &'a str, limit: u32) -> ApiFuture<'a, SearchResponse> {
        Box::pin(async move {
            let url = format!(
                "{}?q={}&limit={}",
                self.url("/search"),
                urlencoding::encode(query),
                limit
            );
            self.get_json("/search", url).await
        })
    }

    fn analyze<'a>(
        &'a self,
        title: &'a str,
        abstract_text: &'a str,
    ) -> ApiFuture<'a, AnalysisResult> {
        Box::pin(async move {
            let body = TitleAbstractRequest {
                title,
                r#abstract: abstract_text,
            };
            self.post_json("/analyze", &body).await
        })
    }

    fn translate_stream<'a>(&'a self, text: &'a str) -> ApiFuture<'a, ByteStream> {
        Box::pin(async move {
            let endpoint = "/translate-stream";
            tracing::debug!(endpoint, "POST (streaming)");
            // The stream may legitimately run longer than any per-call timeout.
            let resp = self
                .client
                .post(self.url(endpoint))
                .json(&TranslateRequest { text })
                .send()
                .await?;
            let resp = check_status(resp, endpoint).await?;
            let stream = resp
                .bytes_stream()
                .map_ok(|chunk| chunk.to_vec())
                .map_err(ApiError::from)
                .boxed();
            Ok(stream as ByteStream)
        })
    }

    fn quick_summary<'a>(
        &'a self,
        title: &'a str,
        abstract_text: &'a str,
    ) -> ApiFuture<'a, QuickSummary> {
        Box::pin(async move {
            let body = TitleAbstractRequest {
                title,
                r#abstract: abstract_text,
            };
            self.post_json("/quick-summary", &body).await
        })
    }

    fn summarize<'a>(
        &'a self,
        title: &'a str,
        abstract_text: &'a str,
    ) -> ApiFuture<'a, SummaryData> {
        Box::pin(async move {
            let body = TitleAbstractRequest {
                title,
                r#abstract: abstract_text,
            };
            self.post_json("/summarize", &body).await
        })
    }

    fn list_models(&self) -> ApiFuture<'_, Vec<AvailableModel>> {
        Box::pin(async move {
            let resp: ModelsResponse = self.get_json("/models", self.url("/models")).await?;
            Ok(resp.models)
        })
    }

    fn model_config(&self) -> ApiFuture<'_, ModelConfig> {
        Box::pin(async move {
            self.get_json("/models/config", self.url("/models/config"))
                .await
        })
    }

    fn update_model_config<'a>(
        &'a self,
        function: ModelFunction,
        model: &'a str,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let endpoint = "/models/config";
            let body = UpdateModelRequest {
                function_name: function.wire_name(),
                model_name: model,
            };
            tracing::debug!(endpoint, function = %function, model, "POST");
            let resp = self
                .apply_timeout(self.client.post(self.url(endpoint)).json(&body))
                .send()
                .await?;
            check_status(resp, endpoint).await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let api = HttpPaperApi::new("http://localhost:8000/");
        assert_eq!(api.base_url(), "http://localhost:8000");
        assert_eq!(api.url("/search"), "http://localhost:8000/search");
    }

    #[tokio::test]
    async fn ok_status_passes_through() {
        let http_resp = ::http::Response::builder().status(200).body("{}").unwrap();
        let resp = reqwest::Response::from(http_resp);
        assert!(check_status(resp, "/search").await.is_ok());
    }

    #[tokio::test]
    async fn error_status_extracts_detail() {
        let http_resp = ::http::Response::builder()
            .status(400)
            .body(r#"{"detail": "model not installed"}"#)
            .unwrap();
        let resp = reqwest::Response::from(http_resp);
        match check_status(resp, "/models/config").await.unwrap_err() {
            ApiError::Status {
                endpoint,
                status,
                detail,
            } => {
                assert_eq!(endpoint, "/models/config");
                assert_eq!(status, 400);
                assert_eq!(detail.as_deref(), Some("model not installed"));
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_status_with_plain_body_has_no_detail() {
        let http_resp = ::http::Response::builder()
            .status(500)
            .body("Internal Server Error")
            .unwrap();
        let resp = reqwest::Response::from(http_resp);
        match check_status(resp, "/summarize").await.unwrap_err() {
            ApiError::Status { status, detail, .. } => {
                assert_eq!(status, 500);
                assert!(detail.is_none());
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_json_is_decode_error() {
        let http_resp = ::http::Response::builder()
            .status(200)
            .body("not json")
            .unwrap();
        let resp = reqwest::Response::from(http_resp);
        let err = decode_json::<SearchResponse>(resp).await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }
}
