use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::time::{Duration, sleep, timeout};
use tracing::{debug, warn};

use crate::config::{AppConfig, TimeoutsConfig};

use super::{
    ApiError, ApiResult, GraphApi, GraphQuery,
    types::{ChatReply, GraphWithAnalysis, HealthStatus, NodeDetail, RawGraph, Statistics},
};

/// reqwest implementation of [`GraphApi`].
pub struct ApiClient {
    http: Client,
    base: Url,
    timeouts: TimeoutsConfig,
    retry_count: u32,
    retry_delay: Duration,
    default_relationship_types: Vec<String>,
    default_search_properties: Vec<String>,
}

impl ApiClient {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        let base = Url::parse(&config.api.base_url)
            .with_context(|| format!("Invalid API base url: {}", config.api.base_url))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("API base url cannot carry paths: {}", config.api.base_url);
        }

        Ok(Self {
            http,
            base,
            timeouts: config.api.timeouts_ms.clone(),
            retry_count: config.api.retry_count,
            retry_delay: Duration::from_millis(config.api.retry_delay_ms),
            default_relationship_types: config.graph.default_relationship_types.clone(),
            default_search_properties: config.graph.default_search_properties.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            path.extend(segments);
        }
        url
    }

    /// Sends the request and decodes the body within `budget`. When the
    /// budget elapses the request future is dropped, aborting the transfer.
    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        budget: Duration,
        request: RequestBuilder,
    ) -> ApiResult<T> {
        let call = async {
            let resp = request
                .send()
                .await
                .map_err(|err| ApiError::from_reqwest(operation, err))?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(upstream_error(operation, status, &body));
            }
            let bytes = resp
                .bytes()
                .await
                .map_err(|err| ApiError::from_reqwest(operation, err))?;
            serde_json::from_slice::<T>(&bytes).map_err(|err| ApiError::Validation {
                operation,
                message: err.to_string(),
            })
        };

        match timeout(budget, call).await {
            Ok(Err(ApiError::Timeout { .. })) | Err(_) => Err(ApiError::Timeout {
                operation,
                after: budget,
            }),
            Ok(result) => result,
        }
    }

    async fn get_json_with_retry<T, F>(
        &self,
        operation: &'static str,
        budget: Duration,
        build: F,
    ) -> ApiResult<T>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let mut delay = self.retry_delay;
        let mut attempt = 0;
        loop {
            match self.execute(operation, budget, build()).await {
                Err(err) if err.is_retryable() && attempt < self.retry_count => {
                    attempt += 1;
                    warn!(operation, attempt, error = %err, "Retrying request");
                    sleep(delay).await;
                    delay = Duration::from_millis((delay.as_millis() as f64 * 1.8) as u64)
                        + Duration::from_millis(fastrand::u64(0..250));
                }
                other => return other,
            }
        }
    }
}

/// Maps a non-2xx response to [`ApiError::Upstream`]. The status sub-code is
/// taken from `detail.status`, the body's `status` or `neo4j` field, else
/// `http_<code>`.
fn upstream_error(operation: &'static str, status: StatusCode, body: &str) -> ApiError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let detail = parsed.as_ref().and_then(|value| value.get("detail"));

    let sub_code = detail
        .and_then(|detail| detail.get("status"))
        .or_else(|| parsed.as_ref().and_then(|value| value.get("status")))
        .or_else(|| parsed.as_ref().and_then(|value| value.get("neo4j")))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("http_{}", status.as_u16()));

    let message = match detail {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Object(map)) => ["message", "error", "detail"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| Value::Object(map.clone()).to_string()),
        Some(other) => other.to_string(),
        None => parsed
            .as_ref()
            .and_then(|value| value.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.trim().to_string()),
    };

    ApiError::Upstream {
        operation,
        status: sub_code,
        http_status: Some(status.as_u16()),
        message,
    }
}

#[async_trait]
impl GraphApi for ApiClient {
    async fn health_check(&self) -> ApiResult<HealthStatus> {
        let request = self.http.get(self.endpoint(&["health"]));
        self.execute("health_check", self.timeouts.health(), request)
            .await
    }

    async fn get_graph(&self, query: &GraphQuery) -> ApiResult<RawGraph> {
        let budget = query.timeout.unwrap_or_else(|| self.timeouts.general());
        let request = self
            .http
            .get(self.endpoint(&["api", "graph"]))
            .query(&query.query_pairs(&self.default_relationship_types));
        debug!(limit = query.limit, labels = ?query.node_labels, "Fetching graph");
        self.execute("get_graph", budget, request).await
    }

    async fn get_graph_with_analysis(&self, query: &GraphQuery) -> ApiResult<GraphWithAnalysis> {
        let budget = query.timeout.unwrap_or_else(|| self.timeouts.full_graph());
        let request = self
            .http
            .get(self.endpoint(&["api", "graph", "analysis"]))
            .query(&query.query_pairs(&self.default_relationship_types));
        debug!(limit = query.limit, labels = ?query.node_labels, "Fetching graph with analysis");
        self.execute("get_graph_with_analysis", budget, request)
            .await
    }

    async fn get_node_detail(
        &self,
        id: &str,
        id_property: Option<&str>,
    ) -> ApiResult<NodeDetail> {
        let url = self.endpoint(&["api", "node", id]);
        self.get_json_with_retry("get_node_detail", self.timeouts.general(), || {
            let request = self.http.get(url.clone());
            match id_property {
                Some(prop) => request.query(&[("id_property", prop)]),
                None => request,
            }
        })
        .await
    }

    async fn get_ego_graph(
        &self,
        id: &str,
        depth: u32,
        limit: u32,
        id_property: Option<&str>,
    ) -> ApiResult<RawGraph> {
        let url = self.endpoint(&["api", "node", id, "ego"]);
        self.get_json_with_retry("get_ego_graph", self.timeouts.general(), || {
            let mut pairs = vec![("depth", depth.to_string()), ("limit", limit.to_string())];
            if let Some(prop) = id_property {
                pairs.push(("id_property", prop.to_string()));
            }
            self.http.get(url.clone()).query(&pairs)
        })
        .await
    }

    async fn search(
        &self,
        term: &str,
        limit: u32,
        properties: Option<&[String]>,
    ) -> ApiResult<RawGraph> {
        let url = self.endpoint(&["api", "graph", "search"]);
        let properties = properties.unwrap_or(self.default_search_properties.as_slice());
        self.get_json_with_retry("search", self.timeouts.general(), || {
            let mut pairs = vec![("search", term.to_string()), ("limit", limit.to_string())];
            pairs.extend(
                properties
                    .iter()
                    .map(|prop| ("search_properties", prop.clone())),
            );
            self.http.get(url.clone()).query(&pairs)
        })
        .await
    }

    async fn get_statistics(&self) -> ApiResult<Statistics> {
        let request = self.http.get(self.endpoint(&["api", "statistics"]));
        self.execute("get_statistics", self.timeouts.statistics(), request)
            .await
    }

    async fn send_chat_message(
        &self,
        message: &str,
        context: Option<&Value>,
    ) -> ApiResult<ChatReply> {
        let body = json!({
            "message": message,
            "context": context.cloned().unwrap_or_else(|| json!({})),
        });
        let request = self
            .http
            .post(self.endpoint(&["api", "chat"]))
            .json(&body);
        self.execute("send_chat_message", self.timeouts.chat(), request)
            .await
    }

    async fn reset_chat_history(&self) {
        let request = self.http.post(self.endpoint(&["api", "chat", "reset"]));
        if let Err(err) = self
            .execute::<Value>("reset_chat_history", self.timeouts.general(), request)
            .await
        {
            warn!(error = %err, "Failed to reset chat history on the server");
        }
    }
}
