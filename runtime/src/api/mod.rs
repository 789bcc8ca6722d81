pub mod client;
pub mod error;
pub mod query;
pub mod types;

use async_trait::async_trait;
use serde_json::Value;

pub use client::ApiClient;
pub use error::{ApiError, ApiResult, ErrorKind};
pub use query::{GraphQuery, dedupe_labels};
pub use types::{
    ChatReply, GraphWithAnalysis, HealthStatus, LabelCount, NodeDetail, RawAnalysis, RawEdge,
    RawGraph, RawNode, Statistics,
};

/// Remote graph API. Every call is bounded by a timeout and returns a
/// classified [`ApiError`] on failure.
#[async_trait]
pub trait GraphApi: Send + Sync {
    /// Never swallows failures.
    async fn health_check(&self) -> ApiResult<HealthStatus>;

    async fn get_graph(&self, query: &GraphQuery) -> ApiResult<RawGraph>;

    /// Graph and analytics in one round trip. `analysis` may be absent.
    async fn get_graph_with_analysis(&self, query: &GraphQuery) -> ApiResult<GraphWithAnalysis>;

    async fn get_node_detail(&self, id: &str, id_property: Option<&str>)
    -> ApiResult<NodeDetail>;

    async fn get_ego_graph(
        &self,
        id: &str,
        depth: u32,
        limit: u32,
        id_property: Option<&str>,
    ) -> ApiResult<RawGraph>;

    async fn search(
        &self,
        term: &str,
        limit: u32,
        properties: Option<&[String]>,
    ) -> ApiResult<RawGraph>;

    async fn get_statistics(&self) -> ApiResult<Statistics>;

    async fn send_chat_message(&self, message: &str, context: Option<&Value>)
    -> ApiResult<ChatReply>;

    /// Best-effort: failures are logged and swallowed.
    async fn reset_chat_history(&self);
}
