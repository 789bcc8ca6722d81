#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use ownership_runtime::{
    api::{
        ApiResult, ChatReply, GraphApi, GraphQuery, GraphWithAnalysis, HealthStatus, NodeDetail,
        RawAnalysis, RawGraph, Statistics,
    },
    config::AppConfig,
    model::{GraphEdge, GraphNode},
    pipeline::LoadPipeline,
    render::RenderFacade,
    session::Session,
    store::Store,
};
use serde_json::{Value, json};
use tokio::sync::Notify;

/// Holds a node-detail request until the test releases it.
#[derive(Default)]
pub struct Gate {
    pub started: Notify,
    pub release: Notify,
}

/// Scripted [`GraphApi`]. Queued results are consumed in call order; empty
/// queues fall back to healthy, empty responses.
#[derive(Default)]
pub struct FakeApi {
    pub health: Mutex<VecDeque<ApiResult<HealthStatus>>>,
    pub graphs: Mutex<VecDeque<ApiResult<RawGraph>>>,
    pub full_graphs: Mutex<VecDeque<ApiResult<GraphWithAnalysis>>>,
    pub statistics: Mutex<VecDeque<ApiResult<Statistics>>>,
    pub details: Mutex<HashMap<String, ApiResult<NodeDetail>>>,
    pub gates: Mutex<HashMap<String, Arc<Gate>>>,
    pub full_gate: Mutex<Option<Arc<Gate>>>,
    pub ego: Mutex<VecDeque<ApiResult<RawGraph>>>,
    pub chat: Mutex<VecDeque<ApiResult<ChatReply>>>,
    pub calls: Mutex<Vec<String>>,
    pub graph_queries: Mutex<Vec<GraphQuery>>,
    pub full_queries: Mutex<Vec<GraphQuery>>,
    pub chat_contexts: Mutex<Vec<Option<Value>>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_health(&self, result: ApiResult<HealthStatus>) {
        self.health.lock().unwrap().push_back(result);
    }

    pub fn push_graph(&self, result: ApiResult<RawGraph>) {
        self.graphs.lock().unwrap().push_back(result);
    }

    pub fn push_full(&self, result: ApiResult<GraphWithAnalysis>) {
        self.full_graphs.lock().unwrap().push_back(result);
    }

    pub fn push_statistics(&self, result: ApiResult<Statistics>) {
        self.statistics.lock().unwrap().push_back(result);
    }

    pub fn set_detail(&self, id: &str, result: ApiResult<NodeDetail>) {
        self.details.lock().unwrap().insert(id.to_string(), result);
    }

    pub fn gate(&self, id: &str) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.gates
            .lock()
            .unwrap()
            .insert(id.to_string(), gate.clone());
        gate
    }

    /// Gates the next full-graph request. Its result is taken from the queue
    /// before the gate is awaited.
    pub fn gate_full(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.full_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn push_ego(&self, result: ApiResult<RawGraph>) {
        self.ego.lock().unwrap().push_back(result);
    }

    pub fn push_chat(&self, result: ApiResult<ChatReply>) {
        self.chat.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.calls().iter().filter(|call| call.as_str() == name).count()
    }

    pub fn graph_queries(&self) -> Vec<GraphQuery> {
        self.graph_queries.lock().unwrap().clone()
    }

    pub fn full_queries(&self) -> Vec<GraphQuery> {
        self.full_queries.lock().unwrap().clone()
    }

    fn record(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }
}

#[async_trait]
impl GraphApi for FakeApi {
    async fn health_check(&self) -> ApiResult<HealthStatus> {
        self.record("health_check");
        self.health
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(healthy()))
    }

    async fn get_graph(&self, query: &GraphQuery) -> ApiResult<RawGraph> {
        self.record("get_graph");
        self.graph_queries.lock().unwrap().push(query.clone());
        self.graphs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RawGraph::default()))
    }

    async fn get_graph_with_analysis(&self, query: &GraphQuery) -> ApiResult<GraphWithAnalysis> {
        self.record("get_graph_with_analysis");
        self.full_queries.lock().unwrap().push(query.clone());
        let result = self
            .full_graphs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(GraphWithAnalysis::default()));
        let gate = self.full_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }
        result
    }

    async fn get_node_detail(
        &self,
        id: &str,
        _id_property: Option<&str>,
    ) -> ApiResult<NodeDetail> {
        self.record("get_node_detail");
        let gate = self.gates.lock().unwrap().get(id).cloned();
        if let Some(gate) = gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }
        self.details
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or_else(|| Ok(detail_for(id)))
    }

    async fn get_ego_graph(
        &self,
        _id: &str,
        _depth: u32,
        _limit: u32,
        _id_property: Option<&str>,
    ) -> ApiResult<RawGraph> {
        self.record("get_ego_graph");
        self.ego
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RawGraph::default()))
    }

    async fn search(
        &self,
        _term: &str,
        _limit: u32,
        _properties: Option<&[String]>,
    ) -> ApiResult<RawGraph> {
        self.record("search");
        Ok(RawGraph::default())
    }

    async fn get_statistics(&self) -> ApiResult<Statistics> {
        self.record("get_statistics");
        self.statistics
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Statistics::default()))
    }

    async fn send_chat_message(
        &self,
        message: &str,
        context: Option<&Value>,
    ) -> ApiResult<ChatReply> {
        self.record("send_chat_message");
        self.chat_contexts.lock().unwrap().push(context.cloned());
        self.chat
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(ChatReply {
                    response: format!("echo: {message}"),
                    graph_data: None,
                })
            })
    }

    async fn reset_chat_history(&self) {
        self.record("reset_chat_history");
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall {
    Mount(usize),
    Rebuild(usize),
    FitToView,
    Focus(String),
    Highlight(usize),
    ResetHighlight,
}

#[derive(Default)]
pub struct RecordingRenderer {
    mounted: AtomicBool,
    pub calls: Mutex<Vec<RenderCall>>,
}

impl RecordingRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Node counts of every mount and rebuild, in order.
    pub fn published_sizes(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RenderCall::Mount(count) | RenderCall::Rebuild(count) => Some(count),
                _ => None,
            })
            .collect()
    }
}

impl RenderFacade for RecordingRenderer {
    fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    fn mount(&self, nodes: &[GraphNode], _edges: &[GraphEdge]) {
        self.mounted.store(true, Ordering::SeqCst);
        self.calls.lock().unwrap().push(RenderCall::Mount(nodes.len()));
    }

    fn rebuild(&self, nodes: &[GraphNode], _edges: &[GraphEdge]) {
        self.calls
            .lock()
            .unwrap()
            .push(RenderCall::Rebuild(nodes.len()));
    }

    fn fit_to_view(&self) {
        self.calls.lock().unwrap().push(RenderCall::FitToView);
    }

    fn focus_node(&self, id: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(RenderCall::Focus(id.to_string()));
    }

    fn highlight(&self, ids: &HashSet<String>) {
        self.calls
            .lock()
            .unwrap()
            .push(RenderCall::Highlight(ids.len()));
    }

    fn reset_highlight(&self) {
        self.calls.lock().unwrap().push(RenderCall::ResetHighlight);
    }
}

pub struct Harness {
    pub api: Arc<FakeApi>,
    pub store: Store,
    pub renderer: Arc<RecordingRenderer>,
    pub pipeline: Arc<LoadPipeline>,
    pub session: Session,
}

pub fn harness(api: Arc<FakeApi>) -> Harness {
    let config = Arc::new(AppConfig::default());
    let store = Store::new();
    let renderer = RecordingRenderer::new();
    let pipeline = Arc::new(LoadPipeline::new(
        api.clone(),
        store.clone(),
        renderer.clone(),
        &config,
    ));
    let session = Session::new(api.clone(), renderer.clone(), pipeline.clone(), config);
    Harness {
        api,
        store,
        renderer,
        pipeline,
        session,
    }
}

pub fn healthy() -> HealthStatus {
    HealthStatus {
        status: "healthy".into(),
        backing_store: Some("connected".into()),
        error: None,
    }
}

/// Builds a wire graph from `(id, label)` nodes and `(source, target, pct)`
/// edges.
pub fn raw_graph(nodes: &[(&str, &str)], edges: &[(&str, &str, Option<f64>)]) -> RawGraph {
    let nodes: Vec<Value> = nodes
        .iter()
        .map(|(id, label)| json!({"id": id, "label": label, "properties": {"displayName": format!("name-{id}")}}))
        .collect();
    let edges: Vec<Value> = edges
        .iter()
        .map(|(source, target, pct)| {
            json!({"source": source, "target": target, "label": "HOLDS_SHARES", "properties": {"pct": pct}})
        })
        .collect();
    serde_json::from_value(json!({"nodes": nodes, "edges": edges})).unwrap()
}

pub fn with_analysis(graph: RawGraph, suggested: Option<&str>) -> GraphWithAnalysis {
    GraphWithAnalysis {
        graph,
        analysis: suggested.map(|id| RawAnalysis {
            suggested_focus_node_id: Some(id.to_string()),
            ..RawAnalysis::default()
        }),
    }
}

pub fn detail_for(id: &str) -> NodeDetail {
    NodeDetail {
        node: json!({"id": id}),
        ..NodeDetail::default()
    }
}
