use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use serde_json::{Value, json};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::{
    api::{ApiError, ErrorKind, GraphApi, GraphQuery, dedupe_labels},
    config::{AppConfig, LabelMap},
    focus::suggest_focus_node,
    model::{GraphSnapshot, NodeType},
    render::{RenderFacade, visible_subgraph},
    store::{Store, paths},
};

use super::{
    error_reporter::ErrorReporter,
    normalize::{normalize_graph, normalize_with_analysis},
    status_service::{LoadStage, LoadStatusService},
};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub initial_edge_limit: u32,
    pub initial_node_cap: u32,
    pub minimal_edge_limit: u32,
    pub minimal_node_cap: u32,
    pub minimal_timeout: Duration,
    pub full_timeout: Duration,
    pub fallback_timeout: Duration,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        let timeouts = &config.api.timeouts_ms;
        Self {
            initial_edge_limit: config.graph.initial_edge_limit,
            initial_node_cap: config.graph.initial_node_cap,
            minimal_edge_limit: config.graph.minimal_edge_limit,
            minimal_node_cap: config.graph.minimal_node_cap,
            minimal_timeout: timeouts.minimal_graph(),
            full_timeout: timeouts.full_graph(),
            fallback_timeout: timeouts.fallback_graph(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Ready {
        generation: u64,
        nodes: usize,
        edges: usize,
        suggested_focus: Option<String>,
        /// The full fetch timed out and the graph-only fallback was shown.
        degraded: bool,
    },
    Failed {
        generation: u64,
        kind: ErrorKind,
        message: String,
    },
    /// A newer load started before this one could publish.
    Superseded { generation: u64 },
}

impl LoadOutcome {
    pub fn generation(&self) -> u64 {
        match self {
            LoadOutcome::Ready { generation, .. }
            | LoadOutcome::Failed { generation, .. }
            | LoadOutcome::Superseded { generation } => *generation,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, LoadOutcome::Ready { .. })
    }
}

/// Staged, degrading graph load: health check, a small minimal slice shown
/// early, then the full graph with analytics, falling back to a graph-only
/// fetch when the full request times out.
///
/// Every `load()` takes a new generation; results of older generations are
/// dropped instead of published.
pub struct LoadPipeline {
    api: Arc<dyn GraphApi>,
    store: Store,
    renderer: Arc<dyn RenderFacade>,
    labels: LabelMap,
    config: PipelineConfig,
    status: LoadStatusService,
    error_reporter: ErrorReporter,
    generation: AtomicU64,
}

impl LoadPipeline {
    pub fn new(
        api: Arc<dyn GraphApi>,
        store: Store,
        renderer: Arc<dyn RenderFacade>,
        config: &AppConfig,
    ) -> Self {
        Self::with_dependencies(
            api,
            store.clone(),
            renderer,
            config.labels.clone(),
            PipelineConfig::from(config),
            LoadStatusService::new(store.clone()),
            ErrorReporter::new(store),
        )
    }

    pub fn with_dependencies(
        api: Arc<dyn GraphApi>,
        store: Store,
        renderer: Arc<dyn RenderFacade>,
        labels: LabelMap,
        config: PipelineConfig,
        status: LoadStatusService,
        error_reporter: ErrorReporter,
    ) -> Self {
        Self {
            api,
            store,
            renderer,
            labels,
            config,
            status,
            error_reporter,
            generation: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.current_generation() == generation
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub async fn load(&self) -> LoadOutcome {
        let generation = self.next_generation();
        let trace_id = format!("load-{}", Uuid::new_v4());
        let span = info_span!("load", generation, trace_id = %trace_id);
        self.run(generation).instrument(span).await
    }

    async fn run(&self, generation: u64) -> LoadOutcome {
        self.status.begin();
        info!("Starting graph load");

        match self.api.health_check().await {
            Ok(health) if health.is_healthy() => {}
            Ok(health) => {
                let err = ApiError::Upstream {
                    operation: "health_check",
                    status: health
                        .backing_store
                        .clone()
                        .unwrap_or_else(|| health.status.clone()),
                    http_status: None,
                    message: health.error.clone().unwrap_or_default(),
                };
                return self.fail(generation, LoadStage::CheckHealth, &err);
            }
            Err(err) => return self.fail(generation, LoadStage::CheckHealth, &err),
        }

        let labels = self.requested_labels();
        let full_query = GraphQuery::new(self.config.initial_edge_limit)
            .with_labels(labels.clone())
            .with_node_cap(self.config.initial_node_cap)
            .with_timeout(self.config.full_timeout);
        let api = Arc::clone(&self.api);
        let full = tokio::spawn(
            async move { api.get_graph_with_analysis(&full_query).await }.in_current_span(),
        );

        self.stage(generation, LoadStage::MinimalFetch);
        let minimal_query = GraphQuery::new(self.config.minimal_edge_limit)
            .with_labels(labels.clone())
            .with_node_cap(self.config.minimal_node_cap)
            .with_timeout(self.config.minimal_timeout);
        match self.api.get_graph(&minimal_query).await {
            Ok(raw) => {
                let snapshot = normalize_graph(raw, &self.labels);
                if snapshot.is_empty() {
                    debug!("Minimal graph was empty");
                } else if self.publish(generation, snapshot) {
                    info!("Minimal graph published");
                }
            }
            Err(err) => warn!(error = %err, "Minimal graph fetch failed"),
        }

        self.stage(generation, LoadStage::FullFetch);
        let full_result = full.await.unwrap_or_else(|join_err| {
            Err(ApiError::Unknown(format!("full graph task failed: {join_err}")))
        });

        let (snapshot, degraded) = match full_result {
            Ok(raw) => {
                self.stage(generation, LoadStage::Normalize);
                (normalize_with_analysis(raw, &self.labels), false)
            }
            Err(err) if err.is_timeout() => {
                warn!(error = %err, "Full graph fetch timed out, falling back to graph only");
                self.stage(generation, LoadStage::FallbackFetch);
                let fallback_query = GraphQuery::new(self.config.initial_edge_limit)
                    .with_labels(labels)
                    .with_node_cap(self.config.initial_node_cap)
                    .with_timeout(self.config.fallback_timeout);
                match self.api.get_graph(&fallback_query).await {
                    Ok(raw) => {
                        self.stage(generation, LoadStage::Normalize);
                        (normalize_graph(raw, &self.labels), true)
                    }
                    Err(fallback_err) => {
                        warn!(error = %fallback_err, "Fallback graph fetch failed");
                        return self.fail(generation, LoadStage::FallbackFetch, &err);
                    }
                }
            }
            Err(err) => return self.fail(generation, LoadStage::FullFetch, &err),
        };

        self.stage(generation, LoadStage::Publish);
        if !self.publish(generation, snapshot) {
            return LoadOutcome::Superseded { generation };
        }

        self.stage(generation, LoadStage::Statistics);
        match self.api.get_statistics().await {
            Ok(stats) if self.is_current(generation) => {
                if let Err(err) = self.store.set_serialized(paths::GRAPH_STATISTICS, &stats) {
                    warn!(error = %err, "Failed to store statistics");
                }
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "Statistics fetch failed"),
        }

        if !self.is_current(generation) {
            debug!("Load superseded before ready");
            return LoadOutcome::Superseded { generation };
        }

        let nodes = self.store.graph_nodes();
        let edges = self.store.graph_edges();
        let analysis = self.store.initial_analysis();
        let node_ids: Vec<String> = nodes.iter().map(|node| node.id.clone()).collect();
        let suggested_focus = suggest_focus_node(&node_ids, analysis.as_ref(), &edges);
        self.store
            .set(paths::UI_SUGGESTED_FOCUS, json!(suggested_focus));
        self.status.finish(LoadStage::Ready);

        info!(
            nodes = nodes.len(),
            edges = edges.len(),
            degraded,
            suggested = ?suggested_focus,
            "Graph load ready"
        );
        LoadOutcome::Ready {
            generation,
            nodes: nodes.len(),
            edges: edges.len(),
            suggested_focus,
            degraded,
        }
    }

    fn stage(&self, generation: u64, stage: LoadStage) {
        if self.is_current(generation) {
            self.status.advance(stage);
        }
    }

    fn fail(&self, generation: u64, stage: LoadStage, err: &ApiError) -> LoadOutcome {
        if !self.is_current(generation) {
            debug!(error = %err, "Ignoring failure of superseded load");
            return LoadOutcome::Superseded { generation };
        }
        self.write_snapshot(GraphSnapshot::empty());
        let report = self.error_reporter.record(stage, err);
        self.status.finish(LoadStage::Failed);
        LoadOutcome::Failed {
            generation,
            kind: report.kind,
            message: report.message,
        }
    }

    /// Publishes `snapshot` if `generation` is still current.
    fn publish(&self, generation: u64, snapshot: GraphSnapshot) -> bool {
        if !self.is_current(generation) {
            debug!(generation, "Dropping stale stage result");
            return false;
        }
        self.write_snapshot(snapshot);
        true
    }

    /// Publishes a graph obtained outside `load()`, such as an ego graph or
    /// chat result. In-flight loads become stale, so the load status is
    /// settled here; their later stage writes are skipped.
    pub fn publish_snapshot(&self, snapshot: GraphSnapshot) -> u64 {
        let generation = self.next_generation();
        self.write_snapshot(snapshot);
        self.status.settle();
        generation
    }

    fn write_snapshot(&self, snapshot: GraphSnapshot) {
        let GraphSnapshot {
            nodes,
            edges,
            analysis,
        } = snapshot;

        let mut writes = vec![
            (paths::GRAPH_RAW_NODES, json!(nodes)),
            (paths::GRAPH_RAW_LINKS, json!(edges)),
            (paths::GRAPH_INITIAL_ANALYSIS, json!(analysis)),
        ];
        if let Some(selected) = self.store.selected_node_id() {
            if !nodes.iter().any(|node| node.id == selected) {
                debug!(node = %selected, "Selected node left the graph");
                writes.push((paths::SELECTED_NODE, Value::Null));
                writes.push((paths::UI_NODE_DETAIL, Value::Null));
            }
        }
        self.store.set_many(writes);

        let filters = self.store.filters();
        let (visible_nodes, visible_edges) = visible_subgraph(&nodes, &edges, &filters);
        if self.renderer.is_mounted() {
            self.renderer.rebuild(&visible_nodes, &visible_edges);
        } else {
            self.renderer.mount(&visible_nodes, &visible_edges);
        }
        info!(nodes = nodes.len(), edges = edges.len(), "Published graph");
    }

    /// Server labels for the active type filters, or `None` when every type
    /// is enabled.
    pub fn requested_labels(&self) -> Option<Vec<String>> {
        let filters = self.store.filters();
        if NodeType::ALL.iter().all(|node_type| filters.contains(node_type)) {
            return None;
        }
        let labels: Vec<String> = NodeType::ALL
            .iter()
            .filter(|node_type| filters.contains(node_type))
            .filter_map(|node_type| self.labels.label_for(*node_type))
            .map(str::to_string)
            .collect();
        Some(dedupe_labels(&labels))
    }
}
