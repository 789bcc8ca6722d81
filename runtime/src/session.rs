use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use ts_rs::TS;

use crate::{
    api::{ApiError, ApiResult, ErrorKind, GraphApi, NodeDetail},
    config::AppConfig,
    model::{ConnectedNodeRef, GraphNode, GraphSnapshot, NodeType},
    neighbors::{
        NodeStats, connected_nodes, dedupe_connected, highlight_set, max_stock_ratio,
        shareholder_count, sort_by_pct_desc,
    },
    pipeline::{LoadOutcome, LoadPipeline, message_for, normalize_graph},
    render::{RenderEvent, RenderFacade},
    store::{Store, paths},
};

const LOCAL_SEARCH_LIMIT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    Applied,
    /// The user selected another node before the detail arrived.
    Stale,
    Failed(ErrorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: String,
}

/// Side-panel view model for one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePanel {
    pub id: String,
    pub node: Option<GraphNode>,
    pub connected: Vec<ConnectedNodeRef>,
    pub stats: NodeStats,
}

/// Commands a UI shell issues against the loaded graph.
pub struct Session {
    api: Arc<dyn GraphApi>,
    store: Store,
    renderer: Arc<dyn RenderFacade>,
    pipeline: Arc<LoadPipeline>,
    config: Arc<AppConfig>,
}

impl Session {
    pub fn new(
        api: Arc<dyn GraphApi>,
        renderer: Arc<dyn RenderFacade>,
        pipeline: Arc<LoadPipeline>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            api,
            store: pipeline.store().clone(),
            renderer,
            pipeline,
            config,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub async fn load(&self) -> LoadOutcome {
        self.pipeline.load().await
    }

    fn find_node(&self, id: &str) -> Option<GraphNode> {
        self.store
            .graph_nodes()
            .into_iter()
            .find(|node| node.id == id)
    }

    fn id_property_for(&self, node: Option<&GraphNode>) -> Option<String> {
        node.and_then(|node| self.config.labels.id_property_for(&node.label))
            .map(str::to_string)
    }

    /// Selects `id`, then fetches its detail. The detail is applied only if
    /// `id` is still the selected node when it arrives.
    pub async fn select_node(&self, id: &str) -> SelectionOutcome {
        let node = self.find_node(id);
        let selected = match &node {
            Some(node) => json!(node),
            None => json!({ "id": id }),
        };
        self.store.set_many([
            (paths::SELECTED_NODE, selected),
            (paths::UI_ACTIVE_TAB, json!("detail")),
            (paths::UI_NODE_DETAIL, Value::Null),
        ]);
        self.renderer.focus_node(id);
        self.renderer
            .highlight(&highlight_set(id, &self.store.graph_edges()));

        let id_property = self.id_property_for(node.as_ref());
        let result = self.api.get_node_detail(id, id_property.as_deref()).await;

        if self.store.selected_node_id().as_deref() != Some(id) {
            debug!(node = id, "Discarding node detail for a deselected node");
            return SelectionOutcome::Stale;
        }
        match result {
            Ok(detail) => {
                if let Err(err) = self.store.set_serialized(paths::UI_NODE_DETAIL, &detail) {
                    warn!(node = id, error = %err, "Failed to store node detail");
                }
                SelectionOutcome::Applied
            }
            Err(err) => {
                warn!(node = id, error = %err, "Node detail fetch failed");
                SelectionOutcome::Failed(err.kind())
            }
        }
    }

    pub fn clear_selection(&self) {
        self.store.set_many([
            (paths::SELECTED_NODE, Value::Null),
            (paths::UI_NODE_DETAIL, Value::Null),
        ]);
        self.renderer.reset_highlight();
    }

    pub async fn handle_render_event(&self, event: RenderEvent) -> Option<SelectionOutcome> {
        match event {
            RenderEvent::NodeSelected(id) => Some(self.select_node(&id).await),
            RenderEvent::CanvasCleared => {
                self.clear_selection();
                None
            }
            RenderEvent::Stabilized => {
                let suggested = self
                    .store
                    .get_as::<String>(paths::UI_SUGGESTED_FOCUS)
                    .filter(|id| self.find_node(id).is_some());
                match suggested {
                    Some(id) => self.renderer.focus_node(&id),
                    None => self.renderer.fit_to_view(),
                }
                None
            }
        }
    }

    /// Flips one node type in `filters` and reloads with the new label set.
    pub async fn toggle_filter(&self, node_type: NodeType) -> LoadOutcome {
        let mut filters = self.store.filters();
        if !filters.remove(&node_type) {
            filters.insert(node_type);
        }
        self.store.set_filters(&filters);
        info!(filter = node_type.as_str(), enabled = filters.contains(&node_type), "Filter toggled");
        self.pipeline.load().await
    }

    /// Case-insensitive substring match over loaded node ids and names.
    pub fn search_local(&self, query: &str) -> Vec<GraphNode> {
        let query = query.trim();
        self.store.set(paths::UI_SEARCH_QUERY, json!(query));
        if query.is_empty() {
            return Vec::new();
        }
        let needle = query.to_lowercase();
        self.store
            .graph_nodes()
            .into_iter()
            .filter(|node| {
                node.id.to_lowercase().contains(&needle)
                    || node.display_name.to_lowercase().contains(&needle)
            })
            .take(LOCAL_SEARCH_LIMIT)
            .collect()
    }

    pub async fn search_remote(&self, term: &str) -> ApiResult<GraphSnapshot> {
        let raw = self
            .api
            .search(term.trim(), self.config.graph.search_limit, None)
            .await?;
        Ok(normalize_graph(raw, &self.config.labels))
    }

    /// Replaces the graph with `id` and its neighbourhood.
    pub async fn enter_ego_view(&self, id: &str) -> ApiResult<usize> {
        let id_property = self.id_property_for(self.find_node(id).as_ref());
        let raw = self
            .api
            .get_ego_graph(
                id,
                self.config.graph.ego_depth,
                self.config.graph.ego_limit,
                id_property.as_deref(),
            )
            .await?;
        let snapshot = normalize_graph(raw, &self.config.labels);
        let count = snapshot.nodes.len();
        self.pipeline.publish_snapshot(snapshot);
        self.store.set_many([
            (paths::UI_EGO_ROOT, json!(id)),
            (paths::UI_SUGGESTED_FOCUS, json!(id)),
        ]);
        info!(node = id, nodes = count, "Entered ego view");
        Ok(count)
    }

    pub async fn exit_ego_view(&self) -> LoadOutcome {
        self.store.set(paths::UI_EGO_ROOT, Value::Null);
        self.pipeline.load().await
    }

    pub fn chat_history(&self) -> Vec<ChatTurn> {
        self.store
            .get_as(paths::CHAT_HISTORY)
            .unwrap_or_default()
    }

    fn push_turn(&self, role: ChatRole, content: &str) {
        let mut history = self.chat_history();
        history.push(ChatTurn {
            role,
            content: content.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        });
        if let Err(err) = self.store.set_serialized(paths::CHAT_HISTORY, &history) {
            warn!(error = %err, "Failed to store chat history");
        }
    }

    /// Sends `text` with the chat context (or the selected node) and records
    /// both turns. A reply carrying graph data replaces the displayed graph.
    pub async fn send_chat(&self, text: &str) -> ApiResult<String> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ApiError::Validation {
                operation: "send_chat_message",
                message: "message is empty".into(),
            });
        }
        self.push_turn(ChatRole::User, text);

        let context = self
            .store
            .get(paths::CHAT_CONTEXT)
            .filter(|value| !value.is_null())
            .or_else(|| {
                self.store
                    .get(paths::SELECTED_NODE)
                    .filter(|value| !value.is_null())
            });

        match self.api.send_chat_message(text, context.as_ref()).await {
            Ok(reply) => {
                self.push_turn(ChatRole::Assistant, &reply.response);
                if let Some(graph) = reply.graph_data.filter(|graph| !graph.nodes.is_empty()) {
                    let snapshot = normalize_graph(graph, &self.config.labels);
                    info!(nodes = snapshot.nodes.len(), "Chat reply carried a graph");
                    self.pipeline.publish_snapshot(snapshot);
                }
                Ok(reply.response)
            }
            Err(err) => {
                self.push_turn(ChatRole::Assistant, &message_for(&err));
                Err(err)
            }
        }
    }

    pub async fn reset_chat(&self) {
        self.api.reset_chat_history().await;
        self.store.set(paths::CHAT_HISTORY, json!([]));
    }

    pub fn node_panel(&self, id: &str) -> NodePanel {
        let nodes = self.store.graph_nodes();
        let edges = self.store.graph_edges();
        let node = nodes.iter().find(|node| node.id == id).cloned();

        let mut connected = dedupe_connected(&connected_nodes(id, &nodes, &edges));
        sort_by_pct_desc(&mut connected);

        let detail: Option<NodeDetail> = if self.store.selected_node_id().as_deref() == Some(id) {
            self.store.get_as(paths::UI_NODE_DETAIL)
        } else {
            None
        };
        let stats = NodeStats {
            connection_count: connected.len(),
            max_stock_ratio: max_stock_ratio(
                detail.as_ref().and_then(|detail| detail.max_stock_ratio_from_rels),
                &connected,
                node.as_ref(),
            ),
            shareholder_count: shareholder_count(
                detail.as_ref().and_then(|detail| detail.shareholder_count),
                &connected,
                node.as_ref(),
            ),
        };

        NodePanel {
            id: id.to_string(),
            node,
            connected,
            stats,
        }
    }
}
