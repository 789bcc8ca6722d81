use std::{
    collections::HashSet,
    sync::atomic::{AtomicBool, Ordering},
};

use tracing::{debug, info};

use crate::model::{GraphEdge, GraphNode, NodeType};

/// Events reported back by the rendering engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    NodeSelected(String),
    CanvasCleared,
    Stabilized,
}

/// Capabilities the dashboard needs from a graph renderer. Implementations
/// own layout and drawing; they receive already-filtered data.
pub trait RenderFacade: Send + Sync {
    fn is_mounted(&self) -> bool;

    fn mount(&self, nodes: &[GraphNode], edges: &[GraphEdge]);

    fn rebuild(&self, nodes: &[GraphNode], edges: &[GraphEdge]);

    fn fit_to_view(&self);

    fn focus_node(&self, id: &str);

    fn highlight(&self, ids: &HashSet<String>);

    fn reset_highlight(&self);
}

/// Renderer for the headless binary: tracks mount state and logs calls.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    mounted: AtomicBool,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderFacade for HeadlessRenderer {
    fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    fn mount(&self, nodes: &[GraphNode], edges: &[GraphEdge]) {
        self.mounted.store(true, Ordering::Release);
        info!(nodes = nodes.len(), edges = edges.len(), "Renderer mounted");
    }

    fn rebuild(&self, nodes: &[GraphNode], edges: &[GraphEdge]) {
        info!(nodes = nodes.len(), edges = edges.len(), "Renderer rebuilt");
    }

    fn fit_to_view(&self) {
        debug!("fit to view");
    }

    fn focus_node(&self, id: &str) {
        debug!(node = id, "focus node");
    }

    fn highlight(&self, ids: &HashSet<String>) {
        debug!(count = ids.len(), "highlight");
    }

    fn reset_highlight(&self) {
        debug!("reset highlight");
    }
}

/// Nodes whose type is enabled, and the edges between them.
pub fn visible_subgraph(
    nodes: &[GraphNode],
    edges: &[GraphEdge],
    filters: &HashSet<NodeType>,
) -> (Vec<GraphNode>, Vec<GraphEdge>) {
    let visible: Vec<GraphNode> = nodes
        .iter()
        .filter(|node| filters.contains(&node.node_type))
        .cloned()
        .collect();
    let ids: HashSet<&str> = visible.iter().map(|node| node.id.as_str()).collect();
    let links = edges
        .iter()
        .filter(|edge| ids.contains(edge.source.as_str()) && ids.contains(edge.target.as_str()))
        .cloned()
        .collect();
    (visible, links)
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use super::*;

    fn node(id: &str, node_type: NodeType) -> GraphNode {
        GraphNode {
            id: id.into(),
            label: "Company".into(),
            display_name: id.into(),
            node_type,
            size: 12.0,
            properties: Map::new(),
        }
    }

    #[test]
    fn hidden_types_drop_their_edges() {
        let nodes = vec![node("c1", NodeType::Company), node("p1", NodeType::Person)];
        let edges = vec![GraphEdge {
            source: "p1".into(),
            target: "c1".into(),
            edge_type: "HOLDS_SHARES".into(),
            pct: Some(10.0),
            properties: Map::new(),
        }];
        let filters = HashSet::from([NodeType::Company]);
        let (visible, links) = visible_subgraph(&nodes, &edges, &filters);
        assert_eq!(visible.len(), 1);
        assert!(links.is_empty());
    }
}
