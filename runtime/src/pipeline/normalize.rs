use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    api::{GraphWithAnalysis, RawAnalysis, RawEdge, RawGraph, RawNode},
    config::LabelMap,
    model::{AnalysisResult, GraphEdge, GraphNode, GraphSnapshot, NodeType},
    neighbors::number_from,
};

const BASE_NODE_SIZE: f64 = 12.0;
const SIZE_PER_EDGE: f64 = 2.0;
const MAX_NODE_SIZE: f64 = 40.0;
const DEFAULT_EDGE_TYPE: &str = "RELATED";

pub fn normalize_graph(raw: RawGraph, labels: &LabelMap) -> GraphSnapshot {
    let mut seen = HashSet::new();
    let mut nodes: Vec<GraphNode> = raw
        .nodes
        .into_iter()
        .filter(|node| !node.id.trim().is_empty() && seen.insert(node.id.clone()))
        .map(|node| normalize_node(node, labels))
        .collect();

    let raw_edge_count = raw.edges.len();
    let edges: Vec<GraphEdge> = raw
        .edges
        .into_iter()
        .filter(|edge| seen.contains(&edge.source) && seen.contains(&edge.target))
        .map(normalize_edge)
        .collect();
    if edges.len() < raw_edge_count {
        debug!(
            dropped = raw_edge_count - edges.len(),
            "Dropped edges with endpoints outside the node set"
        );
    }

    let mut degree: HashMap<&str, usize> = HashMap::new();
    for edge in &edges {
        *degree.entry(edge.source.as_str()).or_default() += 1;
        *degree.entry(edge.target.as_str()).or_default() += 1;
    }
    for node in &mut nodes {
        let count = degree.get(node.id.as_str()).copied().unwrap_or(0);
        node.size = (BASE_NODE_SIZE + SIZE_PER_EDGE * count as f64).min(MAX_NODE_SIZE);
    }

    GraphSnapshot {
        nodes,
        edges,
        analysis: None,
    }
}

pub fn normalize_with_analysis(raw: GraphWithAnalysis, labels: &LabelMap) -> GraphSnapshot {
    let mut snapshot = normalize_graph(raw.graph, labels);
    snapshot.analysis = raw.analysis.map(normalize_analysis);
    snapshot
}

pub fn normalize_analysis(raw: RawAnalysis) -> AnalysisResult {
    AnalysisResult {
        suggested_focus_node_id: raw
            .suggested_focus_node_id
            .filter(|id| !id.trim().is_empty()),
        suggested_focus_reason: raw.suggested_focus_reason,
        degree_centrality: raw.degree_centrality.map(scores),
        pagerank: raw.pagerank.map(scores),
        pagerank_skipped: raw.pagerank_skipped,
    }
}

fn scores(raw: Map<String, Value>) -> HashMap<String, f64> {
    raw.into_iter()
        .filter_map(|(id, value)| number_from(&value).map(|score| (id, score)))
        .collect()
}

fn normalize_node(raw: RawNode, labels: &LabelMap) -> GraphNode {
    let extra_labels: Vec<String> = raw
        .properties
        .get("labels")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let label = raw
        .label
        .filter(|label| !label.is_empty())
        .or_else(|| {
            extra_labels
                .iter()
                .find(|label| labels.type_for(label).is_some())
                .or(extra_labels.first())
                .cloned()
        })
        .unwrap_or_default();

    let node_type = labels
        .type_for(&label)
        .or_else(|| extra_labels.iter().find_map(|label| labels.type_for(label)))
        .unwrap_or_default();

    let display_name = display_name(&raw.id, node_type, &raw.properties);

    GraphNode {
        id: raw.id,
        label,
        display_name,
        node_type,
        size: BASE_NODE_SIZE,
        properties: raw.properties,
    }
}

fn display_name(id: &str, node_type: NodeType, properties: &Map<String, Value>) -> String {
    let name_key = match node_type {
        NodeType::Company => "companyName",
        NodeType::Person | NodeType::Major | NodeType::Institution => "stockName",
    };
    ["displayName", name_key]
        .iter()
        .find_map(|key| {
            properties
                .get(*key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|name| !name.is_empty())
        })
        .map(str::to_string)
        .unwrap_or_else(|| id.to_string())
}

fn normalize_edge(raw: RawEdge) -> GraphEdge {
    let pct = ["pct", "stockRatio"]
        .iter()
        .find_map(|key| raw.properties.get(*key).and_then(number_from));
    GraphEdge {
        source: raw.source,
        target: raw.target,
        edge_type: raw
            .label
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| DEFAULT_EDGE_TYPE.to_string()),
        pct,
        properties: raw.properties,
    }
}
