use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum NodeType {
    #[default]
    Company,
    Person,
    Major,
    Institution,
}

impl NodeType {
    pub const ALL: [NodeType; 4] = [
        NodeType::Company,
        NodeType::Person,
        NodeType::Major,
        NodeType::Institution,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Company => "company",
            NodeType::Person => "person",
            NodeType::Major => "major",
            NodeType::Institution => "institution",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        NodeType::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == value.trim().to_ascii_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub size: f64,
    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: String,
    pub pct: Option<f64>,
    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub properties: Map<String, Value>,
}

/// Analytics computed server-side for one graph load. Replaced wholesale on
/// every load, never merged with a previous result.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AnalysisResult {
    pub suggested_focus_node_id: Option<String>,
    #[serde(default)]
    pub suggested_focus_reason: Option<String>,
    pub degree_centrality: Option<HashMap<String, f64>>,
    pub pagerank: Option<HashMap<String, f64>>,
    #[serde(default)]
    pub pagerank_skipped: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Direction {
    In,
    Out,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ConnectedNodeRef {
    pub id: String,
    pub pct: Option<f64>,
    pub direction: Direction,
    pub display_name: Option<String>,
}

/// A normalized graph ready to be published: every edge endpoint is a member
/// of `nodes`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub analysis: Option<AnalysisResult>,
}

impl GraphSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_ids(&self) -> Vec<String> {
        self.nodes.iter().map(|node| node.id.clone()).collect()
    }
}
