use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

/// Ids arrive as strings or as bare numbers depending on the backing store.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(value) => Ok(value),
        Value::Number(value) => Ok(value.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(Value::Number(value)) => Ok(Some(value.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default, alias = "neo4j", alias = "backingStore")]
    pub backing_store: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
            && self
                .backing_store
                .as_deref()
                .is_none_or(|store| store == "connected")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEdge {
    #[serde(deserialize_with = "string_or_number")]
    pub source: String,
    #[serde(deserialize_with = "string_or_number")]
    pub target: String,
    #[serde(default, alias = "type")]
    pub label: Option<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawGraph {
    #[serde(default)]
    pub nodes: Vec<RawNode>,
    #[serde(default, alias = "links")]
    pub edges: Vec<RawEdge>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAnalysis {
    #[serde(
        default,
        alias = "suggestedFocusNodeId",
        deserialize_with = "optional_string_or_number"
    )]
    pub suggested_focus_node_id: Option<String>,
    #[serde(default, alias = "suggestedFocusReason")]
    pub suggested_focus_reason: Option<String>,
    #[serde(default, alias = "degreeCentrality")]
    pub degree_centrality: Option<Map<String, Value>>,
    #[serde(default, alias = "pageRank")]
    pub pagerank: Option<Map<String, Value>>,
    #[serde(default, alias = "pagerankSkipped")]
    pub pagerank_skipped: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphWithAnalysis {
    #[serde(default)]
    pub graph: RawGraph,
    #[serde(default)]
    pub analysis: Option<RawAnalysis>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NodeDetail {
    #[serde(default)]
    #[ts(type = "unknown")]
    pub node: Value,
    #[serde(default)]
    #[ts(type = "Array<unknown>")]
    pub relationships: Vec<Value>,
    #[serde(default, alias = "connected_node_ids")]
    pub connected_node_ids: Option<Vec<String>>,
    #[serde(default, alias = "max_stock_ratio_from_rels")]
    pub max_stock_ratio_from_rels: Option<f64>,
    #[serde(default, alias = "shareholder_count")]
    pub shareholder_count: Option<u64>,
    #[serde(default, alias = "id_property")]
    pub id_property: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LabelCount {
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Statistics {
    #[serde(default)]
    pub total_nodes: Option<u64>,
    #[serde(default)]
    pub total_relationships: Option<u64>,
    #[serde(default)]
    pub label_counts: Vec<LabelCount>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    #[serde(default)]
    pub graph_data: Option<RawGraph>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn numeric_ids_are_accepted() {
        let graph: RawGraph = serde_json::from_value(json!({
            "nodes": [{"id": 42, "label": "Company"}],
            "edges": [{"source": 42, "target": "p1", "type": "HOLDS_SHARES"}]
        }))
        .expect("graph parses");
        assert_eq!(graph.nodes[0].id, "42");
        assert_eq!(graph.edges[0].source, "42");
        assert_eq!(graph.edges[0].label.as_deref(), Some("HOLDS_SHARES"));
    }

    #[test]
    fn health_accepts_either_backing_store_key() {
        let legacy: HealthStatus =
            serde_json::from_value(json!({"status": "healthy", "neo4j": "disconnected"}))
                .expect("health parses");
        assert!(!legacy.is_healthy());

        let bare: HealthStatus =
            serde_json::from_value(json!({"status": "healthy"})).expect("health parses");
        assert!(bare.is_healthy());
    }

    #[test]
    fn analysis_accepts_camel_case_keys() {
        let analysis: RawAnalysis = serde_json::from_value(json!({
            "suggestedFocusNodeId": 7,
            "degreeCentrality": {"7": 0.5}
        }))
        .expect("analysis parses");
        assert_eq!(analysis.suggested_focus_node_id.as_deref(), Some("7"));
        assert!(analysis.degree_centrality.is_some());
    }
}
