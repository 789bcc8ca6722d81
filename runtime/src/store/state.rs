use std::collections::HashSet;

use serde_json::{Value, json};

use crate::model::{AnalysisResult, GraphEdge, GraphNode, NodeType};

use super::Store;

pub mod paths {
    pub const FILTERS: &str = "filters";
    pub const SELECTED_NODE: &str = "selectedNode";

    pub const CHAT_HISTORY: &str = "chat.history";
    pub const CHAT_CONTEXT: &str = "chat.context";

    pub const GRAPH: &str = "graph";
    pub const GRAPH_RAW_NODES: &str = "graph.rawNodes";
    pub const GRAPH_RAW_LINKS: &str = "graph.rawLinks";
    pub const GRAPH_INITIAL_ANALYSIS: &str = "graph.initialAnalysis";
    pub const GRAPH_STATISTICS: &str = "graph.statistics";
    pub const GRAPH_LOADING: &str = "graph.loading";

    pub const UI_ACTIVE_TAB: &str = "ui.activeTab";
    pub const UI_SEARCH_QUERY: &str = "ui.searchQuery";
    pub const UI_PROPS_EXPANDED: &str = "ui.propsExpanded";
    pub const UI_LOAD_STAGE: &str = "ui.loadStage";
    pub const UI_LOAD_ERROR: &str = "ui.loadError";
    pub const UI_SUGGESTED_FOCUS: &str = "ui.suggestedFocusNodeId";
    pub const UI_NODE_DETAIL: &str = "ui.nodeDetail";
    pub const UI_EGO_ROOT: &str = "ui.egoRoot";
}

pub fn default_state() -> Value {
    let filters: Vec<&str> = NodeType::ALL.iter().map(|t| t.as_str()).collect();
    json!({
        "filters": filters,
        "selectedNode": null,
        "chat": {
            "history": [],
            "context": null
        },
        "graph": {
            "rawNodes": [],
            "rawLinks": [],
            "initialAnalysis": null,
            "statistics": null,
            "loading": false
        },
        "ui": {
            "activeTab": "detail",
            "searchQuery": "",
            "propsExpanded": true,
            "loadStage": "idle",
            "loadError": null,
            "suggestedFocusNodeId": null,
            "nodeDetail": null,
            "egoRoot": null
        }
    })
}

impl Store {
    pub fn filters(&self) -> HashSet<NodeType> {
        self.get_as::<Vec<String>>(paths::FILTERS)
            .unwrap_or_default()
            .iter()
            .filter_map(|value| NodeType::parse(value))
            .collect()
    }

    pub fn set_filters(&self, filters: &HashSet<NodeType>) {
        let ordered: Vec<&str> = NodeType::ALL
            .iter()
            .filter(|t| filters.contains(t))
            .map(|t| t.as_str())
            .collect();
        self.set(paths::FILTERS, json!(ordered));
    }

    pub fn selected_node_id(&self) -> Option<String> {
        self.get(paths::SELECTED_NODE)?
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn graph_nodes(&self) -> Vec<GraphNode> {
        self.get_as(paths::GRAPH_RAW_NODES).unwrap_or_default()
    }

    pub fn graph_edges(&self) -> Vec<GraphEdge> {
        self.get_as(paths::GRAPH_RAW_LINKS).unwrap_or_default()
    }

    pub fn initial_analysis(&self) -> Option<AnalysisResult> {
        self.get_as(paths::GRAPH_INITIAL_ANALYSIS)
    }
}
