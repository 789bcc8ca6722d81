use std::{collections::HashSet, time::Duration};

/// Parameters of a graph fetch. `timeout` overrides the per-operation budget.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphQuery {
    pub limit: u32,
    pub skip: u32,
    pub node_labels: Option<Vec<String>>,
    pub relationship_types: Option<Vec<String>>,
    pub node_cap: Option<u32>,
    pub timeout: Option<Duration>,
}

impl GraphQuery {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn with_labels(mut self, labels: Option<Vec<String>>) -> Self {
        self.node_labels = labels;
        self
    }

    pub fn with_relationship_types(mut self, types: Vec<String>) -> Self {
        self.relationship_types = Some(types);
        self
    }

    pub fn with_node_cap(mut self, node_cap: u32) -> Self {
        self.node_cap = Some(node_cap);
        self
    }

    pub fn with_skip(mut self, skip: u32) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Query-string pairs with repeated keys for list parameters.
    pub fn query_pairs(&self, default_relationship_types: &[String]) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("limit", self.limit.to_string())];
        if self.skip > 0 {
            pairs.push(("skip", self.skip.to_string()));
        }
        if let Some(cap) = self.node_cap {
            pairs.push(("node_cap", cap.to_string()));
        }
        if let Some(labels) = &self.node_labels {
            for label in dedupe_labels(labels) {
                pairs.push(("node_labels", label));
            }
        }
        let relationship_types = self
            .relationship_types
            .as_deref()
            .unwrap_or(default_relationship_types);
        for rel in relationship_types {
            pairs.push(("relationship_types", rel.clone()));
        }
        pairs
    }
}

/// First-seen order, empty labels skipped.
pub fn dedupe_labels(labels: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    labels
        .iter()
        .map(|label| label.trim())
        .filter(|label| !label.is_empty() && seen.insert(label.to_string()))
        .map(str::to_string)
        .collect()
}
