use std::collections::HashMap;

use crate::model::{AnalysisResult, GraphEdge};

/// Picks the node a user should look at first.
///
/// Tiers, first match wins:
/// 1. the server's suggested id, when it is one of `node_ids`;
/// 2. the highest degree-centrality score among ids that have one, else the
///    highest pagerank score (ties go to the earlier id);
/// 3. the highest in-graph degree counted from `edges`, when above zero.
///
/// A score map that rates none of `node_ids` is treated as absent.
pub fn suggest_focus_node(
    node_ids: &[String],
    analysis: Option<&AnalysisResult>,
    edges: &[GraphEdge],
) -> Option<String> {
    if node_ids.is_empty() {
        return None;
    }

    if let Some(analysis) = analysis {
        if let Some(suggested) = analysis
            .suggested_focus_node_id
            .as_deref()
            .filter(|id| node_ids.iter().any(|candidate| candidate == id))
        {
            return Some(suggested.to_string());
        }

        let best = analysis
            .degree_centrality
            .as_ref()
            .and_then(|scores| best_scored(node_ids, scores))
            .or_else(|| {
                analysis
                    .pagerank
                    .as_ref()
                    .and_then(|scores| best_scored(node_ids, scores))
            });
        if best.is_some() {
            return best;
        }
    }

    best_by_degree(node_ids, edges)
}

fn best_scored(node_ids: &[String], scores: &HashMap<String, f64>) -> Option<String> {
    let mut best: Option<(&String, f64)> = None;
    for id in node_ids {
        let Some(score) = scores.get(id).copied().filter(|score| !score.is_nan()) else {
            continue;
        };
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((id, score));
        }
    }
    best.map(|(id, _)| id.clone())
}

fn best_by_degree(node_ids: &[String], edges: &[GraphEdge]) -> Option<String> {
    let mut degree: HashMap<&str, usize> = HashMap::new();
    for edge in edges {
        *degree.entry(edge.source.as_str()).or_default() += 1;
        *degree.entry(edge.target.as_str()).or_default() += 1;
    }

    let mut best: Option<(&String, usize)> = None;
    for id in node_ids {
        let count = degree.get(id.as_str()).copied().unwrap_or(0);
        if count > 0 && best.is_none_or(|(_, top)| count > top) {
            best = Some((id, count));
        }
    }
    best.map(|(id, _)| id.clone())
}
