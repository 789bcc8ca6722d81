use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet, hash_map::Entry},
    hash::Hash,
};

use serde::Serialize;
use serde_json::Value;

use crate::model::{ConnectedNodeRef, Direction, GraphEdge, GraphNode};

/// Shown when a display value cannot be determined.
pub const UNKNOWN_PLACEHOLDER: &str = "-";

/// Raw connection list for `node_id`: outgoing edges yield `out` refs to the
/// target, incoming edges `in` refs to the source.
pub fn connected_nodes(
    node_id: &str,
    nodes: &[GraphNode],
    edges: &[GraphEdge],
) -> Vec<ConnectedNodeRef> {
    let names: HashMap<&str, &str> = nodes
        .iter()
        .map(|node| (node.id.as_str(), node.display_name.as_str()))
        .collect();
    let name_of = |id: &str| names.get(id).map(|name| name.to_string());

    edges
        .iter()
        .filter_map(|edge| {
            if edge.source == node_id {
                Some(ConnectedNodeRef {
                    id: edge.target.clone(),
                    pct: edge.pct,
                    direction: Direction::Out,
                    display_name: name_of(&edge.target),
                })
            } else if edge.target == node_id {
                Some(ConnectedNodeRef {
                    id: edge.source.clone(),
                    pct: edge.pct,
                    direction: Direction::In,
                    display_name: name_of(&edge.source),
                })
            } else {
                None
            }
        })
        .collect()
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum IdKey {
    Id(String),
    Name(String),
}

/// Two-pass merge: first by id, then by display name (falling back to id).
/// Merged entries keep the highest `pct` and the first non-empty name.
/// Output is in first-encounter order.
pub fn dedupe_connected(list: &[ConnectedNodeRef]) -> Vec<ConnectedNodeRef> {
    let cleaned = list.iter().filter_map(clean_ref);
    let by_id = merge_by(cleaned, |entry| match &entry.display_name {
        _ if !entry.id.is_empty() => IdKey::Id(entry.id.clone()),
        Some(name) => IdKey::Name(name.clone()),
        None => IdKey::Id(String::new()),
    });
    merge_by(by_id, |entry| {
        entry
            .display_name
            .clone()
            .unwrap_or_else(|| entry.id.clone())
    })
}

fn clean_ref(entry: &ConnectedNodeRef) -> Option<ConnectedNodeRef> {
    let id = entry.id.trim().to_string();
    let display_name = entry
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string);
    if id.is_empty() && display_name.is_none() {
        return None;
    }
    Some(ConnectedNodeRef {
        id,
        pct: entry.pct.filter(|pct| !pct.is_nan()),
        direction: entry.direction,
        display_name,
    })
}

fn merge_by<K, I, F>(items: I, key: F) -> Vec<ConnectedNodeRef>
where
    K: Eq + Hash,
    I: IntoIterator<Item = ConnectedNodeRef>,
    F: Fn(&ConnectedNodeRef) -> K,
{
    let mut out: Vec<ConnectedNodeRef> = Vec::new();
    let mut index: HashMap<K, usize> = HashMap::new();
    for item in items {
        match index.entry(key(&item)) {
            Entry::Occupied(slot) => merge_into(&mut out[*slot.get()], item),
            Entry::Vacant(slot) => {
                slot.insert(out.len());
                out.push(item);
            }
        }
    }
    out
}

fn merge_into(target: &mut ConnectedNodeRef, item: ConnectedNodeRef) {
    target.pct = match (target.pct, item.pct) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };
    if target.display_name.is_none() {
        target.display_name = item.display_name;
    }
    if target.id.is_empty() {
        target.id = item.id;
    }
}

/// Highest `pct` first, entries without a `pct` last. Stable.
pub fn sort_by_pct_desc(list: &mut [ConnectedNodeRef]) {
    list.sort_by(|a, b| match (a.pct, b.pct) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// The node and its direct neighbours.
pub fn highlight_set(node_id: &str, edges: &[GraphEdge]) -> HashSet<String> {
    let mut ids = HashSet::from([node_id.to_string()]);
    for edge in edges {
        if edge.source == node_id {
            ids.insert(edge.target.clone());
        } else if edge.target == node_id {
            ids.insert(edge.source.clone());
        }
    }
    ids
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStats {
    pub connection_count: usize,
    pub max_stock_ratio: String,
    pub shareholder_count: String,
}

/// Server aggregate, then the largest incoming `pct`, then the node's own
/// `maxStockRatio`/`stockRatio` property, then the placeholder.
pub fn max_stock_ratio(
    server_aggregate: Option<f64>,
    connected: &[ConnectedNodeRef],
    node: Option<&GraphNode>,
) -> String {
    let from_list = connected
        .iter()
        .filter(|entry| entry.direction == Direction::In)
        .filter_map(|entry| entry.pct)
        .reduce(f64::max);
    let from_property = || {
        node.and_then(|node| {
            ["maxStockRatio", "stockRatio"]
                .iter()
                .find_map(|key| node.properties.get(*key).and_then(number_from))
        })
    };

    server_aggregate
        .filter(|value| value.is_finite())
        .or(from_list)
        .or_else(from_property)
        .map(format_pct)
        .unwrap_or_else(|| UNKNOWN_PLACEHOLDER.to_string())
}

/// Server count, then the number of incoming refs (when non-zero), then the
/// node's `shareholderCount` property, then the placeholder.
pub fn shareholder_count(
    server_count: Option<u64>,
    connected: &[ConnectedNodeRef],
    node: Option<&GraphNode>,
) -> String {
    let from_list = connected
        .iter()
        .filter(|entry| entry.direction == Direction::In)
        .count();
    let from_property = || {
        node.and_then(|node| node.properties.get("shareholderCount"))
            .and_then(number_from)
            .map(|value| value.round() as u64)
    };

    server_count
        .or((from_list > 0).then_some(from_list as u64))
        .or_else(from_property)
        .map(|count| count.to_string())
        .unwrap_or_else(|| UNKNOWN_PLACEHOLDER.to_string())
}

pub fn format_pct(value: f64) -> String {
    format!("{value:.2}%")
}

/// Numbers, or strings holding one (optionally with a trailing `%`).
pub fn number_from(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|value| value.is_finite())
}
