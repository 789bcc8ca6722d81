use serde_json::{Map, Value};

/// Subscribers on this path see every mutation.
pub const WILDCARD: &str = "*";

pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|segment| !segment.is_empty())
}

/// Strict ancestors of `path`, nearest first: `a.b.c` yields `a.b` then `a`.
pub fn ancestors(path: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut end = path.len();
    while let Some(idx) = path[..end].rfind('.') {
        if idx > 0 {
            out.push(&path[..idx]);
        }
        end = idx;
    }
    out
}

pub fn get_at<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments(path) {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Writes `value` at `path`, creating (or replacing non-map) intermediates
/// with empty maps. Returns the previous value when one existed.
pub fn set_at(root: &mut Value, path: &str, value: Value) -> Option<Value> {
    let parts: Vec<&str> = segments(path).collect();
    let Some((last, parents)) = parts.split_last() else {
        return Some(std::mem::replace(root, value));
    };

    let mut current = root;
    for segment in parents {
        current = ensure_object(current)
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(current).insert(last.to_string(), value)
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced by an object"),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn ancestors_are_nearest_first() {
        assert_eq!(ancestors("graph.rawNodes"), vec!["graph"]);
        assert_eq!(ancestors("a.b.c"), vec!["a.b", "a"]);
        assert!(ancestors("selectedNode").is_empty());
    }

    #[test]
    fn get_never_creates_missing_segments() {
        let root = json!({"graph": {"rawNodes": []}});
        assert!(get_at(&root, "graph.missing.deeper").is_none());
        assert!(get_at(&root, "graph.rawNodes.0").is_none());
        assert_eq!(root, json!({"graph": {"rawNodes": []}}));
    }

    #[test]
    fn set_creates_and_replaces_intermediates() {
        let mut root = json!({"ui": "flat"});
        set_at(&mut root, "ui.panel.open", json!(true));
        set_at(&mut root, "fresh.key", json!(1));
        assert_eq!(root, json!({"ui": {"panel": {"open": true}}, "fresh": {"key": 1}}));
    }
}
