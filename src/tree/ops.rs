//! Get, set, remove and merge on a JSON tree by path segments

use serde_json::{Map, Value};

/// Look up the node at `segments`.
///
/// Objects are indexed by key and arrays by numeric position. An empty segment
/// list addresses the root.
pub fn get_in<'a>(root: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(*segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Whether a node exists at `segments`
pub fn contains_path(root: &Value, segments: &[&str]) -> bool {
    get_in(root, segments).is_some()
}

/// Replace the node at `segments` with `value`, creating intermediate objects.
///
/// An intermediate that is neither an object nor an array with the addressed
/// position is replaced by an empty object. Setting the root replaces it.
pub fn set_in(root: &mut Value, segments: &[&str], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        *root = value;
        return;
    };

    let mut current = root;
    for segment in parents {
        current = child_mut(current, segment);
    }

    if let Value::Array(items) = &mut *current {
        if let Some(slot) = last.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
            *slot = value;
            return;
        }
    }
    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Value::Object(map) = current {
        map.insert((*last).to_string(), value);
    }
}

fn child_mut<'a>(node: &'a mut Value, segment: &str) -> &'a mut Value {
    let index = match &*node {
        Value::Array(items) => segment.parse::<usize>().ok().filter(|i| *i < items.len()),
        _ => None,
    };
    match (node, index) {
        (Value::Array(items), Some(i)) => &mut items[i],
        (node, _) => {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            let Value::Object(map) = node else {
                unreachable!("node was just replaced by an object")
            };
            map.entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()))
        }
    }
}

/// Remove the node at `segments` and prune every ancestor left without
/// children.
///
/// Returns `false` without touching the tree when nothing exists at the path.
/// The root itself is never removed, only emptied.
pub fn remove_in(root: &mut Value, segments: &[&str]) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return false;
    };
    if !contains_path(root, segments) {
        return false;
    }
    remove_below(root, first, rest);
    true
}

fn remove_below(node: &mut Value, segment: &str, rest: &[&str]) {
    match node {
        Value::Object(map) => {
            if let Some((next, tail)) = rest.split_first() {
                let prune = match map.get_mut(segment) {
                    Some(child) => {
                        remove_below(child, next, tail);
                        is_empty_branch(child)
                    }
                    None => false,
                };
                if prune {
                    map.remove(segment);
                }
            } else {
                map.remove(segment);
            }
        }
        Value::Array(items) => {
            let Ok(i) = segment.parse::<usize>() else {
                return;
            };
            if i >= items.len() {
                return;
            }
            if let Some((next, tail)) = rest.split_first() {
                remove_below(&mut items[i], next, tail);
                if is_empty_branch(&items[i]) {
                    items.remove(i);
                }
            } else {
                items.remove(i);
            }
        }
        _ => {}
    }
}

fn is_empty_branch(node: &Value) -> bool {
    match node {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Deep-merge `incoming` into `target`.
///
/// Objects merge key by key; any other value in `incoming` replaces what is in
/// `target`.
pub fn merge_deep(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match existing.get_mut(&key) {
                    Some(slot) => merge_deep(slot, value),
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
