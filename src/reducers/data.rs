//! Data tree reducer

use crate::events::{LoadEvent, SuccessPayload, UpdatePayload};
use crate::reducers::stitch::{remove_from_index, stitch_index};
use crate::tree::{contains_path, get_in, remove_in, set_in, split_path};
use serde_json::Value;
use std::sync::Arc;

/// Fold `event` into the data tree
pub fn reduce_data(state: Arc<Value>, event: &LoadEvent) -> Arc<Value> {
    match event {
        LoadEvent::Initial(tree) => Arc::new(tree.clone()),
        LoadEvent::Success(payload) => {
            if split_path(payload.target_path()).is_empty() {
                return state;
            }
            Arc::new(apply_success(Arc::unwrap_or_clone(state), payload))
        }
        LoadEvent::Update(payload) => apply_update(state, payload),
        LoadEvent::Start(_) | LoadEvent::Fail(_) => state,
    }
}

fn apply_success(mut tree: Value, payload: &SuccessPayload) -> Value {
    let segments = split_path(payload.target_path());

    if let Some(remove) = &payload.remove_from_index {
        let current = read_index(&tree, &segments);
        set_in(&mut tree, &segments, index_value(remove_from_index(&current, remove)));
    }

    if let Some(data) = &payload.data {
        set_in(&mut tree, &segments, data.clone());
    } else if let Some(append) = payload.append_index.as_ref().filter(|a| !a.is_empty()) {
        let current = read_index(&tree, &segments);
        set_in(&mut tree, &segments, index_value(stitch_index(&current, append)));
    }

    if let Some(extra) = &payload.extra_data {
        for (key, value) in extra {
            let extra_segments = split_path(key);
            if !extra_segments.is_empty() {
                set_in(&mut tree, &extra_segments, value.clone());
            }
        }
    }

    tree
}

fn apply_update(state: Arc<Value>, payload: &UpdatePayload) -> Arc<Value> {
    let segments = split_path(&payload.path);
    if segments.is_empty() {
        return state;
    }

    if payload.remove {
        if !contains_path(&state, &segments) {
            return state;
        }
        let mut tree = Arc::unwrap_or_clone(state);
        remove_in(&mut tree, &segments);
        return Arc::new(tree);
    }

    let value = payload.data.clone().unwrap_or(Value::Null);
    if get_in(&state, &segments) == Some(&value) {
        return state;
    }
    let mut tree = Arc::unwrap_or_clone(state);
    set_in(&mut tree, &segments, value);
    Arc::new(tree)
}

/// Index at `segments`, empty when absent. Non-string entries are skipped.
fn read_index(tree: &Value, segments: &[&str]) -> Vec<String> {
    match get_in(tree, segments) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

fn index_value(keys: Vec<String>) -> Value {
    Value::Array(keys.into_iter().map(Value::String).collect())
}
