//! Shadow tree reducer
//!
//! The shadow tree mirrors the data tree's paths and records when each path
//! started loading, finished loading or failed. Freshness decisions and loading
//! indicators are computed from it.

use crate::error::ErrorInfo;
use crate::events::{LoadEvent, SuccessPayload};
use crate::tree::{get_in, remove_in, set_in, split_path};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Load metadata for one path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShadowRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_loading_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loaded_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_start: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_end: Option<bool>,
}

impl ShadowRecord {
    /// Record stored at `path` in a shadow tree, if any
    pub fn read(shadow: &Value, path: &str) -> Option<ShadowRecord> {
        let node = get_in(shadow, &split_path(path))?;
        if !node.is_object() {
            return None;
        }
        serde_json::from_value(node.clone()).ok()
    }

    /// A load that started after the last success or failure is still pending
    pub fn is_pending(&self) -> bool {
        match self.started_loading_at {
            Some(started) => {
                self.loaded_at.map_or(true, |t| t < started)
                    && self.failed_at.map_or(true, |t| t < started)
            }
            None => false,
        }
    }

    /// Neither loaded nor failed yet
    pub fn is_loading(&self) -> bool {
        self.loaded_at.is_none() && self.failed_at.is_none()
    }

    fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Fold `event` into the shadow tree
pub fn reduce_shadow(state: Arc<Value>, event: &LoadEvent) -> Arc<Value> {
    match event {
        LoadEvent::Initial(_) => state,
        LoadEvent::Start(payload) => {
            if split_path(&payload.path).is_empty() {
                return state;
            }
            let record = ShadowRecord {
                started_loading_at: Some(payload.timestamp),
                loaded_at: ShadowRecord::read(&state, &payload.path).and_then(|r| r.loaded_at),
                ..ShadowRecord::default()
            };
            let mut tree = Arc::unwrap_or_clone(state);
            write_record(&mut tree, &payload.path, &record);
            Arc::new(tree)
        }
        LoadEvent::Success(payload) => {
            if split_path(&payload.path).is_empty() {
                return state;
            }
            let tree = apply_success(Arc::unwrap_or_clone(state), payload);
            Arc::new(tree)
        }
        LoadEvent::Fail(payload) => {
            if split_path(&payload.path).is_empty() {
                return state;
            }
            let record = ShadowRecord {
                failed_at: Some(payload.timestamp),
                error: Some(payload.error.clone()),
                ..ShadowRecord::default()
            };
            let mut tree = Arc::unwrap_or_clone(state);
            write_record(&mut tree, &payload.path, &record);
            Arc::new(tree)
        }
        LoadEvent::Update(payload) => {
            let segments = split_path(&payload.path);
            if segments.is_empty() {
                return state;
            }
            if payload.remove {
                if get_in(&state, &segments).is_none() {
                    return state;
                }
                let mut tree = Arc::unwrap_or_clone(state);
                remove_in(&mut tree, &segments);
                return Arc::new(tree);
            }
            let record = ShadowRecord {
                loaded_at: Some(payload.timestamp),
                ..ShadowRecord::default()
            };
            let mut tree = Arc::unwrap_or_clone(state);
            write_record(&mut tree, &payload.path, &record);
            Arc::new(tree)
        }
    }
}

fn apply_success(mut tree: Value, payload: &SuccessPayload) -> Value {
    let loaded = ShadowRecord {
        loaded_at: Some(payload.timestamp),
        ..ShadowRecord::default()
    };

    let target = payload.target_path();
    if target != payload.path {
        write_record(&mut tree, &payload.path, &loaded);
    }

    let previous = ShadowRecord::read(&tree, target).unwrap_or_default();
    let target_record = ShadowRecord {
        index_start: payload.index_start.or(previous.index_start),
        index_end: payload.index_end.or(previous.index_end),
        ..loaded.clone()
    };
    write_record(&mut tree, target, &target_record);

    if let Some(extra) = &payload.extra_data {
        for key in extra.keys() {
            write_record(&mut tree, key, &loaded);
        }
    }
    tree
}

fn write_record(tree: &mut Value, path: &str, record: &ShadowRecord) {
    let segments = split_path(path);
    if segments.is_empty() {
        return;
    }
    set_in(tree, &segments, record.to_value());
}
