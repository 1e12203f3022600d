//! Load events dispatched to the store.

use crate::error::ErrorInfo;
use crate::resolver::FetchOutcome;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Longest event summary written to logs
const SUMMARY_LIMIT: usize = 255;

/// Milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum LoadEvent {
    /// Replace the whole data tree
    #[serde(rename = "LOAD_INITIAL")]
    Initial(Value),
    #[serde(rename = "LOAD_START")]
    Start(StartPayload),
    #[serde(rename = "LOAD_SUCCESS")]
    Success(SuccessPayload),
    #[serde(rename = "LOAD_FAIL")]
    Fail(FailPayload),
    /// Direct write from outside any resolver
    #[serde(rename = "LOAD_UPDATE")]
    Update(UpdatePayload),
}

impl LoadEvent {
    pub fn start(path: impl Into<String>, timestamp: u64) -> Self {
        LoadEvent::Start(StartPayload {
            path: path.into(),
            timestamp,
        })
    }

    pub fn fail(path: impl Into<String>, timestamp: u64, error: ErrorInfo) -> Self {
        LoadEvent::Fail(FailPayload {
            path: path.into(),
            timestamp,
            error,
        })
    }

    /// Event type name as it appears on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            LoadEvent::Initial(_) => "LOAD_INITIAL",
            LoadEvent::Start(_) => "LOAD_START",
            LoadEvent::Success(_) => "LOAD_SUCCESS",
            LoadEvent::Fail(_) => "LOAD_FAIL",
            LoadEvent::Update(_) => "LOAD_UPDATE",
        }
    }

    /// Requested path, absent for `LOAD_INITIAL`
    pub fn path(&self) -> Option<&str> {
        match self {
            LoadEvent::Initial(_) => None,
            LoadEvent::Start(p) => Some(&p.path),
            LoadEvent::Success(p) => Some(&p.path),
            LoadEvent::Fail(p) => Some(&p.path),
            LoadEvent::Update(p) => Some(&p.path),
        }
    }

    /// Truncated JSON rendering for log lines
    pub fn summary(&self) -> String {
        let raw = serde_json::to_string(self).unwrap_or_else(|_| self.kind().to_string());
        raw.chars().take(SUMMARY_LIMIT).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartPayload {
    pub path: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessPayload {
    pub path: String,
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_data: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub append_index: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_from_index: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_start: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_end: Option<bool>,
    /// Where the value is stored when it differs from `path`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_path: Option<String>,
}

impl SuccessPayload {
    pub fn from_outcome(path: impl Into<String>, timestamp: u64, outcome: FetchOutcome) -> Self {
        let path = path.into();
        let data_path = outcome.path.filter(|p| *p != path);
        Self {
            path,
            timestamp,
            data: outcome.data,
            extra_data: outcome.extra_data,
            append_index: outcome.append_index,
            remove_from_index: outcome.remove_from_index,
            index_start: outcome.index_start,
            index_end: outcome.index_end,
            data_path,
        }
    }

    /// Path the data reducer writes to
    pub fn target_path(&self) -> &str {
        self.data_path.as_deref().unwrap_or(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailPayload {
    pub path: String,
    pub timestamp: u64,
    pub error: ErrorInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatePayload {
    pub path: String,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub remove: bool,
}
