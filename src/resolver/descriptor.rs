//! Resolver descriptors: the plugin surface of the loader.
//!
//! A descriptor declares which paths it serves (`match_spec`) and how to obtain
//! their data: a one-shot [`Fetcher`], a push-based [`Listener`], or both.

use crate::matcher::MatchSpec;
use crate::resolver::options::PathResolution;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Stops a subscription started by a [`Listener`]
pub type Teardown = Box<dyn FnOnce() + Send>;

type ParentPathFn = dyn Fn(&PathResolution) -> Option<String> + Send + Sync;

/// What a fetch or a listener delivery produced.
///
/// At least one of `data`, `extra_data`, `append_index` and
/// `remove_from_index` must be present for the outcome to be usable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_data: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub append_index: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_from_index: Option<Vec<String>>,
    /// The appended page starts the collection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_start: Option<bool>,
    /// The appended page ends the collection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_end: Option<bool>,
    /// Alternate storage location for the value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl FetchOutcome {
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    pub fn append_index<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            append_index: Some(keys.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn remove_from_index<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            remove_from_index: Some(keys.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Side-load a related entity at `path`
    pub fn with_extra(mut self, path: impl Into<String>, value: Value) -> Self {
        self.extra_data
            .get_or_insert_with(Map::new)
            .insert(path.into(), value);
        self
    }

    /// Store the value at `path` instead of the requested path
    pub fn at_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_index_bounds(mut self, start: bool, end: bool) -> Self {
        self.index_start = start.then_some(true);
        self.index_end = end.then_some(true);
        self
    }

    /// True when none of the recognized outcome fields is present
    pub fn is_empty(&self) -> bool {
        self.data.is_none()
            && self.extra_data.is_none()
            && self.append_index.is_none()
            && self.remove_from_index.is_none()
    }
}

/// One-shot data source for a path
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, resolution: &PathResolution) -> anyhow::Result<FetchOutcome>;
}

/// Push-based data source for a path
pub trait Listener: Send + Sync {
    /// Start delivering values into `sink`, returning the teardown that stops it
    fn listen(&self, resolution: &PathResolution, sink: DataSink) -> Teardown;
}

/// Receives values pushed by a [`Listener`]
#[derive(Clone)]
pub struct DataSink {
    deliver: Arc<dyn Fn(FetchOutcome) + Send + Sync>,
}

impl DataSink {
    pub fn new<F>(deliver: F) -> Self
    where
        F: Fn(FetchOutcome) + Send + Sync + 'static,
    {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    pub fn send(&self, outcome: FetchOutcome) {
        (self.deliver)(outcome)
    }
}

impl fmt::Debug for DataSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DataSink(..)")
    }
}

struct FnFetcher<F>(F);

#[async_trait]
impl<F, Fut> Fetcher for FnFetcher<F>
where
    F: Fn(PathResolution) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<FetchOutcome>> + Send + 'static,
{
    async fn fetch(&self, resolution: &PathResolution) -> anyhow::Result<FetchOutcome> {
        (self.0)(resolution.clone()).await
    }
}

/// Build a [`Fetcher`] from an async closure
pub fn fetch_fn<F, Fut>(f: F) -> Arc<dyn Fetcher>
where
    F: Fn(PathResolution) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<FetchOutcome>> + Send + 'static,
{
    Arc::new(FnFetcher(f))
}

struct FnListener<F>(F);

impl<F> Listener for FnListener<F>
where
    F: Fn(&PathResolution, DataSink) -> Teardown + Send + Sync,
{
    fn listen(&self, resolution: &PathResolution, sink: DataSink) -> Teardown {
        (self.0)(resolution, sink)
    }
}

/// Build a [`Listener`] from a closure
pub fn listen_fn<F>(f: F) -> Arc<dyn Listener>
where
    F: Fn(&PathResolution, DataSink) -> Teardown + Send + Sync + 'static,
{
    Arc::new(FnListener(f))
}

/// Declaration of a resolver
#[derive(Clone)]
pub struct ResolverDescriptor {
    pub match_spec: MatchSpec,
    pub fetch: Option<Arc<dyn Fetcher>>,
    pub listen: Option<Arc<dyn Listener>>,
    /// Values merged into the data tree at startup, keyed by path
    pub initial_state: BTreeMap<String, Value>,
    /// Fail a fresh subscription that delivers nothing within the fetch timeout
    pub should_wait_for_value: bool,
    pub parent_path: Option<Arc<ParentPathFn>>,
}

impl ResolverDescriptor {
    pub fn new(match_spec: impl Into<MatchSpec>) -> Self {
        Self {
            match_spec: match_spec.into(),
            fetch: None,
            listen: None,
            initial_state: BTreeMap::new(),
            should_wait_for_value: false,
            parent_path: None,
        }
    }

    pub fn with_fetch(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetch = Some(fetcher);
        self
    }

    pub fn with_listen(mut self, listener: Arc<dyn Listener>) -> Self {
        self.listen = Some(listener);
        self
    }

    pub fn with_initial_state(mut self, path: impl Into<String>, value: Value) -> Self {
        self.initial_state.insert(path.into(), value);
        self
    }

    pub fn wait_for_value(mut self) -> Self {
        self.should_wait_for_value = true;
        self
    }

    pub fn with_parent_path<F>(mut self, parent: F) -> Self
    where
        F: Fn(&PathResolution) -> Option<String> + Send + Sync + 'static,
    {
        self.parent_path = Some(Arc::new(parent));
        self
    }
}

impl fmt::Debug for ResolverDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverDescriptor")
            .field("match_spec", &self.match_spec)
            .field("fetch", &self.fetch.is_some())
            .field("listen", &self.listen.is_some())
            .field("initial_state", &self.initial_state)
            .field("should_wait_for_value", &self.should_wait_for_value)
            .field("parent_path", &self.parent_path.is_some())
            .finish()
    }
}
