//! Loader engine
//!
//! The [`Loader`] is the explicit context holding everything the engine
//! tracks: the resolver registry, active subscriptions, shared dependencies
//! and in-flight fetches. It is cheap to clone; clones share the same state.
//! Independent loaders never see each other's requests.
//!
//! A request for a path goes through [`Loader::attach`]: the registry picks the
//! resolver, listen requests join a shared subscription, fetch requests are
//! checked for staleness and fetched when needed. Every outcome reaches the
//! store as a [`LoadEvent`].

mod fetch;
mod inflight;
mod listen;
mod staleness;

pub use fetch::FetchStatus;
pub use listen::ListenerHandle;
pub use staleness::record_is_stale;

use crate::config::LoaderConfig;
use crate::error::LoadError;
use crate::events::{now_millis, LoadEvent, UpdatePayload};
use crate::matcher::PathParams;
use crate::reducers::ShadowRecord;
use crate::resolver::{
    LoaderOptions, PathOptions, PathResolution, Resolver, ResolverDescriptor, ResolverRegistry,
};
use crate::store::Store;
use crate::subscription::{Dependency, DependencyHandle, DependencyRegistry, ListenerRegistry};
use crate::tree::{merge_deep, set_in, split_path};
use inflight::InFlight;
use serde_json::{Map, Value};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Source of event timestamps, in milliseconds since the Unix epoch
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

struct LoaderInner {
    config: LoaderConfig,
    store: Arc<dyn Store>,
    registry: ResolverRegistry,
    listeners: Arc<ListenerRegistry>,
    dependencies: DependencyRegistry,
    in_flight: InFlight,
    clock: Clock,
}

/// The data loading engine
#[derive(Clone)]
pub struct Loader {
    inner: Arc<LoaderInner>,
}

/// Builder for [`Loader`]
pub struct LoaderBuilder {
    store: Arc<dyn Store>,
    descriptors: Vec<ResolverDescriptor>,
    initial_state: Value,
    config: LoaderConfig,
    clock: Option<Clock>,
}

impl LoaderBuilder {
    pub fn resolver(mut self, descriptor: ResolverDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn resolvers(mut self, descriptors: impl IntoIterator<Item = ResolverDescriptor>) -> Self {
        self.descriptors.extend(descriptors);
        self
    }

    /// Tree merged under every resolver's own initial state
    pub fn initial_state(mut self, state: Value) -> Self {
        self.initial_state = state;
        self
    }

    pub fn config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> u64 + Send + Sync + 'static,
    {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Validate the configuration, register the resolvers and dispatch
    /// `LOAD_INITIAL` with the merged initial state
    pub fn build(self) -> Result<Loader, LoadError> {
        self.config.validate().map_err(LoadError::Config)?;

        let mut initial = match self.initial_state {
            Value::Null => Value::Object(Map::new()),
            state => state,
        };
        for descriptor in &self.descriptors {
            for (path, value) in &descriptor.initial_state {
                let segments = split_path(path);
                if segments.is_empty() {
                    merge_deep(&mut initial, value.clone());
                    continue;
                }
                let mut patch = Value::Object(Map::new());
                set_in(&mut patch, &segments, value.clone());
                merge_deep(&mut initial, patch);
            }
        }

        let registry = ResolverRegistry::from_descriptors(self.descriptors);
        info!(resolvers = registry.len(), "Loader initialized");

        let loader = Loader {
            inner: Arc::new(LoaderInner {
                config: self.config,
                store: self.store,
                registry,
                listeners: Arc::new(ListenerRegistry::new()),
                dependencies: DependencyRegistry::new(),
                in_flight: InFlight::default(),
                clock: self.clock.unwrap_or_else(|| Arc::new(now_millis)),
            }),
        };
        loader.dispatch(LoadEvent::Initial(initial));
        Ok(loader)
    }
}

/// What [`Loader::attach`] did for a request
#[must_use = "a listening attachment is detached when dropped"]
#[derive(Debug)]
pub enum Attachment {
    /// Nothing to do: no resolver, or the cached data is fresh
    Idle,
    /// A fetch was started in the background
    Fetching(JoinHandle<FetchStatus>),
    /// The fetch was awaited because the request asked to wait for the value
    Fetched(FetchStatus),
    /// A subscription is held until the handle is detached or dropped
    Listening(ListenerHandle),
}

impl Attachment {
    pub fn is_listening(&self) -> bool {
        matches!(self, Attachment::Listening(_))
    }

    /// Wait for the fetch this attachment started, if any
    pub async fn settled(self) -> Option<FetchStatus> {
        match self {
            Attachment::Fetching(task) => match task.await {
                Ok(status) => Some(status),
                Err(err) => {
                    warn!(error = %err, "Background fetch task did not complete");
                    None
                }
            },
            Attachment::Fetched(status) => Some(status),
            Attachment::Idle | Attachment::Listening(_) => None,
        }
    }

    /// Release the subscription, if this attachment holds one. Background
    /// fetches keep running.
    pub fn detach(self) {
        if let Attachment::Listening(handle) = self {
            handle.detach();
        }
    }
}

impl Loader {
    pub fn builder(store: Arc<dyn Store>) -> LoaderBuilder {
        LoaderBuilder {
            store,
            descriptors: Vec::new(),
            initial_state: Value::Null,
            config: LoaderConfig::default(),
            clock: None,
        }
    }

    pub fn new(
        store: Arc<dyn Store>,
        descriptors: impl IntoIterator<Item = ResolverDescriptor>,
        config: LoaderConfig,
    ) -> Result<Self, LoadError> {
        Self::builder(store).resolvers(descriptors).config(config).build()
    }

    fn upgrade(inner: &Weak<LoaderInner>) -> Option<Self> {
        inner.upgrade().map(|inner| Loader { inner })
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.inner.store
    }

    pub fn resolvers(&self) -> &ResolverRegistry {
        &self.inner.registry
    }

    fn now(&self) -> u64 {
        (self.inner.clock)()
    }

    /// First resolver serving `path` in the mode `options` selects
    pub fn find_resolver(
        &self,
        path: &str,
        options: &PathOptions,
    ) -> Result<(Arc<Resolver>, PathParams), LoadError> {
        self.inner
            .registry
            .find(path, options)
            .ok_or_else(|| LoadError::NotFound(path.to_string()))
    }

    /// Find the resolver for `path` and build the resolution it will be served with
    pub fn resolve(
        &self,
        path: &str,
        path_options: PathOptions,
        loader_options: LoaderOptions,
    ) -> Result<(Arc<Resolver>, PathResolution), LoadError> {
        let (resolver, params) = self.find_resolver(path, &path_options)?;
        let resolution = PathResolution::new(path, params, path_options, loader_options);
        Ok((resolver, resolution))
    }

    /// Request `path`.
    ///
    /// Listen requests return a subscription handle. Fetch requests fetch only
    /// when the path is stale; the fetch runs in the background unless
    /// `path_options.wait_for_value` is set. A path no resolver serves is
    /// logged and ignored. Background fetches need a Tokio runtime.
    pub async fn attach(
        &self,
        path: &str,
        path_options: PathOptions,
        loader_options: LoaderOptions,
    ) -> Result<Attachment, LoadError> {
        let (resolver, resolution) = match self.resolve(path, path_options, loader_options) {
            Ok(found) => found,
            Err(err @ LoadError::NotFound(_)) => {
                error!(path, error = %err, "No resolver found");
                return Ok(Attachment::Idle);
            }
            Err(err) => return Err(err),
        };

        if resolution.path_options.listen {
            return Ok(Attachment::Listening(self.listen(resolver, resolution)));
        }

        if !self.is_stale(&resolver, &resolution)? {
            debug!(path, "Cached data is fresh");
            return Ok(Attachment::Idle);
        }

        let attempt = self.begin_fetch(&resolution.path);
        if resolution.path_options.wait_for_value {
            let status = self.run_fetch(resolver, resolution, attempt).await;
            return Ok(Attachment::Fetched(status));
        }
        let loader = self.clone();
        let task =
            tokio::spawn(async move { loader.run_fetch(resolver, resolution, attempt).await });
        Ok(Attachment::Fetching(task))
    }

    /// Attach shared dependencies on behalf of one consumer
    pub fn attach_dependencies(&self, dependencies: &[Arc<dyn Dependency>]) -> DependencyHandle {
        self.inner
            .dependencies
            .attach(dependencies, &self.inner.store)
    }

    /// Write `value` at `path` directly, outside any resolver
    pub fn update_data(&self, path: &str, value: Value) {
        self.dispatch(LoadEvent::Update(UpdatePayload {
            path: path.to_string(),
            timestamp: self.now(),
            data: Some(value),
            remove: false,
        }));
    }

    /// Remove `path` and every ancestor left empty
    pub fn remove_data(&self, path: &str) {
        self.dispatch(LoadEvent::Update(UpdatePayload {
            path: path.to_string(),
            timestamp: self.now(),
            data: None,
            remove: true,
        }));
    }

    pub fn is_listening(&self, path: &str) -> bool {
        self.inner.listeners.is_active(&path.to_string())
    }

    pub fn listener_count(&self, path: &str) -> usize {
        self.inner.listeners.subscriber_count(&path.to_string())
    }

    pub fn is_fetching(&self, path: &str) -> bool {
        self.inner.in_flight.is_in_flight(path)
    }

    pub fn is_dependency_active(&self, key: &str) -> bool {
        self.inner.dependencies.is_active(key)
    }

    /// Cancel every in-flight fetch and tear down every subscription and
    /// dependency. Resolvers stay registered.
    pub fn reset(&self) {
        let fetches = self.inner.in_flight.len();
        self.inner.in_flight.cancel_all();
        self.inner.listeners.clear();
        self.inner.dependencies.clear();
        info!(cancelled_fetches = fetches, "Loader reset");
    }

    /// Shadow record for `path` in the current store state
    pub fn shadow_record(&self, path: &str) -> Result<Option<ShadowRecord>, LoadError> {
        let state = self.inner.store.get_state();
        let shadow_node = &self.inner.config.shadow_node;
        let shadow = state.get(shadow_node).ok_or_else(|| {
            LoadError::Config(format!("Shadow state not found under '{}'", shadow_node))
        })?;
        if split_path(path).iter().any(|segment| *segment == "undefined") {
            warn!(path, "Path contains 'undefined'; request parameters may be unvalidated");
        }
        Ok(ShadowRecord::read(shadow, path))
    }

    /// Hand `event` to the store. Errors raised while the store handles it are
    /// logged and swallowed.
    fn dispatch(&self, event: LoadEvent) {
        if let Err(err) = self.inner.store.dispatch(event.clone()) {
            warn!(
                event_type = event.kind(),
                event = %event.summary(),
                error = %err,
                "Error occurred as a consequence of dispatch"
            );
        }
    }
}
