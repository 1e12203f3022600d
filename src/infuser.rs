//! Infuser: declarative selection over the loaded tree
//!
//! A consumer declares the paths it needs and where each value should land in
//! its own view. The infuser attaches all of them, tells whether any followed
//! path is still loading, and collects the values from a state snapshot. The
//! collected map keeps its identity until one of the values changes, so
//! consumers can skip work with a pointer comparison.
//!
//! The selection is either fixed up front with [`Infuser::select`] or derived
//! from each seeded state by a selector ([`Infuser::with_selector`]).

use crate::config::LoaderConfig;
use crate::engine::{Attachment, FetchStatus, Loader};
use crate::error::LoadError;
use crate::reducers::ShadowRecord;
use crate::resolver::{LoaderOptions, PathOptions};
use crate::tree::{get_in, split_path};
use futures::future::try_join_all;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

type Transform = dyn Fn(&Value) -> Value + Send + Sync;

type Selector = dyn Fn(&Value) -> BTreeMap<String, Selection> + Send + Sync;

/// What to do with one requested path
#[derive(Clone, Default)]
pub struct Selection {
    /// Key the value is collected under; not collected when absent
    pub to: Option<String>,
    /// Read the value from this path instead of the requested one
    pub from: Option<String>,
    /// Count this path in `is_loading`
    pub status: bool,
    /// Applied to present values before they are collected
    pub transform: Option<Arc<Transform>>,
    /// Options the path is requested with
    pub options: PathOptions,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to(mut self, key: impl Into<String>) -> Self {
        self.to = Some(key.into());
        self
    }

    pub fn read_from(mut self, path: impl Into<String>) -> Self {
        self.from = Some(path.into());
        self
    }

    pub fn with_status(mut self) -> Self {
        self.status = true;
        self
    }

    pub fn transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    pub fn with_options(mut self, options: PathOptions) -> Self {
        self.options = options;
        self
    }

    /// Whether both selections request and collect the same thing. Transforms
    /// compare by identity.
    fn same_as(&self, other: &Selection) -> bool {
        let same_transform = match (&self.transform, &other.transform) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        self.to == other.to
            && self.from == other.from
            && self.status == other.status
            && self.options == other.options
            && same_transform
    }
}

/// A plain key collects the value under that key and follows its status
impl From<&str> for Selection {
    fn from(to: &str) -> Self {
        Selection::new().to(to).with_status()
    }
}

impl From<String> for Selection {
    fn from(to: String) -> Self {
        Selection::new().to(to).with_status()
    }
}

impl fmt::Debug for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selection")
            .field("to", &self.to)
            .field("from", &self.from)
            .field("status", &self.status)
            .field("transform", &self.transform.is_some())
            .field("options", &self.options)
            .finish()
    }
}

/// Values collected by an [`Infuser`], keyed by `Selection::to`
pub type Collected = Arc<BTreeMap<String, Value>>;

/// Declarative selection of loaded paths
pub struct Infuser {
    selections: BTreeMap<String, Selection>,
    selector: Option<Arc<Selector>>,
    root_node: String,
    shadow_node: String,
    state: Arc<Value>,
    collected: Collected,
    dirty: bool,
}

impl Infuser {
    /// Infuser reading the tree mounts named in `config`
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            selections: BTreeMap::new(),
            selector: None,
            root_node: config.root_node.clone(),
            shadow_node: config.shadow_node.clone(),
            state: Arc::new(Value::Null),
            collected: Arc::new(BTreeMap::new()),
            dirty: true,
        }
    }

    /// Infuser whose selection is recomputed from every new state it is
    /// seeded with. Paths chosen with [`Infuser::select`] are replaced by the
    /// selector's result on the first seed.
    pub fn with_selector<F>(config: &LoaderConfig, selector: F) -> Self
    where
        F: Fn(&Value) -> BTreeMap<String, Selection> + Send + Sync + 'static,
    {
        Self {
            selector: Some(Arc::new(selector)),
            ..Self::new(config)
        }
    }

    /// Request `path`
    pub fn select(mut self, path: impl Into<String>, selection: impl Into<Selection>) -> Self {
        self.selections.insert(path.into(), selection.into());
        self.dirty = true;
        self
    }

    pub fn selections(&self) -> &BTreeMap<String, Selection> {
        &self.selections
    }

    /// Feed the latest store state. Seeding the same snapshot again is free.
    ///
    /// Returns true when a selector chose a different selection for this
    /// state; the new paths have to be attached again with
    /// [`Infuser::attach_all`].
    pub fn seed(&mut self, state: Arc<Value>) -> bool {
        if Arc::ptr_eq(&self.state, &state) {
            return false;
        }
        self.state = state;
        self.dirty = true;

        let Some(selector) = &self.selector else {
            return false;
        };
        let selections = selector(&self.state);
        let unchanged = selections.len() == self.selections.len()
            && selections.iter().all(|(path, selection)| {
                self.selections
                    .get(path)
                    .is_some_and(|current| current.same_as(selection))
            });
        if unchanged {
            return false;
        }
        debug!(paths = selections.len(), "Selector chose a new selection");
        self.selections = selections;
        true
    }

    /// Whether any path with `status` set has neither loaded nor failed
    pub fn is_loading(&self) -> bool {
        let shadow = self.state.get(&self.shadow_node);
        self.selections
            .iter()
            .filter(|(_, selection)| selection.status)
            .any(|(path, selection)| {
                let source = selection.from.as_deref().unwrap_or(path);
                shadow
                    .and_then(|shadow| ShadowRecord::read(shadow, source))
                    .map_or(true, |record| record.is_loading())
            })
    }

    /// Values for every selection with a `to` key; missing values are `null`.
    ///
    /// Returns the previous map when no collected value changed.
    pub fn collect(&mut self) -> Collected {
        if !self.dirty {
            return Arc::clone(&self.collected);
        }
        self.dirty = false;

        let data = self.state.get(&self.root_node);
        let collected: BTreeMap<String, Value> = self
            .selections
            .iter()
            .filter_map(|(path, selection)| {
                let to = selection.to.as_ref()?;
                let source = selection.from.as_deref().unwrap_or(path);
                let value = data.and_then(|data| get_in(data, &split_path(source)));
                let value = match (value, &selection.transform) {
                    (Some(value), Some(transform)) if !value.is_null() => transform(value),
                    (Some(value), _) => value.clone(),
                    (None, _) => Value::Null,
                };
                Some((to.clone(), value))
            })
            .collect();

        if *self.collected != collected {
            self.collected = Arc::new(collected);
        }
        Arc::clone(&self.collected)
    }

    /// Attach every requested path on behalf of one consumer. Paths that wait
    /// for their value are awaited concurrently.
    pub async fn attach_all(
        &self,
        loader: &Loader,
        loader_options: LoaderOptions,
    ) -> Result<InfuserHandle, LoadError> {
        let attaches = self.selections.iter().map(|(path, selection)| async {
            let attachment = loader
                .attach(path, selection.options.clone(), loader_options.clone())
                .await?;
            Ok::<_, LoadError>((path.clone(), attachment))
        });
        let attachments = try_join_all(attaches).await?;
        Ok(InfuserHandle { attachments })
    }
}

/// Every attachment made by [`Infuser::attach_all`]; subscriptions are
/// released on `detach` or drop
#[must_use = "subscriptions are released when the handle is dropped"]
#[derive(Debug)]
pub struct InfuserHandle {
    attachments: Vec<(String, Attachment)>,
}

impl InfuserHandle {
    pub fn listening(&self) -> usize {
        self.attachments
            .iter()
            .filter(|(_, attachment)| attachment.is_listening())
            .count()
    }

    /// Wait for every fetch started by the attach and report how each one
    /// settled, keyed by path. Paths that were fresh or are listened to have
    /// no entry. Subscriptions stay attached.
    pub async fn settled(&mut self) -> BTreeMap<String, FetchStatus> {
        let mut statuses = BTreeMap::new();
        for (path, attachment) in &mut self.attachments {
            if !matches!(attachment, Attachment::Fetching(_) | Attachment::Fetched(_)) {
                continue;
            }
            let pending = std::mem::replace(attachment, Attachment::Idle);
            let Some(status) = pending.settled().await else {
                continue;
            };
            if let FetchStatus::Failed(error) = &status {
                warn!(
                    path = %path,
                    code = error.code.as_deref().unwrap_or_default(),
                    error = %error.message,
                    "Selected path failed to load"
                );
            }
            statuses.insert(path.clone(), status);
        }
        statuses
    }

    pub fn detach(self) {
        for (_, attachment) in self.attachments {
            attachment.detach();
        }
    }
}
