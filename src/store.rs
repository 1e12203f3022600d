//! Store
//!
//! The loader never owns the state tree. It dispatches [`LoadEvent`]s to a
//! [`Store`] and reads snapshots back from it. [`TreeStore`] is the in-memory
//! implementation folding events through the data and shadow reducers.

use crate::config::LoaderConfig;
use crate::events::LoadEvent;
use crate::reducers::{reduce_data, reduce_shadow};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::sync::Arc;

/// State holder the loader dispatches into
pub trait Store: Send + Sync {
    /// Apply an event. Errors raised by whatever reacts to the new state are
    /// reported here; the loader logs them and carries on.
    fn dispatch(&self, event: LoadEvent) -> anyhow::Result<()>;

    /// Current state: an object with the data tree and the shadow tree mounted
    /// under the configured node names
    fn get_state(&self) -> Arc<Value>;
}

type Observer = dyn Fn(&LoadEvent, &Value) -> anyhow::Result<()> + Send + Sync;

struct TreeState {
    data: Arc<Value>,
    shadow: Arc<Value>,
    combined: Arc<Value>,
}

/// In-memory store with observer callbacks
pub struct TreeStore {
    root_node: String,
    shadow_node: String,
    state: RwLock<TreeState>,
    observers: RwLock<Vec<Arc<Observer>>>,
}

impl Default for TreeStore {
    fn default() -> Self {
        Self::new(&LoaderConfig::default())
    }
}

impl TreeStore {
    pub fn new(config: &LoaderConfig) -> Self {
        let data = Arc::new(Value::Object(Map::new()));
        let shadow = Arc::new(Value::Object(Map::new()));
        let combined = combine(&config.root_node, &data, &config.shadow_node, &shadow);
        Self {
            root_node: config.root_node.clone(),
            shadow_node: config.shadow_node.clone(),
            state: RwLock::new(TreeState {
                data,
                shadow,
                combined,
            }),
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Call `observer` after every dispatched event with the resulting state
    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(&LoadEvent, &Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.observers.write().push(Arc::new(observer));
    }

    /// Data tree snapshot
    pub fn data(&self) -> Arc<Value> {
        Arc::clone(&self.state.read().data)
    }

    /// Shadow tree snapshot
    pub fn shadow(&self) -> Arc<Value> {
        Arc::clone(&self.state.read().shadow)
    }
}

impl Store for TreeStore {
    fn dispatch(&self, event: LoadEvent) -> anyhow::Result<()> {
        let combined = {
            let mut state = self.state.write();
            let data = reduce_data(Arc::clone(&state.data), &event);
            let shadow = reduce_shadow(Arc::clone(&state.shadow), &event);
            if !Arc::ptr_eq(&data, &state.data) || !Arc::ptr_eq(&shadow, &state.shadow) {
                state.combined = combine(&self.root_node, &data, &self.shadow_node, &shadow);
                state.data = data;
                state.shadow = shadow;
            }
            Arc::clone(&state.combined)
        };

        let observers: Vec<Arc<Observer>> = self.observers.read().clone();
        let mut first_error = None;
        for observer in observers {
            if let Err(err) = observer(&event, &combined) {
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn get_state(&self) -> Arc<Value> {
        Arc::clone(&self.state.read().combined)
    }
}

fn combine(root_node: &str, data: &Value, shadow_node: &str, shadow: &Value) -> Arc<Value> {
    let mut root = Map::new();
    root.insert(root_node.to_string(), data.clone());
    root.insert(shadow_node.to_string(), shadow.clone());
    Arc::new(Value::Object(root))
}
