//! Shared dependencies
//!
//! A dependency is a side effect shared by every consumer that declares it,
//! for example one socket feeding several views. It is keyed by identity rather
//! than by tree path.

use crate::resolver::Teardown;
use crate::store::Store;
use crate::subscription::{RefCountRegistry, SubscriberId};
use std::sync::Arc;
use tracing::debug;

/// A shared side effect started on first use and stopped after the last
pub trait Dependency: Send + Sync {
    /// Identity; dependencies with equal keys are the same dependency
    fn key(&self) -> &str;

    /// Start the side effect. It may dispatch into `store` for as long as it
    /// runs. Returns the teardown, if there is anything to stop.
    fn attach(&self, store: Arc<dyn Store>) -> Option<Teardown>;
}

/// Reference counts for shared dependencies
#[derive(Default)]
pub struct DependencyRegistry {
    inner: Arc<RefCountRegistry<String>>,
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach every dependency in `dependencies` on behalf of one consumer
    pub fn attach(
        &self,
        dependencies: &[Arc<dyn Dependency>],
        store: &Arc<dyn Store>,
    ) -> DependencyHandle {
        let attached = dependencies
            .iter()
            .map(|dependency| {
                let key = dependency.key().to_string();
                let id = self.inner.attach(key.clone(), || {
                    debug!(dependency = %key, "Attaching dependency");
                    dependency
                        .attach(Arc::clone(store))
                        .unwrap_or_else(|| Box::new(|| {}) as Teardown)
                });
                (key, id)
            })
            .collect();
        DependencyHandle {
            registry: Arc::clone(&self.inner),
            attached,
        }
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.inner.is_active(&key.to_string())
    }

    pub fn consumer_count(&self, key: &str) -> usize {
        self.inner.subscriber_count(&key.to_string())
    }

    pub fn clear(&self) {
        self.inner.clear();
    }
}

/// One consumer's hold on a set of dependencies; released on `detach` or drop
#[must_use = "dependencies are detached when the handle is dropped"]
pub struct DependencyHandle {
    registry: Arc<RefCountRegistry<String>>,
    attached: Vec<(String, SubscriberId)>,
}

impl DependencyHandle {
    pub fn detach(mut self) {
        self.release();
    }

    fn release(&mut self) {
        for (key, id) in self.attached.drain(..) {
            self.registry.detach(&key, id);
        }
    }
}

impl Drop for DependencyHandle {
    fn drop(&mut self) {
        self.release();
    }
}
