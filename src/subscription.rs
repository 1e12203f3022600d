//! Reference-counted subscriptions
//!
//! Many consumers may ask for the same live resource. The first attach runs the
//! setup, later attaches only register another subscriber, and the teardown
//! runs once when the last subscriber detaches.

pub mod dependency;

pub use dependency::{Dependency, DependencyHandle, DependencyRegistry};

use crate::resolver::Teardown;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Identifies one attach call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

struct Entry {
    subscribers: HashSet<SubscriberId>,
    teardown: Option<Teardown>,
    /// Setup is running outside the lock
    setting_up: bool,
}

/// Reference-counted bookkeeping keyed by `K`
pub struct RefCountRegistry<K> {
    entries: Mutex<HashMap<K, Entry>>,
    next_id: AtomicU64,
}

/// Active path subscriptions
pub type ListenerRegistry = RefCountRegistry<String>;

impl<K> Default for RefCountRegistry<K> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<K> RefCountRegistry<K>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for `key`, running `setup` if nobody else holds it.
    ///
    /// `setup` runs without the registry lock held, so it may call back into
    /// the loader. An attach for the same key racing with a running setup
    /// joins it instead of starting a second one.
    pub fn attach<F>(&self, key: K, setup: F) -> SubscriberId
    where
        F: FnOnce() -> Teardown,
    {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        {
            let mut entries = self.entries.lock();
            if let Some(entry) = entries.get_mut(&key) {
                entry.subscribers.insert(id);
                debug!(key = ?key, subscribers = entry.subscribers.len(), "Joined active subscription");
                return id;
            }
            entries.insert(
                key.clone(),
                Entry {
                    subscribers: HashSet::from([id]),
                    teardown: None,
                    setting_up: true,
                },
            );
        }

        let teardown = setup();

        let orphaned = {
            let mut entries = self.entries.lock();
            let abandoned = entries
                .get(&key)
                .map_or(true, |entry| entry.subscribers.is_empty());
            if abandoned {
                entries.remove(&key);
                Some(teardown)
            } else {
                if let Some(entry) = entries.get_mut(&key) {
                    entry.setting_up = false;
                    entry.teardown = Some(teardown);
                }
                None
            }
        };
        if let Some(teardown) = orphaned {
            debug!(key = ?key, "All subscribers left during setup");
            teardown();
        }
        id
    }

    /// Remove a subscriber, tearing the subscription down when it was the last.
    ///
    /// Returns whether the subscriber was registered. Unknown keys or ids are
    /// reported and otherwise ignored.
    pub fn detach(&self, key: &K, id: SubscriberId) -> bool {
        let teardown = {
            let mut entries = self.entries.lock();
            let Some(entry) = entries.get_mut(key) else {
                warn!(key = ?key, subscriber = id.as_u64(), "Detach called for inactive subscription");
                return false;
            };
            if !entry.subscribers.remove(&id) {
                warn!(key = ?key, subscriber = id.as_u64(), "Detach called more than once");
                return false;
            }
            if entry.subscribers.is_empty() && !entry.setting_up {
                entries.remove(key).and_then(|entry| entry.teardown)
            } else {
                None
            }
        };
        if let Some(teardown) = teardown {
            teardown();
        }
        true
    }

    pub fn is_active(&self, key: &K) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn subscriber_count(&self, key: &K) -> usize {
        self.entries
            .lock()
            .get(key)
            .map_or(0, |entry| entry.subscribers.len())
    }

    /// Tear down every subscription regardless of subscribers
    pub fn clear(&self) {
        let drained: Vec<Entry> = self.entries.lock().drain().map(|(_, entry)| entry).collect();
        for entry in drained {
            if let Some(teardown) = entry.teardown {
                teardown();
            }
        }
    }
}
