//! Shared test utilities for integration tests
//!
//! Recording stores, a manual clock, and isolation of the environment variables
//! the configuration loader reads.

use infuse::{LoadEvent, Loader, LoaderConfig, ResolverDescriptor, TreeStore};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Global mutex to serialize environment variable access across all tests
static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Events seen by a store, in dispatch order
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<LoadEvent>>>,
}

impl EventLog {
    pub fn attach(store: &TreeStore) -> Self {
        let log = EventLog::default();
        let events = Arc::clone(&log.events);
        store.subscribe(move |event, _| {
            events.lock().push(event.clone());
            Ok(())
        });
        log
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(LoadEvent::kind).collect()
    }

    /// Kinds of events for `path`
    pub fn kinds_for(&self, path: &str) -> Vec<&'static str> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.path() == Some(path))
            .map(LoadEvent::kind)
            .collect()
    }

    pub fn events(&self) -> Vec<LoadEvent> {
        self.events.lock().clone()
    }
}

/// Clock the test moves by hand
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    pub fn advance_secs(&self, secs: u64) {
        self.now.fetch_add(secs * 1_000, Ordering::SeqCst);
    }

    pub fn reader(&self) -> impl Fn() -> u64 + Send + Sync + 'static {
        let now = Arc::clone(&self.now);
        move || now.load(Ordering::SeqCst)
    }
}

/// Store, event log and loader over `descriptors`
pub fn setup(descriptors: Vec<ResolverDescriptor>) -> (Arc<TreeStore>, EventLog, Loader) {
    let store = Arc::new(TreeStore::default());
    let log = EventLog::attach(&store);
    let loader = Loader::new(store.clone(), descriptors, LoaderConfig::default()).unwrap();
    (store, log, loader)
}

/// Same as [`setup`], with a manual clock
pub fn setup_with_clock(
    descriptors: Vec<ResolverDescriptor>,
    clock: &ManualClock,
) -> (Arc<TreeStore>, EventLog, Loader) {
    let store = Arc::new(TreeStore::default());
    let log = EventLog::attach(&store);
    let loader = Loader::builder(store.clone())
        .resolvers(descriptors)
        .clock(clock.reader())
        .build()
        .unwrap();
    (store, log, loader)
}

/// Environment variable state to restore after test
struct EnvState {
    home: Option<String>,
    xdg_config_home: Option<String>,
}

impl EnvState {
    fn capture() -> Self {
        Self {
            home: std::env::var("HOME").ok(),
            xdg_config_home: std::env::var("XDG_CONFIG_HOME").ok(),
        }
    }

    fn restore(self) {
        if let Some(orig) = self.home {
            std::env::set_var("HOME", orig);
        } else {
            std::env::remove_var("HOME");
        }

        if let Some(orig) = self.xdg_config_home {
            std::env::set_var("XDG_CONFIG_HOME", orig);
        } else {
            std::env::remove_var("XDG_CONFIG_HOME");
        }
    }
}

/// Run `f` with XDG_CONFIG_HOME and HOME inside `test_dir`, plus the given
/// extra variables, restoring everything afterwards
pub fn with_config_env<F, R>(test_dir: &TempDir, vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let env_state = EnvState::capture();

    let test_config_home = test_dir.path().join("config");
    let test_home = test_dir.path().join("home");
    std::fs::create_dir_all(&test_config_home).unwrap();
    std::fs::create_dir_all(&test_home).unwrap();

    std::env::set_var("HOME", test_home.to_str().unwrap());
    std::env::set_var("XDG_CONFIG_HOME", test_config_home.to_str().unwrap());
    for (key, value) in vars {
        std::env::set_var(key, value);
    }

    let result = f();

    for (key, _) in vars {
        std::env::remove_var(key);
    }
    env_state.restore();

    result
}
