//! Infuse: Declarative Path-Addressed Data Loading
//!
//! Remote resources are synchronized into a local JSON tree addressed by
//! slash-delimited paths. Callers request a path; the engine decides whether
//! the cached data is fresh, fetches or subscribes when it is not, deduplicates
//! concurrent requests, and folds the results (including paginated index
//! fragments) back into the tree without mutating earlier snapshots.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod infuser;
pub mod logging;
pub mod matcher;
pub mod reducers;
pub mod resolver;
pub mod store;
pub mod subscription;
pub mod tree;

pub use config::{ConfigLoader, InfuseConfig, LoaderConfig};
pub use engine::{Attachment, FetchStatus, ListenerHandle, Loader, LoaderBuilder};
pub use error::{ErrorInfo, LoadError};
pub use events::LoadEvent;
pub use infuser::{Infuser, Selection};
pub use matcher::{MatchSpec, PathParams};
pub use resolver::{
    fetch_fn, listen_fn, DataSink, FetchOutcome, LoaderOptions, PathOptions, PathResolution,
    ResolverDescriptor,
};
pub use store::{Store, TreeStore};
pub use subscription::{Dependency, DependencyHandle};
