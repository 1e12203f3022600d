//! Resolvers
//!
//! A resolver binds a path pattern to fetch and/or listen behavior. Resolvers
//! are registered once when the loader is built and are immutable afterwards.

pub mod descriptor;
pub mod options;
pub mod registry;

pub use descriptor::{
    fetch_fn, listen_fn, DataSink, FetchOutcome, Fetcher, Listener, ResolverDescriptor, Teardown,
};
pub use options::{LoaderOptions, PathOptions, PathResolution};
pub use registry::ResolverRegistry;

use crate::matcher::PathParams;

/// A registered resolver
#[derive(Debug)]
pub struct Resolver {
    descriptor: ResolverDescriptor,
}

impl Resolver {
    pub fn new(descriptor: ResolverDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn descriptor(&self) -> &ResolverDescriptor {
        &self.descriptor
    }

    pub fn is_fetcher(&self) -> bool {
        self.descriptor.fetch.is_some()
    }

    pub fn is_listener(&self) -> bool {
        self.descriptor.listen.is_some()
    }

    /// Match `path` in the mode selected by `options.listen`.
    ///
    /// A resolver without the matching capability never matches.
    pub fn match_path(&self, path: &str, options: &PathOptions) -> Option<PathParams> {
        let capable = if options.listen {
            self.is_listener()
        } else {
            self.is_fetcher()
        };
        if !capable {
            return None;
        }
        self.descriptor.match_spec.matches(path, options)
    }

    /// Parent path for cascading staleness, if the descriptor declares one
    pub fn parent_path(&self, resolution: &PathResolution) -> Option<String> {
        self.descriptor
            .parent_path
            .as_ref()
            .and_then(|parent| parent(resolution))
            .filter(|path| !path.is_empty())
    }
}
