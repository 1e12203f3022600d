//! Ordered resolver registry with first-match lookup.

use crate::matcher::PathParams;
use crate::resolver::descriptor::ResolverDescriptor;
use crate::resolver::options::PathOptions;
use crate::resolver::Resolver;
use std::sync::Arc;

/// Resolvers in registration order.
///
/// Registration order is the tie-break when several resolvers match a path.
#[derive(Debug, Default, Clone)]
pub struct ResolverRegistry {
    resolvers: Vec<Arc<Resolver>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_descriptors(descriptors: impl IntoIterator<Item = ResolverDescriptor>) -> Self {
        let mut registry = Self::new();
        for descriptor in descriptors {
            registry.register(descriptor);
        }
        registry
    }

    pub fn register(&mut self, descriptor: ResolverDescriptor) {
        self.resolvers.push(Arc::new(Resolver::new(descriptor)));
    }

    /// First resolver able to serve `path` in the mode `options.listen` selects
    pub fn find(&self, path: &str, options: &PathOptions) -> Option<(Arc<Resolver>, PathParams)> {
        self.resolvers.iter().find_map(|resolver| {
            resolver
                .match_path(path, options)
                .map(|params| (Arc::clone(resolver), params))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Resolver>> {
        self.resolvers.iter()
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}
