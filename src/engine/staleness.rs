//! Freshness policy
//!
//! A path is fresh while its data is younger than `refresh_after`, or while a
//! load started less than `retry_after` ago is still pending. Resolvers that
//! declare a parent path defer a stale verdict to the parent.

use super::Loader;
use crate::error::LoadError;
use crate::reducers::ShadowRecord;
use crate::resolver::{PathResolution, Resolver};
use std::time::Duration;
use tracing::{debug, error};

/// Decide from a shadow record alone whether the path needs loading
pub fn record_is_stale(
    record: Option<&ShadowRecord>,
    now: u64,
    refresh_after: Duration,
    retry_after: Duration,
) -> bool {
    let Some(record) = record else {
        return true;
    };
    let age = |at: u64| Duration::from_millis(now.saturating_sub(at));

    if let Some(loaded_at) = record.loaded_at {
        if age(loaded_at) < refresh_after {
            return false;
        }
    }
    if let Some(started) = record.started_loading_at {
        if record.is_pending() && age(started) < retry_after {
            return false;
        }
    }
    true
}

impl Loader {
    /// Whether `resolution` should be fetched now.
    ///
    /// Fails with `ParentNotFound` when the resolver names a parent path no
    /// resolver serves, and with `Config` when the store has no shadow tree.
    pub fn is_stale(
        &self,
        resolver: &Resolver,
        resolution: &PathResolution,
    ) -> Result<bool, LoadError> {
        if resolution.path_options.force_redownload {
            return Ok(true);
        }

        let config = &self.inner.config;
        let record = self.shadow_record(&resolution.path)?;
        let stale = record_is_stale(
            record.as_ref(),
            self.now(),
            resolution.refresh_after(config.refresh_after()),
            resolution.retry_after(config.retry_after()),
        );
        if !stale {
            return Ok(false);
        }

        let Some(parent) = resolver.parent_path(resolution) else {
            return Ok(true);
        };
        let Some((parent_resolver, params)) = self
            .inner
            .registry
            .find(&parent, &resolution.path_options)
        else {
            error!(path = %resolution.path, parent = %parent, "Parent resolver could not be found");
            return Err(LoadError::ParentNotFound(parent));
        };
        debug!(path = %resolution.path, parent = %parent, "Deferring staleness to parent");
        let parent_resolution = PathResolution::new(
            parent,
            params,
            resolution.path_options.clone(),
            resolution.loader_options.clone(),
        );
        self.is_stale(&parent_resolver, &parent_resolution)
    }
}
