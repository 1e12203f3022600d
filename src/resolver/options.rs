//! Per-request and per-consumer options, and the resolved request they travel in.

use crate::matcher::PathParams;
use std::time::Duration;

/// Options supplied with a single path request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathOptions {
    /// Subscribe instead of fetching once
    pub listen: bool,
    /// Fetch even if the cached data is fresh
    pub force_redownload: bool,
    /// Make `attach` wait for the fetch to settle
    pub wait_for_value: bool,
    pub retry_after: Option<Duration>,
    pub refresh_after: Option<Duration>,
    pub data_fetch_timeout: Option<Duration>,
}

impl PathOptions {
    pub fn listen() -> Self {
        Self {
            listen: true,
            ..Self::default()
        }
    }

    pub fn force() -> Self {
        Self {
            force_redownload: true,
            ..Self::default()
        }
    }

    pub fn wait() -> Self {
        Self {
            wait_for_value: true,
            ..Self::default()
        }
    }
}

/// Options shared by every request a consumer makes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Consumer name, used in logs
    pub consumer: Option<String>,
    pub retry_after: Option<Duration>,
    pub refresh_after: Option<Duration>,
    pub data_fetch_timeout: Option<Duration>,
}

impl LoaderOptions {
    pub fn named(consumer: impl Into<String>) -> Self {
        Self {
            consumer: Some(consumer.into()),
            ..Self::default()
        }
    }
}

/// A path matched to a resolver, with everything the resolver needs to serve it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathResolution {
    pub path: String,
    pub params: PathParams,
    pub path_options: PathOptions,
    pub loader_options: LoaderOptions,
}

impl PathResolution {
    pub fn new(
        path: impl Into<String>,
        params: PathParams,
        path_options: PathOptions,
        loader_options: LoaderOptions,
    ) -> Self {
        Self {
            path: path.into(),
            params,
            path_options,
            loader_options,
        }
    }

    /// Capture by name
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Most specific value wins: path options, then loader options, then `default`
    pub fn refresh_after(&self, default: Duration) -> Duration {
        self.path_options
            .refresh_after
            .or(self.loader_options.refresh_after)
            .unwrap_or(default)
    }

    pub fn retry_after(&self, default: Duration) -> Duration {
        self.path_options
            .retry_after
            .or(self.loader_options.retry_after)
            .unwrap_or(default)
    }

    pub fn data_fetch_timeout(&self, default: Duration) -> Duration {
        self.path_options
            .data_fetch_timeout
            .or(self.loader_options.data_fetch_timeout)
            .unwrap_or(default)
    }
}
