//! Fetch execution
//!
//! A fetch races the resolver against the timeout and against its own
//! cancellation slot. Whatever wins, the result is applied only if the attempt
//! still owns the path's slot.

use super::inflight::Attempt;
use super::Loader;
use crate::error::{ErrorInfo, LoadError};
use crate::events::{LoadEvent, SuccessPayload};
use crate::resolver::{FetchOutcome, PathResolution, Resolver};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// How a fetch settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    /// `LOAD_SUCCESS` was dispatched
    Loaded,
    /// `LOAD_FAIL` was dispatched with this error
    Failed(ErrorInfo),
    /// Superseded by a newer fetch for the same path, or reset; nothing was
    /// dispatched after the start event
    Cancelled,
}

impl FetchStatus {
    pub fn is_loaded(&self) -> bool {
        matches!(self, FetchStatus::Loaded)
    }
}

impl Loader {
    /// Fetch `resolution` with `resolver`, regardless of freshness
    pub async fn fetch(&self, resolver: Arc<Resolver>, resolution: PathResolution) -> FetchStatus {
        let attempt = self.begin_fetch(&resolution.path);
        self.run_fetch(resolver, resolution, attempt).await
    }

    /// Claim the in-flight slot for `path` and record the start. Runs before
    /// anything is awaited, so a request arriving right after sees the load
    /// as pending.
    pub(crate) fn begin_fetch(&self, path: &str) -> Attempt {
        let attempt = self.inner.in_flight.begin(path);
        self.dispatch(LoadEvent::start(path, self.now()));
        attempt
    }

    /// Race the resolver for an attempt taken by `begin_fetch` and
    /// apply the result if the attempt still owns the slot
    pub(crate) async fn run_fetch(
        &self,
        resolver: Arc<Resolver>,
        resolution: PathResolution,
        attempt: Attempt,
    ) -> FetchStatus {
        let path = resolution.path.clone();
        let timeout = resolution.data_fetch_timeout(self.inner.config.data_fetch_timeout());
        let fetcher = resolver.descriptor().fetch.clone();
        let result: anyhow::Result<FetchOutcome> = tokio::select! {
            result = async {
                match &fetcher {
                    Some(fetcher) => fetcher.fetch(&resolution).await,
                    None => Err(LoadError::Resolver(format!("Resolver for '{}' cannot fetch", path)).into()),
                }
            } => result,
            _ = sleep(timeout) => Err(LoadError::Timeout.into()),
            _ = attempt.cancelled => Err(LoadError::Cancelled.into()),
        };

        if !self.inner.in_flight.finish(&path, attempt.generation) {
            debug!(path = %path, generation = attempt.generation, "Discarding superseded fetch");
            return FetchStatus::Cancelled;
        }

        let outcome = result.and_then(|outcome| {
            if outcome.is_empty() {
                Err(LoadError::Resolver(format!(
                    "Resolver for '{}' returned none of data, extraData, appendIndex or removeFromIndex",
                    path
                ))
                .into())
            } else {
                Ok(outcome)
            }
        });

        match outcome {
            Ok(outcome) => {
                let payload = SuccessPayload::from_outcome(&path, self.now(), outcome);
                self.dispatch(LoadEvent::Success(payload));
                FetchStatus::Loaded
            }
            Err(err) => {
                if err
                    .downcast_ref::<LoadError>()
                    .is_some_and(LoadError::is_cancelled)
                {
                    info!(path = %path, "Fetch cancelled");
                    return FetchStatus::Cancelled;
                }
                let info = ErrorInfo::from_anyhow(&err);
                error!(
                    path = %path,
                    code = info.code.as_deref().unwrap_or_default(),
                    error = %err,
                    "Fetch failed"
                );
                self.dispatch(LoadEvent::fail(&path, self.now(), info.clone()));
                FetchStatus::Failed(info)
            }
        }
    }
}
