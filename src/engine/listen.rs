//! Listen execution
//!
//! Subscriptions are shared per path through the listener registry. The
//! underlying listener starts on the first attach and stops after the last
//! detach.

use super::{Loader, LoaderInner};
use crate::error::{ErrorInfo, LoadError};
use crate::events::{LoadEvent, SuccessPayload};
use crate::resolver::{DataSink, PathResolution, Resolver, Teardown};
use crate::subscription::{ListenerRegistry, SubscriberId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Deadline for the first value of a `should_wait_for_value` subscription
#[derive(Default)]
struct FirstValueTimer {
    armed: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl FirstValueTimer {
    /// Stop the timer. Returns whether it was still armed.
    fn disarm(&self) -> bool {
        let was_armed = self.armed.swap(false, Ordering::SeqCst);
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        was_armed
    }

    /// Called by the timer task itself when the deadline passes
    fn expire(&self) -> bool {
        self.armed.swap(false, Ordering::SeqCst)
    }
}

/// One subscriber's hold on a path subscription; released on `detach` or drop
#[must_use = "the subscription is released when the handle is dropped"]
pub struct ListenerHandle {
    registry: Arc<ListenerRegistry>,
    path: String,
    id: Option<SubscriberId>,
}

impl ListenerHandle {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn detach(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(id) = self.id.take() {
            self.registry.detach(&self.path, id);
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("path", &self.path)
            .field("id", &self.id)
            .finish()
    }
}

impl Loader {
    /// Subscribe to `resolution` with `resolver`, sharing the subscription with
    /// every other subscriber of the same path
    pub fn listen(&self, resolver: Arc<Resolver>, resolution: PathResolution) -> ListenerHandle {
        let path = resolution.path.clone();
        let id = self
            .inner
            .listeners
            .attach(path.clone(), || self.start_listening(&resolver, &resolution));
        ListenerHandle {
            registry: Arc::clone(&self.inner.listeners),
            path,
            id: Some(id),
        }
    }

    fn start_listening(&self, resolver: &Resolver, resolution: &PathResolution) -> Teardown {
        let path = resolution.path.clone();
        let Some(listener) = resolver.descriptor().listen.clone() else {
            warn!(path = %path, "Resolver cannot listen");
            return Box::new(|| {});
        };
        info!(path = %path, "Starting to listen");

        let timer = Arc::new(FirstValueTimer::default());
        if resolver.descriptor().should_wait_for_value {
            self.dispatch(LoadEvent::start(&path, self.now()));
            self.arm_first_value_timer(&timer, resolution);
        }

        let sink = {
            let inner = Arc::downgrade(&self.inner);
            let timer = Arc::clone(&timer);
            let path = path.clone();
            DataSink::new(move |outcome| {
                let Some(loader) = Loader::upgrade(&inner) else {
                    debug!(path = %path, "Value delivered after loader was dropped");
                    return;
                };
                timer.disarm();
                let payload = SuccessPayload::from_outcome(&path, loader.now(), outcome);
                loader.dispatch(LoadEvent::Success(payload));
            })
        };
        let unsubscribe = listener.listen(resolution, sink);

        let inner = Arc::downgrade(&self.inner);
        Box::new(move || {
            if timer.disarm() {
                if let Some(loader) = Loader::upgrade(&inner) {
                    let error = ErrorInfo::new(
                        format!("Fetching initial value for {} was cancelled", path),
                        Some(LoadError::Cancelled.code()),
                    );
                    loader.dispatch(LoadEvent::fail(&path, loader.now(), error));
                }
            }
            info!(path = %path, "Unsubscribed");
            unsubscribe();
        })
    }

    fn arm_first_value_timer(&self, timer: &Arc<FirstValueTimer>, resolution: &PathResolution) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(path = %resolution.path, "No Tokio runtime; first value deadline not armed");
            return;
        };
        let timeout = resolution.data_fetch_timeout(self.inner.config.data_fetch_timeout());
        let inner: Weak<LoaderInner> = Arc::downgrade(&self.inner);
        let path = resolution.path.clone();

        timer.armed.store(true, Ordering::SeqCst);
        let expiring = Arc::clone(timer);
        let task = runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            if !expiring.expire() {
                return;
            }
            if let Some(loader) = Loader::upgrade(&inner) {
                warn!(path = %path, "No value delivered before deadline");
                let error = ErrorInfo::new(
                    format!("Fetching initial value for {} failed", path),
                    Some(LoadError::Timeout.code()),
                );
                loader.dispatch(LoadEvent::fail(&path, loader.now(), error));
            }
        });
        *timer.task.lock() = Some(task);
    }
}
