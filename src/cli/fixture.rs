//! Fixture-backed resolver: a JSON file standing in for a remote source.
//!
//! Every path is served from the value at the same path in the file. The
//! listener re-delivers the value whenever the file changes on disk.

use crate::error::LoadError;
use crate::resolver::{
    DataSink, FetchOutcome, Fetcher, Listener, PathResolution, ResolverDescriptor, Teardown,
};
use crate::tree::{get_in, split_path};
use async_trait::async_trait;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A JSON document read fresh on every request
#[derive(Debug, Clone)]
pub struct Fixture {
    file: PathBuf,
}

impl Fixture {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self { file: file.into() }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn read(&self) -> anyhow::Result<Value> {
        let raw = std::fs::read_to_string(&self.file).map_err(|e| {
            LoadError::Resolver(format!("Failed to read fixture {}: {}", self.file.display(), e))
        })?;
        let value = serde_json::from_str(&raw).map_err(|e| {
            LoadError::Resolver(format!("Invalid fixture {}: {}", self.file.display(), e))
        })?;
        Ok(value)
    }

    /// Outcome for `path`; a path absent from the file is a resolver error
    pub fn lookup(&self, path: &str) -> anyhow::Result<FetchOutcome> {
        let document = self.read()?;
        let value = get_in(&document, &split_path(path))
            .cloned()
            .ok_or_else(|| LoadError::Resolver(format!("Fixture has no value at '{}'", path)))?;
        Ok(FetchOutcome::data(value))
    }

    /// Resolver serving every path from this fixture
    pub fn descriptor(self, wait_for_value: bool) -> ResolverDescriptor {
        let fixture = Arc::new(self);
        let descriptor = ResolverDescriptor::new("*")
            .with_fetch(Arc::new(FixtureFetcher(Arc::clone(&fixture))))
            .with_listen(Arc::new(FixtureListener(fixture)));
        if wait_for_value {
            descriptor.wait_for_value()
        } else {
            descriptor
        }
    }
}

struct FixtureFetcher(Arc<Fixture>);

#[async_trait]
impl Fetcher for FixtureFetcher {
    async fn fetch(&self, resolution: &PathResolution) -> anyhow::Result<FetchOutcome> {
        self.0.lookup(&resolution.path)
    }
}

struct FixtureListener(Arc<Fixture>);

impl Listener for FixtureListener {
    fn listen(&self, resolution: &PathResolution, sink: DataSink) -> Teardown {
        let fixture = Arc::clone(&self.0);
        let path = resolution.path.clone();

        deliver(&fixture, &path, &sink);

        let Some(directory) = fixture
            .file()
            .parent()
            .map(|dir| if dir.as_os_str().is_empty() { Path::new(".") } else { dir })
            .map(Path::to_path_buf)
        else {
            warn!(fixture = %fixture.file().display(), "Fixture has no parent directory to watch");
            return Box::new(|| {});
        };
        let file_name = fixture.file().file_name().map(|name| name.to_os_string());

        let watched = Arc::clone(&fixture);
        let watched_path = path.clone();
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let relevant = matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
                    && event
                        .paths
                        .iter()
                        .any(|changed| changed.file_name() == file_name.as_deref());
                if relevant {
                    debug!(path = %watched_path, "Fixture changed");
                    deliver(&watched, &watched_path, &sink);
                }
            }
            Err(e) => error!(error = %e, "Fixture watch error"),
        });

        let mut watcher = match watcher {
            Ok(watcher) => watcher,
            Err(e) => {
                error!(error = %e, "Failed to create fixture watcher");
                return Box::new(|| {});
            }
        };
        if let Err(e) = watcher.watch(&directory, RecursiveMode::NonRecursive) {
            error!(directory = %directory.display(), error = %e, "Failed to watch fixture directory");
            return Box::new(|| {});
        }
        info!(fixture = %fixture.file().display(), path = %path, "Watching fixture");

        Box::new(move || drop(watcher))
    }
}

fn deliver(fixture: &Fixture, path: &str, sink: &DataSink) {
    match fixture.lookup(path) {
        Ok(outcome) => sink.send(outcome),
        Err(e) => debug!(path, error = %e, "Nothing to deliver"),
    }
}
