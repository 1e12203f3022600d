//! CLI route: runs parsed commands against a fixture-backed loader.

use super::fixture::Fixture;
use super::parse::Commands;
use super::presentation::{format_status_table, format_value};
use crate::config::InfuseConfig;
use crate::engine::Loader;
use crate::events::LoadEvent;
use crate::resolver::{LoaderOptions, PathOptions};
use crate::store::{Store, TreeStore};
use crate::tree::{get_in, split_path};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const CONSUMER: &str = "infuse-cli";

/// Command runner holding the loaded configuration
pub struct RunContext {
    config: InfuseConfig,
}

impl RunContext {
    pub fn new(config: InfuseConfig) -> Self {
        Self { config }
    }

    pub async fn execute(&self, command: &Commands) -> anyhow::Result<String> {
        match command {
            Commands::Get {
                fixture,
                status,
                paths,
            } => self.get(fixture, *status, paths).await,
            Commands::Watch {
                fixture,
                timeout_ms,
                path,
            } => self.watch(fixture, *timeout_ms, path).await,
        }
    }

    async fn get(&self, fixture: &Path, status: bool, paths: &[String]) -> anyhow::Result<String> {
        let store = Arc::new(TreeStore::new(&self.config.loader));
        let loader = Loader::builder(store.clone())
            .resolver(Fixture::new(fixture).descriptor(false))
            .config(self.config.loader.clone())
            .build()?;

        for path in paths {
            let attachment = loader
                .attach(path, PathOptions::wait(), LoaderOptions::named(CONSUMER))
                .await?;
            attachment.detach();
        }

        let data = store.data();
        let mut lines: Vec<String> = paths
            .iter()
            .map(|path| format_value(path, get_in(&data, &split_path(path))))
            .collect();

        if status {
            let rows = paths
                .iter()
                .map(|path| Ok((path.clone(), loader.shadow_record(path)?)))
                .collect::<Result<Vec<_>, crate::error::LoadError>>()?;
            lines.push(format_status_table(&rows));
        }
        Ok(lines.join("\n"))
    }

    async fn watch(
        &self,
        fixture: &Path,
        timeout_ms: Option<u64>,
        path: &str,
    ) -> anyhow::Result<String> {
        let store = Arc::new(TreeStore::new(&self.config.loader));
        let root_node = self.config.loader.root_node.clone();
        let watched = path.to_string();
        store.subscribe(move |event, state| {
            match event {
                LoadEvent::Success(payload) if payload.path == watched => {
                    let value = state
                        .get(&root_node)
                        .and_then(|data| get_in(data, &split_path(&watched)));
                    println!("{}", format_value(&watched, value));
                }
                LoadEvent::Fail(payload) if payload.path == watched => {
                    eprintln!("{}: {}", watched, payload.error.message);
                }
                _ => {}
            }
            Ok(())
        });

        let loader = Loader::builder(store.clone() as Arc<dyn Store>)
            .resolver(Fixture::new(fixture).descriptor(timeout_ms.is_some()))
            .config(self.config.loader.clone())
            .build()?;

        let loader_options = LoaderOptions {
            data_fetch_timeout: timeout_ms.map(Duration::from_millis),
            ..LoaderOptions::named(CONSUMER)
        };
        let attachment = loader
            .attach(path, PathOptions::listen(), loader_options)
            .await?;
        info!(path, fixture = %fixture.display(), "Watching; press Ctrl-C to stop");

        tokio::signal::ctrl_c().await?;
        attachment.detach();
        Ok(format!("Stopped watching {}", path))
    }
}
