//! Entry points that assemble the configuration sources.

use super::merge::merge_policy;
use super::sources::{explicit_file, global_file};
use super::InfuseConfig;
use crate::error::LoadError;
use config::Environment;
use std::path::{Path, PathBuf};

/// Loads [`InfuseConfig`] from the layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, then the global file, then `explicit` if given, then the environment
    pub fn load(explicit: Option<&Path>) -> Result<InfuseConfig, LoadError> {
        let mut builder = merge_policy::builder_with_defaults()?;
        builder = global_file::add_to_builder(builder)?;
        if let Some(path) = explicit {
            builder = explicit_file::add_to_builder(builder, path)?;
        }
        builder = builder.add_source(
            Environment::with_prefix("INFUSE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: InfuseConfig = builder.build()?.try_deserialize()?;
        config.ensure_valid()?;
        Ok(config)
    }

    /// Defaults and a single file; no global file, no environment
    pub fn load_from_file(path: &Path) -> Result<InfuseConfig, LoadError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = explicit_file::add_to_builder(builder, path)?;
        let config: InfuseConfig = builder.build()?.try_deserialize()?;
        config.ensure_valid()?;
        Ok(config)
    }

    /// Where the global config file is looked up
    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }
}
