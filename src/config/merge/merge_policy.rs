//! Merge rules: defaults every other source is layered over.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with the loader defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("loader.root_node", "data")?
        .set_default("loader.shadow_node", "_data")?
        .set_default("loader.data_fetch_timeout_ms", 10_000)?
        .set_default("loader.retry_after_ms", 5_000)?
        .set_default("loader.refresh_after_ms", 60_000)?
        .set_default("logging.level", "info")
}
