//! mstore configuration file handling
//!
//! The file holds a `[store]` table whose keys are the fields of
//! [`StoreOptions`]. Without a file, options come from `MONGOSTORE_*`
//! environment variables.
//!
//! ```toml
//! [store]
//! db = "app"
//! hosts = ["db1:27017", "db2:27017"]
//! replica_set = "rs0"
//! auto_id = true
//! auto_id_map_id = "id"
//! collections = ["app.users", "logs.*"]
//!
//! [store.pool]
//! max_pool_size = 20
//! connect_timeout = 5
//! ```

use anyhow::{Context, Result};
use mongostore::StoreOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "mstore.toml";

/// Wrapper for the config file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub store: StoreOptions,
}

impl ConfigFile {
    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: ConfigFile = toml::from_str(content)?;
        Ok(config)
    }
}

/// Resolve store options
///
/// Precedence: explicit `--config` path, then `mstore.toml` in `dir`, then
/// the environment. A password in `MONGOSTORE_PASSWORD` always fills a
/// missing password from the file so secrets can stay out of it.
pub fn resolve_options(explicit: Option<&Path>, dir: &Path) -> Result<StoreOptions> {
    let default_path = dir.join(DEFAULT_CONFIG_FILE);
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None if default_path.exists() => Some(default_path),
        None => None,
    };

    let mut options = match path {
        Some(path) => {
            tracing::debug!("Loading options from {}", path.display());
            ConfigFile::load(&path)?.store
        }
        None => {
            tracing::debug!("No config file, reading MONGOSTORE_* environment");
            return StoreOptions::from_env().context("Invalid MONGOSTORE_* environment");
        }
    };

    if options.password.is_none() {
        options.password = std::env::var("MONGOSTORE_PASSWORD").ok();
    }

    options.validate().context("Invalid store options")?;
    Ok(options)
}
