// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Hot-reloading holder for the simulation file

use parking_lot::Mutex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, info};

use super::Config;

/// Errors from loading the simulation file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {0} not found")]
    Missing(PathBuf),

    #[error("IO error while reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Only a missing file stops the simulator; everything else keeps the last good config
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConfigError::Missing(_))
    }
}

/// Outcome of [`ConfigStore::refresh`]
#[derive(Debug, Clone)]
pub enum Refresh {
    Unchanged(Arc<Config>),
    Reloaded(Arc<Config>),
}

impl Refresh {
    pub fn config(&self) -> &Arc<Config> {
        match self {
            Refresh::Unchanged(config) | Refresh::Reloaded(config) => config,
        }
    }

    pub fn into_config(self) -> Arc<Config> {
        match self {
            Refresh::Unchanged(config) | Refresh::Reloaded(config) => config,
        }
    }

    pub fn is_reloaded(&self) -> bool {
        matches!(self, Refresh::Reloaded(_))
    }
}

struct StoreState {
    current: Arc<Config>,
    /// mtime of the last file contents we attempted to parse
    seen: Option<SystemTime>,
    reloads: u64,
}

/// Owns the current [`Config`] snapshot and swaps it when the file's mtime moves
pub struct ConfigStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl ConfigStore {
    /// Create an empty store; nothing is read until the first refresh
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(StoreState {
                current: Arc::new(Config::default()),
                seen: None,
                reloads: 0,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last successfully loaded snapshot (empty before the first good load)
    pub fn current(&self) -> Arc<Config> {
        self.state.lock().current.clone()
    }

    /// Number of successful reloads so far
    pub fn reloads(&self) -> u64 {
        self.state.lock().reloads
    }

    /// Re-read the file if its modification time changed.
    ///
    /// A file that fails to parse is reported once; its mtime is remembered so
    /// later calls return the previous snapshot until the file changes again.
    pub fn refresh(&self) -> Result<Refresh, ConfigError> {
        let modified = self.modified()?;

        let mut state = self.state.lock();
        if state.seen == Some(modified) {
            return Ok(Refresh::Unchanged(state.current.clone()));
        }

        let text = fs::read_to_string(&self.path).map_err(|source| self.io_error(source))?;
        state.seen = Some(modified);

        let config = Arc::new(Config::from_yaml(&text, Some(modified))?);
        info!(
            "Config reloaded: {} greenhouses, {} simulator sensors, {} runtime sensor types",
            config.topology.locations.len(),
            config.sensor_types.len(),
            config.metadata.len()
        );
        debug!("{} readings per cycle", config.readings_per_cycle());

        state.current = config.clone();
        state.reloads += 1;
        Ok(Refresh::Reloaded(config))
    }

    fn modified(&self) -> Result<SystemTime, ConfigError> {
        let meta = fs::metadata(&self.path).map_err(|source| self.io_error(source))?;
        meta.modified().map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: io::Error) -> ConfigError {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::Missing(self.path.clone())
        } else {
            ConfigError::Io {
                path: self.path.clone(),
                source,
            }
        }
    }
}
