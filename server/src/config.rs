//! Validated server settings.

use crate::mapgen;
use shared::{MapError, TileMap, MAX_CLIENTS, MIN_PLAYERS};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Longest tick interval accepted, in milliseconds.
pub const MAX_TICK_MS: u64 = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("tick interval must be between 1 and {} ms, got {0}", MAX_TICK_MS)]
    InvalidTickInterval(u64),
    #[error("minimum players must be between {} and {}, got {0}", MIN_PLAYERS, MAX_CLIENTS)]
    InvalidMinPlayers(usize),
    #[error("client timeout must be positive")]
    InvalidTimeout,
}

/// Where the session's map comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapSource {
    File(PathBuf),
    Generated { seed: u64 },
}

impl MapSource {
    pub fn load(&self) -> Result<TileMap, MapError> {
        match self {
            MapSource::File(path) => TileMap::load_from_file(path),
            MapSource::Generated { seed } => mapgen::generate(*seed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub address: String,
    pub map: MapSource,
    pub tick_interval: Duration,
    pub min_players: usize,
    pub client_timeout: Duration,
    pub restart_after: Option<Duration>,
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:4242".to_string(),
            map: MapSource::Generated { seed: 0 },
            tick_interval: Duration::from_millis(16),
            min_players: MIN_PLAYERS,
            client_timeout: Duration::from_secs(5),
            restart_after: None,
            debug: false,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tick_ms = self.tick_interval.as_millis() as u64;
        if !(1..=MAX_TICK_MS).contains(&tick_ms) {
            return Err(ConfigError::InvalidTickInterval(tick_ms));
        }
        if !(MIN_PLAYERS..=MAX_CLIENTS).contains(&self.min_players) {
            return Err(ConfigError::InvalidMinPlayers(self.min_players));
        }
        if self.client_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }

    /// Number of ticks an ended round lingers before resetting.
    pub fn restart_after_ticks(&self) -> Option<u64> {
        self.restart_after.map(|delay| {
            let tick = self.tick_interval.as_millis().max(1);
            (delay.as_millis() / tick) as u64
        })
    }
}
