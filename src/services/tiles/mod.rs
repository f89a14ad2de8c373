// src/services/tiles/mod.rs

//! Basemap tile resolution.
//!
//! The resolver is a pure state machine: the host feeds it layer events
//! (tile loaded, tile error, layer complete, timers firing) and executes the
//! [`TileEffect`]s it returns. [`TileLoader`] is the async host used by the
//! CLI; a browser front-end drives the same machine from the `scene.json`
//! tile configuration.
//!
//! ```text
//! Idle ──start──▶ Loading(0) ──all_loaded──▶ Succeeded(0)
//!                     │
//!          errors > threshold / watchdog
//!                     ▼
//!                 Failed(0) ──switch_due──▶ Loading(1) ... ──▶ AllFailed
//! ```

mod chain;
mod download;
mod loader;
mod local_first;

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::error::Result;
use crate::models::{TileConfig, TileCoord, TileProvider, TileStrategyKind};

pub use chain::RemoteChain;
pub use download::{DownloadOptions, DownloadReport, TileDownloader, ZoomCoverage, ZoomStats};
pub use loader::{HttpTileFetcher, LoadReport, LocalTileFetcher, TileFetcher, TileLoader};
pub use local_first::LocalFirst;

/// Resolver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "provider", rename_all = "camelCase")]
pub enum ResolverState {
    Idle,
    /// Provider `i` is the active layer
    Loading(usize),
    /// Provider `i` rendered the viewport; no further switching
    Succeeded(usize),
    /// Provider `i` gave up; a switch to `i + 1` is pending
    Failed(usize),
    /// Every provider failed
    AllFailed,
}

impl ResolverState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResolverState::Succeeded(_) | ResolverState::AllFailed)
    }
}

impl fmt::Display for ResolverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolverState::Idle => write!(f, "idle"),
            ResolverState::Loading(i) => write!(f, "loading({i})"),
            ResolverState::Succeeded(i) => write!(f, "succeeded({i})"),
            ResolverState::Failed(i) => write!(f, "failed({i})"),
            ResolverState::AllFailed => write!(f, "all-failed"),
        }
    }
}

/// Side effects requested by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileEffect {
    /// Replace the visible layer with provider `provider`
    ActivateLayer { provider: usize },
    /// Call `switch_due(provider)` after `after`
    ScheduleSwitch { provider: usize, after: Duration },
    /// Call `watchdog_fired(provider, rendered)` after `after`
    ScheduleWatchdog { provider: usize, after: Duration },
    /// Show the loading overlay and hide it again after `dismiss_after`
    ShowOverlay { dismiss_after: Duration },
    DismissOverlay,
    /// Non-blocking error panel over the map
    ShowErrorPanel { message: String },
    /// Re-request one tile from a different URL
    RefetchTile { coord: TileCoord, url: String },
}

/// Message shown once every provider is exhausted.
pub const ALL_FAILED_MESSAGE: &str = "地图加载失败，请检查网络连接";

/// The configured fallback strategy.
#[derive(Debug, Clone)]
pub enum TileStrategy {
    RemoteChain(RemoteChain),
    LocalFirst(LocalFirst),
}

impl TileStrategy {
    /// Build the strategy selected in configuration.
    pub fn from_config(config: &TileConfig) -> Result<Self> {
        match config.strategy {
            TileStrategyKind::RemoteChain => Ok(Self::RemoteChain(RemoteChain::from_config(config))),
            TileStrategyKind::LocalFirst => Ok(Self::LocalFirst(LocalFirst::from_config(config)?)),
        }
    }

    pub fn kind(&self) -> TileStrategyKind {
        match self {
            Self::RemoteChain(_) => TileStrategyKind::RemoteChain,
            Self::LocalFirst(_) => TileStrategyKind::LocalFirst,
        }
    }

    pub fn providers(&self) -> &[TileProvider] {
        match self {
            Self::RemoteChain(s) => s.providers(),
            Self::LocalFirst(s) => s.providers(),
        }
    }

    pub fn provider(&self, index: usize) -> Option<&TileProvider> {
        self.providers().get(index)
    }

    pub fn state(&self) -> ResolverState {
        match self {
            Self::RemoteChain(s) => s.state(),
            Self::LocalFirst(s) => s.state(),
        }
    }

    pub fn start(&mut self) -> Vec<TileEffect> {
        match self {
            Self::RemoteChain(s) => s.start(),
            Self::LocalFirst(s) => s.start(),
        }
    }

    pub fn tile_loaded(&mut self, provider: usize) -> Vec<TileEffect> {
        match self {
            Self::RemoteChain(s) => s.tile_loaded(provider),
            Self::LocalFirst(s) => s.tile_loaded(provider),
        }
    }

    /// A tile failed. `tile_url` is the URL that was requested.
    pub fn tile_error(&mut self, provider: usize, tile_url: &str) -> Vec<TileEffect> {
        match self {
            Self::RemoteChain(s) => s.tile_error(provider),
            Self::LocalFirst(s) => s.tile_error(provider, tile_url),
        }
    }

    pub fn all_loaded(&mut self, provider: usize) -> Vec<TileEffect> {
        match self {
            Self::RemoteChain(s) => s.all_loaded(provider),
            Self::LocalFirst(s) => s.all_loaded(provider),
        }
    }

    pub fn watchdog_fired(&mut self, provider: usize, rendered: u32) -> Vec<TileEffect> {
        match self {
            Self::RemoteChain(s) => s.watchdog_fired(provider, rendered),
            Self::LocalFirst(_) => Vec::new(),
        }
    }

    pub fn switch_due(&mut self, provider: usize) -> Vec<TileEffect> {
        match self {
            Self::RemoteChain(s) => s.switch_due(provider),
            Self::LocalFirst(_) => Vec::new(),
        }
    }

    /// Tiles served by the remote fallback so far (local-first only).
    pub fn fallback_count(&self) -> u32 {
        match self {
            Self::RemoteChain(_) => 0,
            Self::LocalFirst(s) => s.fallback_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_selects_strategy() {
        let mut config = TileConfig::default();
        let strategy = TileStrategy::from_config(&config).unwrap();
        assert_eq!(strategy.kind(), TileStrategyKind::RemoteChain);
        assert_eq!(strategy.providers().len(), 3);
        assert_eq!(strategy.state(), ResolverState::Idle);

        config.strategy = TileStrategyKind::LocalFirst;
        let strategy = TileStrategy::from_config(&config).unwrap();
        assert_eq!(strategy.kind(), TileStrategyKind::LocalFirst);
        assert_eq!(strategy.provider(0).unwrap().name, "local");
    }

    #[test]
    fn test_local_first_ignores_timers() {
        let mut config = TileConfig::default();
        config.strategy = TileStrategyKind::LocalFirst;
        let mut strategy = TileStrategy::from_config(&config).unwrap();
        strategy.start();
        assert!(strategy.watchdog_fired(0, 0).is_empty());
        assert!(strategy.switch_due(0).is_empty());
        assert_eq!(strategy.state(), ResolverState::Loading(0));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ResolverState::Loading(2).to_string(), "loading(2)");
        assert!(ResolverState::AllFailed.is_terminal());
        assert!(!ResolverState::Failed(0).is_terminal());
    }
}
