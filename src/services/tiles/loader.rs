// src/services/tiles/loader.rs

//! Async host for the tile resolver.
//!
//! Requests a viewport's tiles through [`TileFetcher`]s, feeds the results
//! into a [`TileStrategy`] and runs its timers on tokio.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::Client;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{DownloadConfig, TileCoord, TileStrategyKind};
use crate::services::tiles::{ResolverState, TileEffect, TileStrategy};

/// Source of raw tile bytes.
#[async_trait]
pub trait TileFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetches tiles over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpTileFetcher {
    client: Client,
}

impl HttpTileFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    pub fn from_config(config: &DownloadConfig) -> Result<Self> {
        Self::new(&config.user_agent, Duration::from_secs(config.timeout_secs))
    }
}

#[async_trait]
impl TileFetcher for HttpTileFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::tile(url, format!("HTTP {}", status.as_u16())));
        }
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(AppError::tile(url, "empty body"));
        }
        Ok(bytes.to_vec())
    }
}

/// Reads bundle tiles from disk; URLs resolve relative to `root`.
#[derive(Debug, Clone)]
pub struct LocalTileFetcher {
    root: PathBuf,
}

impl LocalTileFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl TileFetcher for LocalTileFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        match tokio::fs::read(self.root.join(url)).await {
            Ok(bytes) if bytes.is_empty() => Err(AppError::tile(url, "empty file")),
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::tile(url, "not in bundle"))
            }
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

/// Outcome of one basemap load.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    pub strategy: TileStrategyKind,
    pub state: ResolverState,
    /// Last activated provider
    pub provider: Option<String>,
    pub requested: usize,
    pub loaded: u32,
    pub failed: u32,
    /// Tiles re-requested from the remote fallback
    pub fallbacks: u32,
    /// Provider switches after the first activation
    pub switches: u32,
    pub error_panel: Option<String>,
    pub elapsed_ms: u64,
}

enum Event {
    Tile {
        provider: usize,
        url: String,
        result: Result<usize>,
    },
    Watchdog {
        provider: usize,
    },
    Switch {
        provider: usize,
    },
    OverlayExpired,
}

#[derive(Debug, Clone, Copy, Default)]
struct Layer {
    outstanding: usize,
    rendered: u32,
}

/// Drives a strategy against real tile sources.
pub struct TileLoader {
    local: Arc<dyn TileFetcher>,
    remote: Arc<dyn TileFetcher>,
}

impl TileLoader {
    pub fn new(local: Arc<dyn TileFetcher>, remote: Arc<dyn TileFetcher>) -> Self {
        Self { local, remote }
    }

    /// Load `tiles` until the strategy settles or nothing is left to wait for.
    pub async fn run(&self, mut strategy: TileStrategy, tiles: &[TileCoord]) -> LoadReport {
        let started = tokio::time::Instant::now();
        let mut queue: FuturesUnordered<BoxFuture<'static, Event>> = FuturesUnordered::new();
        let mut layers = vec![Layer::default(); strategy.providers().len()];
        let mut report = LoadReport {
            strategy: strategy.kind(),
            state: strategy.state(),
            provider: None,
            requested: 0,
            loaded: 0,
            failed: 0,
            fallbacks: 0,
            switches: 0,
            error_panel: None,
            elapsed_ms: 0,
        };

        let effects = strategy.start();
        self.apply(effects, 0, &strategy, tiles, &mut queue, &mut layers, &mut report);

        while !strategy.state().is_terminal() {
            let Some(event) = queue.next().await else {
                break;
            };
            let (origin, effects) = match event {
                Event::Tile {
                    provider,
                    url,
                    result: Ok(bytes),
                } => {
                    log::debug!("Tile {} loaded ({} bytes)", url, bytes);
                    report.loaded += 1;
                    let layer = &mut layers[provider];
                    layer.outstanding = layer.outstanding.saturating_sub(1);
                    layer.rendered += 1;
                    let settled = layer.outstanding == 0;
                    let mut effects = strategy.tile_loaded(provider);
                    if settled {
                        effects.extend(strategy.all_loaded(provider));
                    }
                    (provider, effects)
                }
                Event::Tile {
                    provider,
                    url,
                    result: Err(error),
                } => {
                    log::debug!("Tile failed: {}", error);
                    let effects = strategy.tile_error(provider, &url);
                    let retried = effects
                        .iter()
                        .any(|e| matches!(e, TileEffect::RefetchTile { .. }));
                    let layer = &mut layers[provider];
                    if !retried {
                        report.failed += 1;
                        layer.outstanding = layer.outstanding.saturating_sub(1);
                    }
                    let mut effects = effects;
                    if layer.outstanding == 0 && layer.rendered > 0 {
                        effects.extend(strategy.all_loaded(provider));
                    }
                    (provider, effects)
                }
                Event::Watchdog { provider } => {
                    let rendered = layers[provider].rendered;
                    (provider, strategy.watchdog_fired(provider, rendered))
                }
                Event::Switch { provider } => (provider, strategy.switch_due(provider)),
                Event::OverlayExpired => {
                    log::debug!("Loading overlay expired");
                    (0, Vec::new())
                }
            };
            self.apply(effects, origin, &strategy, tiles, &mut queue, &mut layers, &mut report);
        }

        report.state = strategy.state();
        report.fallbacks = strategy.fallback_count();
        report.elapsed_ms = started.elapsed().as_millis() as u64;
        report
    }

    #[allow(clippy::too_many_arguments)]
    fn apply(
        &self,
        effects: Vec<TileEffect>,
        origin: usize,
        strategy: &TileStrategy,
        tiles: &[TileCoord],
        queue: &mut FuturesUnordered<BoxFuture<'static, Event>>,
        layers: &mut [Layer],
        report: &mut LoadReport,
    ) {
        for effect in effects {
            match effect {
                TileEffect::ActivateLayer { provider } => {
                    let Some(source) = strategy.provider(provider) else {
                        continue;
                    };
                    if report.provider.is_some() {
                        report.switches += 1;
                    }
                    report.provider = Some(source.name.clone());
                    let visible: Vec<TileCoord> = tiles
                        .iter()
                        .copied()
                        .filter(|c| source.supports_zoom(c.z))
                        .collect();
                    report.requested += visible.len();
                    layers[provider].outstanding += visible.len();
                    for coord in visible {
                        queue.push(self.fetch(provider, source.url_for(coord)));
                    }
                }
                TileEffect::RefetchTile { url, .. } => {
                    queue.push(self.fetch(origin, url));
                }
                TileEffect::ScheduleSwitch { provider, after } => {
                    queue.push(timer(after, Event::Switch { provider }));
                }
                TileEffect::ScheduleWatchdog { provider, after } => {
                    queue.push(timer(after, Event::Watchdog { provider }));
                }
                TileEffect::ShowOverlay { dismiss_after } => {
                    log::debug!("Loading overlay shown for up to {:?}", dismiss_after);
                    queue.push(timer(dismiss_after, Event::OverlayExpired));
                }
                TileEffect::DismissOverlay => log::debug!("Loading overlay dismissed"),
                TileEffect::ShowErrorPanel { message } => {
                    log::error!("{}", message);
                    report.error_panel = Some(message);
                }
            }
        }
    }

    fn fetch(&self, provider: usize, url: String) -> BoxFuture<'static, Event> {
        let fetcher = if url.contains("://") {
            Arc::clone(&self.remote)
        } else {
            Arc::clone(&self.local)
        };
        async move {
            let result = fetcher.fetch(&url).await.map(|bytes| bytes.len());
            Event::Tile {
                provider,
                url,
                result,
            }
        }
        .boxed()
    }
}

fn timer(after: Duration, event: Event) -> BoxFuture<'static, Event> {
    async move {
        tokio::time::sleep(after).await;
        event
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LatLng, TileConfig, TileRange};
    use tempfile::TempDir;

    /// Remote fetcher answering per host.
    struct ScriptedFetcher {
        failing: Vec<&'static str>,
        hanging: Vec<&'static str>,
    }

    #[async_trait]
    impl TileFetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            if self.hanging.iter().any(|h| url.contains(h)) {
                futures::future::pending::<()>().await;
            }
            if self.failing.iter().any(|h| url.contains(h)) {
                return Err(AppError::tile(url, "HTTP 503"));
            }
            Ok(vec![0x89, b'P', b'N', b'G'])
        }
    }

    fn viewport() -> Vec<TileCoord> {
        TileRange::viewport(LatLng::new(10.7740, 106.6900), 13, 1024, 768)
            .iter()
            .collect()
    }

    fn loader(remote: ScriptedFetcher) -> (TileLoader, TempDir) {
        let tmp = TempDir::new().unwrap();
        let loader = TileLoader::new(
            Arc::new(LocalTileFetcher::new(tmp.path())),
            Arc::new(remote),
        );
        (loader, tmp)
    }

    #[tokio::test(start_paused = true)]
    async fn test_chain_switches_after_error_threshold() {
        let (loader, _tmp) = loader(ScriptedFetcher {
            failing: vec!["openstreetmap.org"],
            hanging: vec![],
        });
        let strategy = TileStrategy::from_config(&TileConfig::default()).unwrap();
        let report = loader.run(strategy, &viewport()).await;

        assert_eq!(report.state, ResolverState::Succeeded(1));
        assert_eq!(report.provider.as_deref(), Some("carto-voyager"));
        assert_eq!(report.switches, 1);
        assert_eq!(report.loaded, 20);
        // Switch happens after the 1 s delay, well before the watchdog
        assert!(report.elapsed_ms >= 1000 && report.elapsed_ms < 10_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chain_watchdog_switches_silent_provider() {
        let (loader, _tmp) = loader(ScriptedFetcher {
            failing: vec![],
            hanging: vec!["tile.openstreetmap.org"],
        });
        let strategy = TileStrategy::from_config(&TileConfig::default()).unwrap();
        let report = loader.run(strategy, &viewport()).await;

        assert_eq!(report.state, ResolverState::Succeeded(1));
        assert!(report.elapsed_ms >= 10_000);
        assert!(report.error_panel.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_chain_all_failed_shows_panel() {
        let (loader, _tmp) = loader(ScriptedFetcher {
            failing: vec!["openstreetmap", "cartocdn"],
            hanging: vec![],
        });
        let strategy = TileStrategy::from_config(&TileConfig::default()).unwrap();
        let report = loader.run(strategy, &viewport()).await;

        assert_eq!(report.state, ResolverState::AllFailed);
        assert_eq!(report.switches, 2);
        assert!(report.error_panel.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_first_falls_back_per_tile() {
        let (loader, tmp) = loader(ScriptedFetcher {
            failing: vec![],
            hanging: vec![],
        });
        let tiles = viewport();
        // Bundle holds the first 5 tiles only
        for coord in tiles.iter().take(5) {
            let path = tmp.path().join("tiles").join(coord.path());
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, b"png").unwrap();
        }

        let mut config = TileConfig::default();
        config.strategy = TileStrategyKind::LocalFirst;
        let strategy = TileStrategy::from_config(&config).unwrap();
        let report = loader.run(strategy, &tiles).await;

        assert_eq!(report.state, ResolverState::Succeeded(0));
        assert_eq!(report.fallbacks, 15);
        assert_eq!(report.loaded, 20);
        assert_eq!(report.switches, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_first_failing_mirror_settles() {
        let (loader, _tmp) = loader(ScriptedFetcher {
            failing: vec!["mirror.example.com"],
            hanging: vec![],
        });
        let tiles = viewport();
        let mut config = TileConfig::default();
        config.strategy = TileStrategyKind::LocalFirst;
        config.local.fallback_url = "https://mirror.example.com/tiles/{z}/{x}/{y}.png".to_string();
        let strategy = TileStrategy::from_config(&config).unwrap();
        let report = loader.run(strategy, &tiles).await;

        assert_eq!(report.fallbacks as usize, tiles.len());
        assert_eq!(report.failed as usize, tiles.len());
        assert_eq!(report.loaded, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_first_skips_zoom_outside_bundle() {
        let (loader, _tmp) = loader(ScriptedFetcher {
            failing: vec![],
            hanging: vec![],
        });
        let tiles: Vec<TileCoord> = TileRange::viewport(LatLng::new(10.7740, 106.6900), 17, 512, 512)
            .iter()
            .collect();
        let mut config = TileConfig::default();
        config.strategy = TileStrategyKind::LocalFirst;
        let strategy = TileStrategy::from_config(&config).unwrap();
        let report = loader.run(strategy, &tiles).await;

        assert_eq!(report.requested, 0);
        assert_eq!(report.state, ResolverState::Loading(0));
    }
}
