//! Tile-level fallback from the offline bundle to a remote endpoint.

use std::collections::HashSet;
use std::time::Duration;

use regex::Regex;

use crate::error::Result;
use crate::models::{TileConfig, TileCoord, TileProvider, expand_template};
use crate::services::tiles::{ResolverState, TileEffect};

/// Offline bundle first, one remote endpoint per missing tile.
///
/// The layer never switches; each failing bundle tile is re-requested from
/// the fallback template with the same coordinate, at most once.
#[derive(Debug, Clone)]
pub struct LocalFirst {
    providers: Vec<TileProvider>,
    fallback_url: String,
    pattern: Regex,
    log_limit: u32,
    warn_threshold: u32,
    overlay: Duration,
    overlay_visible: bool,
    state: ResolverState,
    fallbacks: u32,
    refetched: HashSet<TileCoord>,
}

impl LocalFirst {
    pub fn from_config(config: &TileConfig) -> Result<Self> {
        let local = &config.local;
        let provider = local.provider();
        Ok(Self {
            pattern: coordinate_pattern(&provider.url_template)?,
            providers: vec![provider],
            fallback_url: local.fallback_url.clone(),
            log_limit: local.fallback_log_limit,
            warn_threshold: local.fallback_warn_threshold,
            overlay: Duration::from_secs(config.overlay_local_secs),
            overlay_visible: false,
            state: ResolverState::Idle,
            fallbacks: 0,
            refetched: HashSet::new(),
        })
    }

    pub fn providers(&self) -> &[TileProvider] {
        &self.providers
    }

    pub fn state(&self) -> ResolverState {
        self.state
    }

    pub fn fallback_count(&self) -> u32 {
        self.fallbacks
    }

    /// Pull `z/x/y` out of a bundle tile URL.
    pub fn parse_coord(&self, url: &str) -> Option<TileCoord> {
        let caps = self.pattern.captures(url)?;
        Some(TileCoord::new(
            caps.name("z")?.as_str().parse().ok()?,
            caps.name("x")?.as_str().parse().ok()?,
            caps.name("y")?.as_str().parse().ok()?,
        ))
    }

    pub fn start(&mut self) -> Vec<TileEffect> {
        if self.state != ResolverState::Idle {
            return Vec::new();
        }
        log::info!("Loading tiles from the offline bundle");
        self.state = ResolverState::Loading(0);
        self.overlay_visible = true;
        vec![
            TileEffect::ShowOverlay {
                dismiss_after: self.overlay,
            },
            TileEffect::ActivateLayer { provider: 0 },
        ]
    }

    pub fn tile_loaded(&mut self, _provider: usize) -> Vec<TileEffect> {
        if self.overlay_visible {
            self.overlay_visible = false;
            return vec![TileEffect::DismissOverlay];
        }
        Vec::new()
    }

    pub fn tile_error(&mut self, _provider: usize, tile_url: &str) -> Vec<TileEffect> {
        let Some(coord) = self.parse_coord(tile_url) else {
            log::debug!("Tile {} failed and is not a bundle tile", tile_url);
            return Vec::new();
        };
        if !self.refetched.insert(coord) {
            log::debug!("Fallback for tile {} failed as well", coord);
            return Vec::new();
        }
        self.fallbacks += 1;
        if self.fallbacks <= self.log_limit {
            log::info!("Bundle tile {} missing, using remote fallback", coord);
        }
        vec![TileEffect::RefetchTile {
            coord,
            url: expand_template(&self.fallback_url, "", coord),
        }]
    }

    pub fn all_loaded(&mut self, provider: usize) -> Vec<TileEffect> {
        if self.state != ResolverState::Loading(provider) {
            return Vec::new();
        }
        self.state = ResolverState::Succeeded(provider);
        if self.fallbacks == 0 {
            log::info!("Tiles loaded, fully offline");
        } else {
            log::info!("Tiles loaded, {} from the remote fallback", self.fallbacks);
            if self.fallbacks > self.warn_threshold {
                log::warn!(
                    "{} tiles fell back to the network; run `tiles download --missing-only`",
                    self.fallbacks
                );
            }
        }
        Vec::new()
    }
}

/// Regex matching the coordinate segments of an expanded template.
fn coordinate_pattern(template: &str) -> Result<Regex> {
    let pattern = regex::escape(template)
        .replace(r"\{z\}", r"(?P<z>\d+)")
        .replace(r"\{x\}", r"(?P<x>\d+)")
        .replace(r"\{y\}", r"(?P<y>\d+)");
    Ok(Regex::new(&pattern)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TileStrategyKind;

    fn local_first() -> LocalFirst {
        let mut config = TileConfig::default();
        config.strategy = TileStrategyKind::LocalFirst;
        LocalFirst::from_config(&config).unwrap()
    }

    #[test]
    fn test_default_pattern_matches_bundle_paths() {
        let pattern = coordinate_pattern("tiles/{z}/{x}/{y}.png").unwrap();
        assert_eq!(pattern.as_str(), r"tiles/(?P<z>\d+)/(?P<x>\d+)/(?P<y>\d+)\.png");

        let resolver = local_first();
        assert_eq!(
            resolver.parse_coord("/srv/storage/tiles/13/6523/3849.png"),
            Some(TileCoord::new(13, 6523, 3849))
        );
        assert_eq!(
            resolver.parse_coord("https://tile.openstreetmap.org/13/6523/3849.png"),
            None
        );
    }

    #[test]
    fn test_error_refetches_same_coordinate_remotely() {
        let mut resolver = local_first();
        resolver.start();
        let effects = resolver.tile_error(0, "tiles/15/26093/15398.png");
        assert_eq!(
            effects,
            vec![TileEffect::RefetchTile {
                coord: TileCoord::new(15, 26093, 15398),
                url: "https://tile.openstreetmap.org/15/26093/15398.png".to_string(),
            }]
        );
        assert_eq!(resolver.fallback_count(), 1);
    }

    #[test]
    fn test_failed_fallback_is_not_retried() {
        let mut resolver = local_first();
        resolver.start();
        let effects = resolver.tile_error(0, "https://tile.openstreetmap.org/15/26093/15398.png");
        assert!(effects.is_empty());
        assert_eq!(resolver.fallback_count(), 0);
    }

    #[test]
    fn test_fallback_matching_bundle_layout_refetches_once() {
        let mut config = TileConfig::default();
        config.strategy = TileStrategyKind::LocalFirst;
        config.local.fallback_url = "https://mirror.example.com/tiles/{z}/{x}/{y}.png".to_string();
        let mut resolver = LocalFirst::from_config(&config).unwrap();
        resolver.start();

        let effects = resolver.tile_error(0, "tiles/15/26093/15398.png");
        let TileEffect::RefetchTile { url, .. } = &effects[0] else {
            panic!("expected a refetch, got {effects:?}");
        };
        assert_eq!(url, "https://mirror.example.com/tiles/15/26093/15398.png");
        assert_eq!(resolver.parse_coord(url), Some(TileCoord::new(15, 26093, 15398)));

        assert!(resolver.tile_error(0, url).is_empty());
        assert_eq!(resolver.fallback_count(), 1);
    }

    #[test]
    fn test_first_tile_dismisses_overlay() {
        let mut resolver = local_first();
        let effects = resolver.start();
        assert_eq!(
            effects[0],
            TileEffect::ShowOverlay {
                dismiss_after: Duration::from_secs(3)
            }
        );
        assert_eq!(resolver.tile_loaded(0), vec![TileEffect::DismissOverlay]);
        assert!(resolver.tile_loaded(0).is_empty());
    }

    #[test]
    fn test_fallbacks_counted_through_completion() {
        let mut resolver = local_first();
        resolver.start();
        for y in 0..60 {
            resolver.tile_error(0, &format!("tiles/14/13046/{}.png", 7690 + y));
        }
        resolver.all_loaded(0);
        assert_eq!(resolver.fallback_count(), 60);
        assert_eq!(resolver.state(), ResolverState::Succeeded(0));
    }
}
