//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::geo::{LatLng, LatLngBounds};
use crate::models::tile::TileProvider;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Basemap loading strategy and providers
    #[serde(default)]
    pub tiles: TileConfig,

    /// Offline tile bundle downloader
    #[serde(default)]
    pub download: DownloadConfig,

    /// Plausible region for data-quality checks
    #[serde(default)]
    pub region: RegionConfig,

    /// Dual-timezone clock
    #[serde(default)]
    pub clock: ClockConfig,

    /// View/like counters
    #[serde(default)]
    pub engagement: EngagementConfig,

    /// Map viewport and marker styling
    #[serde(default)]
    pub map: MapConfig,

    /// File locations, relative to the storage directory
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.tiles.strategy == TileStrategyKind::RemoteChain && self.tiles.providers.is_empty()
        {
            return Err(AppError::validation(
                "tiles.providers must not be empty for the remote-chain strategy",
            ));
        }
        for provider in &self.tiles.providers {
            provider.validate()?;
        }
        self.tiles.local.provider().validate()?;
        if self.tiles.error_threshold == 0 {
            return Err(AppError::validation("tiles.error_threshold must be > 0"));
        }
        if self.tiles.watchdog_secs == 0 {
            return Err(AppError::validation("tiles.watchdog_secs must be > 0"));
        }
        if self.download.user_agent.trim().is_empty() {
            return Err(AppError::validation("download.user_agent is empty"));
        }
        if self.download.timeout_secs == 0 {
            return Err(AppError::validation("download.timeout_secs must be > 0"));
        }
        if self.download.max_concurrent == 0 {
            return Err(AppError::validation("download.max_concurrent must be > 0"));
        }
        if self.download.min_zoom > self.download.max_zoom {
            return Err(AppError::validation(
                "download.min_zoom must not exceed download.max_zoom",
            ));
        }
        for (name, bounds) in [
            ("download.bounds", &self.download.bounds),
            ("region.bounds", &self.region.bounds),
        ] {
            if bounds.south > bounds.north || bounds.west > bounds.east {
                return Err(AppError::validation(format!("{name} is inverted")));
            }
        }
        self.clock.origin.timezone()?;
        self.clock.destination.timezone()?;
        if self.map.width == 0 || self.map.height == 0 {
            return Err(AppError::validation("map.width and map.height must be > 0"));
        }
        if self.engagement.views_key == self.engagement.likes_key {
            return Err(AppError::validation(
                "engagement.views_key and engagement.likes_key must differ",
            ));
        }
        Ok(())
    }
}

/// Which fallback strategy the basemap uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TileStrategyKind {
    /// Whole-provider fallback across remote CDNs
    RemoteChain,
    /// Bundled tiles with per-tile remote fallback
    LocalFirst,
}

/// Basemap loading settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileConfig {
    #[serde(default = "defaults::strategy")]
    pub strategy: TileStrategyKind,

    /// Remote providers in priority order
    #[serde(default = "defaults::providers")]
    pub providers: Vec<TileProvider>,

    /// Offline bundle settings
    #[serde(default)]
    pub local: LocalTileConfig,

    /// Tile errors tolerated before switching providers
    #[serde(default = "defaults::error_threshold")]
    pub error_threshold: u32,

    /// Delay before a threshold-triggered switch
    #[serde(default = "defaults::switch_delay")]
    pub switch_delay_ms: u64,

    /// Seconds after activation before the zero-tiles check
    #[serde(default = "defaults::watchdog")]
    pub watchdog_secs: u64,

    /// Loading overlay lifetime for the remote chain
    #[serde(default = "defaults::overlay_remote")]
    pub overlay_remote_secs: u64,

    /// Loading overlay lifetime for the local bundle
    #[serde(default = "defaults::overlay_local")]
    pub overlay_local_secs: u64,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            strategy: defaults::strategy(),
            providers: defaults::providers(),
            local: LocalTileConfig::default(),
            error_threshold: defaults::error_threshold(),
            switch_delay_ms: defaults::switch_delay(),
            watchdog_secs: defaults::watchdog(),
            overlay_remote_secs: defaults::overlay_remote(),
            overlay_local_secs: defaults::overlay_local(),
        }
    }
}

/// Offline tile bundle with a single remote fallback endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalTileConfig {
    #[serde(default = "defaults::local_template")]
    pub url_template: String,

    #[serde(default = "defaults::local_min_zoom")]
    pub min_zoom: u8,

    #[serde(default = "defaults::local_max_zoom")]
    pub max_zoom: u8,

    /// Remote endpoint used for tiles missing from the bundle
    #[serde(default = "defaults::fallback_url")]
    pub fallback_url: String,

    /// Individual fallbacks logged before going quiet
    #[serde(default = "defaults::fallback_log_limit")]
    pub fallback_log_limit: u32,

    /// Fallback count above which a warning is emitted
    #[serde(default = "defaults::fallback_warn_threshold")]
    pub fallback_warn_threshold: u32,

    #[serde(default = "defaults::attribution")]
    pub attribution: String,
}

impl Default for LocalTileConfig {
    fn default() -> Self {
        Self {
            url_template: defaults::local_template(),
            min_zoom: defaults::local_min_zoom(),
            max_zoom: defaults::local_max_zoom(),
            fallback_url: defaults::fallback_url(),
            fallback_log_limit: defaults::fallback_log_limit(),
            fallback_warn_threshold: defaults::fallback_warn_threshold(),
            attribution: defaults::attribution(),
        }
    }
}

impl LocalTileConfig {
    /// The bundle as a provider descriptor.
    pub fn provider(&self) -> TileProvider {
        TileProvider {
            name: "local".to_string(),
            url_template: self.url_template.clone(),
            attribution: self.attribution.clone(),
            min_zoom: self.min_zoom,
            max_zoom: self.max_zoom,
            subdomains: Vec::new(),
        }
    }
}

/// Bulk tile download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// User-Agent header for tile requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent requests
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Delay between completed requests in milliseconds
    #[serde(default)]
    pub request_delay_ms: u64,

    /// Source template for downloaded tiles
    #[serde(default = "defaults::fallback_url")]
    pub url_template: String,

    /// Area to cover: attractions plus a small buffer
    #[serde(default = "defaults::download_bounds")]
    pub bounds: LatLngBounds,

    #[serde(default = "defaults::local_min_zoom")]
    pub min_zoom: u8,

    #[serde(default = "defaults::local_max_zoom")]
    pub max_zoom: u8,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_concurrent: defaults::max_concurrent(),
            request_delay_ms: 0,
            url_template: defaults::fallback_url(),
            bounds: defaults::download_bounds(),
            min_zoom: defaults::local_min_zoom(),
            max_zoom: defaults::local_max_zoom(),
        }
    }
}

/// Regional bounding box for coordinate plausibility checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    #[serde(default = "defaults::region_bounds")]
    pub bounds: LatLngBounds,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            bounds: defaults::region_bounds(),
        }
    }
}

/// A labelled IANA timezone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub label: String,
    pub zone: String,
}

impl ZoneConfig {
    /// Resolve the IANA name.
    pub fn timezone(&self) -> Result<chrono_tz::Tz> {
        self.zone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| AppError::Timezone(self.zone.clone()))
    }
}

/// Dual-timezone clock settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    #[serde(default = "defaults::origin_zone")]
    pub origin: ZoneConfig,

    #[serde(default = "defaults::destination_zone")]
    pub destination: ZoneConfig,

    #[serde(default = "defaults::tick")]
    pub tick_ms: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            origin: defaults::origin_zone(),
            destination: defaults::destination_zone(),
            tick_ms: defaults::tick(),
        }
    }
}

/// View/like counter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementConfig {
    #[serde(default = "defaults::views_key")]
    pub views_key: String,

    #[serde(default = "defaults::likes_key")]
    pub likes_key: String,

    /// Seed value for a profile that has never been counted
    #[serde(default = "defaults::baseline_views")]
    pub baseline_views: u64,

    #[serde(default = "defaults::baseline_likes")]
    pub baseline_likes: u64,

    /// Stars in the like animation
    #[serde(default = "defaults::particles")]
    pub particles: usize,

    #[serde(default = "defaults::stagger")]
    pub stagger_ms: u64,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            views_key: defaults::views_key(),
            likes_key: defaults::likes_key(),
            baseline_views: defaults::baseline_views(),
            baseline_likes: defaults::baseline_likes(),
            particles: defaults::particles(),
            stagger_ms: defaults::stagger(),
        }
    }
}

/// Map viewport and marker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    /// Viewport size in pixels
    #[serde(default = "defaults::map_width")]
    pub width: u32,

    #[serde(default = "defaults::map_height")]
    pub height: u32,

    /// Padding used when fitting bounds
    #[serde(default = "defaults::padding")]
    pub padding: u32,

    #[serde(default = "defaults::initial_center")]
    pub center: LatLng,

    #[serde(default = "defaults::initial_zoom")]
    pub zoom: f64,

    #[serde(default = "defaults::max_map_zoom")]
    pub max_zoom: f64,

    /// Fly-to animation length
    #[serde(default = "defaults::fly_duration")]
    pub fly_duration_ms: u64,

    #[serde(default = "defaults::airport_zoom")]
    pub airport_zoom: f64,

    #[serde(default = "defaults::place_zoom")]
    pub hotel_zoom: f64,

    #[serde(default = "defaults::place_zoom")]
    pub attraction_zoom: f64,

    /// Colour per trip day, index 0 is day 1
    #[serde(default = "defaults::day_colors")]
    pub day_colors: Vec<String>,

    /// Colour for days beyond `day_colors`
    #[serde(default = "defaults::fallback_color")]
    pub fallback_color: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: defaults::map_width(),
            height: defaults::map_height(),
            padding: defaults::padding(),
            center: defaults::initial_center(),
            zoom: defaults::initial_zoom(),
            max_zoom: defaults::max_map_zoom(),
            fly_duration_ms: defaults::fly_duration(),
            airport_zoom: defaults::airport_zoom(),
            hotel_zoom: defaults::place_zoom(),
            attraction_zoom: defaults::place_zoom(),
            day_colors: defaults::day_colors(),
            fallback_color: defaults::fallback_color(),
        }
    }
}

impl MapConfig {
    /// Colour for a 1-based trip day.
    pub fn day_color(&self, day: u32) -> &str {
        day.checked_sub(1)
            .and_then(|i| self.day_colors.get(i as usize))
            .map(String::as_str)
            .unwrap_or(&self.fallback_color)
    }
}

/// File locations. Relative paths resolve against the storage directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Trip data file; the embedded data set is used when unset
    #[serde(default)]
    pub data_file: Option<String>,

    /// Host page with mount points
    #[serde(default = "defaults::template")]
    pub template: String,

    #[serde(default = "defaults::output_dir")]
    pub output_dir: String,

    /// Offline tile bundle root
    #[serde(default = "defaults::tiles_dir")]
    pub tiles_dir: String,

    /// Counter store file
    #[serde(default = "defaults::counters_file")]
    pub counters_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_file: None,
            template: defaults::template(),
            output_dir: defaults::output_dir(),
            tiles_dir: defaults::tiles_dir(),
            counters_file: defaults::counters_file(),
        }
    }
}

mod defaults {
    use super::{LatLng, LatLngBounds, TileProvider, TileStrategyKind, ZoneConfig};

    const OSM_ATTRIBUTION: &str =
        "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors";

    // Tile defaults
    pub fn strategy() -> TileStrategyKind {
        TileStrategyKind::RemoteChain
    }
    pub fn providers() -> Vec<TileProvider> {
        vec![
            TileProvider {
                name: "osm".to_string(),
                url_template: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
                attribution: OSM_ATTRIBUTION.to_string(),
                min_zoom: 0,
                max_zoom: 19,
                subdomains: vec!["a".into(), "b".into(), "c".into()],
            },
            TileProvider {
                name: "carto-voyager".to_string(),
                url_template: "https://{s}.basemaps.cartocdn.com/rastertiles/voyager/{z}/{x}/{y}.png"
                    .to_string(),
                attribution: format!("{OSM_ATTRIBUTION} &copy; CARTO"),
                min_zoom: 0,
                max_zoom: 19,
                subdomains: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            },
            TileProvider {
                name: "osm-fr".to_string(),
                url_template: "https://{s}.tile.openstreetmap.fr/osmfr/{z}/{x}/{y}.png".to_string(),
                attribution: OSM_ATTRIBUTION.to_string(),
                min_zoom: 0,
                max_zoom: 19,
                subdomains: vec!["a".into(), "b".into(), "c".into()],
            },
        ]
    }
    pub fn error_threshold() -> u32 {
        5
    }
    pub fn switch_delay() -> u64 {
        1000
    }
    pub fn watchdog() -> u64 {
        10
    }
    pub fn overlay_remote() -> u64 {
        15
    }
    pub fn overlay_local() -> u64 {
        3
    }
    pub fn local_template() -> String {
        "tiles/{z}/{x}/{y}.png".into()
    }
    pub fn local_min_zoom() -> u8 {
        10
    }
    pub fn local_max_zoom() -> u8 {
        15
    }
    pub fn fallback_url() -> String {
        "https://tile.openstreetmap.org/{z}/{x}/{y}.png".into()
    }
    pub fn fallback_log_limit() -> u32 {
        5
    }
    pub fn fallback_warn_threshold() -> u32 {
        50
    }
    pub fn attribution() -> String {
        OSM_ATTRIBUTION.into()
    }

    // Download defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; tourmap/0.1)".into()
    }
    pub fn timeout() -> u64 {
        10
    }
    pub fn max_concurrent() -> usize {
        5
    }
    pub fn download_bounds() -> LatLngBounds {
        LatLngBounds::new(10.33, 106.36, 10.79, 106.71)
    }

    // Region defaults
    pub fn region_bounds() -> LatLngBounds {
        LatLngBounds::new(10.0, 106.0, 11.5, 107.5)
    }

    // Clock defaults
    pub fn origin_zone() -> ZoneConfig {
        ZoneConfig {
            label: "上海".into(),
            zone: "Asia/Shanghai".into(),
        }
    }
    pub fn destination_zone() -> ZoneConfig {
        ZoneConfig {
            label: "胡志明市".into(),
            zone: "Asia/Ho_Chi_Minh".into(),
        }
    }
    pub fn tick() -> u64 {
        1000
    }

    // Engagement defaults
    pub fn views_key() -> String {
        "tourmap.views".into()
    }
    pub fn likes_key() -> String {
        "tourmap.likes".into()
    }
    pub fn baseline_views() -> u64 {
        1288
    }
    pub fn baseline_likes() -> u64 {
        66
    }
    pub fn particles() -> usize {
        12
    }
    pub fn stagger() -> u64 {
        50
    }

    // Map defaults
    pub fn map_width() -> u32 {
        1024
    }
    pub fn map_height() -> u32 {
        768
    }
    pub fn padding() -> u32 {
        50
    }
    pub fn initial_center() -> LatLng {
        LatLng::new(10.7740, 106.6900)
    }
    pub fn initial_zoom() -> f64 {
        13.0
    }
    pub fn max_map_zoom() -> f64 {
        19.0
    }
    pub fn fly_duration() -> u64 {
        1500
    }
    pub fn airport_zoom() -> f64 {
        13.0
    }
    pub fn place_zoom() -> f64 {
        16.0
    }
    pub fn day_colors() -> Vec<String> {
        vec![
            "#FF6B6B".into(),
            "#4ECDC4".into(),
            "#95E1D3".into(),
            "#DDA0DD".into(),
        ]
    }
    pub fn fallback_color() -> String {
        "#666".into()
    }

    // Path defaults
    pub fn template() -> String {
        "host.html".into()
    }
    pub fn output_dir() -> String {
        "dist".into()
    }
    pub fn tiles_dir() -> String {
        "tiles".into()
    }
    pub fn counters_file() -> String {
        "counters.json".into()
    }
}
