// src/models/mod.rs

//! Domain models for the itinerary renderer.
//!
//! Geographic primitives, the trip data set, tile provider descriptors and
//! the application configuration.

mod config;
mod geo;
mod tile;
mod trip;

// Re-export all public types
pub use config::{
    ClockConfig, Config, DownloadConfig, EngagementConfig, LocalTileConfig, MapConfig,
    PathsConfig, RegionConfig, TileConfig, TileStrategyKind, ZoneConfig,
};
pub use geo::{LatLng, LatLngBounds, TILE_SIZE, TileCoord, TileRange};
pub use tile::{TileProvider, expand_template};
pub use trip::{
    Activity, Airport, Attraction, DataVersion, Direction, EmergencyContact, ExchangeRate, Flight,
    Flights, Hotel, ItineraryDay, Meals, RatePair, Tip, TipCategory, TripData, TripInfo,
};

/// Entity kinds the map can focus on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceKind {
    Airport,
    Hotel,
    Attraction,
}

impl PlaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaceKind::Airport => "airport",
            PlaceKind::Hotel => "hotel",
            PlaceKind::Attraction => "attraction",
        }
    }
}

impl std::fmt::Display for PlaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
