// src/services/map/mod.rs

//! Map renderer.
//!
//! [`MapContext`] owns the markers, route layers and selected day for one
//! page session and drives a [`MapSurface`].

mod markers;
mod surface;

use std::time::Duration;

use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{LatLng, LatLngBounds, MapConfig, PlaceKind, TileConfig, TripData};

pub use markers::{
    LocationGroup, LocationOption, Marker, MarkerBadge, Popup, RoutePolyline, build_markers,
    location_options, marker_id, parse_location, route_polylines,
};
pub use surface::{HeadlessMap, LayerId, MapSurface, PolylineStyle, Viewport};

/// Serializable snapshot for a browser front-end.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub viewport: Viewport,
    pub markers: Vec<Marker>,
    pub routes: Vec<RoutePolyline>,
    pub routes_visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_day: Option<u32>,
    pub fit_padding: u32,
    pub fly_duration_ms: u64,
    pub tiles: TileConfig,
}

/// Map state for one page session.
pub struct MapContext<'a, S: MapSurface> {
    trip: &'a TripData,
    config: MapConfig,
    surface: S,
    markers: Vec<Marker>,
    route_layers: Vec<LayerId>,
    routes_visible: bool,
    selected_day: Option<u32>,
}

impl<'a, S: MapSurface> MapContext<'a, S> {
    /// Place every marker and set the initial view.
    pub async fn new(trip: &'a TripData, config: MapConfig, mut surface: S) -> Result<Self> {
        let markers = build_markers(trip, &config);
        if let Some(bad) = markers
            .iter()
            .find(|m| !m.position.lat.is_finite() || !m.position.lng.is_finite())
        {
            return Err(AppError::map(format!("marker {} has no valid position", bad.id)));
        }
        surface.set_view(config.center, config.zoom).await?;
        log::debug!("Map initialised with {} markers", markers.len());

        Ok(Self {
            trip,
            config,
            surface,
            markers,
            route_layers: Vec::new(),
            routes_visible: false,
            selected_day: None,
        })
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn marker(&self, id: &str) -> Option<&Marker> {
        self.markers.iter().find(|m| m.id == id)
    }

    pub fn selected_day(&self) -> Option<u32> {
        self.selected_day
    }

    pub fn routes_visible(&self) -> bool {
        self.routes_visible
    }

    pub fn viewport(&self) -> Viewport {
        self.surface.viewport()
    }

    /// Fly to an entity and open its popup once the animation completes.
    ///
    /// Returns `false` when the id is unknown.
    pub async fn focus_on(&mut self, kind: PlaceKind, id: &str) -> Result<bool> {
        let target = match kind {
            PlaceKind::Airport => self
                .trip
                .airport(id)
                .map(|a| (a.position(), self.config.airport_zoom)),
            PlaceKind::Hotel => self
                .trip
                .hotel(id)
                .map(|h| (h.position(), self.config.hotel_zoom)),
            PlaceKind::Attraction => self
                .trip
                .attraction(id)
                .map(|a| (a.position(), self.config.attraction_zoom)),
        };
        let Some((position, zoom)) = target else {
            log::warn!("Location not found: {} {}", kind, id);
            return Ok(false);
        };

        let duration = Duration::from_millis(self.config.fly_duration_ms);
        self.surface.fly_to(position, zoom, duration).await?;
        self.surface.open_popup(&marker_id(kind, id)).await?;
        log::debug!("Focused {} {} at {}", kind, id, position);
        Ok(true)
    }

    /// Focus a location selector value such as `attraction-attr-3`.
    pub async fn focus_location(&mut self, value: &str) -> Result<bool> {
        match parse_location(value) {
            Some((kind, id)) => self.focus_on(kind, id).await,
            None => {
                log::warn!("Unrecognised location value '{}'", value);
                Ok(false)
            }
        }
    }

    /// Fit the viewport to a day's attractions plus the primary hotel.
    ///
    /// Unknown days and days without attractions leave the viewport as is.
    pub async fn show_route(&mut self, day: u32) -> Result<bool> {
        let Some(itinerary) = self.trip.day(day) else {
            log::debug!("No itinerary for day {}", day);
            return Ok(false);
        };
        self.selected_day = Some(day);

        let mut points: Vec<LatLng> = self
            .trip
            .resolve_attractions(itinerary)
            .iter()
            .map(|a| a.position())
            .collect();
        if points.is_empty() {
            return Ok(false);
        }
        if let Some(hotel) = self.trip.primary_hotel() {
            points.push(hotel.position());
        }

        let Some(bounds) = LatLngBounds::from_points(points) else {
            return Ok(false);
        };
        self.surface.fit_bounds(bounds, self.config.padding).await?;
        Ok(true)
    }

    /// Draw or remove the dashed per-day routes. Returns how many are drawn.
    pub async fn toggle_routes(&mut self) -> Result<usize> {
        self.routes_visible = !self.routes_visible;

        for id in std::mem::take(&mut self.route_layers) {
            self.surface.remove_layer(id).await?;
        }

        if self.routes_visible {
            for route in route_polylines(self.trip, &self.config) {
                let id = self.surface.add_polyline(&route.points, &route.style).await?;
                self.route_layers.push(id);
            }
        }
        Ok(self.route_layers.len())
    }

    /// Fit every hotel and attraction and clear the selected day.
    pub async fn fit_all(&mut self) -> Result<()> {
        self.selected_day = None;
        let points = self
            .trip
            .hotels
            .iter()
            .map(|h| h.position())
            .chain(self.trip.attractions.iter().map(|a| a.position()));
        if let Some(bounds) = LatLngBounds::from_points(points) {
            self.surface.fit_bounds(bounds, self.config.padding).await?;
        }
        Ok(())
    }

    pub fn scene(&self, tiles: &TileConfig) -> Scene {
        Scene {
            viewport: self.surface.viewport(),
            markers: self.markers.clone(),
            routes: route_polylines(self.trip, &self.config),
            routes_visible: self.routes_visible,
            selected_day: self.selected_day,
            fit_padding: self.config.padding,
            fly_duration_ms: self.config.fly_duration_ms,
            tiles: tiles.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn context(trip: &TripData) -> MapContext<'_, HeadlessMap> {
        let config = MapConfig::default();
        let surface = HeadlessMap::new(&config);
        MapContext::new(trip, config, surface).await.unwrap()
    }

    #[tokio::test]
    async fn test_initial_view() {
        let trip = TripData::builtin().unwrap();
        let map = context(&trip).await;
        let viewport = map.viewport();
        assert_eq!(viewport.center, LatLng::new(10.7740, 106.6900));
        assert_eq!(viewport.zoom, 13.0);
    }

    #[tokio::test]
    async fn test_show_route_on_empty_day_keeps_viewport() {
        let trip = TripData::builtin().unwrap();
        let mut map = context(&trip).await;
        let before = map.viewport();

        assert!(!map.show_route(4).await.unwrap());
        assert_eq!(map.viewport(), before);
        assert!(!map.show_route(42).await.unwrap());
        assert_eq!(map.viewport(), before);
    }

    #[tokio::test]
    async fn test_show_route_includes_hotel() {
        let trip = TripData::builtin().unwrap();
        let mut map = context(&trip).await;

        assert!(map.show_route(2).await.unwrap());
        assert_eq!(map.selected_day(), Some(2));

        let viewport = map.viewport();
        let mut bounds = LatLngBounds::from_points(
            trip.attractions_for_day(2).iter().map(|a| a.position()),
        )
        .unwrap();
        bounds.extend(trip.primary_hotel().unwrap().position());
        assert!(bounds.contains(viewport.center));
        assert!(viewport.zoom > 0.0 && viewport.zoom <= 19.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_focus_opens_popup_after_fly_to() {
        let trip = TripData::builtin().unwrap();
        let mut map = context(&trip).await;

        assert!(map.focus_location("airport-airport-sgn").await.unwrap());
        let sgn = trip.airport("airport-sgn").unwrap();
        assert_eq!(map.viewport().center, sgn.position());
        assert_eq!(map.viewport().zoom, 13.0);
        assert_eq!(map.surface().opened_popups(), ["airport-airport-sgn"]);

        assert!(map.focus_on(PlaceKind::Attraction, "attr-5").await.unwrap());
        assert_eq!(map.viewport().zoom, 16.0);
    }

    #[tokio::test]
    async fn test_focus_unknown_is_ignored() {
        let trip = TripData::builtin().unwrap();
        let mut map = context(&trip).await;
        let before = map.viewport();

        assert!(!map.focus_on(PlaceKind::Hotel, "hotel-99").await.unwrap());
        assert!(!map.focus_location("bogus").await.unwrap());
        assert_eq!(map.viewport(), before);
        assert!(map.surface().opened_popups().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_routes_adds_and_removes() {
        let trip = TripData::builtin().unwrap();
        let mut map = context(&trip).await;

        assert_eq!(map.toggle_routes().await.unwrap(), 3);
        assert_eq!(map.surface().layer_count(), 3);
        assert!(map.routes_visible());

        assert_eq!(map.toggle_routes().await.unwrap(), 0);
        assert_eq!(map.surface().layer_count(), 0);
    }

    #[tokio::test]
    async fn test_fit_all_clears_selection() {
        let trip = TripData::builtin().unwrap();
        let mut map = context(&trip).await;
        map.show_route(1).await.unwrap();
        map.fit_all().await.unwrap();
        assert_eq!(map.selected_day(), None);

        let scene = map.scene(&TileConfig::default());
        assert_eq!(scene.markers.len(), map.markers().len());
        assert_eq!(scene.routes.len(), 3);
        let json = serde_json::to_value(&scene).unwrap();
        assert!(json["tiles"]["providers"].is_array());
    }

    #[tokio::test]
    async fn test_invalid_position_fails_initialisation() {
        let mut trip = TripData::builtin().unwrap();
        trip.attractions[0].lat = f64::NAN;
        let config = MapConfig::default();
        let surface = HeadlessMap::new(&config);
        let err = MapContext::new(&trip, config, surface).await.err().unwrap();
        assert!(matches!(err, AppError::Map(_)));
    }
}
