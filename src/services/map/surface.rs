//! Map surface abstraction and a headless web-mercator implementation.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{LatLng, LatLngBounds, MapConfig};

/// Handle of a vector layer added to a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LayerId(pub u64);

/// Stroke options for a polyline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolylineStyle {
    pub color: String,
    pub weight: u32,
    pub opacity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dash_array: Option<String>,
}

impl PolylineStyle {
    /// Dashed day-route stroke.
    pub fn route(color: impl Into<String>) -> Self {
        Self {
            color: color.into(),
            weight: 4,
            opacity: 0.7,
            dash_array: Some("10, 10".to_string()),
        }
    }
}

/// Visible map area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub center: LatLng,
    pub zoom: f64,
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "center {} zoom {} ({}x{})",
            self.center, self.zoom, self.width, self.height
        )
    }
}

/// Operations the map renderer needs from a slippy-map widget.
#[async_trait]
pub trait MapSurface: Send {
    async fn set_view(&mut self, center: LatLng, zoom: f64) -> Result<()>;

    /// Animate to `center`; resolves once the animation has finished.
    async fn fly_to(&mut self, center: LatLng, zoom: f64, duration: Duration) -> Result<()>;

    async fn fit_bounds(&mut self, bounds: LatLngBounds, padding: u32) -> Result<()>;

    async fn add_polyline(&mut self, points: &[LatLng], style: &PolylineStyle) -> Result<LayerId>;

    async fn remove_layer(&mut self, id: LayerId) -> Result<()>;

    async fn open_popup(&mut self, marker_id: &str) -> Result<()>;

    fn viewport(&self) -> Viewport;
}

/// In-memory surface computing viewports with web-mercator maths.
#[derive(Debug, Clone)]
pub struct HeadlessMap {
    viewport: Viewport,
    max_zoom: f64,
    layers: BTreeMap<LayerId, Vec<LatLng>>,
    next_layer: u64,
    popups: Vec<String>,
}

impl HeadlessMap {
    pub fn new(config: &MapConfig) -> Self {
        Self {
            viewport: Viewport {
                center: config.center,
                zoom: config.zoom,
                width: config.width,
                height: config.height,
            },
            max_zoom: config.max_zoom,
            layers: BTreeMap::new(),
            next_layer: 1,
            popups: Vec::new(),
        }
    }

    /// Popups opened so far, oldest first.
    pub fn opened_popups(&self) -> &[String] {
        &self.popups
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Zoom at which `bounds` fits inside the padded viewport.
    pub fn bounds_zoom(&self, bounds: &LatLngBounds, padding: u32) -> f64 {
        let (x0, y0) = bounds.north_west().project(0.0);
        let (x1, y1) = bounds.south_east().project(0.0);
        let (bw, bh) = ((x1 - x0).abs(), (y1 - y0).abs());
        if bw == 0.0 && bh == 0.0 {
            return self.max_zoom;
        }
        let pad = 2.0 * padding as f64;
        let avail_w = (self.viewport.width as f64 - pad).max(1.0);
        let avail_h = (self.viewport.height as f64 - pad).max(1.0);
        let scale = match (bw > 0.0, bh > 0.0) {
            (true, true) => (avail_w / bw).min(avail_h / bh),
            (true, false) => avail_w / bw,
            _ => avail_h / bh,
        };
        scale.log2().floor().clamp(0.0, self.max_zoom)
    }

    fn check(&self, center: LatLng, zoom: f64) -> Result<()> {
        if !center.lat.is_finite() || !center.lng.is_finite() || center.lat.abs() > 90.0 {
            return Err(AppError::map(format!("invalid map center {center}")));
        }
        if !(0.0..=self.max_zoom).contains(&zoom) {
            return Err(AppError::map(format!(
                "zoom {zoom} outside 0..={}",
                self.max_zoom
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl MapSurface for HeadlessMap {
    async fn set_view(&mut self, center: LatLng, zoom: f64) -> Result<()> {
        self.check(center, zoom)?;
        self.viewport.center = center;
        self.viewport.zoom = zoom;
        Ok(())
    }

    async fn fly_to(&mut self, center: LatLng, zoom: f64, duration: Duration) -> Result<()> {
        self.check(center, zoom)?;
        tokio::time::sleep(duration).await;
        self.viewport.center = center;
        self.viewport.zoom = zoom;
        Ok(())
    }

    async fn fit_bounds(&mut self, bounds: LatLngBounds, padding: u32) -> Result<()> {
        let zoom = self.bounds_zoom(&bounds, padding);
        // Centre on the projected midpoint, not the lat/lng average
        let (x0, y0) = bounds.north_west().project(0.0);
        let (x1, y1) = bounds.south_east().project(0.0);
        let center = LatLng::unproject((x0 + x1) / 2.0, (y0 + y1) / 2.0, 0.0);
        self.set_view(center, zoom).await
    }

    async fn add_polyline(&mut self, points: &[LatLng], _style: &PolylineStyle) -> Result<LayerId> {
        let id = LayerId(self.next_layer);
        self.next_layer += 1;
        self.layers.insert(id, points.to_vec());
        Ok(id)
    }

    async fn remove_layer(&mut self, id: LayerId) -> Result<()> {
        self.layers.remove(&id);
        Ok(())
    }

    async fn open_popup(&mut self, marker_id: &str) -> Result<()> {
        self.popups.push(marker_id.to_string());
        Ok(())
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> HeadlessMap {
        HeadlessMap::new(&MapConfig::default())
    }

    #[tokio::test]
    async fn test_fit_bounds_picks_floor_zoom() {
        let mut map = map();
        // Roughly District 1: ~0.02 degrees across
        let bounds = LatLngBounds::new(10.7600, 106.6900, 10.7800, 106.7100);
        map.fit_bounds(bounds, 50).await.unwrap();
        let viewport = map.viewport();
        // Height limits: 668 / 0.01448 px is 2^15.49
        assert_eq!(viewport.zoom, 15.0);
        assert!(bounds.contains(viewport.center));
    }

    #[tokio::test]
    async fn test_fit_single_point_uses_max_zoom() {
        let mut map = map();
        let point = LatLng::new(10.7729, 106.6935);
        map.fit_bounds(LatLngBounds::new(point.lat, point.lng, point.lat, point.lng), 50)
            .await
            .unwrap();
        assert_eq!(map.viewport().zoom, 19.0);
    }

    #[tokio::test]
    async fn test_set_view_rejects_invalid_center() {
        let mut map = map();
        let err = map.set_view(LatLng::new(f64::NAN, 0.0), 13.0).await;
        assert!(matches!(err, Err(AppError::Map(_))));
        assert!(map.set_view(LatLng::new(10.0, 106.0), 25.0).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fly_to_resolves_after_duration() {
        let mut map = map();
        let start = tokio::time::Instant::now();
        map.fly_to(LatLng::new(10.8188, 106.6520), 13.0, Duration::from_millis(1500))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(1500));
        assert_eq!(map.viewport().center, LatLng::new(10.8188, 106.6520));
    }

    #[tokio::test]
    async fn test_layers_added_and_removed() {
        let mut map = map();
        let style = PolylineStyle::route("#FF6B6B");
        let a = map
            .add_polyline(&[LatLng::new(10.0, 106.0), LatLng::new(10.1, 106.1)], &style)
            .await
            .unwrap();
        let b = map.add_polyline(&[], &style).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(map.layer_count(), 2);
        map.remove_layer(a).await.unwrap();
        assert_eq!(map.layer_count(), 1);
    }
}
