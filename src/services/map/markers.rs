//! Marker, popup and route view-models derived from the trip data.

use serde::Serialize;

use crate::models::{Airport, Attraction, Hotel, LatLng, MapConfig, PlaceKind, TripData};
use crate::services::map::PolylineStyle;

const HOTEL_COLOR: &str = "#4CAF50";
const AIRPORT_COLOR: &str = "#9C27B0";

/// Popup contents for one marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Popup {
    pub title: String,
    /// Address, contact and hours lines, icon-prefixed
    pub lines: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub tag: String,
}

/// Round marker icon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerBadge {
    pub label: String,
    pub color: String,
    /// Diameter in pixels
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    /// `{kind}-{entity id}`, also the location selector value
    pub id: String,
    pub kind: PlaceKind,
    pub entity_id: String,
    pub position: LatLng,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
    pub badge: MarkerBadge,
    pub popup: Popup,
}

/// Marker id shared by the map and the location selector.
pub fn marker_id(kind: PlaceKind, id: &str) -> String {
    format!("{kind}-{id}")
}

/// Split a selector value into kind and entity id. Ids may contain `-`.
pub fn parse_location(value: &str) -> Option<(PlaceKind, &str)> {
    let (kind, id) = value.split_once('-')?;
    if id.is_empty() {
        return None;
    }
    let kind = match kind {
        "airport" => PlaceKind::Airport,
        "hotel" => PlaceKind::Hotel,
        "attraction" => PlaceKind::Attraction,
        _ => return None,
    };
    Some((kind, id))
}

pub fn hotel_marker(hotel: &Hotel) -> Marker {
    let mut lines = vec![format!("📍 {}", hotel.address)];
    if !hotel.phone.is_empty() {
        lines.push(format!("📞 {}", hotel.phone));
    }
    Marker {
        id: marker_id(PlaceKind::Hotel, &hotel.id),
        kind: PlaceKind::Hotel,
        entity_id: hotel.id.clone(),
        position: hotel.position(),
        day: None,
        badge: MarkerBadge {
            label: "🏨".to_string(),
            color: HOTEL_COLOR.to_string(),
            size: 45,
        },
        popup: Popup {
            title: format!("🏨 {}", hotel.name),
            lines,
            description: Some(format!("⭐ 评分: {}/5", hotel.rating)),
            note: hotel.note.clone(),
            tag: "住宿".to_string(),
        },
    }
}

pub fn airport_marker(airport: &Airport) -> Marker {
    Marker {
        id: marker_id(PlaceKind::Airport, &airport.id),
        kind: PlaceKind::Airport,
        entity_id: airport.id.clone(),
        position: airport.position(),
        day: None,
        badge: MarkerBadge {
            label: "✈️".to_string(),
            color: AIRPORT_COLOR.to_string(),
            size: 36,
        },
        popup: Popup {
            title: format!("✈️ {}", airport.name),
            lines: vec![
                format!("📍 {}", airport.address),
                format!("🏷️ 机场代码: {}", airport.code),
            ],
            description: (!airport.note.is_empty()).then(|| airport.note.clone()),
            note: None,
            tag: "机场".to_string(),
        },
    }
}

pub fn attraction_marker(attraction: &Attraction, config: &MapConfig) -> Marker {
    let mut lines = vec![
        format!("📍 {}", attraction.address),
        format!("⏰ 开放时间: {}", attraction.opening_hours),
    ];
    if !attraction.highlights.is_empty() {
        lines.push(format!("✨ 亮点: {}", attraction.highlights.join("、")));
    }
    Marker {
        id: marker_id(PlaceKind::Attraction, &attraction.id),
        kind: PlaceKind::Attraction,
        entity_id: attraction.id.clone(),
        position: attraction.position(),
        day: Some(attraction.day),
        badge: MarkerBadge {
            label: attraction.order.to_string(),
            color: config.day_color(attraction.day).to_string(),
            size: 32,
        },
        popup: Popup {
            title: format!("🎯 {}", attraction.name),
            lines,
            description: (!attraction.description.is_empty())
                .then(|| attraction.description.clone()),
            note: attraction.note.clone(),
            tag: format!("第{}天", attraction.day),
        },
    }
}

/// Every marker: hotels, attractions, then airports.
pub fn build_markers(trip: &TripData, config: &MapConfig) -> Vec<Marker> {
    trip.hotels
        .iter()
        .map(hotel_marker)
        .chain(trip.attractions.iter().map(|a| attraction_marker(a, config)))
        .chain(trip.airports.iter().map(airport_marker))
        .collect()
}

/// A day's route through its attractions in visit order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePolyline {
    pub day: u32,
    pub points: Vec<LatLng>,
    pub style: PolylineStyle,
}

/// Routes for every day with at least two resolved attractions.
pub fn route_polylines(trip: &TripData, config: &MapConfig) -> Vec<RoutePolyline> {
    trip.itinerary
        .iter()
        .filter_map(|day| {
            let points: Vec<LatLng> = trip
                .resolve_attractions(day)
                .iter()
                .map(|a| a.position())
                .collect();
            (points.len() >= 2).then(|| RoutePolyline {
                day: day.day,
                points,
                style: PolylineStyle::route(config.day_color(day.day)),
            })
        })
        .collect()
}

/// One entry of the location selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationOption {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationGroup {
    pub label: String,
    pub options: Vec<LocationOption>,
}

/// Selector groups: airports, hotels, major attractions, all attractions.
pub fn location_options(trip: &TripData) -> Vec<LocationGroup> {
    let option = |kind: PlaceKind, id: &str, label: String| LocationOption {
        value: marker_id(kind, id),
        label,
    };

    vec![
        LocationGroup {
            label: "✈️ 机场".to_string(),
            options: trip
                .airports
                .iter()
                .map(|a| {
                    option(
                        PlaceKind::Airport,
                        &a.id,
                        format!("🛫 {} ({})", a.name, a.code),
                    )
                })
                .collect(),
        },
        LocationGroup {
            label: "🏨 酒店".to_string(),
            options: trip
                .hotels
                .iter()
                .map(|h| option(PlaceKind::Hotel, &h.id, format!("🏨 {}", h.name)))
                .collect(),
        },
        LocationGroup {
            label: "🎯 主要景点".to_string(),
            options: trip
                .attractions
                .iter()
                .filter_map(|a| {
                    let duration = a.duration.as_deref()?;
                    Some(option(
                        PlaceKind::Attraction,
                        &a.id,
                        format!("📍 {} ({})", a.name, duration),
                    ))
                })
                .collect(),
        },
        LocationGroup {
            label: "📍 所有景点".to_string(),
            options: trip
                .attractions
                .iter()
                .map(|a| {
                    option(
                        PlaceKind::Attraction,
                        &a.id,
                        format!("D{} - {}", a.day, a.name),
                    )
                })
                .collect(),
        },
    ]
}
