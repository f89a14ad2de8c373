// src/models/trip.rs

//! Trip data store: flights, hotels, airports, attractions and the daily plan.
//!
//! The shipped data set lives in `data/trip.json` and is embedded into the
//! binary. Everything here is immutable after load.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};
use crate::models::geo::LatLng;

/// Embedded copy of the shipped data set.
const BUILTIN_TRIP: &str = include_str!("../../data/trip.json");

/// Root trip record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripData {
    pub info: TripInfo,
    pub flights: Flights,
    #[serde(default)]
    pub hotels: Vec<Hotel>,
    #[serde(default)]
    pub airports: Vec<Airport>,
    #[serde(default)]
    pub attractions: Vec<Attraction>,
    #[serde(default)]
    pub itinerary: Vec<ItineraryDay>,
    #[serde(default)]
    pub tips: Vec<Tip>,
    #[serde(default)]
    pub emergency_contacts: Vec<EmergencyContact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_rate: Option<ExchangeRate>,
    pub version: DataVersion,
}

/// Trip header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripInfo {
    /// Tour identifier (e.g., "VN4D-250123")
    pub tour_no: String,
    /// Destination display name
    pub destination: String,
    /// Origin display name
    pub departure: String,
    /// Date range string
    pub dates: String,
    /// Duration string (e.g., "4天3晚")
    pub duration: String,
}

/// Outbound and return flights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flights {
    #[serde(rename = "departure", default, skip_serializing_if = "Option::is_none")]
    pub outbound: Option<Flight>,
    #[serde(rename = "return", default, skip_serializing_if = "Option::is_none")]
    pub inbound: Option<Flight>,
}

/// Flight direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outbound,
    Return,
}

impl Flights {
    /// Present flights in travel order, tagged with their direction.
    pub fn legs(&self) -> Vec<(Direction, &Flight)> {
        let mut legs = Vec::new();
        if let Some(flight) = &self.outbound {
            legs.push((Direction::Outbound, flight));
        }
        if let Some(flight) = &self.inbound {
            legs.push((Direction::Return, flight));
        }
        legs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flight {
    pub flight_no: String,
    pub airline: String,
    pub date: String,
    pub depart_time: String,
    pub depart_location: String,
    pub arrive_time: String,
    pub arrive_location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotel {
    pub id: String,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub phone: String,
    /// Star rating, 0 to 5
    pub rating: u8,
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Airport {
    pub id: String,
    pub name: String,
    pub name_en: String,
    /// IATA code
    pub code: String,
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attraction {
    pub id: String,
    pub name: String,
    pub name_en: String,
    pub address: String,
    pub description: String,
    #[serde(default)]
    pub highlights: Vec<String>,
    pub lat: f64,
    pub lng: f64,
    /// 1-based trip day
    pub day: u32,
    /// 1-based visit order within the day
    pub order: u32,
    pub opening_hours: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryDay {
    pub day: u32,
    pub date: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meals: Option<Meals>,
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub attraction_ids: Vec<String>,
}

/// Meal plan for a day. A missing entry means self-arranged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakfast: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lunch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dinner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// `HH:MM`, compared lexically
    pub time: String,
    pub activity: String,
    pub location: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipCategory {
    Important,
    Normal,
}

impl TipCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TipCategory::Important => "important",
            TipCategory::Normal => "normal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tip {
    pub category: TipCategory,
    pub icon: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRate {
    /// Source currency code
    pub from: String,
    /// Target currency code
    pub to: String,
    pub rate: f64,
    #[serde(default)]
    pub note: String,
    pub last_updated: String,
    #[serde(default)]
    pub quick_reference: Vec<RatePair>,
}

/// One row of the quick-reference conversion table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatePair {
    pub source: f64,
    pub target: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataVersion {
    pub version: String,
    pub last_updated: String,
}

impl Hotel {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

impl Airport {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

impl Attraction {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

impl TripData {
    /// Parse the embedded data set.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_TRIP)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load a data set from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load from `path` if given, otherwise the embedded data set.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::builtin(),
        }
    }

    /// Pretty JSON. Non-finite coordinates have no JSON form and are rejected.
    pub fn to_json(&self) -> Result<String> {
        let places = self
            .hotels
            .iter()
            .map(|h| (h.id.as_str(), h.position()))
            .chain(self.airports.iter().map(|a| (a.id.as_str(), a.position())))
            .chain(self.attractions.iter().map(|a| (a.id.as_str(), a.position())));
        for (id, p) in places {
            if !p.lat.is_finite() || !p.lng.is_finite() {
                return Err(AppError::validation(format!(
                    "{} has non-finite coordinates {}",
                    id, p
                )));
            }
        }
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the data set as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()? + "\n")?;
        Ok(())
    }

    /// SHA-256 of the canonical (compact) JSON encoding, hex encoded.
    pub fn fingerprint(&self) -> Result<String> {
        let canonical = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&canonical)))
    }

    pub fn attraction(&self, id: &str) -> Option<&Attraction> {
        self.attractions.iter().find(|a| a.id == id)
    }

    pub fn hotel(&self, id: &str) -> Option<&Hotel> {
        self.hotels.iter().find(|h| h.id == id)
    }

    pub fn airport(&self, id: &str) -> Option<&Airport> {
        self.airports.iter().find(|a| a.id == id)
    }

    pub fn day(&self, day: u32) -> Option<&ItineraryDay> {
        self.itinerary.iter().find(|d| d.day == day)
    }

    /// The hotel routes and day views are anchored on.
    pub fn primary_hotel(&self) -> Option<&Hotel> {
        self.hotels.first()
    }

    /// Attractions referenced by `day`, in visit order. Dangling ids are skipped.
    pub fn attractions_for_day(&self, day: u32) -> Vec<&Attraction> {
        self.day(day)
            .map(|d| self.resolve_attractions(d))
            .unwrap_or_default()
    }

    /// Resolve a day's attraction ids, skipping dangling references.
    pub fn resolve_attractions(&self, day: &ItineraryDay) -> Vec<&Attraction> {
        day.attraction_ids
            .iter()
            .filter_map(|id| {
                let found = self.attraction(id);
                if found.is_none() {
                    log::debug!("Day {} references unknown attraction {}", day.day, id);
                }
                found
            })
            .collect()
    }

    /// Short label used in tips and titles (e.g., "CZ6077/CZ6078").
    pub fn flight_numbers(&self) -> Vec<&str> {
        self.flights
            .legs()
            .into_iter()
            .map(|(_, f)| f.flight_no.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_parses() {
        let trip = TripData::builtin().unwrap();
        assert_eq!(trip.info.tour_no, "VN4D-250123");
        assert_eq!(trip.itinerary.len(), 4);
        assert_eq!(trip.attractions.len(), 15);
        assert_eq!(trip.version.version, "2.1.1");
        assert_eq!(trip.flight_numbers(), vec!["CZ6077", "CZ6078"]);
    }

    #[test]
    fn test_shipped_flights_are_ground_truth() {
        // Older fixtures quoted 9C8521/9C8522; the shipped file is authoritative.
        let trip = TripData::builtin().unwrap();
        let outbound = trip.flights.outbound.as_ref().unwrap();
        assert_eq!(outbound.flight_no, "CZ6077");
        assert_eq!(outbound.depart_time, "08:35");
        assert_eq!(trip.primary_hotel().unwrap().name, "胡志明新山一酒店");
    }

    #[test]
    fn test_json_round_trip_is_lossless() {
        let trip = TripData::builtin().unwrap();
        let json = trip.to_json().unwrap();
        let reloaded = TripData::from_json(&json).unwrap();
        assert_eq!(trip, reloaded);
        assert_eq!(trip.fingerprint().unwrap(), reloaded.fingerprint().unwrap());
    }

    #[test]
    fn test_non_finite_coordinate_is_not_serialised() {
        let mut trip = TripData::builtin().unwrap();
        trip.attractions[1].lat = f64::NAN;
        let err = trip.to_json().unwrap_err();
        assert!(err.to_string().contains(&trip.attractions[1].id));

        let tmp = tempfile::TempDir::new().unwrap();
        assert!(trip.save(tmp.path().join("trip.json")).is_err());
        assert!(!tmp.path().join("trip.json").exists());
    }

    #[test]
    fn test_save_and_load_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested/trip.json");
        let trip = TripData::builtin().unwrap();
        trip.save(&path).unwrap();
        assert_eq!(TripData::load(&path).unwrap(), trip);
    }

    #[test]
    fn test_attractions_for_day_in_visit_order() {
        let trip = TripData::builtin().unwrap();
        let names: Vec<&str> = trip
            .attractions_for_day(1)
            .iter()
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(names, vec!["attr-1", "attr-2"]);
        assert!(trip.attractions_for_day(4).is_empty());
        assert!(trip.attractions_for_day(9).is_empty());
    }

    #[test]
    fn test_dangling_reference_is_skipped() {
        let mut trip = TripData::builtin().unwrap();
        trip.itinerary[0].attraction_ids.push("attr-missing".to_string());
        assert_eq!(trip.attractions_for_day(1).len(), 2);
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        let trip = TripData::builtin().unwrap();
        let mut edited = trip.clone();
        edited.info.duration = "5天4晚".to_string();
        assert_ne!(trip.fingerprint().unwrap(), edited.fingerprint().unwrap());
        assert_eq!(trip.fingerprint().unwrap().len(), 64);
    }
}
