// src/pipeline/validate.rs

//! Data quality report over a trip data set.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::models::{Direction, LatLng, LatLngBounds, RegionConfig, TripData};

/// Outcome of [`validate_trip`]. Failures make the data set unusable;
/// warnings flag data-quality issues such as an out-of-order schedule or
/// the origin airport lying outside the destination region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub passed: Vec<String>,
    pub failed: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }

    fn check(&mut self, ok: bool, passed: impl Into<String>, failed: impl Into<String>) {
        if ok {
            self.passed.push(passed.into());
        } else {
            self.failed.push(failed.into());
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} passed, {} failed, {} warnings",
            self.passed.len(),
            self.failed.len(),
            self.warnings.len()
        )
    }
}

/// Run every check against `trip`.
pub fn validate_trip(trip: &TripData, region: &RegionConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    check_unique_ids(trip, &mut report);
    check_day_numbers(trip, &mut report);
    check_references(trip, &mut report);
    check_activity_times(trip, &mut report);
    check_coordinates(trip, &region.bounds, &mut report);
    check_flights(trip, &mut report);
    report.check(
        !trip.hotels.is_empty(),
        "At least one hotel",
        "No hotel in data set",
    );
    report.check(
        !trip.version.version.is_empty(),
        format!("Data version v{}", trip.version.version),
        "Data version missing",
    );
    log::debug!("Validation finished: {}", report);
    report
}

fn check_unique_ids(trip: &TripData, report: &mut ValidationReport) {
    let mut seen = HashSet::new();
    let ids = trip
        .hotels
        .iter()
        .map(|h| h.id.as_str())
        .chain(trip.airports.iter().map(|a| a.id.as_str()))
        .chain(trip.attractions.iter().map(|a| a.id.as_str()));
    let duplicates: Vec<&str> = ids.filter(|id| !seen.insert(*id)).collect();
    report.check(
        duplicates.is_empty(),
        format!("{} unique entity ids", seen.len()),
        format!("Duplicate ids: {}", duplicates.join(", ")),
    );
}

fn check_day_numbers(trip: &TripData, report: &mut ValidationReport) {
    let consecutive = trip
        .itinerary
        .iter()
        .enumerate()
        .all(|(i, day)| day.day as usize == i + 1);
    report.check(
        consecutive && !trip.itinerary.is_empty(),
        format!("Days numbered 1..{}", trip.itinerary.len()),
        "Itinerary days are not numbered 1..N in order",
    );
}

fn check_references(trip: &TripData, report: &mut ValidationReport) {
    let mut referenced = HashSet::new();
    let mut resolved = true;
    for day in &trip.itinerary {
        for id in &day.attraction_ids {
            referenced.insert(id.as_str());
            match trip.attraction(id) {
                None => {
                    report
                        .failed
                        .push(format!("Day {} references unknown attraction {}", day.day, id));
                    resolved = false;
                }
                Some(a) if a.day != day.day => {
                    report.failed.push(format!(
                        "Attraction {} is listed on day {} but belongs to day {}",
                        id, day.day, a.day
                    ));
                    resolved = false;
                }
                Some(_) => {}
            }
        }
    }
    if resolved {
        report.passed.push("Every attraction reference resolves".to_string());
    }

    for attraction in &trip.attractions {
        if !referenced.contains(attraction.id.as_str()) {
            report.warnings.push(format!(
                "Attraction {} ({}) is not on any day",
                attraction.id, attraction.name
            ));
        }
    }
}

fn check_activity_times(trip: &TripData, report: &mut ValidationReport) {
    for day in &trip.itinerary {
        let mut last: Option<(u32, &str)> = None;
        let mut ordered = true;
        for activity in &day.activities {
            let Some(minutes) = parse_hhmm(&activity.time) else {
                report.failed.push(format!(
                    "Day {}: invalid time '{}'",
                    day.day, activity.time
                ));
                ordered = false;
                continue;
            };
            if let Some((prev, prev_text)) = last {
                if minutes < prev {
                    report.warnings.push(format!(
                        "Day {}: time goes backwards {} -> {}",
                        day.day, prev_text, activity.time
                    ));
                    ordered = false;
                }
            }
            last = Some((minutes, &activity.time));
        }
        if ordered {
            report
                .passed
                .push(format!("Day {} schedule in time order", day.day));
        }
    }
}

fn check_coordinates(trip: &TripData, region: &LatLngBounds, report: &mut ValidationReport) {
    let places = trip
        .hotels
        .iter()
        .map(|h| (h.id.as_str(), h.name.as_str(), h.position()))
        .chain(
            trip.airports
                .iter()
                .map(|a| (a.id.as_str(), a.name.as_str(), a.position())),
        )
        .chain(
            trip.attractions
                .iter()
                .map(|a| (a.id.as_str(), a.name.as_str(), a.position())),
        );

    let mut valid = true;
    for (id, name, position) in places {
        if !is_valid_position(position) {
            report
                .failed
                .push(format!("{} ({}) has invalid coordinates {}", id, name, position));
            valid = false;
        } else if !region.contains(position) {
            report.warnings.push(format!(
                "{} ({}) at {} is outside the destination region",
                id, name, position
            ));
        }
    }
    if valid {
        report.passed.push("All coordinates valid".to_string());
    }
}

fn check_flights(trip: &TripData, report: &mut ValidationReport) {
    let (Some(first), Some(last)) = (trip.itinerary.first(), trip.itinerary.last()) else {
        return;
    };
    for (direction, flight) in trip.flights.legs() {
        let day = match direction {
            Direction::Outbound => first,
            Direction::Return => last,
        };
        let mentioned = day
            .activities
            .iter()
            .any(|a| a.activity.contains(&flight.flight_no));
        if mentioned {
            report.passed.push(format!(
                "Flight {} appears on day {}",
                flight.flight_no, day.day
            ));
        } else {
            report.warnings.push(format!(
                "Flight {} is not mentioned on day {}",
                flight.flight_no, day.day
            ));
        }
    }
}

fn is_valid_position(p: LatLng) -> bool {
    p.lat.is_finite() && p.lng.is_finite() && p.lat.abs() <= 90.0 && p.lng.abs() <= 180.0
}

/// Minutes since midnight for `HH:MM`.
fn parse_hhmm(time: &str) -> Option<u32> {
    let (h, m) = time.split_once(':')?;
    if h.len() != 2 || m.len() != 2 {
        return None;
    }
    let (h, m): (u32, u32) = (h.parse().ok()?, m.parse().ok()?);
    (h < 24 && m < 60).then_some(h * 60 + m)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_for(trip: &TripData) -> ValidationReport {
        validate_trip(trip, &RegionConfig::default())
    }

    #[test]
    fn test_shipped_data_passes() {
        let report = report_for(&TripData::builtin().unwrap());
        assert!(report.is_ok(), "{:?}", report.failed);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].starts_with("airport-pvg"));
    }

    #[test]
    fn test_dangling_reference_fails() {
        let mut trip = TripData::builtin().unwrap();
        trip.itinerary[0].attraction_ids.push("attr-99".to_string());
        let report = report_for(&trip);
        assert!(!report.is_ok());
        assert!(report.failed[0].contains("attr-99"));
    }

    #[test]
    fn test_wrong_day_fails() {
        let mut trip = TripData::builtin().unwrap();
        trip.attractions[0].day = 3;
        let report = report_for(&trip);
        assert!(report.failed.iter().any(|f| f.contains("belongs to day 3")));
    }

    #[test]
    fn test_backwards_time_warns() {
        let mut trip = TripData::builtin().unwrap();
        trip.itinerary[0].activities[2].time = "07:00".to_string();
        let report = report_for(&trip);
        assert!(report.is_ok());
        assert!(
            report
                .warnings
                .iter()
                .any(|f| f == "Day 1: time goes backwards 08:35 -> 07:00")
        );
    }

    #[test]
    fn test_day_one_order() {
        let trip = TripData::builtin().unwrap();
        let times: Vec<&str> = trip.itinerary[0]
            .activities
            .iter()
            .map(|a| a.time.as_str())
            .collect();
        assert_eq!(times, ["05:35", "08:35", "12:10", "15:00", "16:00", "18:00"]);
    }

    #[test]
    fn test_unreferenced_attraction_warns() {
        let mut trip = TripData::builtin().unwrap();
        trip.itinerary[0].attraction_ids.retain(|id| id != "attr-2");
        let report = report_for(&trip);
        assert!(report.is_ok());
        assert!(report.warnings.iter().any(|w| w.contains("attr-2")));
    }

    #[test]
    fn test_parse_hhmm() {
        assert_eq!(parse_hhmm("05:35"), Some(335));
        assert_eq!(parse_hhmm("24:00"), None);
        assert_eq!(parse_hhmm("5:35"), None);
        assert_eq!(parse_hhmm("待定"), None);
    }
}
