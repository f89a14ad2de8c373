// src/services/view/mod.rs

//! View renderer.
//!
//! Each panel has a typed view-model built from the trip data and a template
//! function turning it into an HTML fragment. All text goes through
//! [`escape_html`].

mod host;

use std::collections::BTreeSet;
use std::fmt::Write as _;

use serde::Serialize;

use crate::models::{Direction, TripData};
use crate::services::clock::{ClockReading, ZoneReading};
use crate::services::engagement::Counters;
use crate::services::map::{LocationGroup, location_options};
use crate::utils::{escape_html, format_amount};

pub use host::HostPage;

/// Label for meals the traveller arranges themselves.
pub const SELF_ARRANGED: &str = "自理";

/// Label for days without attractions.
pub const ITINERARY_CONCLUDED: &str = "（行程结束）";

/// Named mount points of the host page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Mount {
    Map,
    ItineraryList,
    TipsList,
    FlightInfo,
    HotelList,
    DetailSchedule,
    EmergencyContacts,
    ExchangeRate,
    DataVersion,
    LocationSelect,
    LikeButton,
    TripInfo,
    OriginTime,
    DestinationTime,
}

impl Mount {
    pub const ALL: [Mount; 14] = [
        Mount::Map,
        Mount::ItineraryList,
        Mount::TipsList,
        Mount::FlightInfo,
        Mount::HotelList,
        Mount::DetailSchedule,
        Mount::EmergencyContacts,
        Mount::ExchangeRate,
        Mount::DataVersion,
        Mount::LocationSelect,
        Mount::LikeButton,
        Mount::TripInfo,
        Mount::OriginTime,
        Mount::DestinationTime,
    ];

    /// Element id in the host page.
    pub fn id(&self) -> &'static str {
        match self {
            Mount::Map => "map",
            Mount::ItineraryList => "itineraryList",
            Mount::TipsList => "tipsList",
            Mount::FlightInfo => "flightInfo",
            Mount::HotelList => "hotelList",
            Mount::DetailSchedule => "detailSchedule",
            Mount::EmergencyContacts => "emergencyContacts",
            Mount::ExchangeRate => "exchangeRate",
            Mount::DataVersion => "dataVersion",
            Mount::LocationSelect => "locationSelect",
            Mount::LikeButton => "likeButton",
            Mount::TripInfo => "tripInfo",
            Mount::OriginTime => "originTime",
            Mount::DestinationTime => "destinationTime",
        }
    }
}

/// Rendered HTML for one mount point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub mount: Mount,
    pub html: String,
}

impl Fragment {
    pub fn new(mount: Mount, html: String) -> Self {
        Self { mount, html }
    }
}

// --- View-models ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    pub day: u32,
    pub date: String,
    pub title: String,
    /// `🍽️ {b}早餐 | {l}午餐 | {d}晚餐`, absent when the day has no meal plan
    pub meals: Option<String>,
    /// Attraction names joined by `、`, or the concluded label
    pub places: String,
    pub active: bool,
}

pub fn itinerary_summary(trip: &TripData, selected_day: Option<u32>) -> Vec<DaySummary> {
    trip.itinerary
        .iter()
        .map(|day| {
            let names: Vec<&str> = trip
                .resolve_attractions(day)
                .iter()
                .map(|a| a.name.as_str())
                .collect();
            let meals = day.meals.as_ref().map(|m| {
                let label = |meal: &Option<String>| {
                    meal.as_deref()
                        .filter(|s| !s.is_empty())
                        .unwrap_or(SELF_ARRANGED)
                        .to_string()
                };
                format!(
                    "🍽️ {}早餐 | {}午餐 | {}晚餐",
                    label(&m.breakfast),
                    label(&m.lunch),
                    label(&m.dinner)
                )
            });
            DaySummary {
                day: day.day,
                date: day.date.clone(),
                title: day.title.clone(),
                meals,
                places: if names.is_empty() {
                    ITINERARY_CONCLUDED.to_string()
                } else {
                    names.join("、")
                },
                active: selected_day == Some(day.day),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightCard {
    pub direction: String,
    pub flight_no: String,
    pub airline: String,
    pub date: String,
    pub depart: String,
    pub arrive: String,
}

pub fn flight_cards(trip: &TripData) -> Vec<FlightCard> {
    trip.flights
        .legs()
        .into_iter()
        .map(|(direction, flight)| FlightCard {
            direction: match direction {
                Direction::Outbound => "去程 ✈️",
                Direction::Return => "返程 ✈️",
            }
            .to_string(),
            flight_no: flight.flight_no.clone(),
            airline: flight.airline.clone(),
            date: flight.date.clone(),
            depart: format!("{} {}", flight.depart_time, flight.depart_location),
            arrive: format!("{} {}", flight.arrive_time, flight.arrive_location),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HotelCard {
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
    pub rating: u8,
    pub note: Option<String>,
}

pub fn hotel_cards(trip: &TripData) -> Vec<HotelCard> {
    trip.hotels
        .iter()
        .map(|h| HotelCard {
            name: h.name.clone(),
            address: h.address.clone(),
            phone: (!h.phone.is_empty()).then(|| h.phone.clone()),
            rating: h.rating,
            note: h.note.clone(),
        })
        .collect()
}

/// Which detailed schedule days are expanded. All start collapsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleState {
    expanded: BTreeSet<u32>,
}

impl ScheduleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip one day; returns whether it is now expanded.
    pub fn toggle(&mut self, day: u32) -> bool {
        if !self.expanded.remove(&day) {
            self.expanded.insert(day);
            return true;
        }
        false
    }

    pub fn is_expanded(&self, day: u32) -> bool {
        self.expanded.contains(&day)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleRow {
    pub time: String,
    pub activity: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySchedule {
    pub day: u32,
    pub title: String,
    pub expanded: bool,
    pub rows: Vec<ScheduleRow>,
}

pub fn day_schedules(trip: &TripData, state: &ScheduleState) -> Vec<DaySchedule> {
    trip.itinerary
        .iter()
        .map(|day| DaySchedule {
            day: day.day,
            title: day.title.clone(),
            expanded: state.is_expanded(day.day),
            rows: day
                .activities
                .iter()
                .map(|a| ScheduleRow {
                    time: a.time.clone(),
                    activity: a.activity.clone(),
                    location: a.location.clone(),
                })
                .collect(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateRow {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRateView {
    /// `1 CNY ≈ 3,600 VND`
    pub headline: String,
    pub note: Option<String>,
    pub last_updated: String,
    pub from: String,
    pub to: String,
    pub rows: Vec<RateRow>,
}

pub fn exchange_rate_view(trip: &TripData) -> Option<ExchangeRateView> {
    let rate = trip.exchange_rate.as_ref()?;
    Some(ExchangeRateView {
        headline: format!("1 {} ≈ {} {}", rate.from, format_amount(rate.rate), rate.to),
        note: (!rate.note.is_empty()).then(|| rate.note.clone()),
        last_updated: rate.last_updated.clone(),
        from: rate.from.clone(),
        to: rate.to.clone(),
        rows: rate
            .quick_reference
            .iter()
            .map(|pair| RateRow {
                source: format_amount(pair.source),
                target: format_amount(pair.target),
            })
            .collect(),
    })
}

// --- Templates ---

pub fn render_itinerary(days: &[DaySummary]) -> String {
    let mut html = String::new();
    for day in days {
        let _ = write!(
            html,
            r#"<div class="day-item{}" id="day-{}" onclick="showRoute({})"><div class="day-header"><span>{}</span><span class="day-date">{}</span></div>"#,
            if day.active { " active" } else { "" },
            day.day,
            day.day,
            escape_html(&day.title),
            escape_html(&day.date)
        );
        if let Some(meals) = &day.meals {
            let _ = write!(html, r#"<div class="day-meals">{}</div>"#, escape_html(meals));
        }
        let _ = write!(
            html,
            r#"<div class="day-places">{}</div></div>"#,
            escape_html(&day.places)
        );
    }
    html
}

pub fn render_flights(cards: &[FlightCard]) -> String {
    let mut html = String::from(r#"<div class="flight-info">"#);
    for card in cards {
        let _ = write!(
            html,
            r#"<div class="flight-item"><div class="flight-direction">{}</div><div class="flight-detail"><strong>{}</strong> {}<br>{}</div><div class="flight-time">{} →<br>{}</div></div>"#,
            escape_html(&card.direction),
            escape_html(&card.flight_no),
            escape_html(&card.airline),
            escape_html(&card.date),
            escape_html(&card.depart),
            escape_html(&card.arrive)
        );
    }
    html.push_str("</div>");
    html
}

pub fn render_hotels(cards: &[HotelCard]) -> String {
    let mut html = String::from(r#"<div class="hotel-list">"#);
    for card in cards {
        let _ = write!(
            html,
            r#"<div class="hotel-item"><div class="hotel-name">{}</div><div class="hotel-address">📍 {}</div>"#,
            escape_html(&card.name),
            escape_html(&card.address)
        );
        if let Some(phone) = &card.phone {
            let _ = write!(html, r#"<div class="hotel-phone">📞 {}</div>"#, escape_html(phone));
        }
        let _ = write!(html, r#"<div class="hotel-rating">⭐ {}/5</div>"#, card.rating);
        if let Some(note) = &card.note {
            let _ = write!(html, r#"<div class="hotel-note">💡 {}</div>"#, escape_html(note));
        }
        html.push_str("</div>");
    }
    html.push_str("</div>");
    html
}

pub fn render_schedule(days: &[DaySchedule]) -> String {
    let mut html = String::from(r#"<div class="detail-schedule">"#);
    for day in days {
        let _ = write!(
            html,
            r#"<div class="day-schedule"><div class="day-schedule-header" onclick="toggleDaySchedule({})"><span>{}</span><span class="toggle-icon">{}</span></div><div class="day-schedule-content{}" id="schedule-day-{}">"#,
            day.day,
            escape_html(&day.title),
            if day.expanded { "▲" } else { "▼" },
            if day.expanded { " expanded" } else { "" },
            day.day
        );
        for row in &day.rows {
            let _ = write!(
                html,
                r#"<div class="activity-item"><span class="activity-time">{}</span><span class="activity-desc">{}</span><span class="activity-location">@{}</span></div>"#,
                escape_html(&row.time),
                escape_html(&row.activity),
                escape_html(&row.location)
            );
        }
        html.push_str("</div></div>");
    }
    html.push_str("</div>");
    html
}

pub fn render_tips(trip: &TripData) -> String {
    let mut html = String::new();
    for tip in &trip.tips {
        let _ = write!(
            html,
            r#"<div class="tip-item {}"><span class="tip-icon">{}</span><span>{}</span></div>"#,
            tip.category.as_str(),
            escape_html(&tip.icon),
            escape_html(&tip.text)
        );
    }
    html
}

pub fn render_contacts(trip: &TripData) -> String {
    let mut html = String::from(r#"<div class="emergency-contacts">"#);
    for contact in &trip.emergency_contacts {
        let _ = write!(
            html,
            r#"<div class="contact-item"><div class="contact-name">{}</div><div class="contact-phone">📞 <a href="tel:{}">{}</a></div></div>"#,
            escape_html(&contact.name),
            escape_html(&contact.phone.replace(' ', "")),
            escape_html(&contact.phone)
        );
    }
    html.push_str("</div>");
    html
}

pub fn render_exchange_rate(view: &ExchangeRateView) -> String {
    let mut html = format!(
        r#"<div class="exchange-rate"><div class="rate-headline">💱 {}</div>"#,
        escape_html(&view.headline)
    );
    if let Some(note) = &view.note {
        let _ = write!(html, r#"<div class="rate-note">{}</div>"#, escape_html(note));
    }
    if !view.rows.is_empty() {
        let _ = write!(
            html,
            r#"<table class="rate-table"><thead><tr><th>{}</th><th>{}</th></tr></thead><tbody>"#,
            escape_html(&view.from),
            escape_html(&view.to)
        );
        for row in &view.rows {
            let _ = write!(
                html,
                "<tr><td>{}</td><td>{}</td></tr>",
                escape_html(&row.source),
                escape_html(&row.target)
            );
        }
        html.push_str("</tbody></table>");
    }
    let _ = write!(
        html,
        r#"<div class="rate-updated">更新时间: {}</div></div>"#,
        escape_html(&view.last_updated)
    );
    html
}

/// Version footer; `fingerprint` is shown shortened as a cache token.
pub fn render_version(trip: &TripData, fingerprint: Option<&str>) -> String {
    let mut html = format!(
        r#"<div class="version-info">📊 数据版本: v{} | 更新时间: {}"#,
        escape_html(&trip.version.version),
        escape_html(&trip.version.last_updated)
    );
    if let Some(fingerprint) = fingerprint {
        let short: String = fingerprint.chars().take(8).collect();
        let _ = write!(html, r#" <span class="data-fingerprint">#{}</span>"#, escape_html(&short));
    }
    html.push_str(r#"</div><div class="refresh-hint">💡 数据更新后请刷新页面 (F5 或 Ctrl+R)</div>"#);
    html
}

/// Tour number badge and dates; empty when either is missing.
pub fn render_title_badge(trip: &TripData) -> String {
    let info = &trip.info;
    if info.tour_no.is_empty() || info.dates.is_empty() {
        return String::new();
    }
    format!(
        r#"<span class="badge">{}</span><span class="date">{}</span>"#,
        escape_html(&info.tour_no),
        escape_html(&info.dates)
    )
}

pub fn render_location_select(groups: &[LocationGroup]) -> String {
    let mut html = String::from(r#"<option value="">-- 选择要查看的地点 --</option>"#);
    for group in groups.iter().filter(|g| !g.options.is_empty()) {
        let _ = write!(html, r#"<optgroup label="{}">"#, escape_html(&group.label));
        for option in &group.options {
            let _ = write!(
                html,
                r#"<option value="{}">{}</option>"#,
                escape_html(&option.value),
                escape_html(&option.label)
            );
        }
        html.push_str("</optgroup>");
    }
    html
}

pub fn render_like_button(counts: &Counters) -> String {
    format!(
        r#"<button class="like-btn" onclick="likeTrip()">❤️ <span id="likeCount">{}</span></button><span class="view-count">👁️ <span id="viewCount">{}</span></span>"#,
        counts.likes, counts.views
    )
}

/// One clock face. The page script re-reads `data-zone` on every tick.
pub fn render_clock(reading: &ZoneReading) -> String {
    format!(
        r#"<time data-zone="{}">{}</time>"#,
        escape_html(&reading.zone),
        escape_html(&reading.time)
    )
}

/// Initial scene for the map front-end, embedded as inert JSON.
pub fn render_map_payload(scene_json: &str) -> String {
    format!(
        r#"<script type="application/json" id="sceneData">{}</script>"#,
        scene_json.replace("</", "<\\/")
    )
}

/// In-place message when the map could not be initialised.
pub fn render_map_error(message: &str) -> String {
    format!(
        r#"<div class="map-error" style="padding: 20px; text-align: center; color: red;">初始化失败: {}</div>"#,
        escape_html(message)
    )
}

/// Everything the page shows, gathered once per render.
#[derive(Debug, Clone, Default)]
pub struct PageState<'a> {
    pub selected_day: Option<u32>,
    pub schedule: ScheduleState,
    pub counts: Option<Counters>,
    pub clock: Option<ClockReading>,
    pub fingerprint: Option<&'a str>,
    /// Map mount content: scene payload or error
    pub map_html: Option<String>,
}

/// Render every panel. The map and like button appear only when supplied.
pub fn render_panels(trip: &TripData, state: &PageState<'_>) -> Vec<Fragment> {
    let mut fragments = vec![
        Fragment::new(
            Mount::ItineraryList,
            render_itinerary(&itinerary_summary(trip, state.selected_day)),
        ),
        Fragment::new(Mount::TipsList, render_tips(trip)),
        Fragment::new(Mount::FlightInfo, render_flights(&flight_cards(trip))),
        Fragment::new(Mount::HotelList, render_hotels(&hotel_cards(trip))),
        Fragment::new(
            Mount::DetailSchedule,
            render_schedule(&day_schedules(trip, &state.schedule)),
        ),
        Fragment::new(Mount::EmergencyContacts, render_contacts(trip)),
        Fragment::new(Mount::DataVersion, render_version(trip, state.fingerprint)),
        Fragment::new(Mount::TripInfo, render_title_badge(trip)),
        Fragment::new(
            Mount::LocationSelect,
            render_location_select(&location_options(trip)),
        ),
    ];
    if let Some(view) = exchange_rate_view(trip) {
        fragments.push(Fragment::new(Mount::ExchangeRate, render_exchange_rate(&view)));
    }
    if let Some(counts) = &state.counts {
        fragments.push(Fragment::new(Mount::LikeButton, render_like_button(counts)));
    }
    if let Some(clock) = &state.clock {
        fragments.push(Fragment::new(Mount::OriginTime, render_clock(&clock.origin)));
        fragments.push(Fragment::new(
            Mount::DestinationTime,
            render_clock(&clock.destination),
        ));
    }
    if let Some(map_html) = &state.map_html {
        fragments.push(Fragment::new(Mount::Map, map_html.clone()));
    }
    fragments
}
