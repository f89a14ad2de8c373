// src/services/clock.rs

//! Dual-timezone clock widget.

use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::Result;
use crate::models::ClockConfig;

/// One zone's wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneReading {
    pub label: String,
    pub zone: String,
    /// Zero-padded `HH:MM:SS`
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClockReading {
    pub origin: ZoneReading,
    pub destination: ZoneReading,
}

impl std::fmt::Display for ClockReading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} | {} {}",
            self.origin.label, self.origin.time, self.destination.label, self.destination.time
        )
    }
}

#[derive(Debug, Clone)]
pub struct DualClock {
    origin: (String, Tz),
    destination: (String, Tz),
    tick: Duration,
}

impl DualClock {
    pub fn from_config(config: &ClockConfig) -> Result<Self> {
        Ok(Self {
            origin: (config.origin.label.clone(), config.origin.timezone()?),
            destination: (config.destination.label.clone(), config.destination.timezone()?),
            tick: Duration::from_millis(config.tick_ms.max(1)),
        })
    }

    pub fn read_at(&self, instant: DateTime<Utc>) -> ClockReading {
        let reading = |(label, tz): &(String, Tz)| ZoneReading {
            label: label.clone(),
            zone: tz.name().to_string(),
            time: format_hms(instant, *tz),
        };
        ClockReading {
            origin: reading(&self.origin),
            destination: reading(&self.destination),
        }
    }

    pub fn now(&self) -> ClockReading {
        self.read_at(Utc::now())
    }

    /// Tick until `ticks` readings were produced, or forever when `None`.
    ///
    /// The first reading is immediate. Dropping the future cancels the clock.
    pub async fn run<F>(&self, ticks: Option<u64>, mut on_tick: F)
    where
        F: FnMut(&ClockReading),
    {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut produced = 0u64;
        while ticks.is_none_or(|limit| produced < limit) {
            interval.tick().await;
            on_tick(&self.now());
            produced += 1;
        }
    }
}

/// `HH:MM:SS` of `instant` in `tz`.
pub fn format_hms(instant: DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn clock() -> DualClock {
        DualClock::from_config(&ClockConfig::default()).unwrap()
    }

    #[test]
    fn test_destination_is_one_hour_behind() {
        // CZ6077 leaves Shanghai at 08:35 local time
        let instant = Utc.with_ymd_and_hms(2026, 1, 23, 0, 35, 0).unwrap();
        let reading = clock().read_at(instant);
        assert_eq!(reading.origin.time, "08:35:00");
        assert_eq!(reading.destination.time, "07:35:00");
        assert_eq!(reading.destination.zone, "Asia/Ho_Chi_Minh");
    }

    #[test]
    fn test_zero_padding_across_midnight() {
        let instant = Utc.with_ymd_and_hms(2026, 1, 25, 16, 5, 9).unwrap();
        let reading = clock().read_at(instant);
        assert_eq!(reading.origin.time, "00:05:09");
        assert_eq!(reading.destination.time, "23:05:09");
    }

    #[test]
    fn test_unknown_zone_is_rejected() {
        let mut config = ClockConfig::default();
        config.origin.zone = "Asia/Atlantis".to_string();
        assert!(DualClock::from_config(&config).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_every_second() {
        let clock = clock();
        let start = tokio::time::Instant::now();
        let mut readings = Vec::new();
        clock.run(Some(3), |r| readings.push(r.clone())).await;
        assert_eq!(readings.len(), 3);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
