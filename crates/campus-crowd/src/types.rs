use campus_core::{Liveness, Popularity, Reading};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::level::CrowdLevel;

/// Which strategy produced an estimate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    Direct,
    SubVenueAggregate,
    AreaEstimate,
}

impl ResolutionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionMethod::Direct => "direct",
            ResolutionMethod::SubVenueAggregate => "sub_venue_aggregate",
            ResolutionMethod::AreaEstimate => "area_estimate",
        }
    }
}

/// A single reading for one venue at one moment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    pub reading: Reading,
    pub liveness: Liveness,
}

/// Crowd estimate for a resolved venue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VenueEstimate {
    pub venue_id: String,
    pub name: String,
    pub method: ResolutionMethod,
    pub reading: Reading,
    pub liveness: Liveness,
    /// Local time the estimate answers for.
    pub target: NaiveDateTime,
    /// Whether the target counted as "now".
    pub current: bool,
    /// Number of readings that contributed.
    pub samples: usize,
}

impl VenueEstimate {
    pub fn level(&self) -> CrowdLevel {
        CrowdLevel::from_reading(self.reading)
    }

    /// One-line human readable summary.
    pub fn summary(&self) -> String {
        let when = if self.current {
            "right now".to_string()
        } else {
            format!("at {}", format_hour_minute(self.target.time()))
        };
        match self.reading {
            Reading::Known(p) => format!(
                "{} is {}% busy ({}) {}",
                self.name,
                p.value(),
                self.level(),
                when
            ),
            Reading::Unknown => format!("{}: crowd data unavailable {}", self.name, when),
        }
    }
}

/// One sampled hour of a peak profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlySample {
    pub hour: u32,
    pub reading: Reading,
}

/// A ranked busy hour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedHour {
    pub hour: u32,
    pub popularity: Popularity,
}

/// Inclusive range of hours that are typically busy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

/// Historical busyness across a venue's operating window for one day.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeakProfile {
    pub venue_id: String,
    pub name: String,
    pub day: NaiveDate,
    pub samples: Vec<HourlySample>,
    /// Up to three busiest hours, busiest first.
    pub top: Vec<RankedHour>,
    pub peak_window: Option<PeakWindow>,
}

impl PeakProfile {
    pub fn summary(&self) -> String {
        let Some(busiest) = self.top.first() else {
            return format!("No historical busyness data available for {}", self.name);
        };
        let mut out = format!(
            "{} is typically busiest at {} ({}% busy)",
            self.name,
            format_hour(busiest.hour),
            busiest.popularity.value()
        );
        if let Some(window) = self.peak_window {
            if window.end_hour > window.start_hour {
                out.push_str(&format!(
                    ". Peak busy period: {} - {}",
                    format_hour(window.start_hour),
                    format_hour(window.end_hour)
                ));
            }
        }
        out
    }
}

/// "2:00 PM" style clock text.
pub fn format_hour(hour: u32) -> String {
    NaiveTime::from_hms_opt(hour % 24, 0, 0)
        .map(format_hour_minute)
        .unwrap_or_default()
}

fn format_hour_minute(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}
