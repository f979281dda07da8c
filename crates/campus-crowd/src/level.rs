//! Display buckets for popularity readings.

use std::fmt;

use campus_core::Reading;
use serde::{Deserialize, Serialize};

/// Coarse crowd level shown to users. Never stored or converted back into
/// a number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrowdLevel {
    Light,
    Medium,
    High,
    VeryHigh,
    Unknown,
}

impl CrowdLevel {
    pub fn from_reading(reading: Reading) -> Self {
        match reading.popularity().map(|p| p.value()) {
            None => CrowdLevel::Unknown,
            Some(v) if v < 30 => CrowdLevel::Light,
            Some(v) if v < 60 => CrowdLevel::Medium,
            Some(v) if v < 85 => CrowdLevel::High,
            Some(_) => CrowdLevel::VeryHigh,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CrowdLevel::Light => "light",
            CrowdLevel::Medium => "medium",
            CrowdLevel::High => "high",
            CrowdLevel::VeryHigh => "very high",
            CrowdLevel::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CrowdLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
