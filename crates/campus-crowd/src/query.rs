//! Free-text helpers for crowd questions.
//!
//! Extracts the target time ("now", "at 7pm", "around 19:00 tomorrow"),
//! the kind of crowd question being asked, and the canonical campus venue
//! behind common nicknames.

use std::sync::LazyLock;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

// =============================================================================
// Patterns
// =============================================================================

static NOW_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bnow\b").unwrap());

static TOMORROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\btomorrow\b").unwrap());

static PEAK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:busiest|most\s+crowded|most\s+busy|peak\s+(?:time|hour)s?)\b").unwrap()
});

static CLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:(at|around)\s+)?(\d{1,2})(?::(\d{2}))?\s*(am|pm|o'clock)?\b").unwrap()
});

static VENUE_ALIASES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)\bbusch\b", "Busch Student Center"),
        (
            r"(?i)\bcollege\s+ave(?:nue)?\b|\bcac\b",
            "College Ave Student Center",
        ),
        (r"(?i)\blivingston\b|\blivi\b|\blsc\b", "Livingston Student Center"),
        (r"(?i)\bcook\b", "Cook Student Center"),
        (r"(?i)\bdoug(?:lass)?\b", "Douglass Student Center"),
        (r"(?i)\balexander\b", "Alexander Library"),
    ]
    .into_iter()
    .map(|(p, name)| (Regex::new(p).expect("Invalid venue alias regex"), name))
    .collect()
});

// =============================================================================
// Types
// =============================================================================

/// The moment a crowd question is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "at", rename_all = "snake_case")]
pub enum Target {
    /// The current moment; live readings are eligible.
    Now,
    /// A specific local time.
    At(NaiveDateTime),
}

impl From<Option<NaiveDateTime>> for Target {
    fn from(value: Option<NaiveDateTime>) -> Self {
        value.map_or(Target::Now, Target::At)
    }
}

/// What kind of crowd question the user is asking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrowdQueryKind {
    /// "How busy is Busch right now?"
    Current,
    /// "How busy is Busch at 7pm?"
    SpecificTime,
    /// "When is Busch busiest?"
    PeakTime,
}

impl CrowdQueryKind {
    /// Classify a crowd question by its wording.
    pub fn detect(text: &str) -> Self {
        if PEAK_RE.is_match(text) {
            return CrowdQueryKind::PeakTime;
        }
        if NOW_RE.is_match(text) {
            return CrowdQueryKind::Current;
        }
        if clock_time(text).is_some() || TOMORROW_RE.is_match(text) {
            return CrowdQueryKind::SpecificTime;
        }
        CrowdQueryKind::Current
    }
}

/// Everything the estimator needs from a crowd question.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CrowdQuery {
    pub kind: CrowdQueryKind,
    pub target: Target,
    /// Day a peak-time question is about.
    pub day: NaiveDate,
}

impl CrowdQuery {
    pub fn parse(text: &str, now: NaiveDateTime) -> Self {
        Self {
            kind: CrowdQueryKind::detect(text),
            target: parse_when(text, now),
            day: now.date() + Duration::days(day_offset(text)),
        }
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Days ahead of today the text refers to: 1 for "tomorrow", else 0.
pub fn day_offset(text: &str) -> i64 {
    if TOMORROW_RE.is_match(text) {
        1
    } else {
        0
    }
}

/// Extract the target time from a question.
///
/// "now" always wins. A clock time ("7pm", "at 19:00", "around 7:30 am")
/// is placed on today, or tomorrow when the text says so. "tomorrow" with
/// no clock time means this time tomorrow. Anything else means now.
pub fn parse_when(text: &str, now: NaiveDateTime) -> Target {
    if NOW_RE.is_match(text) {
        return Target::Now;
    }
    let offset = day_offset(text);
    match clock_time(text) {
        Some(time) => Target::At((now.date() + Duration::days(offset)).and_time(time)),
        None if offset > 0 => Target::At(now + Duration::days(offset)),
        None => Target::Now,
    }
}

/// First explicit clock time in the text.
///
/// A bare number only counts when it is introduced by "at"/"around", carries
/// minutes, or has an am/pm suffix, so "2 people" is not a time.
fn clock_time(text: &str) -> Option<NaiveTime> {
    CLOCK_RE.captures_iter(text).find_map(|caps| {
        let lead = caps.get(1).is_some();
        let minutes = caps.get(3).map(|m| m.as_str());
        let suffix = caps.get(4).map(|m| m.as_str().to_ascii_lowercase());
        if !lead && minutes.is_none() && suffix.is_none() {
            return None;
        }

        let mut hour: u32 = caps.get(2)?.as_str().parse().ok()?;
        let minute: u32 = minutes.map_or(Some(0), |m| m.parse().ok())?;
        match suffix.as_deref() {
            Some("pm") if (1..=12).contains(&hour) => {
                if hour < 12 {
                    hour += 12;
                }
            }
            Some("am") if (1..=12).contains(&hour) => {
                if hour == 12 {
                    hour = 0;
                }
            }
            Some("am") | Some("pm") => return None,
            _ => {}
        }
        NaiveTime::from_hms_opt(hour, minute, 0)
    })
}

/// Canonical venue name for a well-known campus nickname in the text.
pub fn normalize_venue_query(text: &str) -> Option<&'static str> {
    VENUE_ALIASES
        .iter()
        .find(|(re, _)| re.is_match(text))
        .map(|(_, name)| *name)
}
