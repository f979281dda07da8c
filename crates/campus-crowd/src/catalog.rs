//! Venue directory and the JSON catalog that backs it.
//!
//! The catalog stands in for a places/popular-times provider: each venue
//! carries an optional live reading and a weekly histogram of 24 hourly
//! popularity samples per weekday.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use campus_core::Popularity;
use chrono::Weekday;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::CrowdError;
use crate::geo::GeoPoint;
use crate::query::normalize_venue_query;

// =============================================================================
// Venue model
// =============================================================================

/// Hourly popularity samples for each weekday.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeeklyHistogram {
    days: HashMap<Weekday, Vec<Option<Popularity>>>,
}

impl WeeklyHistogram {
    /// Historical sample for `weekday` at `hour`, if one was recorded.
    pub fn sample(&self, weekday: Weekday, hour: u32) -> Option<Popularity> {
        self.days
            .get(&weekday)
            .and_then(|hours| hours.get(hour as usize).copied().flatten())
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Set all 24 samples for one weekday.
    pub fn with_day(mut self, weekday: Weekday, hours: Vec<Option<Popularity>>) -> Self {
        self.days.insert(weekday, hours);
        self
    }
}

/// A place whose crowd level can be asked about.
#[derive(Clone, Debug, PartialEq)]
pub struct Venue {
    pub id: String,
    pub name: String,
    pub aliases: Vec<String>,
    /// Category tags such as `student_center`, `dining`, `gym`.
    pub kinds: Vec<String>,
    pub location: Option<GeoPoint>,
    /// Enclosing place, for sub-venues such as a food court stall.
    pub parent: Option<String>,
    /// Fraction of the parent's visits this sub-venue accounts for.
    pub visit_share: Option<f64>,
    /// Current reading, when the provider reports one.
    pub live: Option<Popularity>,
    pub weekly: WeeklyHistogram,
}

impl Venue {
    pub fn shares_kind_with(&self, other: &Venue) -> bool {
        self.kinds.iter().any(|k| other.kinds.contains(k))
    }
}

/// Lookup surface the estimator needs from a venue provider.
pub trait VenueDirectory: Send + Sync {
    /// Resolve free text to a venue.
    fn find(&self, query: &str) -> Option<&Venue>;

    fn get(&self, id: &str) -> Option<&Venue>;

    /// Venues whose parent is `id`.
    fn sub_venues(&self, id: &str) -> Vec<&Venue>;

    fn venues(&self) -> Vec<&Venue>;
}

// =============================================================================
// JSON catalog
// =============================================================================

#[derive(Debug, Deserialize, Serialize)]
struct CatalogFile {
    venues: Vec<VenueRecord>,
}

#[derive(Debug, Deserialize, Serialize)]
struct VenueRecord {
    id: String,
    name: String,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    kinds: Vec<String>,
    #[serde(default)]
    location: Option<GeoPoint>,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    visit_share: Option<f64>,
    #[serde(default)]
    live: Option<Popularity>,
    /// Weekday name (e.g. "monday") to 24 hourly samples.
    #[serde(default)]
    weekly: HashMap<String, Vec<Option<Popularity>>>,
}

impl VenueRecord {
    fn into_venue(self) -> Result<Venue, CrowdError> {
        if let Some(share) = self.visit_share {
            if !(share.is_finite() && share > 0.0 && share <= 1.0) {
                return Err(CrowdError::Catalog(format!(
                    "venue '{}' has visit_share {share} outside (0, 1]",
                    self.id
                )));
            }
        }

        let mut weekly = WeeklyHistogram::default();
        for (day, hours) in self.weekly {
            let weekday: Weekday = day.parse().map_err(|_| {
                CrowdError::Catalog(format!("venue '{}' has unknown weekday '{day}'", self.id))
            })?;
            if hours.len() != 24 {
                return Err(CrowdError::Catalog(format!(
                    "venue '{}' has {} samples for {day}, expected 24",
                    self.id,
                    hours.len()
                )));
            }
            weekly = weekly.with_day(weekday, hours);
        }

        Ok(Venue {
            id: self.id,
            name: self.name,
            aliases: self.aliases,
            kinds: self.kinds,
            location: self.location,
            parent: self.parent,
            visit_share: self.visit_share,
            live: self.live,
            weekly,
        })
    }
}

/// A venue name or alias matched as whole words.
#[derive(Debug, Clone)]
struct Phrase {
    venue: usize,
    len: usize,
    pattern: Regex,
}

impl Phrase {
    fn new(venue: usize, text: &str) -> Result<Self, CrowdError> {
        let pattern = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(text.trim())))
            .map_err(|e| CrowdError::Catalog(format!("bad venue phrase '{text}': {e}")))?;
        Ok(Self {
            venue,
            len: text.trim().len(),
            pattern,
        })
    }
}

/// In-memory venue directory loaded from a JSON file.
#[derive(Debug, Clone, Default)]
pub struct VenueCatalog {
    venues: Vec<Venue>,
    by_id: HashMap<String, usize>,
    phrases: Vec<Phrase>,
}

impl VenueCatalog {
    /// Load and validate a catalog file.
    pub fn load(path: &Path) -> Result<Self, CrowdError> {
        let content = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&content)?;
        info!(path = %path.display(), venues = catalog.len(), "Venue catalog loaded");
        Ok(catalog)
    }

    /// Parse a catalog document. Popularity values outside 0..=100 are
    /// rejected rather than clamped.
    pub fn from_json(content: &str) -> Result<Self, CrowdError> {
        let file: CatalogFile = serde_json::from_str(content)?;
        let venues = file
            .venues
            .into_iter()
            .map(VenueRecord::into_venue)
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_venues(venues)
    }

    /// Build a catalog from already-constructed venues.
    pub fn from_venues(venues: Vec<Venue>) -> Result<Self, CrowdError> {
        let mut by_id = HashMap::with_capacity(venues.len());
        for (idx, venue) in venues.iter().enumerate() {
            if by_id.insert(venue.id.clone(), idx).is_some() {
                return Err(CrowdError::Catalog(format!(
                    "duplicate venue id '{}'",
                    venue.id
                )));
            }
        }

        let ids: HashSet<&str> = venues.iter().map(|v| v.id.as_str()).collect();
        for venue in &venues {
            if let Some(parent) = &venue.parent {
                if parent == &venue.id || !ids.contains(parent.as_str()) {
                    return Err(CrowdError::Catalog(format!(
                        "venue '{}' has unknown parent '{parent}'",
                        venue.id
                    )));
                }
            }
        }

        let mut phrases = Vec::new();
        for (idx, venue) in venues.iter().enumerate() {
            for text in std::iter::once(&venue.name).chain(venue.aliases.iter()) {
                if !text.trim().is_empty() {
                    phrases.push(Phrase::new(idx, text)?);
                }
            }
        }

        Ok(Self {
            venues,
            by_id,
            phrases,
        })
    }

    pub fn len(&self) -> usize {
        self.venues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.venues.is_empty()
    }

    /// Venue whose name or alias appears in `query` as whole words,
    /// preferring the longest such phrase.
    fn best_phrase_match(&self, query: &str) -> Option<&Venue> {
        self.phrases
            .iter()
            .filter(|p| p.pattern.is_match(query))
            .max_by(|a, b| a.len.cmp(&b.len).then(b.venue.cmp(&a.venue)))
            .map(|p| &self.venues[p.venue])
    }

    fn by_name(&self, name: &str) -> Option<&Venue> {
        self.venues
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(name))
    }
}

impl VenueDirectory for VenueCatalog {
    fn find(&self, query: &str) -> Option<&Venue> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return None;
        }
        self.get(trimmed)
            .or_else(|| self.best_phrase_match(trimmed))
            .or_else(|| normalize_venue_query(trimmed).and_then(|name| self.by_name(name)))
    }

    fn get(&self, id: &str) -> Option<&Venue> {
        self.by_id.get(id).map(|&idx| &self.venues[idx])
    }

    fn sub_venues(&self, id: &str) -> Vec<&Venue> {
        self.venues
            .iter()
            .filter(|v| v.parent.as_deref() == Some(id))
            .collect()
    }

    fn venues(&self) -> Vec<&Venue> {
        self.venues.iter().collect()
    }
}
