use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Categories and intent
// =============================================================================

/// A data-source category a user turn may need.
///
/// The declaration order is the canonical slot order inside a context, so
/// reordering variants changes output ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// How crowded a venue is, now or at a given time.
    CrowdLevel,
    /// Dining hall menus.
    DiningMenu,
    /// Dining hall, restaurant, and retail hours.
    DiningHours,
    /// Gym hours and facilities.
    GymHours,
    /// Library hours.
    LibraryHours,
    /// Campus events.
    Events,
}

impl Category {
    /// Every category in canonical order.
    pub const ALL: [Category; 6] = [
        Category::CrowdLevel,
        Category::DiningMenu,
        Category::DiningHours,
        Category::GymHours,
        Category::LibraryHours,
        Category::Events,
    ];

    /// Human-readable label used in prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Category::CrowdLevel => "Venue crowd levels",
            Category::DiningMenu => "Dining menus",
            Category::DiningHours => "Dining hall and restaurant hours",
            Category::GymHours => "Gym hours",
            Category::LibraryHours => "Library hours",
            Category::Events => "Campus events",
        }
    }

    /// Which kind of backend serves this category.
    pub fn source_kind(&self) -> SourceKind {
        match self {
            Category::CrowdLevel => SourceKind::CrowdLevel,
            _ => SourceKind::StructuredQuery,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::CrowdLevel => "crowd_level",
            Category::DiningMenu => "dining_menu",
            Category::DiningHours => "dining_hours",
            Category::GymHours => "gym_hours",
            Category::LibraryHours => "library_hours",
            Category::Events => "events",
        };
        f.write_str(s)
    }
}

/// Backend family behind a category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// The crowd-level estimator.
    CrowdLevel,
    /// The structured-record adapter.
    StructuredQuery,
}

/// The set of categories a turn needs. Empty means a general question.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Intent {
    categories: BTreeSet<Category>,
}

impl Intent {
    /// An intent needing no data source.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn contains(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }

    /// Categories in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = Category> + '_ {
        self.categories.iter().copied()
    }
}

impl FromIterator<Category> for Intent {
    fn from_iter<I: IntoIterator<Item = Category>>(iter: I) -> Self {
        Self {
            categories: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("general");
        }
        let labels: Vec<String> = self.iter().map(|c| c.to_string()).collect();
        f.write_str(&labels.join(", "))
    }
}

// =============================================================================
// Popularity readings
// =============================================================================

/// A crowd popularity percentage, guaranteed to lie in `0..=100`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Popularity(u8);

impl Popularity {
    /// Returns `None` for values above 100.
    pub fn new(value: u8) -> Option<Self> {
        (value <= 100).then_some(Self(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

/// A popularity value outside `0..=100`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("popularity {0} is outside 0..=100")]
pub struct PopularityOutOfRange(pub i64);

impl TryFrom<i64> for Popularity {
    type Error = PopularityOutOfRange;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .and_then(Popularity::new)
            .ok_or(PopularityOutOfRange(value))
    }
}

impl From<Popularity> for u8 {
    fn from(p: Popularity) -> Self {
        p.0
    }
}

impl fmt::Display for Popularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// A popularity reading, or the explicit absence of one.
///
/// Serializes as the bare number or `null`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reading {
    Known(Popularity),
    Unknown,
}

impl Reading {
    pub fn popularity(&self) -> Option<Popularity> {
        match self {
            Reading::Known(p) => Some(*p),
            Reading::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Reading::Known(_))
    }
}

impl From<Option<Popularity>> for Reading {
    fn from(value: Option<Popularity>) -> Self {
        value.map_or(Reading::Unknown, Reading::Known)
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Known(p) => p.fmt(f),
            Reading::Unknown => f.write_str("unavailable"),
        }
    }
}

/// Whether a reading reflects the venue right now or its weekly pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    Live,
    Historical,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_order_is_declaration_order() {
        let mut shuffled = vec![Category::Events, Category::CrowdLevel, Category::GymHours];
        shuffled.sort();
        assert_eq!(
            shuffled,
            vec![Category::CrowdLevel, Category::GymHours, Category::Events]
        );
    }

    #[test]
    fn test_category_source_kind() {
        assert_eq!(Category::CrowdLevel.source_kind(), SourceKind::CrowdLevel);
        for c in &Category::ALL[1..] {
            assert_eq!(c.source_kind(), SourceKind::StructuredQuery);
        }
    }

    #[test]
    fn test_intent_dedups_and_orders() {
        let intent: Intent = [Category::Events, Category::DiningMenu, Category::Events]
            .into_iter()
            .collect();
        assert_eq!(intent.len(), 2);
        let ordered: Vec<Category> = intent.iter().collect();
        assert_eq!(ordered, vec![Category::DiningMenu, Category::Events]);
    }

    #[test]
    fn test_intent_display() {
        assert_eq!(Intent::empty().to_string(), "general");
        let intent: Intent = [Category::GymHours, Category::CrowdLevel].into_iter().collect();
        assert_eq!(intent.to_string(), "crowd_level, gym_hours");
    }

    #[test]
    fn test_intent_serializes_as_list() {
        let intent: Intent = [Category::DiningHours].into_iter().collect();
        let json = serde_json::to_string(&intent).unwrap();
        assert_eq!(json, r#"["dining_hours"]"#);
    }

    #[test]
    fn test_popularity_bounds() {
        assert!(Popularity::new(0).is_some());
        assert!(Popularity::new(100).is_some());
        assert!(Popularity::new(101).is_none());
        assert!(Popularity::try_from(-1).is_err());
        assert!(Popularity::try_from(250).is_err());
        assert_eq!(Popularity::try_from(42).unwrap().value(), 42);
    }

    #[test]
    fn test_popularity_deserialize_rejects_out_of_range() {
        let ok: Popularity = serde_json::from_str("85").unwrap();
        assert_eq!(ok.value(), 85);
        assert!(serde_json::from_str::<Popularity>("101").is_err());
        assert!(serde_json::from_str::<Popularity>("-5").is_err());
    }

    #[test]
    fn test_reading_serialization() {
        let known = Reading::Known(Popularity::new(40).unwrap());
        assert_eq!(serde_json::to_string(&known).unwrap(), "40");
        assert_eq!(serde_json::to_string(&Reading::Unknown).unwrap(), "null");
        let back: Reading = serde_json::from_str("null").unwrap();
        assert_eq!(back, Reading::Unknown);
    }

    #[test]
    fn test_reading_display() {
        assert_eq!(Reading::Known(Popularity::new(7).unwrap()).to_string(), "7%");
        assert_eq!(Reading::Unknown.to_string(), "unavailable");
    }
}
