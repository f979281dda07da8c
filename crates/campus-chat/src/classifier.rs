//! Keyword intent classifier.
//!
//! Labels a turn with every data category whose patterns match. A
//! model-backed classifier can replace it behind the [`Classifier`] trait.

use std::sync::LazyLock;

use campus_core::{Category, Intent};
use regex::Regex;

use crate::adapters::Classifier;
use crate::error::ClassifierError;

// =============================================================================
// Compiled patterns
// =============================================================================

static CATEGORY_PATTERNS: LazyLock<Vec<(Category, Vec<Regex>)>> = LazyLock::new(|| {
    let mk = |pats: &[&str]| -> Vec<Regex> {
        pats.iter()
            .map(|p| Regex::new(p).expect("Invalid category regex"))
            .collect()
    };

    vec![
        (
            Category::CrowdLevel,
            mk(&[
                r"(?i)\bbusy\b",
                r"(?i)\bbusiest\b",
                r"(?i)\bcrowd(?:ed|s)?\b",
                r"(?i)\bpacked\b",
                r"(?i)\bpeak\s+(?:time|hour)s?\b",
                r"(?i)\bhow\s+many\s+people\b",
                r"(?i)\bbusyness\b",
            ]),
        ),
        (
            Category::DiningMenu,
            mk(&[
                r"(?i)\bmenus?\b",
                r"(?i)\bserving\b",
                r"(?i)\bwhat'?s\s+for\s+(?:breakfast|brunch|lunch|dinner)\b",
                r"(?i)\bwhat\s+(?:food|dishes)\b",
                r"(?i)\b(?:vegan|vegetarian|gluten[\s-]free)\b",
            ]),
        ),
        (
            Category::DiningHours,
            mk(&[
                r"(?i)\b(?:dining|restaurants?|cafe|food\s+court)\b.*\b(?:hours?|open|close[sd]?)\b",
                r"(?i)\b(?:hours?|open|close[sd]?)\b.*\b(?:dining|restaurants?|cafe|food\s+court)\b",
                r"(?i)\bplaces?\s+to\s+eat\b",
            ]),
        ),
        (
            Category::GymHours,
            mk(&[
                r"(?i)\bgyms?\b",
                r"(?i)\brec(?:reation)?\s+center\b",
                r"(?i)\bfitness\b",
                r"(?i)\bwork\s*out\b",
            ]),
        ),
        (
            Category::LibraryHours,
            mk(&[r"(?i)\blibrar(?:y|ies)\b", r"(?i)\bstudy\s+space\b"]),
        ),
        (
            Category::Events,
            mk(&[
                r"(?i)\bevents?\b",
                r"(?i)\bhappening\b",
                r"(?i)\bconcerts?\b",
                r"(?i)\bthings\s+to\s+do\b",
                r"(?i)\bthis\s+weekend\b",
            ]),
        ),
    ]
});

/// Regex-based classifier over the campus categories.
#[derive(Debug, Default, Clone)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl Classifier for KeywordClassifier {
    fn classify(&self, text: &str) -> Result<Intent, ClassifierError> {
        Ok(CATEGORY_PATTERNS
            .iter()
            .filter(|(_, patterns)| patterns.iter().any(|re| re.is_match(text)))
            .map(|(category, _)| *category)
            .collect())
    }
}
