//! The merged, read-only result of one dispatch.
//!
//! A [`Context`] always carries exactly one slot per intent category, in
//! category order, and knows how to render itself as the prompt for the
//! generative stage.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use campus_core::{Category, Intent, Liveness};
use campus_crowd::{format_hour, PeakProfile, ResolutionMethod, VenueEstimate};

use crate::adapters::SourcePayload;
use crate::error::SourceError;

/// Outcome of one data-source call.
pub type SlotResult = Result<SourcePayload, SourceError>;

/// Ordered bundle of the user's text, the intent, and every slot result.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    text: String,
    intent: Intent,
    slots: BTreeMap<Category, SlotResult>,
    voice: Option<usize>,
}

impl Context {
    /// Context for a general question with no data sources.
    pub fn general(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            intent: Intent::empty(),
            slots: BTreeMap::new(),
            voice: None,
        }
    }

    /// Build from completed slots. Categories of `intent` without a slot
    /// are filled with an unavailable marker and slots outside the intent
    /// are dropped, so the slot set always equals the intent.
    pub fn from_slots(
        text: impl Into<String>,
        intent: Intent,
        mut slots: BTreeMap<Category, SlotResult>,
    ) -> Self {
        slots.retain(|category, _| intent.contains(*category));
        for category in intent.iter() {
            slots.entry(category).or_insert_with(|| {
                Err(SourceError::UpstreamUnavailable {
                    category,
                    reason: "no result was produced".to_string(),
                })
            });
        }
        Self {
            text: text.into(),
            intent,
            slots,
            voice: None,
        }
    }

    /// Ask for a short spoken answer of at most `sentence_limit` sentences.
    pub fn with_voice(mut self, sentence_limit: usize) -> Self {
        self.voice = Some(sentence_limit.max(1));
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn intent(&self) -> &Intent {
        &self.intent
    }

    /// Sentence limit when the answer will be spoken.
    pub fn voice(&self) -> Option<usize> {
        self.voice
    }

    pub fn slot(&self, category: Category) -> Option<&SlotResult> {
        self.slots.get(&category)
    }

    /// Slots in category order.
    pub fn slots(&self) -> impl Iterator<Item = (Category, &SlotResult)> {
        self.slots.iter().map(|(c, r)| (*c, r))
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Render the prompt handed to the generative service.
    pub fn render_prompt(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "User Question: {}", self.text);
        let _ = writeln!(out);
        if self.intent.is_empty() {
            let _ = writeln!(out, "Identified Categories: none (general question)");
        } else {
            let labels: Vec<&str> = self.intent.iter().map(|c| c.label()).collect();
            let _ = writeln!(out, "Identified Categories: {}", labels.join(", "));
        }

        for (category, result) in self.slots() {
            let _ = writeln!(out);
            let _ = writeln!(out, "[{}]", category.label());
            let _ = writeln!(out, "{}", describe_slot(category, result));
        }

        let _ = writeln!(out);
        match self.voice {
            Some(limit) => {
                let _ = write!(
                    out,
                    "Please answer the user's question for a spoken reply: at most {limit} \
                     short sentences, plain conversational language, no markdown, lists, \
                     or emoji."
                );
            }
            None => {
                let _ = write!(out, "Please provide a helpful response to the user's question.");
            }
        }
        out
    }
}

/// One-paragraph description of a slot. Failures become explicit notes
/// and unknown crowd data is never given a number.
pub fn describe_slot(category: Category, result: &SlotResult) -> String {
    match result {
        Ok(SourcePayload::Crowd(estimate)) => describe_estimate(estimate),
        Ok(SourcePayload::Peak(profile)) => describe_profile(profile),
        Ok(SourcePayload::Records(records)) if records.is_empty() => {
            format!("Note: no {} records matched.", category.label().to_lowercase())
        }
        Ok(SourcePayload::Records(records)) => {
            let body = serde_json::to_string_pretty(records).unwrap_or_else(|_| "[]".to_string());
            format!("Database Results:\n{body}")
        }
        Err(SourceError::VenueNotFound { query }) => format!(
            "Note: crowd data unavailable; no campus venue matched \"{query}\"."
        ),
        Err(err) if category == Category::CrowdLevel => {
            format!("Note: crowd data unavailable ({err}).")
        }
        Err(SourceError::DataSourceNotConfigured { .. }) => format!(
            "Note: {} data is not available; the database is not set up yet.",
            category.label().to_lowercase()
        ),
        Err(err) => format!(
            "Note: {} data is not available right now ({err}).",
            category.label().to_lowercase()
        ),
    }
}

fn describe_estimate(estimate: &VenueEstimate) -> String {
    let mut line = estimate.summary();
    if estimate.reading.is_known() {
        line.push_str(match estimate.liveness {
            Liveness::Live => " (live reading)",
            Liveness::Historical => " (typical for this time)",
        });
        match estimate.method {
            ResolutionMethod::Direct => {}
            ResolutionMethod::SubVenueAggregate => {
                let _ = write!(line, "; estimated from {} venues inside it", estimate.samples);
            }
            ResolutionMethod::AreaEstimate => {
                let _ = write!(line, "; estimated from {} nearby venues", estimate.samples);
            }
        }
    }
    line.push('.');
    line
}

fn describe_profile(profile: &PeakProfile) -> String {
    let mut line = profile.summary();
    line.push('.');
    if profile.top.len() > 1 {
        let hours: Vec<String> = profile
            .top
            .iter()
            .map(|h| format!("{} ({}%)", format_hour(h.hour), h.popularity.value()))
            .collect();
        let _ = write!(line, " Busiest hours: {}.", hours.join(", "));
    }
    line
}
