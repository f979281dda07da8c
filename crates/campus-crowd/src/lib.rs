//! Crowd-level estimation for campus venues.
//!
//! Resolves free-text venue questions to a catalog entry, measures live or
//! historical popularity, falls back to sub-venue and area-weighted
//! estimates when a venue has no reading of its own, and analyzes the
//! busiest hours of a day.

pub mod catalog;
pub mod error;
pub mod estimator;
pub mod geo;
pub mod level;
pub mod peak;
pub mod query;
pub mod strategy;
pub mod types;

pub use catalog::{Venue, VenueCatalog, VenueDirectory, WeeklyHistogram};
pub use error::CrowdError;
pub use estimator::{CrowdEstimator, EstimatorSettings};
pub use geo::GeoPoint;
pub use level::CrowdLevel;
pub use query::{normalize_venue_query, parse_when, CrowdQuery, CrowdQueryKind, Target};
pub use strategy::{
    AreaStrategy, DirectStrategy, ResolutionStrategy, Sampler, Signal, SubVenueStrategy,
};
pub use types::{
    format_hour, HourlySample, Measurement, PeakProfile, PeakWindow, RankedHour, ResolutionMethod,
    VenueEstimate,
};
