//! Resolution strategies, evaluated in priority order by the estimator.
//!
//! Each strategy either produces a [`Signal`] for the resolved venue or
//! reports "no signal" so the next one can try.

use std::sync::Arc;

use campus_core::config::SubVenueWeighting;
use campus_core::{Clock, Liveness, Popularity, Reading};
use chrono::{Datelike, Duration, NaiveDateTime, Timelike};

use crate::catalog::{Venue, VenueDirectory};
use crate::error::CrowdError;
use crate::geo::gaussian_weight;
use crate::query::Target;
use crate::types::{Measurement, ResolutionMethod};

// =============================================================================
// Sampler
// =============================================================================

/// Reads live and historical popularity for single venues.
#[derive(Clone)]
pub struct Sampler {
    directory: Arc<dyn VenueDirectory>,
    clock: Arc<dyn Clock>,
    now_tolerance: Duration,
}

impl Sampler {
    pub fn new(
        directory: Arc<dyn VenueDirectory>,
        clock: Arc<dyn Clock>,
        now_tolerance_minutes: i64,
    ) -> Self {
        Self {
            directory,
            clock,
            now_tolerance: Duration::minutes(now_tolerance_minutes),
        }
    }

    pub fn directory(&self) -> &dyn VenueDirectory {
        self.directory.as_ref()
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    /// Concrete local time for `target` and whether it counts as "now".
    pub fn resolve_target(&self, target: Target) -> (NaiveDateTime, bool) {
        let now = self.now();
        match target {
            Target::Now => (now, true),
            Target::At(at) => (at, (at - now).abs() <= self.now_tolerance),
        }
    }

    /// Live reading when the target is "now" and one exists, otherwise the
    /// historical sample nearest the target hour.
    pub fn measure(&self, venue: &Venue, target: Target) -> Measurement {
        let (at, is_now) = self.resolve_target(target);
        if is_now {
            if let Some(live) = venue.live {
                return Measurement {
                    reading: Reading::Known(live),
                    liveness: Liveness::Live,
                };
            }
        }
        Measurement {
            reading: historical_at(venue, at),
            liveness: Liveness::Historical,
        }
    }
}

/// Historical sample at the nearest hour; minute 30 and later rounds up,
/// possibly into the next day.
pub fn historical_at(venue: &Venue, at: NaiveDateTime) -> Reading {
    let rounded = at + Duration::minutes(30);
    venue
        .weekly
        .sample(rounded.weekday(), rounded.hour())
        .into()
}

// =============================================================================
// Strategies
// =============================================================================

/// A usable estimate produced by one strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signal {
    pub popularity: Popularity,
    pub liveness: Liveness,
    pub samples: usize,
}

/// One step of the crowd-resolution fallback chain.
pub trait ResolutionStrategy: Send + Sync {
    fn method(&self) -> ResolutionMethod;

    /// `Ok(None)` means this strategy has no signal for the venue.
    fn resolve(
        &self,
        venue: &Venue,
        target: Target,
        sampler: &Sampler,
    ) -> Result<Option<Signal>, CrowdError>;
}

/// The venue's own reading.
#[derive(Debug, Default)]
pub struct DirectStrategy;

impl ResolutionStrategy for DirectStrategy {
    fn method(&self) -> ResolutionMethod {
        ResolutionMethod::Direct
    }

    fn resolve(
        &self,
        venue: &Venue,
        target: Target,
        sampler: &Sampler,
    ) -> Result<Option<Signal>, CrowdError> {
        let m = sampler.measure(venue, target);
        Ok(m.reading.popularity().map(|popularity| Signal {
            popularity,
            liveness: m.liveness,
            samples: 1,
        }))
    }
}

/// Blend of the venue's sub-venues, e.g. the stalls inside a student center.
#[derive(Debug, Default)]
pub struct SubVenueStrategy {
    pub weighting: SubVenueWeighting,
}

impl ResolutionStrategy for SubVenueStrategy {
    fn method(&self) -> ResolutionMethod {
        ResolutionMethod::SubVenueAggregate
    }

    fn resolve(
        &self,
        venue: &Venue,
        target: Target,
        sampler: &Sampler,
    ) -> Result<Option<Signal>, CrowdError> {
        let readings: Vec<(Popularity, Liveness, Option<f64>)> = sampler
            .directory()
            .sub_venues(&venue.id)
            .into_iter()
            .filter_map(|sub| {
                let m = sampler.measure(sub, target);
                m.reading
                    .popularity()
                    .map(|p| (p, m.liveness, sub.visit_share))
            })
            .collect();

        let use_shares = self.weighting == SubVenueWeighting::VisitShare
            && readings.iter().all(|(_, _, share)| share.is_some());

        let weighted = readings
            .iter()
            .map(|&(p, live, share)| {
                let w = if use_shares { share.unwrap_or(1.0) } else { 1.0 };
                (p, live, w)
            })
            .collect::<Vec<_>>();

        Ok(blend(&weighted))
    }
}

/// Distance-weighted blend of comparable venues nearby.
#[derive(Debug)]
pub struct AreaStrategy {
    pub radius_m: f64,
    pub sigma_m: f64,
}

impl ResolutionStrategy for AreaStrategy {
    fn method(&self) -> ResolutionMethod {
        ResolutionMethod::AreaEstimate
    }

    fn resolve(
        &self,
        venue: &Venue,
        target: Target,
        sampler: &Sampler,
    ) -> Result<Option<Signal>, CrowdError> {
        let Some(center) = venue.location else {
            return Ok(None);
        };

        let weighted: Vec<(Popularity, Liveness, f64)> = sampler
            .directory()
            .venues()
            .into_iter()
            .filter(|other| other.id != venue.id && other.shares_kind_with(venue))
            .filter_map(|other| {
                let distance = center.distance_m(&other.location?);
                if distance > self.radius_m {
                    return None;
                }
                let m = sampler.measure(other, target);
                m.reading
                    .popularity()
                    .map(|p| (p, m.liveness, gaussian_weight(distance, self.sigma_m)))
            })
            .collect();

        Ok(blend(&weighted))
    }
}

/// Weighted mean of readings. Live only when every contributor is live.
fn blend(readings: &[(Popularity, Liveness, f64)]) -> Option<Signal> {
    if readings.is_empty() {
        return None;
    }
    let (num, den) = readings
        .iter()
        .fold((0.0, 0.0), |(num, den), &(p, _, w)| {
            (num + w * f64::from(p.value()), den + w)
        });
    if den <= 0.0 || !den.is_finite() {
        return None;
    }

    let value = (num / den).round().clamp(0.0, 100.0) as u8;
    let liveness = if readings.iter().all(|(_, l, _)| *l == Liveness::Live) {
        Liveness::Live
    } else {
        Liveness::Historical
    };

    Popularity::new(value).map(|popularity| Signal {
        popularity,
        liveness,
        samples: readings.len(),
    })
}

/// The standard fallback chain: direct, sub-venue, then area.
pub fn default_strategies(
    weighting: SubVenueWeighting,
    radius_m: f64,
    sigma_m: f64,
) -> Vec<Box<dyn ResolutionStrategy>> {
    vec![
        Box::new(DirectStrategy),
        Box::new(SubVenueStrategy { weighting }),
        Box::new(AreaStrategy { radius_m, sigma_m }),
    ]
}
