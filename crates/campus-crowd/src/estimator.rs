//! Crowd-level estimator: venue resolution, point measurements, and peak
//! profiles.

use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use campus_core::config::{CrowdConfig, SubVenueWeighting};
use campus_core::{Clock, Reading};
use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info};

use crate::catalog::{Venue, VenueCatalog, VenueDirectory};
use crate::error::CrowdError;
use crate::peak::{peak_window, rank_top};
use crate::query::Target;
use crate::strategy::{default_strategies, historical_at, ResolutionStrategy, Sampler};
use crate::types::{HourlySample, Measurement, PeakProfile, VenueEstimate};

/// Number of ranked hours kept in a peak profile.
const TOP_HOURS: usize = 3;

/// Tunables for the estimator, usually taken from [`CrowdConfig`].
#[derive(Debug, Clone)]
pub struct EstimatorSettings {
    pub high_threshold: u8,
    pub operating_hours: Range<u32>,
    pub area_radius_m: f64,
    pub area_sigma_m: f64,
    pub now_tolerance_minutes: i64,
    pub sub_venue_weighting: SubVenueWeighting,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self::from(&CrowdConfig::default())
    }
}

impl From<&CrowdConfig> for EstimatorSettings {
    fn from(config: &CrowdConfig) -> Self {
        Self {
            high_threshold: config.high_threshold,
            operating_hours: config.operating_start_hour..config.operating_end_hour,
            area_radius_m: config.area_radius_m,
            area_sigma_m: config.area_sigma_m,
            now_tolerance_minutes: config.now_tolerance_minutes,
            sub_venue_weighting: config.sub_venue_weighting,
        }
    }
}

/// Resolves venue questions against a [`VenueDirectory`] using an ordered
/// list of strategies.
pub struct CrowdEstimator {
    sampler: Sampler,
    strategies: Vec<Box<dyn ResolutionStrategy>>,
    settings: EstimatorSettings,
}

impl CrowdEstimator {
    /// Estimator with the standard direct, sub-venue, area chain.
    pub fn new(
        directory: Arc<dyn VenueDirectory>,
        clock: Arc<dyn Clock>,
        settings: EstimatorSettings,
    ) -> Self {
        let strategies = default_strategies(
            settings.sub_venue_weighting,
            settings.area_radius_m,
            settings.area_sigma_m,
        );
        Self::with_strategies(directory, clock, settings, strategies)
    }

    pub fn with_strategies(
        directory: Arc<dyn VenueDirectory>,
        clock: Arc<dyn Clock>,
        settings: EstimatorSettings,
        strategies: Vec<Box<dyn ResolutionStrategy>>,
    ) -> Self {
        let sampler = Sampler::new(directory, clock, settings.now_tolerance_minutes);
        Self {
            sampler,
            strategies,
            settings,
        }
    }

    /// Load the catalog named in `config` and build an estimator over it.
    pub fn from_config(
        config: &CrowdConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CrowdError> {
        let catalog = VenueCatalog::load(Path::new(&config.catalog_path))?;
        Ok(Self::new(Arc::new(catalog), clock, config.into()))
    }

    pub fn settings(&self) -> &EstimatorSettings {
        &self.settings
    }

    /// Current local time according to the estimator's clock.
    pub fn now(&self) -> NaiveDateTime {
        self.sampler.now()
    }

    fn find(&self, venue_query: &str) -> Result<&Venue, CrowdError> {
        self.sampler
            .directory()
            .find(venue_query)
            .ok_or_else(|| CrowdError::VenueNotFound(venue_query.trim().to_string()))
    }

    fn get(&self, venue_id: &str) -> Result<&Venue, CrowdError> {
        self.sampler
            .directory()
            .get(venue_id)
            .ok_or_else(|| CrowdError::VenueNotFound(venue_id.to_string()))
    }

    /// Resolve free text to a venue and estimate how busy it is at `target`.
    ///
    /// Strategies run in priority order and the first signal wins. Fails with
    /// [`CrowdError::VenueNotFound`] when the text matches no venue or no
    /// strategy has a signal.
    pub fn resolve(&self, venue_query: &str, target: Target) -> Result<VenueEstimate, CrowdError> {
        let venue = self.find(venue_query)?;
        let (at, current) = self.sampler.resolve_target(target);

        for strategy in &self.strategies {
            let method = strategy.method();
            match strategy.resolve(venue, target, &self.sampler)? {
                Some(signal) => {
                    info!(
                        venue = %venue.id,
                        method = method.as_str(),
                        popularity = signal.popularity.value(),
                        samples = signal.samples,
                        "Crowd estimate resolved"
                    );
                    return Ok(VenueEstimate {
                        venue_id: venue.id.clone(),
                        name: venue.name.clone(),
                        method,
                        reading: Reading::Known(signal.popularity),
                        liveness: signal.liveness,
                        target: at,
                        current,
                        samples: signal.samples,
                    });
                }
                None => debug!(venue = %venue.id, method = method.as_str(), "No signal"),
            }
        }

        Err(CrowdError::VenueNotFound(venue.name.clone()))
    }

    /// Single reading for a known venue id. A missing sample is
    /// [`Reading::Unknown`], not an error.
    pub fn measure_at(&self, venue_id: &str, target: Target) -> Result<Measurement, CrowdError> {
        let venue = self.get(venue_id)?;
        Ok(self.sampler.measure(venue, target))
    }

    /// Historical profile of a venue across the operating window on `day`.
    pub fn build_peak_profile(
        &self,
        venue_id: &str,
        day: NaiveDate,
    ) -> Result<PeakProfile, CrowdError> {
        let venue = self.get(venue_id)?;
        Ok(self.profile_for(venue, day))
    }

    /// Resolve free text to a venue, then build its peak profile.
    pub fn peak_profile(&self, venue_query: &str, day: NaiveDate) -> Result<PeakProfile, CrowdError> {
        let venue = self.find(venue_query)?;
        Ok(self.profile_for(venue, day))
    }

    fn profile_for(&self, venue: &Venue, day: NaiveDate) -> PeakProfile {
        let samples: Vec<HourlySample> = self
            .settings
            .operating_hours
            .clone()
            .filter_map(|hour| day.and_hms_opt(hour, 0, 0).map(|at| (hour, at)))
            .map(|(hour, at)| HourlySample {
                hour,
                reading: historical_at(venue, at),
            })
            .collect();

        let top = rank_top(&samples, TOP_HOURS);
        let peak_window = peak_window(&samples, self.settings.high_threshold);
        debug!(
            venue = %venue.id,
            day = %day,
            known = samples.iter().filter(|s| s.reading.is_known()).count(),
            "Peak profile built"
        );

        PeakProfile {
            venue_id: venue.id.clone(),
            name: venue.name.clone(),
            day,
            samples,
            top,
            peak_window,
        }
    }
}

impl std::fmt::Debug for CrowdEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrowdEstimator")
            .field("strategies", &self.strategies.len())
            .field("settings", &self.settings)
            .finish()
    }
}
