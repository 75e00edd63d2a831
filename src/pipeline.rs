//! # Orbit pipeline
//!
//! [`OrbitPipeline`] chains the stages of a request:
//!
//! ```text
//! observations ─► select_triplet ─► Gauss IOD ─► state vector ─┬─► orbital elements
//!                                                              └─► Kepler propagation ─► closest approach
//! ```
//!
//! Every stage error is terminal. It is returned as a [`PipelineError`] carrying
//! the failing [`Stage`] and the underlying [`CometFitError`]; no partial result is
//! produced.
//!
//! ## Search window
//!
//! The closest-approach window starts `search_start_offset_days` after the central
//! epoch of the triplet and spans `search_window_days`. When the separation is
//! monotonic over the window, the pipeline may retry on a window of twice the
//! length, up to `max_window_widenings` times (none by default).
use std::fmt;

use hifitime::Epoch;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::closest_approach::{find_closest_approach, ClosestApproach, SearchParams};
use crate::cometfit_errors::CometFitError;
use crate::constants::{ObservationId, Radian};
use crate::ephemeris::{BodyId, PositionProvider};
use crate::geometry::ReferencePlane;
use crate::initial_orbit_determination::gauss::GaussObs;
use crate::initial_orbit_determination::gauss_result::GaussSolution;
use crate::initial_orbit_determination::IODParams;
use crate::kepler::KeplerPropagator;
use crate::observations::{select_triplet, Observation};
use crate::orbit_type::summary::OrbitSummary;
use crate::orbit_type::OrbitalElements;
use crate::state_vector::StateVector;
use crate::time::offset_days;

/// Stage of the pipeline at which a request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Selection,
    ObserverPosition,
    InitialOrbit,
    Elements,
    Propagation,
    ClosestApproach,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Selection => "observation selection",
            Stage::ObserverPosition => "observer position",
            Stage::InitialOrbit => "initial orbit determination",
            Stage::Elements => "orbital elements",
            Stage::Propagation => "propagation",
            Stage::ClosestApproach => "closest approach",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("{stage} failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: CometFitError,
}

impl PipelineError {
    fn at(stage: Stage) -> impl FnOnce(CometFitError) -> PipelineError {
        move |source| PipelineError { stage, source }
    }
}

/// Configuration of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParams {
    pub iod: IODParams,
    pub search: SearchParams,
    pub search_window_days: f64,
    pub search_start_offset_days: f64,
    pub max_window_widenings: usize,
    pub reference_plane: ReferencePlane,
    /// Body whose closest approach is searched.
    pub target: BodyId,
    /// Body at whose centre observations are assumed to be taken.
    pub observer: BodyId,
}

impl Default for PipelineParams {
    fn default() -> Self {
        PipelineParams {
            iod: IODParams::default(),
            search: SearchParams::default(),
            search_window_days: 730.0,
            search_start_offset_days: 0.0,
            max_window_widenings: 0,
            reference_plane: ReferencePlane::Ecliptic,
            target: BodyId::Earth,
            observer: BodyId::Earth,
        }
    }
}

impl PipelineParams {
    pub fn builder() -> PipelineParamsBuilder {
        PipelineParamsBuilder::default()
    }

    pub fn validate(&self) -> Result<(), CometFitError> {
        self.iod.validate()?;
        self.search.validate()?;
        if !(self.search_window_days > 0.0 && self.search_window_days.is_finite()) {
            return Err(CometFitError::InvalidParameter(
                "search_window_days must be finite and > 0".into(),
            ));
        }
        if !self.search_start_offset_days.is_finite() {
            return Err(CometFitError::InvalidParameter(
                "search_start_offset_days must be finite".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`PipelineParams`], validated on [`build`](PipelineParamsBuilder::build).
#[derive(Debug, Clone, Default)]
pub struct PipelineParamsBuilder {
    params: PipelineParams,
}

impl PipelineParamsBuilder {
    pub fn iod(mut self, v: IODParams) -> Self {
        self.params.iod = v;
        self
    }
    pub fn search(mut self, v: SearchParams) -> Self {
        self.params.search = v;
        self
    }
    pub fn search_window_days(mut self, v: f64) -> Self {
        self.params.search_window_days = v;
        self
    }
    pub fn search_start_offset_days(mut self, v: f64) -> Self {
        self.params.search_start_offset_days = v;
        self
    }
    pub fn max_window_widenings(mut self, v: usize) -> Self {
        self.params.max_window_widenings = v;
        self
    }
    pub fn reference_plane(mut self, v: ReferencePlane) -> Self {
        self.params.reference_plane = v;
        self
    }
    pub fn target(mut self, v: BodyId) -> Self {
        self.params.target = v;
        self
    }
    pub fn observer(mut self, v: BodyId) -> Self {
        self.params.observer = v;
        self
    }

    pub fn build(self) -> Result<PipelineParams, CometFitError> {
        self.params.validate()?;
        Ok(self.params)
    }
}

/// Everything a successful run produces.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitResult {
    pub elements: OrbitalElements,
    pub closest_approach: ClosestApproach,
    pub observation_ids_used: [ObservationId; 3],
    /// Heliocentric state at the central epoch, equatorial frame.
    pub state: StateVector,
    pub solution: GaussSolution,
    pub target: BodyId,
}

impl OrbitResult {
    /// Reporting view in AU, degrees and UTC strings.
    pub fn summary(&self) -> OrbitSummary {
        OrbitSummary::new(
            &self.elements,
            &self.closest_approach,
            self.target,
            &self.observation_ids_used,
        )
    }
}

/// Orbit determination and close-approach prediction from angle-only sightings.
pub struct OrbitPipeline<P: PositionProvider> {
    provider: P,
    params: PipelineParams,
}

impl<P: PositionProvider> OrbitPipeline<P> {
    /// Fails with [`CometFitError::InvalidParameter`] for inconsistent parameters.
    pub fn new(provider: P, params: PipelineParams) -> Result<Self, CometFitError> {
        params.validate()?;
        Ok(OrbitPipeline { provider, params })
    }

    pub fn params(&self) -> &PipelineParams {
        &self.params
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Build an observation taken from the centre of the configured observer body,
    /// whose position is read from the provider.
    pub fn observe(
        &self,
        id: ObservationId,
        right_ascension: Radian,
        declination: Radian,
        epoch: Epoch,
    ) -> Result<Observation, PipelineError> {
        Observation::with_provider(
            id,
            right_ascension,
            declination,
            epoch,
            &self.provider,
            self.params.observer,
        )
        .map_err(PipelineError::at(Stage::ObserverPosition))
    }

    /// Estimate the orbit of the body and its closest approach to the target.
    ///
    /// Arguments
    /// -----------------
    /// * `observations`: at least three sightings, in any order; see
    ///   [`select_triplet`] for which three are used.
    ///
    /// Return
    /// ----------
    /// * The [`OrbitResult`], or the first stage error.
    pub fn compute_orbit(
        &self,
        observations: &[Observation],
    ) -> Result<OrbitResult, PipelineError> {
        info!("computing orbit from {} observations", observations.len());

        let triplet = select_triplet(observations).map_err(PipelineError::at(Stage::Selection))?;
        let gauss = GaussObs::from_observations(triplet);
        let solution = gauss
            .solve(&self.params.iod)
            .map_err(PipelineError::at(Stage::InitialOrbit))?;
        let state = solution.state;

        let mu = self.params.iod.gravitational_parameter;
        let elements = OrbitalElements::from_state(&state, mu, self.params.reference_plane)
            .map_err(PipelineError::at(Stage::Elements))?;
        debug!("preliminary orbit:\n{elements}");

        let closest_approach = self.search(&KeplerPropagator::new(state, mu), &state.epoch)?;
        info!(
            "closest approach to {}: {:.0} km at {}",
            self.params.target, closest_approach.distance_km, closest_approach.epoch
        );

        Ok(OrbitResult {
            elements,
            closest_approach,
            observation_ids_used: gauss.ids(),
            state,
            solution,
            target: self.params.target,
        })
    }

    fn search(
        &self,
        body: &KeplerPropagator,
        reference: &Epoch,
    ) -> Result<ClosestApproach, PipelineError> {
        let start = offset_days(reference, self.params.search_start_offset_days);
        let mut window_days = self.params.search_window_days;

        for widening in 0..=self.params.max_window_widenings {
            let end = offset_days(&start, window_days);
            match find_closest_approach(
                body,
                &self.provider,
                self.params.target,
                &start,
                &end,
                &self.params.search,
            ) {
                Err(CometFitError::Search(msg)) if widening < self.params.max_window_widenings => {
                    warn!("{msg} over {window_days} days, widening the search window");
                    window_days *= 2.0;
                }
                Err(err @ CometFitError::Propagation(_)) => {
                    return Err(PipelineError::at(Stage::Propagation)(err))
                }
                other => return other.map_err(PipelineError::at(Stage::ClosestApproach)),
            }
        }

        // max_window_widenings + 1 attempts always end in a return above.
        Err(PipelineError {
            stage: Stage::ClosestApproach,
            source: CometFitError::Search("no local minimum found in window".into()),
        })
    }
}
