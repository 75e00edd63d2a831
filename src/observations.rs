//! # Angular observations
//!
//! An [`Observation`] is one sighting of the comet: a direction on the sky, the
//! UTC instant it was taken, and the heliocentric position of the observer at
//! that instant. Records are immutable once built; the storage layer that owns
//! them only hands out their id.
//!
//! Right ascension is kept in `[0, 2π)` and declination in `[-π/2, π/2]`
//! (radians). The storage side of the service keeps RA in hours and Dec in
//! degrees, hence [`Observation::from_hours_degrees`].
//!
//! [`select_triplet`] picks the three observations fed to the Gauss solver.
use std::cmp::Ordering;

use hifitime::Epoch;
use itertools::Itertools;
use log::debug;
use nalgebra::Vector3;

use crate::cometfit_errors::CometFitError;
use crate::constants::{Degree, Hour, ObservationId, Radian, RADEG, RADH};
use crate::ephemeris::{BodyId, PositionProvider};
use crate::geometry::{principal_angle, to_unit_vector};
use crate::time::seconds_between;

/// A single angle-only sighting.
///
/// # Fields
///
/// * `id` - identifier of the record in the storage layer
/// * `right_ascension` - right ascension in radians, `[0, 2π)`
/// * `declination` - declination in radians, `[-π/2, π/2]`
/// * `epoch` - UTC instant of the sighting
/// * `observer_position` - heliocentric observer position (km), equatorial frame
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub id: ObservationId,
    pub right_ascension: Radian,
    pub declination: Radian,
    pub epoch: Epoch,
    pub observer_position: Vector3<f64>,
}

impl Observation {
    /// Build an observation from angles in radians.
    ///
    /// The right ascension is reduced to `[0, 2π)`. Fails with
    /// [`CometFitError::Domain`] for a declination outside `[-π/2, π/2]`, a
    /// non-finite angle or a non-finite observer position.
    pub fn new(
        id: ObservationId,
        right_ascension: Radian,
        declination: Radian,
        epoch: Epoch,
        observer_position: Vector3<f64>,
    ) -> Result<Self, CometFitError> {
        // Validates both angles.
        to_unit_vector(right_ascension, declination)?;
        if !observer_position.iter().all(|x| x.is_finite()) {
            return Err(CometFitError::Domain(format!(
                "observation {id}: non-finite observer position"
            )));
        }

        Ok(Observation {
            id,
            right_ascension: principal_angle(right_ascension),
            declination,
            epoch,
            observer_position,
        })
    }

    /// Build an observation from right ascension in hours and declination in degrees.
    pub fn from_hours_degrees(
        id: ObservationId,
        ra_hours: Hour,
        dec_degrees: Degree,
        epoch: Epoch,
        observer_position: Vector3<f64>,
    ) -> Result<Self, CometFitError> {
        Self::new(id, ra_hours * RADH, dec_degrees * RADEG, epoch, observer_position)
    }

    /// Build an observation from right ascension and declination in degrees.
    pub fn from_degrees(
        id: ObservationId,
        ra_degrees: Degree,
        dec_degrees: Degree,
        epoch: Epoch,
        observer_position: Vector3<f64>,
    ) -> Result<Self, CometFitError> {
        Self::new(id, ra_degrees * RADEG, dec_degrees * RADEG, epoch, observer_position)
    }

    /// Build an observation taken from the centre of `observer`, whose position is
    /// read from a [`PositionProvider`] at the observation epoch.
    ///
    /// Provider failures ([`CometFitError::Ephemeris`]) are returned unchanged.
    pub fn with_provider<P: PositionProvider + ?Sized>(
        id: ObservationId,
        right_ascension: Radian,
        declination: Radian,
        epoch: Epoch,
        provider: &P,
        observer: BodyId,
    ) -> Result<Self, CometFitError> {
        let (position, _) = provider.position_velocity(observer, &epoch)?;
        Self::new(id, right_ascension, declination, epoch, position)
    }
}

fn chronological(a: &&Observation, b: &&Observation) -> Ordering {
    a.epoch
        .partial_cmp(&b.epoch)
        .unwrap_or(Ordering::Equal)
        .then(a.id.cmp(&b.id))
}

/// Pick the three observations used for the initial orbit.
///
/// Selection rule
/// -----------------
/// Observations are ordered by `(epoch, id)`. The triplet is made of
///
/// 1. the first observation,
/// 2. the observation whose epoch is closest to the midpoint of the arc
///    (ties go to the earlier one), excluding the first and the last,
/// 3. the last observation.
///
/// Spreading the triplet over the whole arc maximises the time separations,
/// which is what conditions the Gauss solver best. The rule only depends on the
/// content of the input, not on its order, so the same observation set always
/// yields the same triplet.
///
/// Return
/// ----------
/// * The triplet, in chronological order.
/// * [`CometFitError::InvalidParameter`] when fewer than three observations are given.
pub fn select_triplet(observations: &[Observation]) -> Result<[&Observation; 3], CometFitError> {
    if observations.len() < 3 {
        return Err(CometFitError::InvalidParameter(format!(
            "at least 3 observations are required, got {}",
            observations.len()
        )));
    }

    let sorted = observations.iter().sorted_by(chronological).collect_vec();
    let (first, last) = (sorted[0], sorted[sorted.len() - 1]);
    let half_arc = 0.5 * seconds_between(&first.epoch, &last.epoch);

    let middle = sorted[1..sorted.len() - 1]
        .iter()
        .copied()
        .min_by(|a, b| {
            let da = (seconds_between(&first.epoch, &a.epoch) - half_arc).abs();
            let db = (seconds_between(&first.epoch, &b.epoch) - half_arc).abs();
            // min_by keeps the first of equal elements, i.e. the earlier one.
            da.partial_cmp(&db).unwrap_or(Ordering::Equal)
        })
        .ok_or_else(|| CometFitError::InvalidParameter("empty observation arc".into()))?;

    debug!(
        "selected observations {} / {} / {} out of {}",
        first.id,
        middle.id,
        last.id,
        observations.len()
    );

    Ok([first, middle, last])
}
