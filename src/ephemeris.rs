//! # Position providers
//!
//! The orbit core never reads an ephemeris directly. Positions and velocities of
//! the observing site and of the target body are obtained through the
//! [`PositionProvider`] trait, so a host service can plug in any backend
//! (JPL kernels, a remote service, a table) without the numeric code knowing.
//!
//! Two implementations ship with the crate:
//!
//! * [`KeplerianEarth`]: analytic mean elements of the Earth–Moon barycentre,
//!   good to a few arcminutes over 1800–2050. Enough to locate an observer and
//!   to predict close approaches at the precision of a three-point orbit.
//! * [`MemoizedProvider`]: a per-request cache wrapping any provider, keyed by
//!   `(body, epoch)`.
//!
//! All vectors are heliocentric, in km and km/s, in the equatorial inertial frame.
use std::cell::RefCell;
use std::fmt;

use ahash::AHashMap;
use hifitime::Epoch;
use log::trace;
use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::cometfit_errors::CometFitError;
use crate::constants::{AU, DAYS_PER_JULIAN_CENTURY, RADEG, SECONDS_PER_DAY};
use crate::geometry::ecliptic_to_equatorial;
use crate::kepler::solve_kepler_equation;
use crate::time::{epoch_key, julian_centuries_since_j2000};

/// Bodies a [`PositionProvider`] can be asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BodyId {
    Sun,
    #[default]
    Earth,
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyId::Sun => write!(f, "Sun"),
            BodyId::Earth => write!(f, "Earth"),
        }
    }
}

/// Heliocentric position (km) and velocity (km/s).
pub type PosVel = (Vector3<f64>, Vector3<f64>);

/// Source of body positions and velocities.
///
/// Implementations must be side-effect free: the same `(body, epoch)` query
/// always yields the same answer, which is what allows [`MemoizedProvider`] to
/// cache results. Queries outside the supported epoch range fail with
/// [`CometFitError::Ephemeris`]; the core propagates that error unchanged.
pub trait PositionProvider {
    fn position_velocity(&self, body: BodyId, epoch: &Epoch) -> Result<PosVel, CometFitError>;
}

impl<P: PositionProvider + ?Sized> PositionProvider for &P {
    fn position_velocity(&self, body: BodyId, epoch: &Epoch) -> Result<PosVel, CometFitError> {
        (**self).position_velocity(body, epoch)
    }
}

/// Per-epoch cache in front of another provider.
///
/// Meant to live for the duration of one computation (one closest-approach
/// search, one pipeline run); nothing is shared between requests. Failed
/// lookups are not cached.
pub struct MemoizedProvider<'a, P: PositionProvider + ?Sized> {
    inner: &'a P,
    cache: RefCell<AHashMap<(BodyId, i128), PosVel>>,
}

impl<'a, P: PositionProvider + ?Sized> MemoizedProvider<'a, P> {
    pub fn new(inner: &'a P) -> Self {
        MemoizedProvider {
            inner,
            cache: RefCell::new(AHashMap::new()),
        }
    }

    /// Number of distinct `(body, epoch)` entries fetched so far.
    pub fn cached_len(&self) -> usize {
        self.cache.borrow().len()
    }
}

impl<P: PositionProvider + ?Sized> PositionProvider for MemoizedProvider<'_, P> {
    fn position_velocity(&self, body: BodyId, epoch: &Epoch) -> Result<PosVel, CometFitError> {
        let key = (body, epoch_key(epoch));
        if let Some(hit) = self.cache.borrow().get(&key) {
            return Ok(*hit);
        }

        let value = self.inner.position_velocity(body, epoch)?;
        trace!("ephemeris cache miss for {body} at {epoch}");
        self.cache.borrow_mut().insert(key, value);
        Ok(value)
    }
}

/// Mean orbital elements of one body at J2000 with their secular rates per
/// Julian century (angles in degrees, `a` in AU), referred to the mean
/// ecliptic and equinox of J2000.
#[derive(Debug, Clone, Copy)]
struct MeanElements {
    a: (f64, f64),
    e: (f64, f64),
    incl: (f64, f64),
    mean_longitude: (f64, f64),
    long_perihelion: (f64, f64),
    long_node: (f64, f64),
}

/// Earth–Moon barycentre, valid 1800 AD – 2050 AD (Standish, JPL).
const EM_BARYCENTER: MeanElements = MeanElements {
    a: (1.000_002_61, 0.000_005_62),
    e: (0.016_711_23, -0.000_043_92),
    incl: (-0.000_015_31, -0.012_946_68),
    mean_longitude: (100.464_571_66, 35_999.372_449_81),
    long_perihelion: (102.937_681_93, 0.323_273_64),
    long_node: (0.0, 0.0),
};

/// Low-precision analytic Earth ephemeris.
///
/// The Earth is represented by the Earth–Moon barycentre moving on a Keplerian
/// ellipse with secularly varying elements. Errors stay at the level of
/// arcminutes in longitude (a few 10⁴ km), well below the uncertainty of a
/// three-observation orbit. The Sun is the origin of the frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeplerianEarth;

impl KeplerianEarth {
    /// First and last instants covered by the mean elements.
    pub fn validity() -> (Epoch, Epoch) {
        (
            Epoch::from_gregorian_utc_at_midnight(1800, 1, 1),
            Epoch::from_gregorian_utc_at_midnight(2051, 1, 1),
        )
    }

    fn earth_state(&self, epoch: &Epoch) -> Result<PosVel, CometFitError> {
        let (start, end) = Self::validity();
        if *epoch < start || *epoch > end {
            return Err(CometFitError::Ephemeris(format!(
                "epoch {epoch} outside the analytic Earth validity range [{start}, {end}]"
            )));
        }

        let t = julian_centuries_since_j2000(epoch);
        let el = EM_BARYCENTER;
        let at = |(v0, rate): (f64, f64)| v0 + rate * t;

        let a = at(el.a) * AU;
        let e = at(el.e);
        let incl = at(el.incl) * RADEG;
        let node = at(el.long_node) * RADEG;
        let varpi = at(el.long_perihelion) * RADEG;
        let mean_anomaly = (at(el.mean_longitude) - at(el.long_perihelion)) * RADEG;

        // deg/century -> rad/s
        let mean_motion = (el.mean_longitude.1 - el.long_perihelion.1) * RADEG
            / (DAYS_PER_JULIAN_CENTURY * SECONDS_PER_DAY);

        let ecc_anom = solve_kepler_equation(mean_anomaly, e)?;
        let (sin_e, cos_e) = ecc_anom.sin_cos();
        let beta = (1.0 - e * e).sqrt();
        let ecc_anom_rate = mean_motion / (1.0 - e * cos_e);

        let pos_orb = Vector3::new(a * (cos_e - e), a * beta * sin_e, 0.0);
        let vel_orb = Vector3::new(
            -a * sin_e * ecc_anom_rate,
            a * beta * cos_e * ecc_anom_rate,
            0.0,
        );

        let orbit_to_ecliptic = Rotation3::from_axis_angle(&Vector3::z_axis(), node)
            * Rotation3::from_axis_angle(&Vector3::x_axis(), incl)
            * Rotation3::from_axis_angle(&Vector3::z_axis(), varpi - node);
        let to_equatorial = ecliptic_to_equatorial() * orbit_to_ecliptic.matrix();

        Ok((to_equatorial * pos_orb, to_equatorial * vel_orb))
    }
}

impl PositionProvider for KeplerianEarth {
    fn position_velocity(&self, body: BodyId, epoch: &Epoch) -> Result<PosVel, CometFitError> {
        match body {
            BodyId::Sun => Ok((Vector3::zeros(), Vector3::zeros())),
            BodyId::Earth => self.earth_state(epoch),
        }
    }
}
