//! # Geometry utilities
//!
//! Angle normalisation, line-of-sight construction and the small amount of
//! frame handling the orbit pipeline needs.
//!
//! All functions are pure. Vector algebra itself (dot, cross, norm, linear
//! combinations) is delegated to [`nalgebra::Vector3`]; the helpers below only
//! add the guarded variants that callers use to detect degeneracies.
//!
//! ## Frames
//!
//! Observer positions, state vectors and provider outputs live in the
//! **equatorial** inertial frame (ICRS axes, heliocentric origin). Orbital
//! elements may be reported in the **ecliptic** frame instead; the rotation
//! between both is [`equatorial_to_ecliptic`] / [`ecliptic_to_equatorial`].
use std::f64::consts::{FRAC_PI_2, PI};

use nalgebra::{Matrix3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::cometfit_errors::CometFitError;
use crate::constants::{Radian, DPI, OBLIQUITY_J2000_ARCSEC, RADSEC};

/// Reference plane in which orbital elements are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ReferencePlane {
    /// Mean equator of J2000 (the frame of the observations).
    Equatorial,
    /// Mean ecliptic of J2000.
    #[default]
    Ecliptic,
}

impl ReferencePlane {
    /// Rotation taking an equatorial vector into this reference plane.
    pub fn rotation_from_equatorial(&self) -> Matrix3<f64> {
        match self {
            ReferencePlane::Equatorial => Matrix3::identity(),
            ReferencePlane::Ecliptic => equatorial_to_ecliptic(),
        }
    }

    /// Rotation taking a vector expressed in this reference plane back to equatorial.
    pub fn rotation_to_equatorial(&self) -> Matrix3<f64> {
        self.rotation_from_equatorial().transpose()
    }
}

/// Return the principal value of an angle in `[0, 2π)`.
pub fn principal_angle(a: f64) -> f64 {
    a.rem_euclid(DPI)
}

/// Return the principal difference `a - b` between two angles, in `[-π, π]`.
pub fn angle_diff(a: f64, b: f64) -> f64 {
    let mut diff = principal_angle(a) - principal_angle(b);

    if diff > PI {
        diff -= DPI;
    } else if diff < -PI {
        diff += DPI;
    }

    diff
}

/// Build the unit line-of-sight vector pointing at `(ra, dec)`.
///
/// Arguments
/// -----------------
/// * `ra`: right ascension `[rad]`, any value (periodic).
/// * `dec`: declination `[rad]`, must lie in `[-π/2, π/2]`.
///
/// Return
/// ----------
/// * `(cos dec·cos ra, cos dec·sin ra, sin dec)`, or [`CometFitError::Domain`] if the
///   declination is out of range or one of the angles is not finite.
pub fn to_unit_vector(ra: Radian, dec: Radian) -> Result<Vector3<f64>, CometFitError> {
    if !ra.is_finite() || !dec.is_finite() {
        return Err(CometFitError::Domain(format!(
            "non-finite angle (ra = {ra}, dec = {dec})"
        )));
    }
    if !(-FRAC_PI_2..=FRAC_PI_2).contains(&dec) {
        return Err(CometFitError::Domain(format!(
            "declination {dec} rad outside [-π/2, π/2]"
        )));
    }

    let cos_dec = dec.cos();
    Ok(Vector3::new(
        ra.cos() * cos_dec,
        ra.sin() * cos_dec,
        dec.sin(),
    ))
}

/// Angle between two vectors in `[0, π]`.
///
/// Uses `atan2(|a × b|, a · b)`, which stays accurate for nearly parallel and
/// nearly anti-parallel inputs where `acos` of the normalized dot product loses
/// all significant digits.
pub fn angle_between(a: &Vector3<f64>, b: &Vector3<f64>) -> Radian {
    a.cross(b).norm().atan2(a.dot(b))
}

/// Scalar triple product `a · (b × c)`.
pub fn triple_product(a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) -> f64 {
    a.dot(&b.cross(c))
}

/// Mean obliquity of the ecliptic at J2000 `[rad]`.
pub fn obliquity_j2000() -> Radian {
    OBLIQUITY_J2000_ARCSEC * RADSEC
}

/// Rotation from the J2000 mean equator to the J2000 mean ecliptic.
pub fn equatorial_to_ecliptic() -> Matrix3<f64> {
    Rotation3::from_axis_angle(&Vector3::x_axis(), -obliquity_j2000()).into()
}

/// Rotation from the J2000 mean ecliptic to the J2000 mean equator.
pub fn ecliptic_to_equatorial() -> Matrix3<f64> {
    Rotation3::from_axis_angle(&Vector3::x_axis(), obliquity_j2000()).into()
}
