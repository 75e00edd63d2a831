//! # Orbital elements
//!
//! Conversion between a heliocentric [`StateVector`] and classical orbital
//! elements `(a, e, i, Ω, ω, T_peri)`, plus the reporting summary in
//! astronomical units and degrees ([`summary::OrbitSummary`]).
//!
//! ## Conic coverage
//!
//! Elements are produced for every conic. The semi-major axis is negative for
//! hyperbolic orbits and NaN only for an exact parabola; the perihelion
//! distance `q = h²/(μ(1 + e))` is always defined, and so is the periapsis
//! epoch (through the hyperbolic anomaly or Barker's equation when `e ≥ 1`).
//!
//! ## Singular geometries
//!
//! The node is undefined for equatorial orbits and the periapsis for circular
//! ones. The affected angles are set to NaN, never to zero, and
//! [`AngleConvention`] tells which substitute angle carries the information:
//!
//! | Orbit                   | NaN fields         | Substitute                                   |
//! |-------------------------|--------------------|----------------------------------------------|
//! | inclined, eccentric     | none               | none                                         |
//! | equatorial, eccentric   | `Ω`, `ω`           | longitude of periapsis `ϖ`                   |
//! | inclined, circular      | `ω`, `ν`, `T_peri` | argument of latitude `u`                     |
//! | equatorial, circular    | `Ω`, `ω`, `ν`, `u`, `ϖ`, `T_peri` | true longitude `l`            |
//!
//! For equatorial orbits, `ϖ` and `l` are measured from the x axis of the
//! reference plane in the direction of motion.
use std::fmt;

use hifitime::Epoch;
use nalgebra::{Rotation3, Vector3};

use crate::cometfit_errors::CometFitError;
use crate::constants::{Kilometer, Radian, AU, RADEG};
use crate::geometry::{principal_angle, ReferencePlane};
use crate::kepler::{propagate, time_since_periapsis};
use crate::state_vector::StateVector;
use crate::time::offset_seconds;

pub mod summary;

/// Eccentricity below which an orbit is treated as circular.
pub const CIRCULAR_EPS: f64 = 1e-10;

/// `sin i` below which an orbit is treated as equatorial.
pub const EQUATORIAL_EPS: f64 = 1e-10;

/// Which angles of an [`OrbitalElements`] set are defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleConvention {
    /// `Ω`, `ω` and `ν` are all defined.
    Classical,
    /// Equatorial orbit: `Ω` and `ω` are NaN, `ϖ` locates the periapsis.
    LongitudeOfPeriapsis,
    /// Circular inclined orbit: `ω` and `ν` are NaN, `u` locates the body.
    ArgumentOfLatitude,
    /// Circular equatorial orbit: only the true longitude `l` locates the body.
    TrueLongitude,
}

/// Osculating two-body elements of a heliocentric orbit.
///
/// Units: distances in km, angles in radians. Angles are normalised to `[0, 2π)`.
/// `semi_major_axis` is negative for hyperbolic orbits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitalElements {
    pub epoch: Epoch,
    pub reference_plane: ReferencePlane,
    pub gravitational_parameter: f64,

    pub semi_major_axis: Kilometer,
    pub perihelion_distance: Kilometer,
    pub eccentricity: f64,
    pub inclination: Radian,
    pub ascending_node_longitude: Radian,
    pub periapsis_argument: Radian,
    pub true_anomaly: Radian,
    /// Epoch of the nearest periapsis passage, `None` for circular orbits.
    pub periapsis_epoch: Option<Epoch>,

    /// `ϖ = Ω + ω`
    pub periapsis_longitude: Radian,
    /// `u = ω + ν`
    pub latitude_argument: Radian,
    /// `l = Ω + ω + ν`
    pub true_longitude: Radian,
    pub convention: AngleConvention,
}

/// Angle from `from` to `to` measured around `axis` (unit), in `[0, 2π)`.
fn oriented_angle(from: &Vector3<f64>, to: &Vector3<f64>, axis: &Vector3<f64>) -> Radian {
    principal_angle(from.cross(to).dot(axis).atan2(from.dot(to)))
}

impl OrbitalElements {
    /// Compute the elements of a heliocentric state.
    ///
    /// Arguments
    /// -----------------
    /// * `state`: position/velocity in the equatorial frame (km, km/s).
    /// * `mu`: gravitational parameter of the Sun (km³/s²).
    /// * `plane`: reference plane the angles are expressed in.
    ///
    /// Return
    /// ----------
    /// * The element set; see the module documentation for the NaN conventions.
    /// * [`CometFitError::Domain`] for a non-finite state, a zero radius, or a
    ///   rectilinear trajectory (vanishing angular momentum).
    pub fn from_state(
        state: &StateVector,
        mu: f64,
        plane: ReferencePlane,
    ) -> Result<Self, CometFitError> {
        let in_plane = state.rotated(&plane.rotation_from_equatorial());
        let (r, v) = (in_plane.position, in_plane.velocity);

        let r_norm = r.norm();
        if !r_norm.is_finite() || r_norm == 0.0 || !v.iter().all(|x| x.is_finite()) {
            return Err(CometFitError::Domain(
                "state vector is not finite or has zero radius".into(),
            ));
        }

        let h = r.cross(&v);
        let h_norm = h.norm();
        if h_norm <= f64::EPSILON * r_norm * in_plane.speed() {
            return Err(CometFitError::Domain(
                "rectilinear trajectory: orbital elements are undefined".into(),
            ));
        }
        let h_unit = h / h_norm;

        let e_vec = ((v.norm_squared() - mu / r_norm) * r - r.dot(&v) * v) / mu;
        let ecc = e_vec.norm();

        let inv_a = 2.0 / r_norm - v.norm_squared() / mu;
        let semi_major_axis = if inv_a == 0.0 { f64::NAN } else { 1.0 / inv_a };
        let perihelion_distance = h_norm.powi(2) / (mu * (1.0 + ecc));

        let inclination = (h.z / h_norm).clamp(-1.0, 1.0).acos();

        // node vector ẑ × h
        let node = Vector3::new(-h.y, h.x, 0.0);
        let equatorial = node.norm() < EQUATORIAL_EPS * h_norm;
        let circular = ecc < CIRCULAR_EPS;

        let x_axis = Vector3::x();
        let (node_longitude, reference) = if equatorial {
            (f64::NAN, x_axis)
        } else {
            (principal_angle(node.y.atan2(node.x)), node.normalize())
        };

        // Angles from the node (or the x axis when there is no node).
        let to_position = oriented_angle(&reference, &r, &h_unit);
        let to_periapsis = if circular {
            f64::NAN
        } else {
            oriented_angle(&reference, &e_vec, &h_unit)
        };
        let true_anomaly = if circular {
            f64::NAN
        } else {
            oriented_angle(&e_vec, &r, &h_unit)
        };

        let (convention, periapsis_argument, periapsis_longitude, latitude_argument, true_longitude) =
            match (equatorial, circular) {
                (false, false) => (
                    AngleConvention::Classical,
                    to_periapsis,
                    principal_angle(node_longitude + to_periapsis),
                    to_position,
                    principal_angle(node_longitude + to_position),
                ),
                (true, false) => (
                    AngleConvention::LongitudeOfPeriapsis,
                    f64::NAN,
                    to_periapsis,
                    f64::NAN,
                    to_position,
                ),
                (false, true) => (
                    AngleConvention::ArgumentOfLatitude,
                    f64::NAN,
                    f64::NAN,
                    to_position,
                    principal_angle(node_longitude + to_position),
                ),
                (true, true) => (
                    AngleConvention::TrueLongitude,
                    f64::NAN,
                    f64::NAN,
                    f64::NAN,
                    to_position,
                ),
            };

        let periapsis_epoch = time_since_periapsis(ecc, perihelion_distance, true_anomaly, mu)
            .map(|dt| offset_seconds(&state.epoch, -dt));

        Ok(OrbitalElements {
            epoch: state.epoch,
            reference_plane: plane,
            gravitational_parameter: mu,
            semi_major_axis,
            perihelion_distance,
            eccentricity: ecc,
            inclination,
            ascending_node_longitude: node_longitude,
            periapsis_argument,
            true_anomaly,
            periapsis_epoch,
            periapsis_longitude,
            latitude_argument,
            true_longitude,
            convention,
        })
    }

    /// `(Ω, ω, ν)` to feed the rotation back to Cartesian, using the substitute
    /// angle of the convention with the undefined angles set to zero.
    fn effective_angles(&self) -> (Radian, Radian, Radian) {
        match self.convention {
            AngleConvention::Classical => (
                self.ascending_node_longitude,
                self.periapsis_argument,
                self.true_anomaly,
            ),
            AngleConvention::LongitudeOfPeriapsis => {
                (0.0, self.periapsis_longitude, self.true_anomaly)
            }
            AngleConvention::ArgumentOfLatitude => {
                (self.ascending_node_longitude, 0.0, self.latitude_argument)
            }
            AngleConvention::TrueLongitude => (0.0, 0.0, self.true_longitude),
        }
    }

    /// Cartesian state at an arbitrary true anomaly, in the equatorial frame.
    ///
    /// For circular orbits the anomaly is counted from the substitute reference
    /// direction of the convention (node or x axis). The epoch of the returned
    /// state is obtained from the time since periapsis, on the revolution
    /// nearest to the element epoch.
    pub fn state_at_true_anomaly(
        &self,
        true_anomaly: Radian,
    ) -> Result<StateVector, CometFitError> {
        let (node, arg_peri, current) = self.effective_angles();
        let e = self.eccentricity;
        let mu = self.gravitational_parameter;
        let p = self.perihelion_distance * (1.0 + e);

        let denom = 1.0 + e * true_anomaly.cos();
        if !(denom > 0.0) || !p.is_finite() {
            return Err(CometFitError::Domain(format!(
                "true anomaly {true_anomaly} rad is beyond the asymptotes of the orbit (e = {e})"
            )));
        }

        let (sin_nu, cos_nu) = true_anomaly.sin_cos();
        let radius = p / denom;
        let speed_factor = (mu / p).sqrt();
        let pos_pf = Vector3::new(radius * cos_nu, radius * sin_nu, 0.0);
        let vel_pf = Vector3::new(-speed_factor * sin_nu, speed_factor * (e + cos_nu), 0.0);

        let to_plane = Rotation3::from_axis_angle(&Vector3::z_axis(), node)
            * Rotation3::from_axis_angle(&Vector3::x_axis(), self.inclination)
            * Rotation3::from_axis_angle(&Vector3::z_axis(), arg_peri);
        let to_equatorial = self.reference_plane.rotation_to_equatorial() * to_plane.matrix();

        let dt = match (
            time_since_periapsis(e, self.perihelion_distance, true_anomaly, mu),
            time_since_periapsis(e, self.perihelion_distance, current, mu),
        ) {
            (Some(target), Some(now)) => target - now,
            _ => 0.0,
        };

        Ok(StateVector::new(
            to_equatorial * pos_pf,
            to_equatorial * vel_pf,
            offset_seconds(&self.epoch, dt),
        ))
    }

    /// Cartesian state at the element epoch (inverse of [`OrbitalElements::from_state`]).
    pub fn to_state(&self) -> Result<StateVector, CometFitError> {
        let (_, _, current) = self.effective_angles();
        let mut state = self.state_at_true_anomaly(current)?;
        state.epoch = self.epoch;
        Ok(state)
    }

    /// Two-body state at another epoch.
    pub fn propagate_to(&self, epoch: &Epoch) -> Result<StateVector, CometFitError> {
        propagate(&self.to_state()?, epoch, self.gravitational_parameter)
    }

    /// Same elements expressed in another reference plane.
    pub fn in_plane(&self, plane: ReferencePlane) -> Result<Self, CometFitError> {
        Self::from_state(&self.to_state()?, self.gravitational_parameter, plane)
    }
}

impl fmt::Display for OrbitalElements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let deg = |x: f64| x / RADEG;
        writeln!(
            f,
            "Orbital elements @ {} ({:?} plane, {:?})",
            self.epoch, self.reference_plane, self.convention
        )?;
        writeln!(f, "-------------------------------------------")?;
        writeln!(
            f,
            "  a   (semi-major axis)       = {:.8} AU",
            self.semi_major_axis / AU
        )?;
        writeln!(
            f,
            "  q   (perihelion distance)   = {:.8} AU",
            self.perihelion_distance / AU
        )?;
        writeln!(f, "  e   (eccentricity)          = {:.8}", self.eccentricity)?;
        writeln!(f, "  i   (inclination)           = {:.6}°", deg(self.inclination))?;
        writeln!(
            f,
            "  Ω   (longitude of node)     = {:.6}°",
            deg(self.ascending_node_longitude)
        )?;
        writeln!(
            f,
            "  ω   (argument of periapsis) = {:.6}°",
            deg(self.periapsis_argument)
        )?;
        writeln!(f, "  ν   (true anomaly)          = {:.6}°", deg(self.true_anomaly))?;
        match self.periapsis_epoch {
            Some(t) => write!(f, "  T   (periapsis passage)     = {t}"),
            None => write!(f, "  T   (periapsis passage)     = undefined"),
        }
    }
}

#[cfg(test)]
mod orbit_type_test {
    use super::*;
    use crate::constants::GM_SUN;
    use crate::time::{offset_days, parse_utc, seconds_between};
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::PI;

    fn epoch() -> Epoch {
        parse_utc("2027-04-12T06:00:00").unwrap()
    }

    fn assert_round_trip(state: &StateVector, plane: ReferencePlane) -> OrbitalElements {
        let elements = OrbitalElements::from_state(state, GM_SUN, plane).unwrap();
        let back = elements.to_state().unwrap();
        let scale_r = state.position.norm();
        let scale_v = state.velocity.norm();
        assert!(
            (back.position - state.position).norm() < 1e-9 * scale_r,
            "position round trip failed for {elements}"
        );
        assert!(
            (back.velocity - state.velocity).norm() < 1e-9 * scale_v,
            "velocity round trip failed for {elements}"
        );
        assert_eq!(back.epoch, state.epoch);
        elements
    }

    #[test]
    fn test_known_elements() {
        // Perihelion of an inclined ellipse, built directly in the equatorial frame.
        let q = 0.8 * AU;
        let e = 0.5;
        let incl: f64 = 0.4;
        let v_peri = (GM_SUN * (1.0 + e) / q).sqrt();
        let state = StateVector::new(
            Vector3::new(q, 0.0, 0.0),
            Vector3::new(0.0, v_peri * incl.cos(), v_peri * incl.sin()),
            epoch(),
        );

        let el = OrbitalElements::from_state(&state, GM_SUN, ReferencePlane::Equatorial).unwrap();
        assert_eq!(el.convention, AngleConvention::Classical);
        assert_relative_eq!(el.eccentricity, e, max_relative = 1e-12);
        assert_relative_eq!(el.perihelion_distance, q, max_relative = 1e-12);
        assert_relative_eq!(el.semi_major_axis, q / (1.0 - e), max_relative = 1e-12);
        assert_relative_eq!(el.inclination, incl, epsilon = 1e-12);
        assert_relative_eq!(el.ascending_node_longitude, 0.0, epsilon = 1e-12);
        // At periapsis on the node: ω = 0 and ν = 0 (up to wrap-around).
        assert!(el.periapsis_argument < 1e-9 || el.periapsis_argument > 2.0 * PI - 1e-9);
        assert!(el.true_anomaly < 1e-9 || el.true_anomaly > 2.0 * PI - 1e-9);
        assert_eq!(el.periapsis_epoch, Some(state.epoch));
    }

    #[test]
    fn test_round_trip_random() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let r = Vector3::new(
                rng.random_range(-3.0..3.0),
                rng.random_range(-3.0..3.0),
                rng.random_range(-1.0..1.0),
            ) * AU;
            if r.norm() < 0.2 * AU {
                continue;
            }
            let v_esc = (2.0 * GM_SUN / r.norm()).sqrt();
            let v = Vector3::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
            ) * v_esc;

            let state = StateVector::new(r, v, epoch());
            assert_round_trip(&state, ReferencePlane::Ecliptic);
            assert_round_trip(&state, ReferencePlane::Equatorial);
        }
    }

    #[test]
    fn test_equatorial_orbit() {
        let r = 1.2 * AU;
        let v = 1.1 * (GM_SUN / r).sqrt();
        let state = StateVector::new(Vector3::new(0.0, r, 0.0), Vector3::new(-v, 0.0, 0.0), epoch());

        let el = assert_round_trip(&state, ReferencePlane::Equatorial);
        assert_eq!(el.convention, AngleConvention::LongitudeOfPeriapsis);
        assert!(el.ascending_node_longitude.is_nan());
        assert!(el.periapsis_argument.is_nan());
        assert_eq!(el.inclination, 0.0);
        // Released at periapsis on the +y axis.
        assert_relative_eq!(el.periapsis_longitude, PI / 2.0, epsilon = 1e-12);
        assert_relative_eq!(el.true_longitude, PI / 2.0, epsilon = 1e-12);

        // Same orbit flown backwards: retrograde equatorial.
        let retro = StateVector::new(state.position, -state.velocity, epoch());
        let el = assert_round_trip(&retro, ReferencePlane::Equatorial);
        assert_relative_eq!(el.inclination, PI, epsilon = 1e-12);
        assert_eq!(el.convention, AngleConvention::LongitudeOfPeriapsis);

        // Not equatorial anymore once expressed in the ecliptic.
        let el = assert_round_trip(&state, ReferencePlane::Ecliptic);
        assert_eq!(el.convention, AngleConvention::Classical);
    }

    #[test]
    fn test_circular_orbits() {
        let r = AU;
        let v = (GM_SUN / r).sqrt();

        let flat = StateVector::new(Vector3::new(r, 0.0, 0.0), Vector3::new(0.0, v, 0.0), epoch());
        let el = assert_round_trip(&flat, ReferencePlane::Equatorial);
        assert_eq!(el.convention, AngleConvention::TrueLongitude);
        assert!(el.true_anomaly.is_nan());
        assert!(el.periapsis_epoch.is_none());
        assert_relative_eq!(el.true_longitude, 0.0, epsilon = 1e-12);

        let incl = 0.3_f64;
        let tilted = StateVector::new(
            Vector3::new(0.0, r * incl.cos(), r * incl.sin()),
            Vector3::new(-v, 0.0, 0.0),
            epoch(),
        );
        let el = assert_round_trip(&tilted, ReferencePlane::Equatorial);
        assert_eq!(el.convention, AngleConvention::ArgumentOfLatitude);
        assert!(el.periapsis_argument.is_nan());
        assert!(!el.ascending_node_longitude.is_nan());
        assert_relative_eq!(el.latitude_argument, PI / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_hyperbolic_and_parabolic() {
        let r = 1.5 * AU;
        let v_esc = (2.0 * GM_SUN / r).sqrt();

        let hyper = StateVector::new(
            Vector3::new(r, 0.0, 0.0),
            Vector3::new(0.3 * v_esc, 1.1 * v_esc, 0.2 * v_esc),
            epoch(),
        );
        let el = assert_round_trip(&hyper, ReferencePlane::Ecliptic);
        assert!(el.eccentricity > 1.0);
        assert!(el.semi_major_axis < 0.0);
        let t_peri = el.periapsis_epoch.unwrap();

        // The periapsis epoch is where the propagated distance equals q.
        let at_peri = propagate(&hyper, &t_peri, GM_SUN).unwrap();
        assert_relative_eq!(at_peri.distance(), el.perihelion_distance, max_relative = 1e-8);

        // Exactly parabolic: a is NaN, q and T_peri are defined.
        let parabolic = StateVector::new(Vector3::new(r, 0.0, 0.0), Vector3::new(0.0, v_esc, 0.0), epoch());
        let el = OrbitalElements::from_state(&parabolic, GM_SUN, ReferencePlane::Equatorial).unwrap();
        assert_relative_eq!(el.eccentricity, 1.0, epsilon = 1e-12);
        assert!(el.semi_major_axis.is_nan() || el.semi_major_axis.abs() > 1e6 * AU);
        assert_relative_eq!(el.perihelion_distance, r, max_relative = 1e-12);
        assert_eq!(el.periapsis_epoch, Some(parabolic.epoch));
    }

    #[test]
    fn test_rectilinear_is_rejected() {
        let state = StateVector::new(
            Vector3::new(AU, 0.0, 0.0),
            Vector3::new(10.0, 0.0, 0.0),
            epoch(),
        );
        assert!(matches!(
            OrbitalElements::from_state(&state, GM_SUN, ReferencePlane::Ecliptic),
            Err(CometFitError::Domain(_))
        ));
    }

    #[test]
    fn test_state_at_other_anomaly_and_propagation() {
        let q = 1.1 * AU;
        let e = 0.3;
        let v_peri = (GM_SUN * (1.0 + e) / q).sqrt();
        let state = StateVector::new(Vector3::new(q, 0.0, 0.0), Vector3::new(0.0, v_peri, 0.0), epoch());
        let el = OrbitalElements::from_state(&state, GM_SUN, ReferencePlane::Equatorial).unwrap();

        // A quarter turn along the orbit, dated consistently with the propagator.
        let later = el.state_at_true_anomaly(PI / 2.0).unwrap();
        assert!(seconds_between(&el.epoch, &later.epoch) > 0.0);
        let propagated = propagate(&state, &later.epoch, GM_SUN).unwrap();
        assert!((propagated.position - later.position).norm() < 1e-3 * AU * 1e-3);

        let t = offset_days(&el.epoch, 100.0);
        let via_elements = el.propagate_to(&t).unwrap();
        let via_state = propagate(&state, &t, GM_SUN).unwrap();
        assert!((via_elements.position - via_state.position).norm() < 1.0);

        // Hyperbolic anomalies beyond the asymptote are rejected.
        let hyper = OrbitalElements {
            eccentricity: 2.0,
            ..el
        };
        assert!(hyper.state_at_true_anomaly(2.5).is_err());
    }
}
