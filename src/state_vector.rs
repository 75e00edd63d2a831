use std::fmt;

use hifitime::Epoch;
use nalgebra::Vector3;

use crate::constants::AU;

/// Cartesian two-body state of a body at a given epoch.
///
/// Units
/// -----
/// * `position`: km, heliocentric, equatorial inertial frame.
/// * `velocity`: km/s, same frame.
/// * `epoch`: absolute instant at which the state is valid.
///
/// A `StateVector` is transient: it is produced by the Gauss solver or the
/// propagator and consumed within the same request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateVector {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub epoch: Epoch,
}

impl StateVector {
    pub fn new(position: Vector3<f64>, velocity: Vector3<f64>, epoch: Epoch) -> Self {
        StateVector {
            position,
            velocity,
            epoch,
        }
    }

    /// Heliocentric distance `|r|` in km.
    pub fn distance(&self) -> f64 {
        self.position.norm()
    }

    /// Speed `|v|` in km/s.
    pub fn speed(&self) -> f64 {
        self.velocity.norm()
    }

    /// Specific angular momentum `h = r × v` (km²/s).
    pub fn angular_momentum(&self) -> Vector3<f64> {
        self.position.cross(&self.velocity)
    }

    /// Specific orbital energy `v²/2 − μ/r` (km²/s²).
    pub fn specific_energy(&self, mu: f64) -> f64 {
        0.5 * self.velocity.norm_squared() - mu / self.distance()
    }

    /// Orbital period in seconds, `None` for unbound orbits.
    pub fn period(&self, mu: f64) -> Option<f64> {
        let energy = self.specific_energy(mu);
        if energy < 0.0 {
            let a = -mu / (2.0 * energy);
            Some(crate::constants::DPI * (a.powi(3) / mu).sqrt())
        } else {
            None
        }
    }

    /// Express the state in another frame through a rotation matrix.
    pub fn rotated(&self, rotation: &nalgebra::Matrix3<f64>) -> StateVector {
        StateVector {
            position: rotation * self.position,
            velocity: rotation * self.velocity,
            epoch: self.epoch,
        }
    }
}

impl fmt::Display for StateVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.position / AU;
        writeln!(f, "State vector at {}", self.epoch)?;
        writeln!(
            f,
            "  r = [{:>14.8}, {:>14.8}, {:>14.8}] AU",
            r.x, r.y, r.z
        )?;
        write!(
            f,
            "  v = [{:>14.8}, {:>14.8}, {:>14.8}] km/s",
            self.velocity.x, self.velocity.y, self.velocity.z
        )
    }
}
