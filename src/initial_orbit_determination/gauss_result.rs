//! # Gauss orbit determination result
//!
//! [`GaussSolution`] is the outcome of [`GaussObs::solve`](crate::initial_orbit_determination::gauss::GaussObs::solve):
//! the heliocentric state vector at the central epoch, together with the
//! diagnostics of how it was obtained.
//!
//! The velocity comes either from the refined Lagrange coefficients
//! ([`VelocityMethod::Lagrange`]) or, when their combination is singular, from the
//! Herrick–Gibbs formula ([`VelocityMethod::HerrickGibbs`]).
use std::fmt;

use nalgebra::Vector3;

use crate::constants::{ObservationId, AU};
use crate::state_vector::StateVector;

/// How the velocity at the central epoch was computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VelocityMethod {
    Lagrange,
    HerrickGibbs,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GaussSolution {
    /// State at the central epoch (km, km/s, equatorial frame).
    pub state: StateVector,
    pub velocity_method: VelocityMethod,
    /// Refinement iterations performed.
    pub iterations: usize,
    /// Observer-to-body distances at the three epochs (km).
    pub slant_ranges: Vector3<f64>,
    /// Root of the distance polynomial that seeded the refinement (km).
    pub polynomial_root: f64,
    pub observation_ids: [ObservationId; 3],
}

impl GaussSolution {
    pub fn is_refined(&self) -> bool {
        self.velocity_method == VelocityMethod::Lagrange
    }
}

impl fmt::Display for GaussSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Gauss IOD Result ({:?} velocity, {} iterations)",
            self.velocity_method, self.iterations
        )?;
        writeln!(
            f,
            "  observations = {} / {} / {}",
            self.observation_ids[0], self.observation_ids[1], self.observation_ids[2]
        )?;
        writeln!(
            f,
            "  rho [AU]     = ({:.6}, {:.6}, {:.6})",
            self.slant_ranges.x / AU,
            self.slant_ranges.y / AU,
            self.slant_ranges.z / AU
        )?;
        write!(f, "{}", self.state)
    }
}

#[cfg(test)]
mod gauss_result_test {
    use super::*;
    use crate::time::parse_utc;

    #[test]
    fn test_display_and_flags() {
        let solution = GaussSolution {
            state: StateVector::new(
                Vector3::new(AU, 0.0, 0.0),
                Vector3::new(0.0, 30.0, 0.0),
                parse_utc("2030-01-01T00:00:00").unwrap(),
            ),
            velocity_method: VelocityMethod::HerrickGibbs,
            iterations: 0,
            slant_ranges: Vector3::new(0.5, 0.6, 0.7) * AU,
            polynomial_root: AU,
            observation_ids: [4, 5, 6],
        };
        assert!(!solution.is_refined());

        let text = format!("{solution}");
        assert!(text.contains("HerrickGibbs"));
        assert!(text.contains("4 / 5 / 6"));
        assert!(text.contains("0.600000"));
    }
}
