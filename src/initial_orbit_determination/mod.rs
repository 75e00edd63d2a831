//! # Initial Orbit Determination (IOD) parameters
//!
//! This module defines the [`IODParams`] configuration struct and its builder,
//! which control the numerical tolerances and the admissibility rules of the
//! **Gauss method** ([`gauss::GaussObs`]).
//!
//! ## Pipeline overview
//!
//! 1. **Triplet checks**
//!    Epochs must be strictly increasing and adjacent epochs at least
//!    `min_time_separation_days` apart. The lines of sight must not be coplanar:
//!    `|D0| = |ρ̂₁ · (ρ̂₂ × ρ̂₃)|` must reach `min_geometry_determinant`.
//!
//! 2. **Distance polynomial**
//!    The 8th-degree polynomial in the central heliocentric distance `r₂` is solved
//!    with the Aberth–Ehrlich method (`aberth_max_iter`, `aberth_eps`); complex roots
//!    with `|Im| < root_imag_eps` are promoted to real.
//!
//! 3. **Root selection**
//!    The admissible root is the smallest one exceeding the observer's own
//!    heliocentric distance whose central slant range reaches `min_rho2_au`.
//!
//! 4. **Refinement**
//!    The Lagrange `f`, `g` coefficients are recomputed from the current state until the
//!    relative change of `r₂` drops below `convergence_tolerance`, within `max_iterations`.
//!    When `|f₁g₃ − f₃g₁|` falls below `fg_denominator_eps · τ`, the velocity is taken
//!    from the Herrick–Gibbs formula instead. A refined `|r₂|` further than
//!    `max_root_drift` (relative) from the selected root means the iteration jumped to
//!    another branch, and the triplet is rejected.
//!
//! 5. **Plausibility**
//!    The refined central slant range must still reach `min_rho2_au`. Transfer angles
//!    above `max_transfer_angle` and eccentricities above `max_eccentricity` are rejected.
//!
//! ## Example
//!
//! ```rust,no_run
//! use cometfit::initial_orbit_determination::IODParams;
//!
//! let params = IODParams::builder()
//!     .min_time_separation_days(0.5)
//!     .max_eccentricity(3.0)
//!     .min_rho2_au(0.02)
//!     .build()
//!     .unwrap();
//! println!("{params:#}");
//! ```
//!
//! ## See also
//!
//! * [`gauss::GaussObs::solve`] – Gauss solver entry point
//! * [`gauss_result::GaussSolution`] – state vector and diagnostics returned by the solver
use std::cmp::Ordering::{Equal, Greater};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cometfit_errors::CometFitError;
use crate::constants::{Radian, GM_SUN, RADEG};

pub mod gauss;
pub mod gauss_result;

/// Configuration of the Gauss initial orbit determination.
///
/// Fields
/// -----------------
/// **Triplet checks**
/// * `min_time_separation_days` – minimum gap (days) between adjacent epochs of the triplet.
/// * `min_geometry_determinant` – minimum `|D0|` (dimensionless, unit vectors).
///
/// **Gauss polynomial**
/// * `aberth_max_iter` – maximum iterations of the Aberth–Ehrlich solver.
/// * `aberth_eps` – convergence tolerance of the Aberth solver.
/// * `root_imag_eps` – largest imaginary part of a root promoted to real (AU).
/// * `min_rho2_au` – minimum central slant range (AU); filters the spurious root `ρ₂ ≈ 0`.
///
/// **Refinement**
/// * `max_iterations` – refinement iteration cap.
/// * `convergence_tolerance` – relative change of `r₂` at convergence.
/// * `fg_denominator_eps` – relative threshold on `|f₁g₃ − f₃g₁| / τ` below which the
///   Herrick–Gibbs velocity is used.
/// * `max_root_drift` – largest relative distance between the refined `|r₂|` and the
///   selected polynomial root.
///
/// **Plausibility**
/// * `max_transfer_angle` – largest heliocentric angle between `r₁` and `r₃` (rad).
/// * `max_eccentricity` – largest accepted eccentricity.
/// * `gravitational_parameter` – `μ` of the central body (km³/s²).
///
/// Defaults
/// -----------------
/// * `min_time_separation_days`: 0.03 d (~43 min)
/// * `min_geometry_determinant`: 1e-10
/// * `max_iterations`: 50
/// * `convergence_tolerance`: 1e-8
/// * `aberth_max_iter`: 50
/// * `aberth_eps`: 1e-6
/// * `root_imag_eps`: 1e-6
/// * `min_rho2_au`: 0.01 AU
/// * `fg_denominator_eps`: 1e-10
/// * `max_root_drift`: 0.1
/// * `max_transfer_angle`: 175°
/// * `max_eccentricity`: 5
/// * `gravitational_parameter`: heliocentric `μ☉`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IODParams {
    // --- Triplet checks ---
    pub min_time_separation_days: f64,
    pub min_geometry_determinant: f64,

    // --- Gauss polynomial ---
    pub aberth_max_iter: u32,
    pub aberth_eps: f64,
    pub root_imag_eps: f64,
    pub min_rho2_au: f64,

    // --- Refinement ---
    pub max_iterations: usize,
    pub convergence_tolerance: f64,
    pub fg_denominator_eps: f64,
    pub max_root_drift: f64,

    // --- Plausibility ---
    pub max_transfer_angle: Radian,
    pub max_eccentricity: f64,
    pub gravitational_parameter: f64,
}

impl IODParams {
    /// Equivalent to [`IODParams::default()`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Fluent builder over the defaults, validated on [`IODParamsBuilder::build`].
    pub fn builder() -> IODParamsBuilder {
        IODParamsBuilder::new()
    }
}

impl Default for IODParams {
    fn default() -> Self {
        IODParams {
            min_time_separation_days: 0.03,
            min_geometry_determinant: 1e-10,

            aberth_max_iter: 50,
            aberth_eps: 1.0e-6,
            root_imag_eps: 1.0e-6,
            min_rho2_au: 0.01,

            max_iterations: 50,
            convergence_tolerance: 1.0e-8,
            fg_denominator_eps: 1.0e-10,
            max_root_drift: 0.1,

            max_transfer_angle: 175.0 * RADEG,
            max_eccentricity: 5.0,
            gravitational_parameter: GM_SUN,
        }
    }
}

/// Builder for [`IODParams`], with validation.
#[derive(Debug, Clone)]
pub struct IODParamsBuilder {
    params: IODParams,
}

impl Default for IODParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IODParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: IODParams::default(),
        }
    }

    // --- Triplet checks ---
    pub fn min_time_separation_days(mut self, v: f64) -> Self {
        self.params.min_time_separation_days = v;
        self
    }
    pub fn min_geometry_determinant(mut self, v: f64) -> Self {
        self.params.min_geometry_determinant = v;
        self
    }

    // --- Gauss polynomial ---
    pub fn aberth_max_iter(mut self, v: u32) -> Self {
        self.params.aberth_max_iter = v;
        self
    }
    pub fn aberth_eps(mut self, v: f64) -> Self {
        self.params.aberth_eps = v;
        self
    }
    pub fn root_imag_eps(mut self, v: f64) -> Self {
        self.params.root_imag_eps = v;
        self
    }
    pub fn min_rho2_au(mut self, v: f64) -> Self {
        self.params.min_rho2_au = v;
        self
    }

    // --- Refinement ---
    pub fn max_iterations(mut self, v: usize) -> Self {
        self.params.max_iterations = v;
        self
    }
    pub fn convergence_tolerance(mut self, v: f64) -> Self {
        self.params.convergence_tolerance = v;
        self
    }
    pub fn fg_denominator_eps(mut self, v: f64) -> Self {
        self.params.fg_denominator_eps = v;
        self
    }
    pub fn max_root_drift(mut self, v: f64) -> Self {
        self.params.max_root_drift = v;
        self
    }

    // --- Plausibility ---
    pub fn max_transfer_angle(mut self, v: Radian) -> Self {
        self.params.max_transfer_angle = v;
        self
    }
    pub fn max_eccentricity(mut self, v: f64) -> Self {
        self.params.max_eccentricity = v;
        self
    }
    pub fn gravitational_parameter(mut self, v: f64) -> Self {
        self.params.gravitational_parameter = v;
        self
    }

    /// Finalize the builder and produce a validated [`IODParams`].
    ///
    /// See [`IODParams::validate`] for the rules.
    pub fn build(self) -> Result<IODParams, CometFitError> {
        self.params.validate()?;
        Ok(self.params)
    }
}

// ---- Numeric helpers for PartialOrd (handle NaN as invalid) ----

/// Return true iff x > 0.0 and comparable (i.e., not NaN).
#[inline]
fn gt0(x: f64) -> bool {
    x.partial_cmp(&0.0) == Some(Greater)
}

/// Return true iff x >= 0.0 and comparable (i.e., not NaN).
#[inline]
fn ge0(x: f64) -> bool {
    matches!(x.partial_cmp(&0.0), Some(Greater) | Some(Equal))
}

impl IODParams {
    /// Check the consistency of the parameters.
    ///
    /// Validation rules
    /// -----------------
    /// * `min_time_separation_days ≥ 0`, `min_geometry_determinant ≥ 0`, `root_imag_eps ≥ 0`.
    /// * `aberth_eps > 0`, `min_rho2_au > 0`, `convergence_tolerance > 0`,
    ///   `max_root_drift > 0`, `fg_denominator_eps ≥ 0`, `gravitational_parameter > 0`.
    /// * `aberth_max_iter ≥ 1`, `max_iterations ≥ 1`.
    /// * `0 < max_transfer_angle ≤ π`, `max_eccentricity ≥ 0`.
    ///
    /// Returns
    /// -----------------
    /// * `Ok(())`, or [`CometFitError::InvalidParameter`] naming the first failing rule.
    ///
    /// Parameters deserialized from a configuration file bypass the builder and
    /// should be checked with this method.
    pub fn validate(&self) -> Result<(), CometFitError> {
        let invalid = |msg: &str| Err(CometFitError::InvalidParameter(msg.into()));

        // --- Non-negativity (accept zero) ---
        if !ge0(self.min_time_separation_days) {
            return invalid("min_time_separation_days must be >= 0");
        }
        if !ge0(self.min_geometry_determinant) {
            return invalid("min_geometry_determinant must be >= 0");
        }
        if !ge0(self.root_imag_eps) {
            return invalid("root_imag_eps must be >= 0");
        }
        if !ge0(self.fg_denominator_eps) {
            return invalid("fg_denominator_eps must be >= 0");
        }
        if !ge0(self.max_eccentricity) {
            return invalid("max_eccentricity must be >= 0");
        }

        // --- Strictly positive ---
        if !gt0(self.aberth_eps) {
            return invalid("aberth_eps must be > 0");
        }
        if !gt0(self.min_rho2_au) {
            return invalid("min_rho2_au must be > 0");
        }
        if !gt0(self.convergence_tolerance) {
            return invalid("convergence_tolerance must be > 0");
        }
        if !gt0(self.max_root_drift) {
            return invalid("max_root_drift must be > 0");
        }
        if !gt0(self.gravitational_parameter) || !self.gravitational_parameter.is_finite() {
            return invalid("gravitational_parameter must be finite and > 0");
        }

        // --- Iteration counts ---
        if self.aberth_max_iter == 0 {
            return invalid("aberth_max_iter must be >= 1");
        }
        if self.max_iterations == 0 {
            return invalid("max_iterations must be >= 1");
        }

        if !(gt0(self.max_transfer_angle) && self.max_transfer_angle <= std::f64::consts::PI) {
            return invalid("require 0 < max_transfer_angle <= π");
        }

        Ok(())
    }
}

impl fmt::Display for IODParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            const PARAM_COL: usize = 48; // width reserved for "name = value"
            writeln!(f, "Initial Orbit Determination Parameters")?;
            writeln!(f, "-------------------------------------")?;

            macro_rules! line {
                ($fmt:expr, $val:expr, $comment:expr) => {{
                    let s = format!($fmt, $val);
                    let pad = if s.chars().count() < PARAM_COL {
                        " ".repeat(PARAM_COL - s.chars().count())
                    } else {
                        " ".to_string()
                    };
                    writeln!(f, "  {}{}# {}", s, pad, $comment)
                }};
            }

            writeln!(f, "[Triplet checks]")?;
            line!(
                "min_time_separation_days = {:.3} d",
                self.min_time_separation_days,
                "Minimum gap between adjacent epochs"
            )?;
            line!(
                "min_geometry_determinant = {:.1e}",
                self.min_geometry_determinant,
                "Minimum |D0| of the lines of sight"
            )?;

            writeln!(f, "\n[Gauss polynomial]")?;
            line!(
                "aberth_max_iter          = {}",
                self.aberth_max_iter,
                "Max iterations for Aberth solver"
            )?;
            line!(
                "aberth_eps               = {:.1e}",
                self.aberth_eps,
                "Convergence tolerance for Aberth solver"
            )?;
            line!(
                "root_imag_eps            = {:.1e}",
                self.root_imag_eps,
                "Max imaginary part for promoted roots"
            )?;
            line!(
                "min_rho2_au              = {:.1e} AU",
                self.min_rho2_au,
                "Minimum central slant range"
            )?;

            writeln!(f, "\n[Refinement]")?;
            line!(
                "max_iterations           = {}",
                self.max_iterations,
                "Max f/g refinement iterations"
            )?;
            line!(
                "convergence_tolerance    = {:.1e}",
                self.convergence_tolerance,
                "Relative change of r2 at convergence"
            )?;
            line!(
                "fg_denominator_eps       = {:.1e}",
                self.fg_denominator_eps,
                "Herrick–Gibbs fallback threshold"
            )?;
            line!(
                "max_root_drift           = {:.2}",
                self.max_root_drift,
                "Max relative move of r2 away from the root"
            )?;

            writeln!(f, "\n[Plausibility]")?;
            line!(
                "max_transfer_angle       = {:.2}°",
                self.max_transfer_angle / RADEG,
                "Max angle between r1 and r3"
            )?;
            line!(
                "max_eccentricity         = {:.3}",
                self.max_eccentricity,
                "Maximum eccentricity accepted"
            )?;
            line!(
                "gravitational_parameter  = {:.6e}",
                self.gravitational_parameter,
                "km^3/s^2"
            )?;

            Ok(())
        } else {
            write!(
                f,
                "IODParams(dt_min={:.3}d, |D0|≥{:.1e}, max_it={}, tol={:.1e}, rho2≥{:.1e}AU, max_ecc={:.2}, max_transfer={:.1}°)",
                self.min_time_separation_days,
                self.min_geometry_determinant,
                self.max_iterations,
                self.convergence_tolerance,
                self.min_rho2_au,
                self.max_eccentricity,
                self.max_transfer_angle / RADEG,
            )
        }
    }
}
