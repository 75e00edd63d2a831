//! # Gauss Method for Initial Orbit Determination
//!
//! This module implements the **classical Gauss method**: from three angle-only
//! observations and the heliocentric positions of the observer, recover the
//! heliocentric position and velocity of the body at the central epoch.
//!
//! ## Core structure: [`GaussObs`]
//!
//! [`GaussObs`] holds the triplet:
//!
//! * ids of the three observations (for traceability),
//! * right ascensions and declinations `[rad]`,
//! * observation epochs (UTC instants),
//! * observer heliocentric positions (km, equatorial frame), one column per epoch.
//!
//! ## Algorithm outline
//!
//! 1. Check the epochs (strictly increasing, adjacent gaps above the configured minimum).
//! 2. Line-of-sight unit vectors `ρ̂ᵢ`, their triple product `D0 = ρ̂₁·(ρ̂₂×ρ̂₃)` and the
//!    cross-product coefficients `Dᵢⱼ = Rᵢ·pⱼ` with `p₁ = ρ̂₂×ρ̂₃`, `p₂ = ρ̂₁×ρ̂₃`, `p₃ = ρ̂₁×ρ̂₂`.
//! 3. Truncated Lagrange coefficients give the sparse 8th-degree polynomial
//!    `r⁸ + c₆r⁶ + c₃r³ + c₀ = 0` in the central heliocentric distance, solved with the
//!    Aberth–Ehrlich method after a Descartes sign-rule prefilter.
//! 4. Root selection (see [`GaussObs::select_root`]), slant ranges `ρᵢ` and positions
//!    `rᵢ = Rᵢ + ρᵢρ̂ᵢ`.
//! 5. Iterative refinement with the exact `f`, `g` coefficients of the current state until
//!    the relative change of `r₂` is below tolerance. The velocity is
//!    `v₂ = (f₃r₁ − f₁r₃)/(f₃g₁ − f₁g₃)`, or the Herrick–Gibbs estimate when that
//!    denominator vanishes.
//! 6. Consistency checks: the refined `|r₂|` must stay near the selected root and the
//!    refined central slant range must still clear `min_rho2_au`.
//! 7. Plausibility checks: transfer angle, orbital plane, eccentricity.
//!
//! ## Units
//!
//! Internally the solver works in canonical units: lengths in AU and times in
//! units of `√(AU³/μ)`, so that `μ = 1`. This keeps the polynomial coefficients of
//! order unity. Inputs and the returned [`GaussSolution`] are in km, km/s and seconds.
//!
//! ## References
//!
//! * Milani & Gronchi (2010) – *Theory of Orbit Determination*
//! * Curtis (2014) – *Orbital Mechanics for Engineering Students*, §5.10
use aberth::{aberth, StopReason};
use hifitime::Epoch;
use log::{debug, trace};
use nalgebra::{Matrix3, Vector3};
use smallvec::SmallVec;

use crate::cometfit_errors::{CometFitError, IODFailure};
use crate::constants::{ObservationId, Radian, AU, SECONDS_PER_DAY};
use crate::geometry::{angle_between, to_unit_vector, triple_product};
use crate::initial_orbit_determination::gauss_result::{GaussSolution, VelocityMethod};
use crate::initial_orbit_determination::IODParams;
use crate::kepler::lagrange_coefficients;
use crate::observations::Observation;
use crate::state_vector::StateVector;
use crate::time::seconds_between;

/// Observation triplet for Gauss's initial orbit determination.
///
/// Element `i` of `ra`, `dec`, `epochs` and column `i` of `observer_helio_position`
/// all refer to the same observation.
#[derive(Debug, PartialEq, Clone)]
pub struct GaussObs {
    pub(crate) ids: [ObservationId; 3],
    pub(crate) ra: Vector3<Radian>,
    pub(crate) dec: Vector3<Radian>,
    pub(crate) epochs: [Epoch; 3],
    pub(crate) observer_helio_position: Matrix3<f64>,
}

/// Length in AU, time in `√(AU³/μ)` seconds.
#[derive(Debug, Clone, Copy)]
struct CanonicalUnits {
    time: f64,
}

impl CanonicalUnits {
    fn new(mu: f64) -> Self {
        CanonicalUnits {
            time: (AU.powi(3) / mu).sqrt(),
        }
    }

    /// km/s per canonical velocity unit.
    fn velocity(&self) -> f64 {
        AU / self.time
    }
}

/// Geometry shared by every stage of the solver, in canonical units.
#[derive(Debug, Clone)]
pub struct GaussPrelim {
    pub tau1: f64,
    pub tau3: f64,
    /// Columns are the line-of-sight unit vectors.
    pub unit_matrix: Matrix3<f64>,
    pub inv_unit_matrix: Matrix3<f64>,
    /// `D0 = ρ̂₁·(ρ̂₂×ρ̂₃)`
    pub determinant: f64,
    /// `Dᵢⱼ = Rᵢ·pⱼ`
    pub cross_coefficients: Matrix3<f64>,
    pub vector_a: Vector3<f64>,
    pub vector_b: Vector3<f64>,
    /// Observer positions in AU, one column per epoch.
    pub observer: Matrix3<f64>,
}

/// Outcome of the f/g refinement.
#[derive(Debug, Clone)]
struct Refinement {
    positions: Matrix3<f64>,
    slant_ranges: Vector3<f64>,
    velocity: Vector3<f64>,
    iterations: usize,
    method: VelocityMethod,
}

/// Compute Descartes' sign-variation upper bound on the number of positive real
/// roots of `p(x) = c0 + c3·x³ + c6·x⁶ + x⁸`.
///
/// Coefficients with `|c| ≤ zero_eps` are ignored. A result of `0` guarantees that
/// there is no positive real root, so the Aberth solve can be skipped.
#[inline]
fn descartes_upper_bound_deg8_sparse(c0: f64, c3: f64, c6: f64, zero_eps: f64) -> u32 {
    #[inline]
    fn s(v: f64, eps: f64) -> i8 {
        if v.abs() <= eps {
            0
        } else if v.is_sign_positive() {
            1
        } else {
            -1
        }
    }
    // Leading coefficient is +1 for x^8.
    let seq = [1_i8, s(c6, zero_eps), s(c3, zero_eps), s(c0, zero_eps)];

    let mut last = 0_i8;
    let mut count = 0_u32;
    for &cur in &seq {
        if cur == 0 {
            continue;
        }
        if last != 0 && cur != last {
            count += 1;
        }
        last = cur;
    }
    count
}

/// `v₂ = (f₃r₁ − f₁r₃)/(f₃g₁ − f₁g₃)`, `None` when `|f₁g₃ − f₃g₁| < floor`.
fn lagrange_velocity(
    positions: &Matrix3<f64>,
    (f1, g1): (f64, f64),
    (f3, g3): (f64, f64),
    floor: f64,
) -> Option<Vector3<f64>> {
    let denom = f3 * g1 - f1 * g3;
    if !(denom.abs() >= floor) {
        return None;
    }
    Some((f3 * positions.column(0) - f1 * positions.column(2)) / denom)
}

impl GaussObs {
    /// Build a triplet from explicit angles, epochs and observer positions.
    ///
    /// Arguments
    /// -----------------
    /// * `ids`: identifiers of the three observations.
    /// * `ra`, `dec`: angles `[rad]`.
    /// * `epochs`: observation instants.
    /// * `observer_helio_position`: observer positions (km), one column per epoch.
    pub fn with_observer_position(
        ids: [ObservationId; 3],
        ra: Vector3<Radian>,
        dec: Vector3<Radian>,
        epochs: [Epoch; 3],
        observer_helio_position: Matrix3<f64>,
    ) -> GaussObs {
        GaussObs {
            ids,
            ra,
            dec,
            epochs,
            observer_helio_position,
        }
    }

    /// Build a triplet from three [`Observation`] records, in the given order.
    pub fn from_observations(triplet: [&Observation; 3]) -> GaussObs {
        let [o1, o2, o3] = triplet;
        GaussObs {
            ids: [o1.id, o2.id, o3.id],
            ra: Vector3::new(o1.right_ascension, o2.right_ascension, o3.right_ascension),
            dec: Vector3::new(o1.declination, o2.declination, o3.declination),
            epochs: [o1.epoch, o2.epoch, o3.epoch],
            observer_helio_position: Matrix3::from_columns(&[
                o1.observer_position,
                o2.observer_position,
                o3.observer_position,
            ]),
        }
    }

    pub fn ids(&self) -> [ObservationId; 3] {
        self.ids
    }

    /// Matrix whose columns are the line-of-sight unit vectors of the three observations.
    fn unit_matrix(&self) -> Result<Matrix3<f64>, CometFitError> {
        Ok(Matrix3::from_columns(&[
            to_unit_vector(self.ra[0], self.dec[0])?,
            to_unit_vector(self.ra[1], self.dec[1])?,
            to_unit_vector(self.ra[2], self.dec[2])?,
        ]))
    }

    /// Check that the epochs are strictly increasing and that adjacent epochs are
    /// at least `min_time_separation_days` apart.
    pub fn check_epochs(&self, params: &IODParams) -> Result<(), IODFailure> {
        let gap12 = seconds_between(&self.epochs[0], &self.epochs[1]);
        let gap23 = seconds_between(&self.epochs[1], &self.epochs[2]);

        if !(gap12 > 0.0 && gap23 > 0.0) {
            return Err(IODFailure::NonIncreasingEpochs);
        }
        let min_gap = params.min_time_separation_days * SECONDS_PER_DAY;
        if gap12 < min_gap || gap23 < min_gap {
            return Err(IODFailure::InsufficientTimeSpan);
        }
        Ok(())
    }

    fn gauss_prelim_in(
        &self,
        params: &IODParams,
        units: &CanonicalUnits,
    ) -> Result<GaussPrelim, CometFitError> {
        let tau1 = seconds_between(&self.epochs[1], &self.epochs[0]) / units.time;
        let tau3 = seconds_between(&self.epochs[1], &self.epochs[2]) / units.time;
        let tau13 = tau3 - tau1;
        let vector_a = Vector3::new(tau3 / tau13, -1.0, -(tau1 / tau13));
        let vector_b = Vector3::new(
            vector_a[0] * (tau13.powi(2) - tau3.powi(2)) / 6.0,
            0.0,
            vector_a[2] * (tau13.powi(2) - tau1.powi(2)) / 6.0,
        );

        let unit_matrix = self.unit_matrix()?;
        let (rho1, rho2, rho3) = (
            unit_matrix.column(0).into_owned(),
            unit_matrix.column(1).into_owned(),
            unit_matrix.column(2).into_owned(),
        );
        let determinant = triple_product(&rho1, &rho2, &rho3);
        if !(determinant.abs() >= params.min_geometry_determinant) || determinant == 0.0 {
            return Err(IODFailure::DegenerateGeometry.into());
        }

        let inv_unit_matrix = unit_matrix
            .try_inverse()
            .ok_or(IODFailure::SingularDirectionMatrix)?;

        let observer = self.observer_helio_position / AU;
        let p = [rho2.cross(&rho3), rho1.cross(&rho3), rho1.cross(&rho2)];
        let cross_coefficients =
            Matrix3::from_fn(|i, j| observer.column(i).dot(&p[j]));

        Ok(GaussPrelim {
            tau1,
            tau3,
            unit_matrix,
            inv_unit_matrix,
            determinant,
            cross_coefficients,
            vector_a,
            vector_b,
            observer,
        })
    }

    /// Geometry of the triplet in canonical units.
    ///
    /// Return
    /// ----------
    /// * [`GaussPrelim`] with `τ₁ = t₁ − t₂`, `τ₃ = t₃ − t₂`, the direction matrix and its
    ///   inverse, `D0`, the `Dᵢⱼ` coefficients and the `a`, `b` vectors.
    /// * [`IODFailure::DegenerateGeometry`] when `|D0|` is below `min_geometry_determinant`,
    ///   [`IODFailure::SingularDirectionMatrix`] when the direction matrix cannot be inverted.
    /// * [`CometFitError::Domain`] for a declination outside `[−π/2, π/2]`.
    pub fn gauss_prelim(&self, params: &IODParams) -> Result<GaussPrelim, CometFitError> {
        let units = CanonicalUnits::new(params.gravitational_parameter);
        self.gauss_prelim_in(params, &units)
    }

    /// Coefficients `(c₆, c₃, c₀)` of the distance polynomial `r⁸ + c₆r⁶ + c₃r³ + c₀`.
    ///
    /// With `ρ₂ = A + B/r₂³`, where `A = −Σₖ aₖDₖ₂/D0` and `B = −Σₖ bₖDₖ₂/D0`, and the
    /// law of cosines `r₂² = ρ₂² + 2ρ₂(ρ̂₂·R₂) + |R₂|²`:
    ///
    /// * `c₆ = −(A² + 2A(ρ̂₂·R₂) + |R₂|²)`
    /// * `c₃ = −2B(A + ρ̂₂·R₂)`
    /// * `c₀ = −B²`
    pub fn coeff_eight_poly(&self, prelim: &GaussPrelim) -> (f64, f64, f64) {
        let d_col2 = prelim.cross_coefficients.column(1);
        let a2star = -prelim.vector_a.dot(&d_col2) / prelim.determinant;
        let b2star = -prelim.vector_b.dot(&d_col2) / prelim.determinant;

        let r2 = prelim.observer.column(1);
        let r22 = r2.norm_squared();
        let s2r2 = prelim.unit_matrix.column(1).dot(&r2);

        (
            -(a2star.powi(2)) - r22 - (2.0 * a2star * s2r2),
            -(2.0 * b2star * (a2star + s2r2)),
            -(b2star.powi(2)),
        )
    }

    /// Real positive roots of the distance polynomial, in ascending order.
    ///
    /// A complex root is accepted as real when `|Im| < root_acceptance_epsilon`.
    /// Fails with [`IODFailure::PolynomialRootFindingFailed`] when Aberth does not
    /// produce usable roots.
    pub fn solve_8poly(
        polynom: &[f64; 9],
        max_iterations: u32,
        aberth_epsilon: f64,
        root_acceptance_epsilon: f64,
    ) -> Result<SmallVec<[f64; 8]>, IODFailure> {
        let roots = aberth(polynom, max_iterations, aberth_epsilon);
        match roots.stop_reason {
            StopReason::Converged(_) | StopReason::MaxIteration(_) => {
                let mut real: SmallVec<[f64; 8]> = roots
                    .iter()
                    // root must be real, finite and positive
                    .filter(|z| z.re > 0.0 && z.re.is_finite() && z.im.abs() < root_acceptance_epsilon)
                    .map(|z| z.re)
                    .collect();
                real.sort_by(f64::total_cmp);
                Ok(real)
            }
            StopReason::Failed(_) => Err(IODFailure::PolynomialRootFindingFailed),
        }
    }

    /// Slant ranges and heliocentric positions (AU) for the combination vector `c`.
    ///
    /// `ρ = −(L⁻¹·R·c) / c` component-wise, `rᵢ = Rᵢ + ρᵢρ̂ᵢ`.
    pub fn position_vectors(
        &self,
        prelim: &GaussPrelim,
        vector_c: &Vector3<f64>,
    ) -> (Vector3<f64>, Matrix3<f64>) {
        let gcap = prelim.observer * vector_c;
        let crhom = prelim.inv_unit_matrix * gcap;
        let rho: Vector3<f64> = -crhom.component_div(vector_c);
        let rho_unit = Matrix3::from_columns(&[
            rho[0] * prelim.unit_matrix.column(0),
            rho[1] * prelim.unit_matrix.column(1),
            rho[2] * prelim.unit_matrix.column(2),
        ]);
        (rho, prelim.observer + rho_unit)
    }

    /// Choose the root of the distance polynomial that describes the body.
    ///
    /// Selection rule
    /// -----------------
    /// 1. Among the roots larger than the observer's heliocentric distance `|R₂|`,
    ///    the smallest one whose central slant range reaches `min_rho2_au`.
    /// 2. Otherwise, the roots below `|R₂|` with an admissible slant range: exactly
    ///    one is accepted, several give [`IODFailure::AmbiguousSolution`].
    /// 3. No admissible root gives [`IODFailure::NoAdmissibleRoot`].
    ///
    /// The polynomial always has a root close to `|R₂|` that describes the observer
    /// itself. Its slant range is usually a few 10⁻³ AU and the `min_rho2_au` floor
    /// removes it. When it clears the floor it may still be selected. The refinement
    /// then collapses onto the observer and [`GaussObs::solve`] rejects the result
    /// with [`IODFailure::NonPhysicalRoot`].
    ///
    /// Bodies inside the Earth's orbit often keep two admissible inner roots
    /// (ambiguous). When a single inner root survives, the f/g iteration is only
    /// stable for short arcs at favourable elongations. Otherwise it fails with
    /// [`IODFailure::DidNotConverge`] or [`IODFailure::NonPhysicalRoot`].
    pub fn select_root(
        &self,
        prelim: &GaussPrelim,
        roots: &[f64],
        params: &IODParams,
    ) -> Result<(f64, Vector3<f64>, Matrix3<f64>), IODFailure> {
        let observer_distance = prelim.observer.column(1).norm();
        let admissible = |r2: f64| {
            let vector_c = prelim.vector_a + prelim.vector_b / r2.powi(3);
            let (rho, positions) = self.position_vectors(prelim, &vector_c);
            let finite = rho.iter().all(|x| x.is_finite());
            (finite && rho[1] >= params.min_rho2_au).then_some((r2, rho, positions))
        };

        if let Some(outer) = roots
            .iter()
            .filter(|&&r| r > observer_distance)
            .find_map(|&r| admissible(r))
        {
            return Ok(outer);
        }

        let inner: SmallVec<[_; 8]> = roots
            .iter()
            .filter(|&&r| r <= observer_distance)
            .filter_map(|&r| admissible(r))
            .collect();
        match inner.len() {
            0 => Err(IODFailure::NoAdmissibleRoot),
            1 => Ok(inner[0]),
            _ => Err(IODFailure::AmbiguousSolution),
        }
    }

    /// Herrick–Gibbs velocity at the central epoch (canonical units, `μ = 1`).
    ///
    /// `v₂ = −d₁r₁ + d₂r₂ + d₃r₃` with
    /// `d₁ = τ₃(1/(12r₁³) − 1/(τ₁τ₁₃))`, `d₂ = (τ₁+τ₃)(1/(12r₂³) − 1/(τ₁τ₃))`,
    /// `d₃ = −τ₁(1/(12r₃³) + 1/(τ₃τ₁₃))`.
    pub fn gibbs_correction(ast_pos_vector: &Matrix3<f64>, tau1: f64, tau3: f64) -> Vector3<f64> {
        let tau13 = tau3 - tau1;

        let r1m3 = 1.0 / ast_pos_vector.column(0).norm().powi(3);
        let r2m3 = 1.0 / ast_pos_vector.column(1).norm().powi(3);
        let r3m3 = 1.0 / ast_pos_vector.column(2).norm().powi(3);

        let d1 = tau3 * (r1m3 / 12.0 - 1.0 / (tau1 * tau13));
        let d2 = (tau1 + tau3) * (r2m3 / 12.0 - 1.0 / (tau1 * tau3));
        let d3 = -tau1 * (r3m3 / 12.0 + 1.0 / (tau3 * tau13));

        ast_pos_vector * Vector3::new(-d1, d2, d3)
    }

    /// Iterate the slant ranges with exact Lagrange coefficients.
    ///
    /// The first velocity comes from the truncated series
    /// `f ≈ 1 − τ²/(2r₂³)`, `g ≈ τ − τ³/(6r₂³)`. Each iteration propagates the
    /// current `(r₂, v₂)` to `τ₁` and `τ₃`, rebuilds `c = (g₃/Δ, −1, −g₁/Δ)` with
    /// `Δ = f₁g₃ − f₃g₁`, and recomputes the positions and the velocity.
    fn pos_and_vel_correction(
        &self,
        prelim: &GaussPrelim,
        root: f64,
        positions: &Matrix3<f64>,
        slant_ranges: &Vector3<f64>,
        params: &IODParams,
        units: &CanonicalUnits,
    ) -> Result<Refinement, IODFailure> {
        let (tau1, tau3) = (prelim.tau1, prelim.tau3);
        let floor = params.fg_denominator_eps * (tau3 - tau1);
        let mu = params.gravitational_parameter;

        let herrick_gibbs = |positions: &Matrix3<f64>, rho: &Vector3<f64>, iterations| {
            debug!("f/g denominator below threshold, using Herrick–Gibbs velocity");
            Refinement {
                positions: *positions,
                slant_ranges: *rho,
                velocity: GaussObs::gibbs_correction(positions, tau1, tau3),
                iterations,
                method: VelocityMethod::HerrickGibbs,
            }
        };

        let r2m3 = root.powi(-3);
        let series = |tau: f64| (1.0 - 0.5 * tau * tau * r2m3, tau - tau.powi(3) * r2m3 / 6.0);
        let Some(mut velocity) = lagrange_velocity(positions, series(tau1), series(tau3), floor)
        else {
            return Ok(herrick_gibbs(positions, slant_ranges, 0));
        };

        let mut positions = *positions;
        let mut slant_ranges = *slant_ranges;
        for iteration in 1..=params.max_iterations {
            let r2 = positions.column(1) * AU;
            let v2 = velocity * units.velocity();
            let exact = |tau: f64| {
                lagrange_coefficients(&r2, &v2, tau * units.time, mu)
                    .map(|c| (c.f, c.g / units.time))
                    .map_err(|e| {
                        debug!("Lagrange coefficients failed during refinement: {e}");
                        IODFailure::DidNotConverge
                    })
            };
            let (f1, g1) = exact(tau1)?;
            let (f3, g3) = exact(tau3)?;

            let denom = f1 * g3 - f3 * g1;
            if !(denom.abs() >= floor) {
                return Ok(herrick_gibbs(&positions, &slant_ranges, iteration - 1));
            }
            let vector_c = Vector3::new(g3 / denom, -1.0, -g1 / denom);
            let (new_rho, new_positions) = self.position_vectors(prelim, &vector_c);

            velocity = lagrange_velocity(&new_positions, (f1, g1), (f3, g3), floor)
                .ok_or(IODFailure::DidNotConverge)?;

            let new_r2 = new_positions.column(1);
            let change = (new_r2 - positions.column(1)).norm() / new_r2.norm();
            positions = new_positions;
            slant_ranges = new_rho;
            trace!("Gauss refinement iteration {iteration}: relative change {change:.3e}");

            if !change.is_finite() {
                return Err(IODFailure::DidNotConverge);
            }
            if change < params.convergence_tolerance {
                return Ok(Refinement {
                    positions,
                    slant_ranges,
                    velocity,
                    iterations: iteration,
                    method: VelocityMethod::Lagrange,
                });
            }
        }

        Err(IODFailure::DidNotConverge)
    }

    fn check_transfer_angle(
        positions: &Matrix3<f64>,
        params: &IODParams,
    ) -> Result<(), IODFailure> {
        let r1 = positions.column(0).into_owned();
        let r3 = positions.column(2).into_owned();
        if angle_between(&r1, &r3) > params.max_transfer_angle {
            return Err(IODFailure::NearOppositeGeometry);
        }
        Ok(())
    }

    /// Physical checks on the refined solution (canonical units).
    fn check_solution(refined: &Refinement, params: &IODParams) -> Result<(), IODFailure> {
        if refined
            .slant_ranges
            .iter()
            .chain(refined.positions.iter())
            .chain(refined.velocity.iter())
            .any(|x| !x.is_finite())
            || refined.slant_ranges.iter().any(|&rho| rho <= 0.0)
            || refined.slant_ranges[1] < params.min_rho2_au
        {
            return Err(IODFailure::NonPhysicalRoot);
        }
        Self::check_transfer_angle(&refined.positions, params)?;

        let r = refined.positions.column(1).into_owned();
        let v = refined.velocity;
        let h = r.cross(&v);
        if h.norm() <= 1e-12 * r.norm() * v.norm() {
            return Err(IODFailure::DegenerateOrbitalPlane);
        }

        let e_vec = (v.norm_squared() - 1.0 / r.norm()) * r - r.dot(&v) * v;
        if e_vec.norm() > params.max_eccentricity {
            return Err(IODFailure::ImplausibleOrbit);
        }
        Ok(())
    }

    /// Run the Gauss method on the triplet.
    ///
    /// Return
    /// ----------
    /// * A [`GaussSolution`] holding the heliocentric state at the central epoch (km, km/s),
    ///   the velocity method, the refinement iteration count and the slant ranges.
    /// * [`CometFitError::InvalidParameter`] for inconsistent parameters,
    ///   [`CometFitError::IOD`] with the failing [`IODFailure`] otherwise.
    pub fn solve(&self, params: &IODParams) -> Result<GaussSolution, CometFitError> {
        params.validate()?;
        self.check_epochs(params)?;

        let units = CanonicalUnits::new(params.gravitational_parameter);
        let prelim = self.gauss_prelim_in(params, &units)?;

        let (c6, c3, c0) = self.coeff_eight_poly(&prelim);
        if descartes_upper_bound_deg8_sparse(c0, c3, c6, 0.0) == 0 {
            return Err(IODFailure::NoAdmissibleRoot.into());
        }
        let poly = [c0, 0.0, 0.0, c3, 0.0, 0.0, c6, 0.0, 1.0];
        let roots = Self::solve_8poly(
            &poly,
            params.aberth_max_iter,
            params.aberth_eps,
            params.root_imag_eps,
        )?;
        debug!(
            "Gauss polynomial for {:?}: D0 = {:.3e}, real positive roots {:?} AU",
            self.ids, prelim.determinant, roots
        );

        let (root, slant_ranges, positions) = self.select_root(&prelim, &roots, params)?;
        Self::check_transfer_angle(&positions, params)?;

        let refined =
            self.pos_and_vel_correction(&prelim, root, &positions, &slant_ranges, params, &units)?;
        let refined_r2 = refined.positions.column(1).norm();
        if !((refined_r2 - root).abs() <= params.max_root_drift * root) {
            debug!(
                "Gauss refinement for {:?} left the selected root: r2 = {refined_r2:.6} AU, root = {root:.6} AU",
                self.ids
            );
            return Err(IODFailure::DidNotConverge.into());
        }
        Self::check_solution(&refined, params)?;
        debug!(
            "Gauss solution for {:?}: r2 = {:.6} AU after {} iterations ({:?})",
            self.ids,
            refined.positions.column(1).norm(),
            refined.iterations,
            refined.method
        );

        Ok(GaussSolution {
            state: StateVector::new(
                refined.positions.column(1) * AU,
                refined.velocity * units.velocity(),
                self.epochs[1],
            ),
            velocity_method: refined.method,
            iterations: refined.iterations,
            slant_ranges: refined.slant_ranges * AU,
            polynomial_root: root * AU,
            observation_ids: self.ids,
        })
    }
}

#[cfg(test)]
pub(crate) mod gauss_test {
    use super::*;
    use crate::constants::GM_SUN;
    use crate::time::{offset_days, parse_utc};
    use approx::assert_relative_eq;

    /// Circular orbit of the given radius, tilted about the x axis.
    pub(crate) fn circular(
        radius: f64,
        incl: f64,
        phase: f64,
        dt: f64,
    ) -> (Vector3<f64>, Vector3<f64>) {
        let n = (GM_SUN / radius.powi(3)).sqrt();
        let (s, c) = (phase + n * dt).sin_cos();
        let tilt = nalgebra::Rotation3::from_axis_angle(&Vector3::x_axis(), incl);
        (
            tilt * Vector3::new(radius * c, radius * s, 0.0),
            tilt * Vector3::new(-radius * n * s, radius * n * c, 0.0),
        )
    }

    const OBLIQUITY: f64 = 0.409_092_8;

    fn synthetic_triplet(days: [f64; 3], comet_incl: f64) -> GaussObs {
        let t0 = parse_utc("2026-03-01T00:00:00").unwrap();
        let mut ra = Vector3::zeros();
        let mut dec = Vector3::zeros();
        let mut observer = Matrix3::zeros();
        let mut epochs = [t0; 3];
        for (i, &day) in days.iter().enumerate() {
            let dt = day * SECONDS_PER_DAY;
            let (earth, _) = circular(AU, OBLIQUITY, 0.3, dt);
            let (comet, _) = circular(2.0 * AU, comet_incl, 0.9, dt);
            let los = (comet - earth).normalize();
            ra[i] = los.y.atan2(los.x);
            dec[i] = los.z.asin();
            observer.set_column(i, &earth);
            epochs[i] = offset_days(&t0, day);
        }
        GaussObs::with_observer_position([1, 2, 3], ra, dec, epochs, observer)
    }

    fn semi_major_axis(state: &StateVector) -> f64 {
        -GM_SUN / (2.0 * state.specific_energy(GM_SUN))
    }

    #[test]
    fn test_descartes_bound() {
        assert_eq!(descartes_upper_bound_deg8_sparse(-1.0, -1.0, -1.0, 0.0), 1);
        assert_eq!(descartes_upper_bound_deg8_sparse(1.0, 1.0, 1.0, 0.0), 0);
        assert_eq!(descartes_upper_bound_deg8_sparse(-1.0, 1.0, -1.0, 0.0), 3);
        assert_eq!(descartes_upper_bound_deg8_sparse(1e-20, 1.0, 1.0, 1e-12), 0);
    }

    #[test]
    fn test_solving_polynom() {
        // x^8 - 256 has a single real positive root, x = 2.
        let poly = [-256.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0];
        let roots = GaussObs::solve_8poly(&poly, 100, 1e-12, 1e-8).unwrap();
        assert_eq!(roots.len(), 1);
        assert_relative_eq!(roots[0], 2.0, max_relative = 1e-10);
    }

    #[test]
    fn test_cross_coefficients_match_inverse() {
        let gauss = synthetic_triplet([0.0, 10.0, 20.0], 0.0);
        let prelim = gauss.gauss_prelim(&IODParams::default()).unwrap();

        // Row 2 of L⁻¹ is (ρ̂₃ × ρ̂₁)/D0 = −p₂/D0.
        let ra = prelim.observer * prelim.vector_a;
        let via_inverse = prelim.inv_unit_matrix.row(1).transpose().dot(&ra);
        let via_d = -prelim.vector_a.dot(&prelim.cross_coefficients.column(1)) / prelim.determinant;
        assert_relative_eq!(via_inverse, via_d, max_relative = 1e-9);
        assert_relative_eq!(prelim.determinant, prelim.unit_matrix.determinant(), max_relative = 1e-12);
    }

    #[test]
    fn test_root_selection() {
        let gauss = synthetic_triplet([0.0, 10.0, 20.0], 0.0);
        let params = IODParams::default();
        let prelim = gauss.gauss_prelim(&params).unwrap();
        let (c6, c3, c0) = gauss.coeff_eight_poly(&prelim);
        let poly = [c0, 0.0, 0.0, c3, 0.0, 0.0, c6, 0.0, 1.0];
        let roots = GaussObs::solve_8poly(&poly, 50, 1e-6, 1e-6).unwrap();

        // The body root and the spurious root near the observer distance.
        assert!(roots.len() >= 2);
        let (root, rho, _) = gauss.select_root(&prelim, &roots, &params).unwrap();
        assert_relative_eq!(root, 2.0, max_relative = 1e-3);
        assert!(rho.iter().all(|&r| r > 0.0));

        // Without the outer root, the remaining ones are not admissible.
        let inner: Vec<f64> = roots.iter().copied().filter(|&r| r < 1.0).collect();
        assert_eq!(
            gauss.select_root(&prelim, &inner, &params),
            Err(IODFailure::NoAdmissibleRoot)
        );
    }

    #[test]
    fn test_gibbs_correction() {
        // Exact circular orbit sampled ±10 days around the central epoch.
        let units = CanonicalUnits::new(GM_SUN);
        let dt = 10.0 * SECONDS_PER_DAY;
        let positions = Matrix3::from_columns(&[
            circular(2.0 * AU, 0.4, 0.1, -dt).0 / AU,
            circular(2.0 * AU, 0.4, 0.1, 0.0).0 / AU,
            circular(2.0 * AU, 0.4, 0.1, dt).0 / AU,
        ]);
        let tau = dt / units.time;
        let v = GaussObs::gibbs_correction(&positions, -tau, tau) * units.velocity();
        let expected = circular(2.0 * AU, 0.4, 0.1, 0.0).1;
        assert!((v - expected).norm() < 1e-6 * expected.norm());
    }

    #[test]
    fn test_solve_circular_orbit() {
        let gauss = synthetic_triplet([0.0, 10.0, 20.0], 0.0);
        let solution = gauss.solve(&IODParams::default()).unwrap();

        assert_eq!(solution.velocity_method, VelocityMethod::Lagrange);
        assert!(solution.iterations >= 1);
        assert_eq!(solution.observation_ids, [1, 2, 3]);
        assert_relative_eq!(semi_major_axis(&solution.state), 2.0 * AU, max_relative = 1e-6);

        let (truth_r, truth_v) = circular(2.0 * AU, 0.0, 0.9, 10.0 * SECONDS_PER_DAY);
        assert!((solution.state.position - truth_r).norm() < 100.0);
        assert!((solution.state.velocity - truth_v).norm() < 1e-4);
    }

    #[test]
    fn test_herrick_gibbs_fallback() {
        let gauss = synthetic_triplet([0.0, 10.0, 20.0], 0.5);
        let params = IODParams::builder().fg_denominator_eps(1e3).build().unwrap();
        let solution = gauss.solve(&params).unwrap();
        assert_eq!(solution.velocity_method, VelocityMethod::HerrickGibbs);
        assert_eq!(solution.iterations, 0);
        assert_relative_eq!(semi_major_axis(&solution.state), 2.0 * AU, max_relative = 1e-2);
    }

    #[test]
    fn test_failures() {
        let params = IODParams::default();

        let coplanar = synthetic_triplet([0.0, 10.0, 20.0], OBLIQUITY);
        assert_eq!(
            coplanar.solve(&params),
            Err(CometFitError::IOD(IODFailure::DegenerateGeometry))
        );

        let unordered = synthetic_triplet([0.0, 20.0, 10.0], 0.3);
        assert_eq!(
            unordered.solve(&params),
            Err(CometFitError::IOD(IODFailure::NonIncreasingEpochs))
        );

        let close = synthetic_triplet([0.0, 0.01, 10.0], 0.3);
        assert_eq!(
            close.solve(&params),
            Err(CometFitError::IOD(IODFailure::InsufficientTimeSpan))
        );

        let strict = IODParams::builder().max_eccentricity(0.0).build().unwrap();
        let gauss = synthetic_triplet([0.0, 10.0, 20.0], 0.3);
        assert_eq!(
            gauss.solve(&strict),
            Err(CometFitError::IOD(IODFailure::ImplausibleOrbit))
        );

        let impatient = IODParams::builder().max_iterations(1).build().unwrap();
        assert_eq!(
            gauss.solve(&impatient),
            Err(CometFitError::IOD(IODFailure::DidNotConverge))
        );
    }

    fn refinement(positions: Matrix3<f64>, rho2: f64, velocity: Vector3<f64>) -> Refinement {
        Refinement {
            positions,
            slant_ranges: Vector3::new(0.5, rho2, 0.5),
            velocity,
            iterations: 3,
            method: VelocityMethod::Lagrange,
        }
    }

    #[test]
    fn test_transfer_angle_limit() {
        let params = IODParams::default();
        let r1 = Vector3::new(1.2, 0.0, 0.1);
        let r2 = Vector3::new(0.0, 1.2, 0.0);

        let opposite = Matrix3::from_columns(&[r1, r2, -r1 + Vector3::new(0.0, 0.03, 0.0)]);
        assert_eq!(
            GaussObs::check_transfer_angle(&opposite, &params),
            Err(IODFailure::NearOppositeGeometry)
        );

        let quarter = Matrix3::from_columns(&[r1, r2, Vector3::new(-0.1, 1.2, 0.0)]);
        assert_eq!(GaussObs::check_transfer_angle(&quarter, &params), Ok(()));
    }

    #[test]
    fn test_solution_checks() {
        let params = IODParams::default();
        let positions = Matrix3::from_columns(&[
            Vector3::new(1.3, -0.1, 0.0),
            Vector3::new(1.3, 0.0, 0.0),
            Vector3::new(1.3, 0.1, 0.0),
        ]);
        let circular_velocity = Vector3::new(0.0, 1.3_f64.powf(-0.5), 0.0);

        let good = refinement(positions, 0.4, circular_velocity);
        assert_eq!(GaussObs::check_solution(&good, &params), Ok(()));

        // Refinement that collapsed onto the observer.
        let collapsed = refinement(positions, 1e-4, circular_velocity);
        assert_eq!(
            GaussObs::check_solution(&collapsed, &params),
            Err(IODFailure::NonPhysicalRoot)
        );

        let behind = refinement(positions, -0.2, circular_velocity);
        assert_eq!(
            GaussObs::check_solution(&behind, &params),
            Err(IODFailure::NonPhysicalRoot)
        );

        // Purely radial motion has no orbital plane.
        let radial = refinement(positions, 0.4, Vector3::new(0.5, 0.0, 0.0));
        assert_eq!(
            GaussObs::check_solution(&radial, &params),
            Err(IODFailure::DegenerateOrbitalPlane)
        );
    }

    #[test]
    fn test_root_drift_is_rejected() {
        let gauss = synthetic_triplet([0.0, 10.0, 20.0], 0.5);
        assert!(gauss.solve(&IODParams::default()).is_ok());

        let tight = IODParams::builder().max_root_drift(1e-9).build().unwrap();
        assert_eq!(
            gauss.solve(&tight),
            Err(CometFitError::IOD(IODFailure::DidNotConverge))
        );
    }
}
