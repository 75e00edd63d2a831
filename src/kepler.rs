//! # Two-body propagation
//!
//! Kepler-equation solvers and the Lagrange `f`/`g` coefficients used to move a
//! [`StateVector`] along its conic.
//!
//! Three regimes are handled:
//!
//! * **elliptic** (`e < 1`): eccentric anomaly from `M = E − e·sin E`,
//! * **hyperbolic** (`e > 1`): hyperbolic anomaly from `M = e·sinh H − H`,
//! * **near-parabolic** (`|e − 1| <` [`NEAR_PARABOLIC_THRESHOLD`]): universal
//!   variable formulation, free of the `1/(1 − e)` singularity.
//!
//! All quantities are in km, km/s and seconds; `mu` is the gravitational
//! parameter of the central body in km³/s².
use hifitime::Epoch;
use nalgebra::Vector3;

use crate::closest_approach::Trajectory;
use crate::cometfit_errors::CometFitError;
use crate::geometry::angle_diff;
use crate::state_vector::StateVector;
use crate::time::seconds_between;

/// Convergence tolerance on the anomaly for the Kepler solvers.
pub const KEPLER_TOLERANCE: f64 = 1e-10;

/// Iteration cap of the Kepler solvers.
pub const KEPLER_MAX_ITERATIONS: usize = 50;

/// Below this value of `|e − 1|` the universal-variable formulation is used.
pub const NEAR_PARABOLIC_THRESHOLD: f64 = 1e-2;

/// Below this value of `|e − 1|` periapsis times use Barker's equation.
const PARABOLIC_EPS: f64 = 1e-8;

fn not_converged() -> CometFitError {
    CometFitError::Propagation("Kepler solve did not converge".into())
}

/// Solve the elliptic Kepler equation `M = E − e·sin E`.
///
/// Safeguarded Newton–Raphson: the iteration is seeded with `E₀ = M` and kept
/// inside the bracket `[M − e, M + e]`, which always contains the root; a
/// step leaving the bracket is replaced by a bisection step.
///
/// Arguments
/// -----------------
/// * `mean_anomaly`: mean anomaly `M` `[rad]`, any value.
/// * `e`: eccentricity in `[0, 1)`.
///
/// Return
/// ----------
/// * The eccentric anomaly `E` `[rad]`, on the same revolution as `M`.
/// * [`CometFitError::Domain`] for an eccentricity outside `[0, 1)` or a non-finite `M`.
/// * [`CometFitError::Propagation`] if the tolerance is not reached within
///   [`KEPLER_MAX_ITERATIONS`] iterations.
pub fn solve_kepler_equation(mean_anomaly: f64, e: f64) -> Result<f64, CometFitError> {
    if !(0.0..1.0).contains(&e) || !mean_anomaly.is_finite() {
        return Err(CometFitError::Domain(format!(
            "elliptic Kepler equation requires 0 <= e < 1 and finite M (e = {e}, M = {mean_anomaly})"
        )));
    }

    // Work on the reduced anomaly in [-π, π] and restore the revolution count at the end.
    let m = angle_diff(mean_anomaly, 0.0);
    let revolutions = mean_anomaly - m;

    let (mut lo, mut hi) = (m - e, m + e);
    let mut ecc_anom = m;

    for _ in 0..KEPLER_MAX_ITERATIONS {
        let (sin_e, cos_e) = ecc_anom.sin_cos();
        let residual = ecc_anom - e * sin_e - m;
        if residual.abs() < KEPLER_TOLERANCE * 1e-2 {
            return Ok(ecc_anom + revolutions);
        }
        if residual > 0.0 {
            hi = ecc_anom;
        } else {
            lo = ecc_anom;
        }

        let mut next = ecc_anom - residual / (1.0 - e * cos_e);
        if !(next > lo && next < hi) {
            next = 0.5 * (lo + hi);
        }

        let step = next - ecc_anom;
        ecc_anom = next;
        if step.abs() < KEPLER_TOLERANCE {
            return Ok(ecc_anom + revolutions);
        }
    }

    Err(not_converged())
}

/// Solve the hyperbolic Kepler equation `M = e·sinh H − H` for `e > 1`.
///
/// The root is bracketed by `asinh(M/e) ≤ |H| ≤ asinh(M/(e − 1))` and found with
/// the same safeguarded Newton iteration as [`solve_kepler_equation`].
pub fn solve_hyperbolic_kepler(mean_anomaly: f64, e: f64) -> Result<f64, CometFitError> {
    if e <= 1.0 || !e.is_finite() || !mean_anomaly.is_finite() {
        return Err(CometFitError::Domain(format!(
            "hyperbolic Kepler equation requires e > 1 and finite M (e = {e}, M = {mean_anomaly})"
        )));
    }
    if mean_anomaly == 0.0 {
        return Ok(0.0);
    }

    let sign = mean_anomaly.signum();
    let m = mean_anomaly.abs();
    let (mut lo, mut hi) = ((m / e).asinh(), (m / (e - 1.0)).asinh());
    let mut hyp_anom = lo;

    for _ in 0..KEPLER_MAX_ITERATIONS {
        let residual = e * hyp_anom.sinh() - hyp_anom - m;
        if residual.abs() < KEPLER_TOLERANCE * 1e-2 * (1.0 + m) {
            return Ok(sign * hyp_anom);
        }
        if residual > 0.0 {
            hi = hyp_anom;
        } else {
            lo = hyp_anom;
        }

        let mut next = hyp_anom - residual / (e * hyp_anom.cosh() - 1.0);
        if !(next > lo && next < hi) {
            next = 0.5 * (lo + hi);
        }

        let step = next - hyp_anom;
        hyp_anom = next;
        if step.abs() < KEPLER_TOLERANCE * (1.0 + hyp_anom.abs()) {
            return Ok(sign * hyp_anom);
        }
    }

    Err(not_converged())
}

/// Stumpff-like functions `s0..s3` of the universal variable `psi` for the
/// energy parameter `alpha = v² − 2μ/r`.
///
/// Small `|alpha·psi²|` uses the power series directly; larger values halve
/// `psi` until the series converges and rebuild the result with the
/// duplication formulas.
fn s_funct(psi: f64, alpha: f64) -> (f64, f64, f64, f64) {
    const JMAX: usize = 70;
    const HALFMAX: usize = 30;
    const BETACONTR: f64 = 100.0;

    let contr = 100.0 * f64::EPSILON;
    let overfl = 1.0 / f64::EPSILON;

    let beta = alpha * psi.powi(2);

    if beta.abs() < BETACONTR {
        let mut term2 = psi.powi(2) / 2.0;
        let mut term3 = term2 * psi / 3.0;
        let mut s2 = term2;
        let mut s3 = term3;

        for j in 1..=JMAX {
            let j = j as f64;
            term2 *= beta / ((2.0 * j + 1.0) * (2.0 * j + 2.0));
            s2 += term2;
            if term2.abs() <= contr * s2.abs() || term2.abs() > overfl {
                break;
            }
        }
        for j in 1..=JMAX {
            let j = j as f64;
            term3 *= beta / ((2.0 * j + 2.0) * (2.0 * j + 3.0));
            s3 += term3;
            if term3.abs() <= contr * s3.abs() || term3.abs() > overfl {
                break;
            }
        }

        (1.0 + alpha * s2, psi + alpha * s3, s2, s3)
    } else {
        let mut half = psi;
        let mut nhalf = 0;
        for _ in 0..HALFMAX {
            half *= 0.5;
            nhalf += 1;
            if (alpha * half.powi(2)).abs() < BETACONTR {
                break;
            }
        }

        let beta_half = alpha * half.powi(2);
        let mut term0 = 1.0;
        let mut term1 = half;
        let mut s0 = 1.0;
        let mut s1 = half;

        for j in 1..=JMAX {
            let j = j as f64;
            term0 *= beta_half / ((2.0 * j - 1.0) * (2.0 * j));
            s0 += term0;
            if term0.abs() <= contr * s0.abs() || term0.abs() > overfl {
                break;
            }
        }
        for j in 1..=JMAX {
            let j = j as f64;
            term1 *= beta_half / ((2.0 * j) * (2.0 * j + 1.0));
            s1 += term1;
            if term1.abs() <= contr * s1.abs() || term1.abs() > overfl {
                break;
            }
        }

        for _ in 0..nhalf {
            let doubled_s0 = 2.0 * s0.powi(2) - 1.0;
            let doubled_s1 = 2.0 * s0 * s1;
            s0 = doubled_s0;
            s1 = doubled_s1;
        }

        (s0, s1, (s0 - 1.0) / alpha, (s1 - psi) / alpha)
    }
}

/// Starting value of the universal variable, taken from the conic-specific
/// anomaly when the orbit is clearly elliptic or hyperbolic.
fn initial_psi(dt: f64, r0: f64, sig0: f64, mu: f64, alpha: f64, e0: f64) -> f64 {
    let fallback = dt / r0;

    if alpha < 0.0 && e0 < 1.0 {
        let a0 = -mu / alpha;
        let mean_motion = (-alpha).powi(3).sqrt() / mu;
        // e·cos u0 and e·sin u0 are both available without dividing by e.
        let e_cos = 1.0 - r0 / a0;
        let e_sin = sig0 / (mu * a0).sqrt();
        let u0 = e_sin.atan2(e_cos);
        let ell = u0 - e0 * u0.sin() + mean_motion * dt;
        match solve_kepler_equation(ell, e0) {
            Ok(u) => (u - u0) / (-alpha).sqrt(),
            Err(_) => fallback,
        }
    } else if alpha > 0.0 && e0 > 1.0 {
        let a0 = -mu / alpha;
        let mean_motion = alpha.powi(3).sqrt() / mu;
        let f0 = (sig0 / (-mu * a0).sqrt() / e0).asinh();
        let ell = e0 * f0.sinh() - f0 + mean_motion * dt;
        match solve_hyperbolic_kepler(ell, e0) {
            Ok(f) => (f - f0) / alpha.sqrt(),
            Err(_) => fallback,
        }
    } else {
        fallback
    }
}

/// Converged universal variable and its `s` functions.
#[derive(Debug, Clone, Copy)]
struct UniversalSolution {
    s0: f64,
    s1: f64,
    s2: f64,
    s3: f64,
}

/// Solve the universal Kepler equation `r0·s1 + σ0·s2 + μ·s3 = dt` by Newton's method.
///
/// A step that would change the sign of `psi` is replaced by halving `psi`,
/// since the solution always has the sign of `dt`.
fn solve_kepuni(
    dt: f64,
    r0: f64,
    sig0: f64,
    mu: f64,
    alpha: f64,
    e0: f64,
) -> Option<UniversalSolution> {
    const JMAX: usize = 100;
    let contr = 100.0 * f64::EPSILON;

    let mut psi = initial_psi(dt, r0, sig0, mu, alpha, e0);

    for _ in 0..JMAX {
        let (s0, s1, s2, s3) = s_funct(psi, alpha);

        let fun = r0 * s1 + sig0 * s2 + mu * s3 - dt;
        let funp = r0 * s0 + sig0 * s1 + mu * s2;
        if !fun.is_finite() || !funp.is_finite() || funp == 0.0 {
            return None;
        }

        let dpsi = -fun / funp;
        let next = psi + dpsi;
        psi = if next * psi < 0.0 { psi / 2.0 } else { next };

        if dpsi.abs() < contr * psi.abs().max(f64::MIN_POSITIVE) * 10.0 || fun == 0.0 {
            let (s0, s1, s2, s3) = s_funct(psi, alpha);
            return Some(UniversalSolution { s0, s1, s2, s3 });
        }
    }

    None
}

/// Lagrange coefficients relating a two-body state at `t0` to the state at `t0 + dt`:
///
/// ```text
/// r(t) = f·r0 + g·v0
/// v(t) = ḟ·r0 + ġ·v0
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LagrangeCoefficients {
    pub f: f64,
    pub g: f64,
    pub f_dot: f64,
    pub g_dot: f64,
}

impl LagrangeCoefficients {
    fn identity() -> Self {
        LagrangeCoefficients {
            f: 1.0,
            g: 0.0,
            f_dot: 0.0,
            g_dot: 1.0,
        }
    }

    /// Apply the coefficients to an initial position and velocity.
    pub fn apply(&self, r0: &Vector3<f64>, v0: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
        (
            self.f * r0 + self.g * v0,
            self.f_dot * r0 + self.g_dot * v0,
        )
    }
}

/// Exact Lagrange coefficients for a signed interval `dt` (seconds).
///
/// The conic is identified from the initial state; elliptic and hyperbolic
/// orbits go through their anomaly, near-parabolic orbits through the
/// universal variable.
///
/// Return
/// ----------
/// * [`CometFitError::Domain`] for a non-finite or zero-radius initial state,
/// * [`CometFitError::Propagation`] when the Kepler solve does not converge.
pub fn lagrange_coefficients(
    r0: &Vector3<f64>,
    v0: &Vector3<f64>,
    dt: f64,
    mu: f64,
) -> Result<LagrangeCoefficients, CometFitError> {
    let r0n = r0.norm();
    if !(r0n > 0.0) || !r0n.is_finite() || !v0.iter().all(|x| x.is_finite()) || !dt.is_finite()
    {
        return Err(CometFitError::Domain(
            "cannot propagate a degenerate or non-finite state".into(),
        ));
    }
    if dt == 0.0 {
        return Ok(LagrangeCoefficients::identity());
    }

    let v2 = v0.norm_squared();
    let sig0 = r0.dot(v0);
    let alpha = v2 - 2.0 * mu / r0n;
    let e_vec = ((v2 - mu / r0n) * r0 - sig0 * v0) / mu;
    let e = e_vec.norm();

    if (e - 1.0).abs() < NEAR_PARABOLIC_THRESHOLD || alpha == 0.0 {
        universal_coefficients(r0n, sig0, dt, mu, alpha, e)
    } else if alpha < 0.0 {
        elliptic_coefficients(r0n, sig0, dt, mu, alpha, e)
    } else {
        hyperbolic_coefficients(r0n, sig0, dt, mu, alpha, e)
    }
}

fn elliptic_coefficients(
    r0: f64,
    sig0: f64,
    dt: f64,
    mu: f64,
    alpha: f64,
    e: f64,
) -> Result<LagrangeCoefficients, CometFitError> {
    let a = -mu / alpha;
    let n = (mu / a.powi(3)).sqrt();

    let e_cos0 = 1.0 - r0 / a;
    let e_sin0 = sig0 / (mu * a).sqrt();
    let ecc_anom0 = e_sin0.atan2(e_cos0);

    let mean_anom = ecc_anom0 - e_sin0 + n * dt;
    let delta = solve_kepler_equation(mean_anom, e)? - ecc_anom0;
    let (sin_d, cos_d) = delta.sin_cos();

    let r = a + (r0 - a) * cos_d + sig0 * (a / mu).sqrt() * sin_d;

    Ok(LagrangeCoefficients {
        f: 1.0 - a / r0 * (1.0 - cos_d),
        g: dt - (delta - sin_d) / n,
        f_dot: -(mu * a).sqrt() * sin_d / (r * r0),
        g_dot: 1.0 - a / r * (1.0 - cos_d),
    })
}

fn hyperbolic_coefficients(
    r0: f64,
    sig0: f64,
    dt: f64,
    mu: f64,
    alpha: f64,
    e: f64,
) -> Result<LagrangeCoefficients, CometFitError> {
    let a = -mu / alpha;
    let n = (mu / (-a).powi(3)).sqrt();

    let e_sinh0 = sig0 / (-mu * a).sqrt();
    let hyp_anom0 = (e_sinh0 / e).asinh();

    let mean_anom = e_sinh0 - hyp_anom0 + n * dt;
    let delta = solve_hyperbolic_kepler(mean_anom, e)? - hyp_anom0;
    let (sinh_d, cosh_d) = (delta.sinh(), delta.cosh());

    let r = a + (r0 - a) * cosh_d + sig0 * (-a / mu).sqrt() * sinh_d;

    Ok(LagrangeCoefficients {
        f: 1.0 - a / r0 * (1.0 - cosh_d),
        g: dt - (sinh_d - delta) / n,
        f_dot: -(-mu * a).sqrt() * sinh_d / (r * r0),
        g_dot: 1.0 - a / r * (1.0 - cosh_d),
    })
}

fn universal_coefficients(
    r0: f64,
    sig0: f64,
    dt: f64,
    mu: f64,
    alpha: f64,
    e: f64,
) -> Result<LagrangeCoefficients, CometFitError> {
    let sol = solve_kepuni(dt, r0, sig0, mu, alpha, e).ok_or_else(not_converged)?;
    let r = r0 * sol.s0 + sig0 * sol.s1 + mu * sol.s2;

    Ok(LagrangeCoefficients {
        f: 1.0 - mu * sol.s2 / r0,
        g: dt - mu * sol.s3,
        f_dot: -mu * sol.s1 / (r * r0),
        g_dot: 1.0 - mu * sol.s2 / r,
    })
}

/// Propagate a state vector to another epoch (forward or backward) under
/// two-body motion around a central body of gravitational parameter `mu`.
pub fn propagate(
    state: &StateVector,
    epoch: &Epoch,
    mu: f64,
) -> Result<StateVector, CometFitError> {
    let dt = seconds_between(&state.epoch, epoch);
    let coeffs = lagrange_coefficients(&state.position, &state.velocity, dt, mu)?;
    let (position, velocity) = coeffs.apply(&state.position, &state.velocity);

    Ok(StateVector::new(position, velocity, *epoch))
}

/// Time elapsed since the nearest periapsis passage (seconds, signed).
///
/// Arguments
/// -----------------
/// * `e`: eccentricity.
/// * `q`: periapsis distance (km).
/// * `true_anomaly`: true anomaly `[rad]`.
/// * `mu`: gravitational parameter (km³/s²).
///
/// Return
/// ----------
/// * `Some(t − T_peri)`; for elliptic orbits the mean anomaly is reduced to
///   `[−π, π]`, i.e. the nearest periapsis is used.
/// * `None` when the periapsis is undefined: a rectilinear orbit (`q = 0`), or a
///   non-finite true anomaly (circular orbit).
pub fn time_since_periapsis(e: f64, q: f64, true_anomaly: f64, mu: f64) -> Option<f64> {
    if !(q > 0.0) || !true_anomaly.is_finite() || !e.is_finite() {
        return None;
    }
    let half = 0.5 * true_anomaly;

    if (e - 1.0).abs() < PARABOLIC_EPS {
        // Barker's equation
        let p = 2.0 * q;
        let d = half.tan();
        Some(0.5 * (p.powi(3) / mu).sqrt() * (d + d.powi(3) / 3.0))
    } else if e < 1.0 {
        let a = q / (1.0 - e);
        let n = (mu / a.powi(3)).sqrt();
        let ecc_anom = 2.0 * ((1.0 - e).sqrt() * half.sin()).atan2((1.0 + e).sqrt() * half.cos());
        let mean_anom = angle_diff(ecc_anom - e * ecc_anom.sin(), 0.0);
        Some(mean_anom / n)
    } else {
        let a = q / (1.0 - e);
        let n = (mu / (-a).powi(3)).sqrt();
        let t = ((e - 1.0) / (e + 1.0)).sqrt() * half.tan();
        if t.abs() >= 1.0 {
            return None;
        }
        let hyp_anom = 2.0 * t.atanh();
        Some((e * hyp_anom.sinh() - hyp_anom) / n)
    }
}

/// Two-body trajectory of a body, anchored on a reference state.
#[derive(Debug, Clone, Copy)]
pub struct KeplerPropagator {
    state: StateVector,
    mu: f64,
}

impl KeplerPropagator {
    pub fn new(state: StateVector, mu: f64) -> Self {
        KeplerPropagator { state, mu }
    }
}

impl Trajectory for KeplerPropagator {
    fn state_at(&self, epoch: &Epoch) -> Result<StateVector, CometFitError> {
        propagate(&self.state, epoch, self.mu)
    }
}
