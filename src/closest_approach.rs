//! # Closest-approach search
//!
//! Find the epoch of minimum distance between a propagated body and a target
//! whose positions come from a [`PositionProvider`].
//!
//! ## Algorithm
//!
//! 1. **Coarse sampling**: the separation `d(t) = |r_body(t) − r_target(t)|` is
//!    sampled every [`SearchParams::sampling_step_days`] across the window
//!    (the last sample sits exactly on the window end).
//! 2. **Bracketing**: every interior sample lower than both neighbours brackets
//!    a local minimum. A window where `d` is monotonic has none and the search
//!    fails with [`CometFitError::Search`]; widening the window is left to the
//!    caller.
//! 3. **Refinement**: inside each bracket, the root of
//!    `½·d(d²)/dt = Δr·Δv` is located with Brent's method. If the derivative
//!    does not change sign over the bracket, a golden-section search on `d`
//!    is used instead.
//! 4. The deepest refined minimum is reported with the relative speed
//!    `|v_body − v_target|` at that epoch.
//!
//! Target lookups go through a [`MemoizedProvider`] owned by the search, so a
//! given epoch is only requested once.
use std::cell::RefCell;

use hifitime::Epoch;
use itertools::Itertools;
use log::{debug, warn};
use nalgebra::Vector3;
use roots::{find_root_brent, Convergency};
use serde::{Deserialize, Serialize};

use crate::cometfit_errors::CometFitError;
use crate::constants::{Kilometer, Seconds, SECONDS_PER_DAY};
use crate::ephemeris::{BodyId, MemoizedProvider, PositionProvider};
use crate::state_vector::StateVector;
use crate::time::{offset_seconds, seconds_between};

/// Anything that can produce the state of a body at an arbitrary epoch.
pub trait Trajectory {
    fn state_at(&self, epoch: &Epoch) -> Result<StateVector, CometFitError>;
}

/// Minimum-distance encounter between the body and the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestApproach {
    pub epoch: Epoch,
    pub distance_km: Kilometer,
    pub relative_speed_kms: f64,
}

/// Tuning of [`find_closest_approach`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    /// Spacing of the coarse samples (days).
    pub sampling_step_days: f64,
    /// Time tolerance of the refinement (seconds).
    pub time_tolerance_seconds: Seconds,
    /// Iteration cap of the refinement.
    pub max_iterations: usize,
    /// Upper bound on the number of coarse samples in one window.
    pub max_samples: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            sampling_step_days: 1.0,
            time_tolerance_seconds: 1.0,
            max_iterations: 100,
            max_samples: 100_000,
        }
    }
}

impl SearchParams {
    pub fn builder() -> SearchParamsBuilder {
        SearchParamsBuilder::default()
    }
}

/// Builder for [`SearchParams`], validated on [`build`](SearchParamsBuilder::build).
#[derive(Debug, Clone, Default)]
pub struct SearchParamsBuilder {
    params: SearchParams,
}

impl SearchParamsBuilder {
    pub fn sampling_step_days(mut self, v: f64) -> Self {
        self.params.sampling_step_days = v;
        self
    }
    pub fn time_tolerance_seconds(mut self, v: f64) -> Self {
        self.params.time_tolerance_seconds = v;
        self
    }
    pub fn max_iterations(mut self, v: usize) -> Self {
        self.params.max_iterations = v;
        self
    }
    pub fn max_samples(mut self, v: usize) -> Self {
        self.params.max_samples = v;
        self
    }

    pub fn build(self) -> Result<SearchParams, CometFitError> {
        self.params.validate()?;
        Ok(self.params)
    }
}

impl SearchParams {
    pub(crate) fn validate(&self) -> Result<(), CometFitError> {
        if !(self.sampling_step_days > 0.0 && self.sampling_step_days.is_finite()) {
            return Err(CometFitError::InvalidParameter(
                "sampling_step_days must be > 0".into(),
            ));
        }
        if !(self.time_tolerance_seconds > 0.0) {
            return Err(CometFitError::InvalidParameter(
                "time_tolerance_seconds must be > 0".into(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(CometFitError::InvalidParameter(
                "max_iterations must be >= 1".into(),
            ));
        }
        if self.max_samples < 3 {
            return Err(CometFitError::InvalidParameter(
                "max_samples must be >= 3".into(),
            ));
        }
        Ok(())
    }
}

/// Stopping rule for Brent's method: converge on the bracket width only.
///
/// The derivative `Δr·Δv` has no natural scale (it is in km²/s), so an
/// absolute threshold on its value would be meaningless.
struct TimeConvergency {
    tolerance: Seconds,
    max_iter: usize,
}

impl Convergency<f64> for TimeConvergency {
    fn is_root_found(&mut self, y: f64) -> bool {
        y == 0.0
    }

    fn is_converged(&mut self, x1: f64, x2: f64) -> bool {
        (x1 - x2).abs() < self.tolerance
    }

    fn is_iteration_limit_reached(&mut self, iter: usize) -> bool {
        iter >= self.max_iter
    }
}

/// Relative state of the body with respect to the target at `offset` seconds
/// after the window start.
#[derive(Debug, Clone, Copy)]
struct Sample {
    offset: Seconds,
    dr: Vector3<f64>,
    dv: Vector3<f64>,
}

impl Sample {
    fn distance(&self) -> f64 {
        self.dr.norm()
    }

    /// `½·d(d²)/dt`
    fn half_rate(&self) -> f64 {
        self.dr.dot(&self.dv)
    }
}

struct Separation<'a, T: ?Sized, P: PositionProvider + ?Sized> {
    body: &'a T,
    target: BodyId,
    provider: MemoizedProvider<'a, P>,
    start: Epoch,
}

impl<T: Trajectory + ?Sized, P: PositionProvider + ?Sized> Separation<'_, T, P> {
    fn at(&self, offset: Seconds) -> Result<Sample, CometFitError> {
        let epoch = offset_seconds(&self.start, offset);
        let body = self.body.state_at(&epoch)?;
        let (r_target, v_target) = self.provider.position_velocity(self.target, &epoch)?;
        Ok(Sample {
            offset,
            dr: body.position - r_target,
            dv: body.velocity - v_target,
        })
    }

    /// Brent's method on `Δr·Δv` over `[lo, hi]`, which must bracket a sign change.
    fn refine_brent(
        &self,
        lo: Seconds,
        hi: Seconds,
        params: &SearchParams,
    ) -> Result<Seconds, CometFitError> {
        let failure: RefCell<Option<CometFitError>> = RefCell::new(None);
        let rate = |s: f64| match self.at(s) {
            Ok(sample) => sample.half_rate(),
            Err(e) => {
                failure.borrow_mut().get_or_insert(e);
                f64::NAN
            }
        };

        let mut convergency = TimeConvergency {
            tolerance: params.time_tolerance_seconds,
            max_iter: params.max_iterations,
        };
        let root = find_root_brent(lo, hi, rate, &mut convergency);

        if let Some(e) = failure.into_inner() {
            return Err(e);
        }
        Ok(root?)
    }

    /// Golden-section minimisation of `d` over `[lo, hi]`.
    fn refine_golden(
        &self,
        mut lo: Seconds,
        mut hi: Seconds,
        params: &SearchParams,
    ) -> Result<Seconds, CometFitError> {
        let inv_phi = (5.0_f64.sqrt() - 1.0) / 2.0;

        let mut x1 = hi - inv_phi * (hi - lo);
        let mut x2 = lo + inv_phi * (hi - lo);
        let mut f1 = self.at(x1)?.distance();
        let mut f2 = self.at(x2)?.distance();

        for _ in 0..params.max_iterations {
            if hi - lo < params.time_tolerance_seconds {
                break;
            }
            if f1 < f2 {
                hi = x2;
                x2 = x1;
                f2 = f1;
                x1 = hi - inv_phi * (hi - lo);
                f1 = self.at(x1)?.distance();
            } else {
                lo = x1;
                x1 = x2;
                f1 = f2;
                x2 = lo + inv_phi * (hi - lo);
                f2 = self.at(x2)?.distance();
            }
        }

        Ok(0.5 * (lo + hi))
    }
}

/// Locate the closest approach of `body` to `target` within `[start, end]`.
///
/// Arguments
/// -----------------
/// * `body`: trajectory of the small body.
/// * `provider`: source of the target positions; its errors are returned unchanged.
/// * `target`: body whose distance is minimised (usually [`BodyId::Earth`]).
/// * `start`, `end`: search window, `start < end`.
/// * `params`: sampling and refinement settings.
///
/// Return
/// ----------
/// * The deepest local minimum of the separation inside the window.
/// * [`CometFitError::Search`] (`"no local minimum found in window"`) when the
///   sampled separation is monotonic over the whole window.
/// * [`CometFitError::InvalidParameter`] for an empty window, invalid params, or a
///   window that would need more than [`SearchParams::max_samples`] samples.
pub fn find_closest_approach<T, P>(
    body: &T,
    provider: &P,
    target: BodyId,
    start: &Epoch,
    end: &Epoch,
    params: &SearchParams,
) -> Result<ClosestApproach, CometFitError>
where
    T: Trajectory + ?Sized,
    P: PositionProvider + ?Sized,
{
    params.validate()?;
    let span = seconds_between(start, end);
    if !(span > 0.0) {
        return Err(CometFitError::InvalidParameter(format!(
            "empty search window [{start}, {end}]"
        )));
    }

    let step = params.sampling_step_days * SECONDS_PER_DAY;
    let n_steps = (span / step).ceil();
    if !(n_steps < params.max_samples as f64) {
        return Err(CometFitError::InvalidParameter(format!(
            "search window of {:.1} days needs {} samples at {} d spacing (max_samples = {})",
            span / SECONDS_PER_DAY,
            n_steps + 1.0,
            params.sampling_step_days,
            params.max_samples
        )));
    }
    let n_steps = n_steps as usize;

    let separation = Separation {
        body,
        target,
        provider: MemoizedProvider::new(provider),
        start: *start,
    };

    let samples = (0..=n_steps)
        .map(|k| separation.at((k as f64 * step).min(span)))
        .collect::<Result<Vec<_>, _>>()?;

    let brackets = samples
        .iter()
        .tuple_windows()
        .filter(|(a, b, c)| b.distance() <= a.distance() && b.distance() < c.distance())
        .map(|(a, b, c)| (*a, *b, *c))
        .collect_vec();

    debug!(
        "closest approach to {target}: {} samples, {} bracketed minima",
        samples.len(),
        brackets.len()
    );

    if brackets.is_empty() {
        return Err(CometFitError::Search("no local minimum found in window".into()));
    }

    let mut best: Option<Sample> = None;
    for (a, b, c) in brackets {
        let offset = if a.half_rate() < 0.0 && c.half_rate() > 0.0 {
            separation.refine_brent(a.offset, c.offset, params)?
        } else {
            warn!(
                "separation rate does not change sign around t0 + {:.0} s, using golden section",
                b.offset
            );
            separation.refine_golden(a.offset, c.offset, params)?
        };

        let refined = separation.at(offset)?;
        let candidate = if refined.distance() <= b.distance() { refined } else { b };
        if best.map_or(true, |s| candidate.distance() < s.distance()) {
            best = Some(candidate);
        }
    }

    let best =
        best.ok_or_else(|| CometFitError::Search("no local minimum found in window".into()))?;
    Ok(ClosestApproach {
        epoch: offset_seconds(start, best.offset),
        distance_km: best.distance(),
        relative_speed_kms: best.dv.norm(),
    })
}
