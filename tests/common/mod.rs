#![allow(dead_code)]

use cometfit::closest_approach::Trajectory;
use cometfit::constants::{ObservationId, AU, GM_SUN};
use cometfit::ephemeris::{BodyId, KeplerianEarth, PositionProvider};
use cometfit::kepler::KeplerPropagator;
use cometfit::observations::Observation;
use cometfit::state_vector::StateVector;
use cometfit::time::{offset_days, parse_utc, seconds_between};
use hifitime::Epoch;
use nalgebra::Vector3;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn encounter_epoch() -> Epoch {
    parse_utc("2026-06-01T00:00:00").unwrap()
}

/// Body on a 2 AU orbit that crosses 0.05 AU north of the Earth on
/// [`encounter_epoch`]. Its true closest approach is a few days earlier.
pub fn encounter_comet() -> KeplerPropagator {
    let epoch = encounter_epoch();
    let (r_earth, v_earth) = KeplerianEarth
        .position_velocity(BodyId::Earth, &epoch)
        .unwrap();

    let north = r_earth.cross(&v_earth).normalize();
    let radial = r_earth.normalize();
    let along = v_earth.normalize();

    let position = r_earth + north * 0.05 * AU;
    let velocity = along * v_earth.norm() - radial * 15.0 + north * 15.0;
    KeplerPropagator::new(StateVector::new(position, velocity, epoch), GM_SUN)
}

/// Circular orbit in a plane tilted by `inclination` about the equatorial x axis,
/// at angle `phase` from the x axis on `epoch`.
pub fn circular_comet(
    radius_au: f64,
    inclination: f64,
    phase: f64,
    epoch: Epoch,
) -> KeplerPropagator {
    let radius = radius_au * AU;
    let speed = (GM_SUN / radius).sqrt();
    let (sin_ph, cos_ph) = phase.sin_cos();
    let (sin_i, cos_i) = inclination.sin_cos();
    let tilt = |v: Vector3<f64>| Vector3::new(v.x, v.y * cos_i - v.z * sin_i, v.y * sin_i + v.z * cos_i);

    let position = tilt(Vector3::new(radius * cos_ph, radius * sin_ph, 0.0));
    let velocity = tilt(Vector3::new(-speed * sin_ph, speed * cos_ph, 0.0));
    KeplerPropagator::new(StateVector::new(position, velocity, epoch), GM_SUN)
}

/// Geocentric sighting of `body` at `epoch`, noise free.
pub fn sight<P: PositionProvider>(
    provider: &P,
    body: &KeplerPropagator,
    id: ObservationId,
    epoch: Epoch,
) -> Observation {
    let (observer, _) = provider.position_velocity(BodyId::Earth, &epoch).unwrap();
    let los = body.state_at(&epoch).unwrap().position - observer;
    Observation::new(
        id,
        los.y.atan2(los.x),
        (los.z / los.norm()).asin(),
        epoch,
        observer,
    )
    .unwrap()
}

/// Sightings at `first + days[k]`, with ids 1, 2, 3, ...
pub fn sightings<P: PositionProvider>(
    provider: &P,
    body: &KeplerPropagator,
    first: &Epoch,
    days: &[f64],
) -> Vec<Observation> {
    days.iter()
        .enumerate()
        .map(|(k, d)| sight(provider, body, k as ObservationId + 1, offset_days(first, *d)))
        .collect()
}

/// Minimum Earth distance of `body` over `[start, end]` by dense sampling.
pub fn brute_force_approach(
    body: &KeplerPropagator,
    start: &Epoch,
    end: &Epoch,
    step_days: f64,
) -> (Epoch, f64) {
    let span_days = seconds_between(start, end) / 86_400.0;
    let n = (span_days / step_days).ceil() as usize;

    (0..=n)
        .map(|k| {
            let epoch = offset_days(start, (k as f64 * step_days).min(span_days));
            let (earth, _) = KeplerianEarth
                .position_velocity(BodyId::Earth, &epoch)
                .unwrap();
            let distance = (body.state_at(&epoch).unwrap().position - earth).norm();
            (epoch, distance)
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap()
}
