//! Benchmarks for the Gauss initial orbit determination.
//!
//!   cargo bench --bench gauss_prelim_orbit
//!   cargo bench gauss_prelim_orbit -- gauss_prelim_orbit/single_solve

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use hifitime::Epoch;
use nalgebra::{Matrix3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use cometfit::constants::{AU, GM_SUN};
use cometfit::initial_orbit_determination::gauss::GaussObs;
use cometfit::initial_orbit_determination::IODParams;
use cometfit::time::{offset_days, parse_utc};

const OBLIQUITY: f64 = 0.409_092_8;

/// Circular orbit tilted about the x axis, position at `days` after the reference.
fn circular_position(radius_au: f64, inclination: f64, phase: f64, days: f64) -> Vector3<f64> {
    let radius = radius_au * AU;
    let n = (GM_SUN / radius.powi(3)).sqrt();
    let theta = phase + n * days * 86_400.0;
    let (s, c) = inclination.sin_cos();
    Vector3::new(
        radius * theta.cos(),
        radius * theta.sin() * c,
        radius * theta.sin() * s,
    )
}

/// Noise-free triplet of a body on a 2 AU circular orbit seen from a circular Earth.
fn make_fixture_gaussobs(t0: Epoch, comet_phase: f64, spacing_days: f64) -> GaussObs {
    let days = [0.0, spacing_days, 2.0 * spacing_days];
    let earth = days.map(|d| circular_position(1.0, OBLIQUITY, 0.3, d));
    let comet = days.map(|d| circular_position(2.0, 0.5, comet_phase, d));

    let los = [0, 1, 2].map(|k| comet[k] - earth[k]);
    let ra = Vector3::from_fn(|k, _| los[k].y.atan2(los[k].x));
    let dec = Vector3::from_fn(|k, _| (los[k].z / los[k].norm()).asin());

    GaussObs::with_observer_position(
        [1, 2, 3],
        ra,
        dec,
        days.map(|d| offset_days(&t0, d)),
        Matrix3::from_columns(&earth),
    )
}

fn bench_single_solve(c: &mut Criterion) {
    let t0 = parse_utc("2030-01-01T00:00:00").unwrap();
    let gauss = make_fixture_gaussobs(t0, 0.9, 10.0);
    let params = IODParams::default();

    c.bench_function("gauss_prelim_orbit/single_solve", |b| {
        b.iter(|| black_box(black_box(&gauss).solve(&params).ok()))
    });

    c.bench_function("gauss_prelim_orbit/prelim_only", |b| {
        b.iter(|| black_box(black_box(&gauss).gauss_prelim(&params).ok()))
    });
}

fn bench_batch(c: &mut Criterion) {
    let t0 = parse_utc("2030-01-01T00:00:00").unwrap();
    let params = IODParams::default();
    let mut rng = StdRng::seed_from_u64(42);

    c.bench_function("gauss_prelim_orbit/batch_100", |b| {
        b.iter_batched(
            || {
                (0..100)
                    .map(|_| {
                        make_fixture_gaussobs(
                            t0,
                            rng.random_range(0.0..std::f64::consts::TAU),
                            rng.random_range(5.0..20.0),
                        )
                    })
                    .collect::<Vec<_>>()
            },
            |batch| {
                for gauss in &batch {
                    black_box(gauss.solve(&params).ok());
                }
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_single_solve, bench_batch);
criterion_main!(benches);
