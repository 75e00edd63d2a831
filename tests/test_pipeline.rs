mod common;

use approx::assert_relative_eq;
use cometfit::closest_approach::Trajectory;
use cometfit::cometfit_errors::CometFitError;
use cometfit::constants::{AU, GM_SUN};
use cometfit::ephemeris::{BodyId, KeplerianEarth};
use cometfit::geometry::ReferencePlane;
use cometfit::observations::Observation;
use cometfit::orbit_type::OrbitalElements;
use cometfit::pipeline::{OrbitPipeline, PipelineParams, Stage};
use cometfit::time::{days_between, offset_days};

use crate::common::{
    brute_force_approach, encounter_comet, encounter_epoch, init_logger, sightings,
};

/// Five sightings spread over 20 days, ending 90 days before the encounter.
/// Returned out of chronological order.
fn encounter_sightings() -> Vec<Observation> {
    let first = offset_days(&encounter_epoch(), -110.0);
    let mut obs = sightings(
        &KeplerianEarth,
        &encounter_comet(),
        &first,
        &[0.0, 4.0, 10.0, 15.0, 20.0],
    );
    obs.swap(0, 3);
    obs.swap(1, 4);
    obs
}

#[test]
fn test_pipeline_predicts_encounter() {
    init_logger();

    let pipeline = OrbitPipeline::new(KeplerianEarth, PipelineParams::default()).unwrap();
    let result = pipeline.compute_orbit(&encounter_sightings()).unwrap();

    assert_eq!(result.observation_ids_used, [1, 3, 5]);
    assert_eq!(result.target, BodyId::Earth);
    assert!(result.solution.is_refined());

    let comet = encounter_comet();
    let truth = comet.state_at(&result.state.epoch).unwrap();
    let expected = OrbitalElements::from_state(&truth, GM_SUN, ReferencePlane::Ecliptic).unwrap();
    assert_relative_eq!(result.elements.semi_major_axis, expected.semi_major_axis, max_relative = 1e-4);
    assert_relative_eq!(result.elements.eccentricity, expected.eccentricity, epsilon = 1e-5);
    assert_eq!(result.elements.reference_plane, ReferencePlane::Ecliptic);

    let start = offset_days(&encounter_epoch(), -6.0);
    let end = offset_days(&encounter_epoch(), 1.0);
    let (true_epoch, true_distance) = brute_force_approach(&comet, &start, &end, 1e-3);

    let approach = result.closest_approach;
    assert!(days_between(&true_epoch, &approach.epoch).abs() < 0.02);
    assert_relative_eq!(approach.distance_km, true_distance, max_relative = 1e-3);
    assert!(approach.distance_km < 0.04 * AU);
    assert!(approach.relative_speed_kms > 5.0);
}

#[test]
fn test_pipeline_summary_json() {
    init_logger();

    let pipeline = OrbitPipeline::new(KeplerianEarth, PipelineParams::default()).unwrap();
    let summary = pipeline.compute_orbit(&encounter_sightings()).unwrap().summary();

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["approach_body"], "Earth");
    assert_eq!(json["reference_plane"], "Ecliptic");
    assert_eq!(json["observation_ids"], serde_json::json!([1, 3, 5]));
    assert!(json["perihelion_time"].is_string());
    assert!(json["approach_time"].as_str().unwrap().starts_with("2026-05-"));

    let a_au = json["semi_major_axis_au"].as_f64().unwrap();
    assert_relative_eq!(a_au, 2.0, max_relative = 2e-2);
}

#[test]
fn test_pipeline_params_from_json() {
    let params: PipelineParams = serde_json::from_str(
        r#"{
            "search_window_days": 20.0,
            "max_window_widenings": 3,
            "reference_plane": "Equatorial",
            "iod": { "max_iterations": 80 },
            "search": { "sampling_step_days": 0.5 }
        }"#,
    )
    .unwrap();

    assert_eq!(params.search_window_days, 20.0);
    assert_eq!(params.max_window_widenings, 3);
    assert_eq!(params.reference_plane, ReferencePlane::Equatorial);
    assert_eq!(params.iod.max_iterations, 80);
    assert_eq!(params.iod.min_time_separation_days, 0.03);
    assert_eq!(params.search.sampling_step_days, 0.5);
    assert_eq!(params.target, BodyId::Earth);
    assert!(params.validate().is_ok());
}

#[test]
fn test_pipeline_window_widening() {
    init_logger();
    let obs = encounter_sightings();

    // The separation only decreases over the first 20 days after the central epoch.
    let narrow = PipelineParams::builder()
        .search_window_days(20.0)
        .build()
        .unwrap();
    let err = OrbitPipeline::new(KeplerianEarth, narrow)
        .unwrap()
        .compute_orbit(&obs)
        .unwrap_err();
    assert_eq!(err.stage, Stage::ClosestApproach);
    assert!(matches!(err.source, CometFitError::Search(_)));

    // 20, 40, 80 then 160 days: the last window contains the encounter.
    let widening = PipelineParams::builder()
        .search_window_days(20.0)
        .max_window_widenings(3)
        .build()
        .unwrap();
    let result = OrbitPipeline::new(KeplerianEarth, widening)
        .unwrap()
        .compute_orbit(&obs)
        .unwrap();
    assert!(days_between(&encounter_epoch(), &result.closest_approach.epoch).abs() < 5.0);
    assert!(result.closest_approach.distance_km < 0.04 * AU);
}

#[test]
fn test_pipeline_too_few_observations() {
    let pipeline = OrbitPipeline::new(KeplerianEarth, PipelineParams::default()).unwrap();
    let obs = encounter_sightings();

    let err = pipeline.compute_orbit(&obs[..2]).unwrap_err();
    assert_eq!(err.stage, Stage::Selection);
    assert!(matches!(err.source, CometFitError::InvalidParameter(_)));
}
