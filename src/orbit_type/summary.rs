//! Serializable report of a computed orbit, in the units the surrounding
//! service hands out: astronomical units, degrees and UTC timestamps.
use serde::Serialize;

use crate::closest_approach::ClosestApproach;
use crate::constants::{ObservationId, AU, RADEG};
use crate::ephemeris::BodyId;
use crate::geometry::ReferencePlane;
use crate::orbit_type::OrbitalElements;
use crate::time::format_utc;

/// Undefined quantities (NaN) are reported as `None`.
fn defined(x: f64) -> Option<f64> {
    x.is_finite().then_some(x)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrbitSummary {
    pub epoch: String,
    pub reference_plane: ReferencePlane,
    pub semi_major_axis_au: Option<f64>,
    pub perihelion_distance_au: f64,
    pub eccentricity: f64,
    pub inclination_deg: f64,
    pub ascending_node_deg: Option<f64>,
    pub periapsis_argument_deg: Option<f64>,
    pub perihelion_time: Option<String>,
    pub approach_body: BodyId,
    pub approach_time: String,
    pub approach_distance_km: f64,
    pub approach_speed_kms: f64,
    pub observation_ids: Vec<ObservationId>,
}

impl OrbitSummary {
    pub fn new(
        elements: &OrbitalElements,
        approach: &ClosestApproach,
        approach_body: BodyId,
        observation_ids: &[ObservationId],
    ) -> Self {
        let deg = |x: f64| defined(x / RADEG);
        OrbitSummary {
            epoch: format_utc(&elements.epoch),
            reference_plane: elements.reference_plane,
            semi_major_axis_au: defined(elements.semi_major_axis / AU),
            perihelion_distance_au: elements.perihelion_distance / AU,
            eccentricity: elements.eccentricity,
            inclination_deg: elements.inclination / RADEG,
            ascending_node_deg: deg(elements.ascending_node_longitude),
            periapsis_argument_deg: deg(elements.periapsis_argument),
            perihelion_time: elements.periapsis_epoch.as_ref().map(format_utc),
            approach_body,
            approach_time: format_utc(&approach.epoch),
            approach_distance_km: approach.distance_km,
            approach_speed_kms: approach.relative_speed_kms,
            observation_ids: observation_ids.to_vec(),
        }
    }
}
