//! # cometfit
//!
//! Preliminary orbit determination of a small body from angle-only sightings,
//! and prediction of its closest approach to the Earth.
//!
//! The entry point is [`pipeline::OrbitPipeline`]. Each stage is also usable on its own:
//!
//! * [`observations`] – sightings and triplet selection,
//! * [`initial_orbit_determination`] – Gauss method,
//! * [`orbit_type`] – state vector ↔ orbital elements,
//! * [`kepler`] – two-body propagation,
//! * [`closest_approach`] – minimum-distance search against a [`ephemeris::PositionProvider`].
//!
//! Internal units are km, km/s, seconds and radians; AU and degrees only appear in
//! reports ([`orbit_type::summary::OrbitSummary`]).
pub mod closest_approach;
pub mod cometfit_errors;
pub mod constants;
pub mod ephemeris;
pub mod geometry;
pub mod initial_orbit_determination;
pub mod kepler;
pub mod observations;
pub mod orbit_type;
pub mod pipeline;
pub mod state_vector;
pub mod time;
