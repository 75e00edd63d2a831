//! # Constants and type definitions for cometfit
//!
//! This module centralizes the **physical constants**, **conversion factors** and
//! **type aliases** used throughout the crate.
//!
//! ## Units
//!
//! Internally every computation works in:
//!
//! - kilometers for distances,
//! - kilometers per second for velocities,
//! - seconds for time intervals,
//! - radians for angles.
//!
//! Astronomical units and degrees only appear at reporting boundaries
//! (see [`OrbitSummary`](crate::orbit_type::summary::OrbitSummary)).

// -------------------------------------------------------------------------------------------------
// Physical constants and unit conversions
// -------------------------------------------------------------------------------------------------

/// 2π, useful for trigonometric conversions
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Number of seconds in a day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Number of days in a Julian century
pub const DAYS_PER_JULIAN_CENTURY: f64 = 36_525.0;

/// Astronomical Unit in kilometers (IAU 2012)
pub const AU: f64 = 149_597_870.7;

/// Heliocentric gravitational constant μ☉ in km³/s²
pub const GM_SUN: f64 = 1.327_124_400_18e11;

/// Julian date of the J2000.0 epoch (TT)
pub const J2000_JD: f64 = 2_451_545.0;

/// Degrees → radians
pub const RADEG: f64 = std::f64::consts::PI / 180.0;

/// Arcseconds → radians
pub const RADSEC: f64 = std::f64::consts::PI / 648_000.0;

/// Hours → radians
pub const RADH: f64 = DPI / 24.0;

/// Mean obliquity of the ecliptic at J2000 (IAU 1976), in arcseconds
pub const OBLIQUITY_J2000_ARCSEC: f64 = 84_381.448;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in degrees
pub type Degree = f64;
/// Angle in radians
pub type Radian = f64;
/// Angle in hours (right ascension at the storage boundary)
pub type Hour = f64;
/// Distance in kilometers
pub type Kilometer = f64;
/// Time interval in seconds
pub type Seconds = f64;

/// Opaque identifier of an observation record, owned by the storage layer.
pub type ObservationId = u64;
