//! Local shaking estimate from a report and the observer's position.
//!
//! Everything here is pure. The only failure mode, a non-positive distance
//! fed into the attenuation law, is logged and replaced by a tiny positive
//! distance so a bad estimate can never block the raw report from showing.

use serde::Serialize;
use std::fmt;
use tracing::warn;

use crate::common::GeoPoint;
use crate::error::SceewError;
use crate::feed::QuakeReport;

/// Equatorial Earth radius used by the haversine distance, in km.
pub const EARTH_RADIUS_KM: f64 = 6378.137;

/// Distance substituted for degenerate inputs, in km.
pub const MIN_DISTANCE_KM: f64 = 0.001;

/// Great-circle distance between two points using the haversine formula.
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Rejects distances the attenuation law cannot take a logarithm of.
pub fn checked_distance(distance_km: f64) -> Result<f64, SceewError> {
    if distance_km > 0.0 && distance_km.is_finite() {
        Ok(distance_km)
    } else {
        Err(SceewError::Estimation(format!(
            "epicentral distance {distance_km} km is not a positive finite number"
        )))
    }
}

/// Estimated local intensity: `max(1.92 + 1.63*M - 3.49*log10(D), 0)`.
pub fn estimate_intensity(magnitude: f64, distance_km: f64) -> f64 {
    let distance = checked_distance(distance_km).unwrap_or_else(|err| {
        warn!(error = %err, fallback_km = MIN_DISTANCE_KM, "using fallback distance");
        MIN_DISTANCE_KM
    });
    (1.92 + 1.63 * magnitude - 3.49 * distance.log10()).max(0.0)
}

/// Four-level qualitative severity used for message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityTier {
    /// Intensity below 1: nothing felt.
    Unfelt,
    Light,
    Moderate,
    Severe,
}

impl SeverityTier {
    pub fn from_intensity(intensity: f64) -> Self {
        if intensity >= 4.0 {
            SeverityTier::Severe
        } else if intensity >= 2.0 {
            SeverityTier::Moderate
        } else if intensity >= 1.0 {
            SeverityTier::Light
        } else {
            SeverityTier::Unfelt
        }
    }

    /// What the observer should expect and do.
    pub fn advice(&self) -> &'static str {
        match self {
            SeverityTier::Unfelt => "no shaking expected, no action needed",
            SeverityTier::Light => "light shaking expected, no action needed",
            SeverityTier::Moderate => "strong shaking expected, take cover as appropriate",
            SeverityTier::Severe => "severe shaking expected, take cover now",
        }
    }
}

impl fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SeverityTier::Unfelt => "none",
            SeverityTier::Light => "light",
            SeverityTier::Moderate => "moderate",
            SeverityTier::Severe => "severe",
        };
        f.write_str(label)
    }
}

/// Three-level classification selecting the alert clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundLevel {
    Silent,
    Low,
    High,
}

impl SoundLevel {
    pub fn from_intensity(intensity: f64) -> Self {
        if intensity >= 4.0 {
            SoundLevel::High
        } else if intensity >= 1.0 {
            SoundLevel::Low
        } else {
            SoundLevel::Silent
        }
    }

    /// Numeric level, 0 to 2.
    pub fn index(&self) -> u8 {
        match self {
            SoundLevel::Silent => 0,
            SoundLevel::Low => 1,
            SoundLevel::High => 2,
        }
    }
}

/// Everything derived from one report for one observer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedAlert {
    pub distance_km: f64,
    pub intensity: f64,
    pub tier: SeverityTier,
    pub sound_level: SoundLevel,
}

impl DerivedAlert {
    pub fn from_distance(magnitude: f64, distance_km: f64) -> Self {
        let intensity = estimate_intensity(magnitude, distance_km);
        Self {
            distance_km,
            intensity,
            tier: SeverityTier::from_intensity(intensity),
            sound_level: SoundLevel::from_intensity(intensity),
        }
    }

    pub fn compute(report: &QuakeReport, observer: GeoPoint) -> Self {
        let distance = distance_km(report.epicenter(), observer);
        Self::from_distance(report.magnitude, distance)
    }
}
