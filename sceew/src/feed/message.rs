//! Classification of raw feed payloads.

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::Value;

use crate::common::GeoPoint;
use crate::error::{Result, SceewError};
use crate::time::parse_origin_time;

/// The `type` value of liveness messages.
pub const HEARTBEAT_TYPE: &str = "heartbeat";

/// A classified inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    Heartbeat,
    Report(QuakeReport),
}

/// One detection or update for a seismic event.
#[derive(Debug, Clone, PartialEq)]
pub struct QuakeReport {
    /// Origin time as published, in the feed's local timezone.
    pub origin_local: NaiveDateTime,
    /// The same origin time as an absolute instant.
    pub origin: DateTime<Utc>,
    pub hypocenter: String,
    pub magnitude: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub max_intensity: f64,
    pub report_num: u32,
}

impl QuakeReport {
    pub fn epicenter(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Wire shape of a report. Field names (including the `Magunitude` spelling)
/// are fixed by the provider.
#[derive(Debug, Deserialize)]
struct RawReport {
    #[serde(rename = "OriginTime")]
    origin_time: String,
    #[serde(rename = "HypoCenter")]
    hypocenter: String,
    #[serde(rename = "Magunitude")]
    magnitude: f64,
    #[serde(rename = "Latitude")]
    latitude: f64,
    #[serde(rename = "Longitude")]
    longitude: f64,
    #[serde(rename = "MaxIntensity")]
    max_intensity: f64,
    #[serde(rename = "ReportNum")]
    report_num: u32,
}

/// Parses and classifies one payload.
///
/// The `type` field decides the shape: the heartbeat sentinel yields
/// [`FeedMessage::Heartbeat`], anything else must carry every report field.
pub fn classify(raw: &str, tz: Tz) -> Result<FeedMessage> {
    let value: Value = serde_json::from_str(raw)?;
    let kind = value
        .get("type")
        .ok_or_else(|| SceewError::parse("missing field `type`"))?
        .as_str()
        .ok_or_else(|| SceewError::parse("field `type` is not a string"))?;

    if kind == HEARTBEAT_TYPE {
        return Ok(FeedMessage::Heartbeat);
    }

    let raw_report: RawReport = serde_json::from_value(value)?;
    let (origin_local, origin) = parse_origin_time(&raw_report.origin_time, tz)?;
    Ok(FeedMessage::Report(QuakeReport {
        origin_local,
        origin,
        hypocenter: raw_report.hypocenter,
        magnitude: raw_report.magnitude,
        latitude: raw_report.latitude,
        longitude: raw_report.longitude,
        max_intensity: raw_report.max_intensity,
        report_num: raw_report.report_num,
    }))
}
