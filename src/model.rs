//! Row types shared by every pipeline stage.
//!
//! Raw readings come straight from the turnstile feed; everything else is
//! derived once per run and never mutated afterwards.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Divisions that make up the NYC subway. Readings from any other division
/// (PATH, Staten Island Railway, Roosevelt Island Tram) are dropped at ingestion.
pub const SUBWAY_DIVISIONS: [&str; 3] = ["BMT", "IND", "IRT"];

/// Canonical key for one physical turnstile: `unit + control_area + scp`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnstileId(String);

impl TurnstileId {
    pub fn new(unit: &str, control_area: &str, scp: &str) -> Self {
        Self(format!("{unit}{control_area}{scp}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TurnstileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key for one individual reading: turnstile id plus the reading timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObservationId(String);

impl ObservationId {
    pub fn new(turnstile: &TurnstileId, timestamp: NaiveDateTime) -> Self {
        Self(format!("{turnstile}{}", timestamp.format("%m/%d/%Y %H:%M:%S")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One cumulative meter snapshot from the turnstile feed.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    pub control_area: String,
    pub unit: String,
    pub scp: String,
    pub station: String,
    pub line_name: String,
    pub division: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub description: String,
    pub entries: i64,
    pub exits: i64,
}

impl RawReading {
    pub fn turnstile_id(&self) -> TurnstileId {
        TurnstileId::new(&self.unit, &self.control_area, &self.scp)
    }

    pub fn observation_id(&self) -> ObservationId {
        ObservationId::new(&self.turnstile_id(), self.timestamp())
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    pub fn is_subway(&self) -> bool {
        is_subway_division(&self.division)
    }
}

pub fn is_subway_division(division: &str) -> bool {
    SUBWAY_DIVISIONS.contains(&division)
}

/// Validated entries/exits accumulated since the previous reading of the
/// same turnstile. Both deltas are always within `[0, max_delta]`.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedInterval {
    pub turnstile_id: TurnstileId,
    pub control_area: String,
    pub unit: String,
    pub scp: String,
    pub station: String,
    pub line_name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub entries: u64,
    pub exits: u64,
}

/// Sum of one turnstile's intervals over a calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTurnstileTotal {
    pub turnstile_id: TurnstileId,
    pub date: NaiveDate,
    pub station: String,
    pub line_name: String,
    pub unit: String,
    pub control_area: String,
    pub scp: String,
    pub entries: u64,
    pub exits: u64,
}

/// One row of the unit to station-complex table.
///
/// `complex_id` is blank in freshly derived tables and filled in by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationComplexMapping {
    pub unit: String,
    pub station: String,
    #[serde(rename = "linename")]
    pub line_name: String,
    pub division: String,
    pub complex_id: Option<u32>,
}

/// A row of the MTA station reference table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StationLocation {
    #[serde(rename = "Complex ID")]
    pub complex_id: u32,
    #[serde(rename = "Stop Name")]
    pub stop_name: String,
    #[serde(rename = "Borough", default)]
    pub borough: String,
    #[serde(rename = "Daytime Routes", default)]
    pub daytime_routes: String,
    #[serde(rename = "GTFS Latitude")]
    pub latitude: f64,
    #[serde(rename = "GTFS Longitude")]
    pub longitude: f64,
    #[serde(rename = "ADA", default)]
    pub ada: Option<u8>,
}

/// Fully joined per-turnstile daily ridership; the grain of the snapshot cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidershipRecord {
    pub turnstile_id: TurnstileId,
    pub date: NaiveDate,
    pub station: String,
    pub station_name: Option<String>,
    pub line_name: String,
    pub division: Option<String>,
    pub complex_id: Option<u32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub entries: u64,
    pub exits: u64,
}

/// Ridership for one station (or station complex) on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StationDailyTotal {
    pub date: NaiveDate,
    pub station: String,
    pub complex_id: Option<u32>,
    pub entries: u64,
    pub exits: u64,
}

/// System-wide ridership for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SystemDailyTotal {
    pub date: NaiveDate,
    pub entries: u64,
    pub exits: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading() -> RawReading {
        RawReading {
            control_area: "A002".to_string(),
            unit: "R051".to_string(),
            scp: "02-00-00".to_string(),
            station: "59 ST".to_string(),
            line_name: "NQR456W".to_string(),
            division: "BMT".to_string(),
            date: NaiveDate::from_ymd_opt(2020, 3, 14).unwrap(),
            time: NaiveTime::from_hms_opt(4, 0, 0).unwrap(),
            description: "REGULAR".to_string(),
            entries: 7394747,
            exits: 2508844,
        }
    }

    #[test]
    fn test_turnstile_id_concatenates_unit_first() {
        assert_eq!(reading().turnstile_id().as_str(), "R051A00202-00-00");
    }

    #[test]
    fn test_observation_id_includes_timestamp() {
        assert_eq!(
            reading().observation_id().as_str(),
            "R051A00202-00-0003/14/2020 04:00:00"
        );
    }

    #[test]
    fn test_subway_division_filter() {
        let mut r = reading();
        assert!(r.is_subway());
        r.division = "PTH".to_string();
        assert!(!r.is_subway());
        assert!(is_subway_division("IRT"));
        assert!(!is_subway_division("SRT"));
    }
}
