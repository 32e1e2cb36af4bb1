//! CSV readers for the turnstile feed and the station reference table.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::IngestError;
use crate::model::{RawReading, StationLocation, is_subway_division};

/// Date layouts seen in the turnstile and case-count exports.
const DATE_FORMATS: [&str; 3] = ["%m/%d/%Y", "%m-%d-%Y", "%Y-%m-%d"];

/// A turnstile CSV row before date/time parsing.
#[derive(Debug, Deserialize)]
struct TurnstileRow {
    #[serde(rename = "C/A")]
    control_area: String,
    #[serde(rename = "UNIT")]
    unit: String,
    #[serde(rename = "SCP")]
    scp: String,
    #[serde(rename = "STATION")]
    station: String,
    #[serde(rename = "LINENAME")]
    line_name: String,
    #[serde(rename = "DIVISION")]
    division: String,
    #[serde(rename = "DATE")]
    date: String,
    #[serde(rename = "TIME")]
    time: String,
    #[serde(rename = "DESC", default)]
    description: String,
    #[serde(rename = "ENTRIES")]
    entries: i64,
    #[serde(rename = "EXITS")]
    exits: i64,
}

/// Location of the turnstile export for `year` inside `dir`.
pub fn turnstile_path(dir: &Path, year: i32) -> PathBuf {
    dir.join(format!("turnstile_{year}.csv"))
}

/// Parses a date in any of the accepted layouts.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M:%S").ok()
}

/// Reads one yearly turnstile export, keeping only subway divisions.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn read_turnstile_file(path: &Path) -> Result<Vec<RawReading>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open turnstile file {}", path.display()))?;
    let readings = parse_turnstile_csv(file, &path.display().to_string())?;
    info!(readings = readings.len(), "Turnstile file loaded");
    Ok(readings)
}

/// Parses turnstile CSV from any reader. `source_name` labels errors.
///
/// # Errors
///
/// Fails on the first row whose date, time or counters cannot be parsed.
pub fn parse_turnstile_csv<R: Read>(reader: R, source_name: &str) -> Result<Vec<RawReading>> {
    // Exported headers carry trailing padding, e.g. "EXITS      ".
    let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(reader);

    let headers = rdr.headers()?.clone();

    let mut readings = Vec::new();
    let mut skipped = 0usize;

    for result in rdr.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let row: TurnstileRow =
            record
                .deserialize(Some(&headers))
                .map_err(|e| IngestError::InvalidRow {
                    source_name: source_name.to_string(),
                    line,
                    message: e.to_string(),
                })?;

        let date = parse_date(&row.date).ok_or_else(|| IngestError::InvalidDate {
            source_name: source_name.to_string(),
            line,
            value: row.date.clone(),
        })?;
        let time = parse_time(&row.time).ok_or_else(|| IngestError::InvalidTime {
            source_name: source_name.to_string(),
            line,
            value: row.time.clone(),
        })?;

        // Every row is validated, including the ones filtered out below.
        if !is_subway_division(&row.division) {
            skipped += 1;
            continue;
        }

        readings.push(RawReading {
            control_area: row.control_area,
            unit: row.unit,
            scp: row.scp,
            station: row.station,
            line_name: row.line_name,
            division: row.division,
            date,
            time,
            description: row.description,
            entries: row.entries,
            exits: row.exits,
        });
    }

    debug!(
        source = source_name,
        kept = readings.len(),
        skipped,
        "Dropped non-subway divisions"
    );
    Ok(readings)
}

/// Reads the station reference table.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn read_station_locations(path: &Path) -> Result<Vec<StationLocation>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open station table {}", path.display()))?;
    let locations = parse_station_csv(file)
        .with_context(|| format!("failed to parse station table {}", path.display()))?;
    info!(stations = locations.len(), "Station table loaded");
    Ok(locations)
}

pub fn parse_station_csv<R: Read>(reader: R) -> Result<Vec<StationLocation>> {
    let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let mut locations = Vec::new();
    for result in rdr.deserialize() {
        let location: StationLocation = result?;
        locations.push(location);
    }
    Ok(locations)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "C/A,UNIT,SCP,STATION,LINENAME,DIVISION,DATE,TIME,DESC,ENTRIES,EXITS     \n";

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2019, 12, 28).unwrap();
        assert_eq!(parse_date("12/28/2019"), Some(expected));
        assert_eq!(parse_date("12-28-2019"), Some(expected));
        assert_eq!(parse_date("2019-12-28"), Some(expected));
        assert_eq!(parse_date("28.12.2019"), None);
    }

    #[test]
    fn test_parse_turnstile_csv_keeps_subway_only() {
        let data = format!(
            "{HEADER}\
             A002,R051,02-00-00,59 ST,NQR456W,BMT,12/21/2019,03:00:00,REGULAR,0007299373,0002475395\n\
             PTH01,R549,00-00-00,NEWARK BM BW,1,PTH,12/21/2019,00:04:16,REGULAR,0000010253,0000004127\n"
        );

        let readings = parse_turnstile_csv(data.as_bytes(), "test").unwrap();

        assert_eq!(readings.len(), 1);
        let r = &readings[0];
        assert_eq!(r.unit, "R051");
        assert_eq!(r.entries, 7299373);
        assert_eq!(r.exits, 2475395);
        assert_eq!(r.time, NaiveTime::from_hms_opt(3, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_turnstile_csv_rejects_bad_date() {
        let data = format!(
            "{HEADER}A002,R051,02-00-00,59 ST,NQR456W,BMT,2019/21/12,03:00:00,REGULAR,1,1\n"
        );

        let err = parse_turnstile_csv(data.as_bytes(), "bad.csv").unwrap_err();
        let ingest = err.downcast_ref::<IngestError>().unwrap();
        assert!(matches!(ingest, IngestError::InvalidDate { line: 2, .. }));
    }

    #[test]
    fn test_parse_turnstile_csv_rejects_bad_date_outside_subway() {
        let data = format!(
            "{HEADER}\
             A002,R051,02-00-00,59 ST,NQR456W,BMT,12/21/2019,03:00:00,REGULAR,1,1\n\
             PTH01,R549,00-00-00,NEWARK BM BW,1,PTH,garbage,00:04:16,REGULAR,1,1\n"
        );

        let err = parse_turnstile_csv(data.as_bytes(), "bad.csv").unwrap_err();
        let ingest = err.downcast_ref::<IngestError>().unwrap();
        assert!(matches!(ingest, IngestError::InvalidDate { line: 3, .. }));
    }

    #[test]
    fn test_parse_turnstile_csv_rejects_bad_counter() {
        let data = format!(
            "{HEADER}A002,R051,02-00-00,59 ST,NQR456W,BMT,12/21/2019,03:00:00,REGULAR,abc,1\n"
        );

        assert!(parse_turnstile_csv(data.as_bytes(), "bad.csv").is_err());
    }

    #[test]
    fn test_parse_station_csv() {
        let data = "Station ID,Complex ID,GTFS Stop ID,Division,Line,Stop Name,Borough,Daytime Routes,Structure,GTFS Latitude,GTFS Longitude,ADA\n\
                    8,613,R11,BMT,Astoria,Lexington Av/59 St,M,N W R,Subway,40.76266,-73.967258,0\n";

        let locations = parse_station_csv(data.as_bytes()).unwrap();

        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].complex_id, 613);
        assert_eq!(locations[0].stop_name, "Lexington Av/59 St");
        assert_eq!(locations[0].ada, Some(0));
    }
}
