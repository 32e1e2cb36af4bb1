//! End-to-end orchestration: raw feeds to snapshot, snapshot to report.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, info_span};

use crate::aggregate::{daily_turnstile_totals, station_daily_totals, system_daily_totals};
use crate::config::PipelineConfig;
use crate::enrich::{CaseCount, EnrichedDay, enrich};
use crate::ingest::{read_station_locations, read_turnstile_file};
use crate::merge::merge_years;
use crate::model::{RawReading, RidershipRecord, StationComplexMapping, StationDailyTotal};
use crate::normalize::{NormalizerConfig, normalize};
use crate::output::{write_csv, write_json};
use crate::report::{RidershipSummary, build_summary};
use crate::resolve::{
    IdentityResolver, MappingOutcome, MappingSource, derive_mapping, load_or_derive,
};

/// Normalizes, aggregates and resolves one year of readings.
pub fn process_year(
    readings: &[RawReading],
    normalizer: &NormalizerConfig,
    resolver: &IdentityResolver,
) -> Vec<RidershipRecord> {
    let normalized = normalize(readings, normalizer);
    let totals = daily_turnstile_totals(&normalized.intervals);
    resolver.resolve(totals)
}

fn read_mapping_year(config: &PipelineConfig) -> Result<Vec<RawReading>> {
    let path = config.turnstile_path(config.mapping_year);
    read_turnstile_file(&path)
        .with_context(|| format!("cannot derive station mapping from {}", path.display()))
}

/// Derives the station mapping from the configured mapping year's feed.
pub fn derive_station_mapping(config: &PipelineConfig) -> Result<Vec<StationComplexMapping>> {
    Ok(derive_mapping(&read_mapping_year(config)?))
}

/// Loads the curated mapping from `source`, or derives and stores one.
///
/// A derived mapping hands back the mapping year's readings it was built
/// from, so that year is not read twice.
pub fn resolve_mapping<S>(
    config: &PipelineConfig,
    source: &S,
) -> Result<(MappingOutcome, Option<Vec<RawReading>>)>
where
    S: MappingSource + ?Sized,
{
    let mut readings = None;
    let outcome = load_or_derive(source, || {
        let loaded = read_mapping_year(config)?;
        let rows = derive_mapping(&loaded);
        readings = Some(loaded);
        Ok(rows)
    })?;
    Ok((outcome, readings))
}

/// Runs the full pipeline over every configured year and merges the result.
#[tracing::instrument(skip_all, fields(years = ?config.years))]
pub fn build_ridership<S>(config: &PipelineConfig, mapping: &S) -> Result<Vec<RidershipRecord>>
where
    S: MappingSource + ?Sized,
{
    let (mapping, mut mapping_readings) = resolve_mapping(config, mapping)?;
    let locations = read_station_locations(&config.station_locations)?;
    let resolver = IdentityResolver::new(mapping.into_rows(), locations);

    let mut years = Vec::with_capacity(config.years.len());
    for &year in &config.years {
        let _span = info_span!("year", year).entered();
        let readings = match mapping_readings.take_if(|_| year == config.mapping_year) {
            Some(readings) => readings,
            None => read_turnstile_file(&config.turnstile_path(year))?,
        };
        let records = process_year(&readings, &config.normalizer, &resolver);
        info!(records = records.len(), "Year processed");
        years.push((year, records));
    }

    Ok(merge_years(years))
}

/// Serves the merged records from the snapshot cache, building it on a miss.
pub fn load_or_build<S>(config: &PipelineConfig, mapping: &S) -> Result<Vec<RidershipRecord>>
where
    S: MappingSource + ?Sized,
{
    config
        .snapshot_cache()?
        .get_or_build(|| build_ridership(config, mapping))
}

/// Everything the reporting stage produces.
#[derive(Debug)]
pub struct Report {
    pub series: Vec<EnrichedDay>,
    pub stations: Vec<StationDailyTotal>,
    pub summary: RidershipSummary,
}

pub fn build_report(
    records: &[RidershipRecord],
    cases: &[CaseCount],
    config: &PipelineConfig,
) -> Report {
    let system = system_daily_totals(records);
    let series = enrich(&system, cases, config.moving_average_window);
    let stations = station_daily_totals(records);
    let summary = build_summary(records, &series, &stations, config.top_stations);

    Report {
        series,
        stations,
        summary,
    }
}

/// Paths of the files written by [`write_report`].
#[derive(Debug, Clone)]
pub struct ReportFiles {
    pub series: PathBuf,
    pub stations: PathBuf,
    pub summary: PathBuf,
}

impl ReportFiles {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            series: dir.join("daily_series.csv"),
            stations: dir.join("station_daily.csv"),
            summary: dir.join("summary.json"),
        }
    }
}

#[tracing::instrument(skip_all, fields(dir = %dir.display()))]
pub fn write_report(report: &Report, dir: &Path) -> Result<ReportFiles> {
    let files = ReportFiles::in_dir(dir);
    write_csv(&files.series, &report.series)?;
    write_csv(&files.stations, &report.stations)?;
    write_json(&files.summary, &report.summary)?;

    info!(
        days = report.series.len(),
        station_days = report.stations.len(),
        "Report written"
    );
    Ok(files)
}
