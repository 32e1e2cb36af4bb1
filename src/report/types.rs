//! Data types written to `summary.json`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Daily ridership statistics for one calendar year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearSummary {
    pub(crate) year: i32,
    pub(crate) days: usize,
    pub(crate) mean_daily_entries: f64,
    pub(crate) stddev_daily_entries: f64,
    pub(crate) mean_daily_exits: f64,
    /// Change in mean daily entries against the previous year, in percent.
    pub(crate) entries_change_pct: Option<f64>,
}

/// Total ridership of one station over the whole series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StationRank {
    pub(crate) station: String,
    pub(crate) complex_id: Option<u32>,
    pub(crate) entries: u64,
    pub(crate) exits: u64,
}

/// The day with the most reported cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeakCases {
    pub(crate) date: NaiveDate,
    pub(crate) case_count: u64,
}

#[derive(Debug, Serialize)]
pub struct RidershipSummary {
    pub(crate) schema_version: u8,
    pub(crate) generated_at: DateTime<Utc>,
    pub(crate) first_date: Option<NaiveDate>,
    pub(crate) last_date: Option<NaiveDate>,
    pub(crate) records: usize,
    pub(crate) unmapped_records: usize,
    pub(crate) years: Vec<YearSummary>,
    pub(crate) peak_cases: Option<PeakCases>,
    pub(crate) top_stations: Vec<StationRank>,
}
