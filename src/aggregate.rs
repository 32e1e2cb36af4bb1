//! Daily roll-ups of normalized intervals and joined ridership records.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

use crate::model::{
    DailyTurnstileTotal, NormalizedInterval, RidershipRecord, StationDailyTotal, SystemDailyTotal,
    TurnstileId,
};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct DailyKey {
    turnstile_id: TurnstileId,
    date: NaiveDate,
    station: String,
    line_name: String,
    unit: String,
    control_area: String,
    scp: String,
}

/// Sums intervals into one row per turnstile per day, ordered by turnstile
/// then date.
pub fn daily_turnstile_totals(intervals: &[NormalizedInterval]) -> Vec<DailyTurnstileTotal> {
    let mut groups: BTreeMap<DailyKey, (u64, u64)> = BTreeMap::new();

    for interval in intervals {
        let key = DailyKey {
            turnstile_id: interval.turnstile_id.clone(),
            date: interval.date,
            station: interval.station.clone(),
            line_name: interval.line_name.clone(),
            unit: interval.unit.clone(),
            control_area: interval.control_area.clone(),
            scp: interval.scp.clone(),
        };
        let totals = groups.entry(key).or_default();
        totals.0 += interval.entries;
        totals.1 += interval.exits;
    }

    debug!(
        intervals = intervals.len(),
        days = groups.len(),
        "Turnstile days aggregated"
    );

    groups
        .into_iter()
        .map(|(key, (entries, exits))| DailyTurnstileTotal {
            turnstile_id: key.turnstile_id,
            date: key.date,
            station: key.station,
            line_name: key.line_name,
            unit: key.unit,
            control_area: key.control_area,
            scp: key.scp,
            entries,
            exits,
        })
        .collect()
}

/// Ridership per station per day, ordered by date then station.
///
/// Stations are keyed by name and complex id so that distinct stations
/// sharing an abbreviated name stay apart once mapped.
pub fn station_daily_totals(records: &[RidershipRecord]) -> Vec<StationDailyTotal> {
    let mut groups: BTreeMap<(NaiveDate, &str, Option<u32>), (u64, u64)> = BTreeMap::new();

    for record in records {
        let totals = groups
            .entry((record.date, record.station.as_str(), record.complex_id))
            .or_default();
        totals.0 += record.entries;
        totals.1 += record.exits;
    }

    groups
        .into_iter()
        .map(|((date, station, complex_id), (entries, exits))| StationDailyTotal {
            date,
            station: station.to_string(),
            complex_id,
            entries,
            exits,
        })
        .collect()
}

/// Ridership across the whole system per day, ordered by date.
pub fn system_daily_totals(records: &[RidershipRecord]) -> Vec<SystemDailyTotal> {
    let mut groups: BTreeMap<NaiveDate, (u64, u64)> = BTreeMap::new();

    for record in records {
        let totals = groups.entry(record.date).or_default();
        totals.0 += record.entries;
        totals.1 += record.exits;
    }

    groups
        .into_iter()
        .map(|(date, (entries, exits))| SystemDailyTotal {
            date,
            entries,
            exits,
        })
        .collect()
}
