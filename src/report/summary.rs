use chrono::{Datelike, Utc};
use std::collections::{BTreeMap, HashMap};

use crate::enrich::EnrichedDay;
use crate::model::{RidershipRecord, StationDailyTotal};
use crate::report::types::{PeakCases, RidershipSummary, StationRank, YearSummary};
use crate::report::utility::{mean, pct_change, stddev};

/// Summarizes the merged ridership series.
///
/// `series` is the enriched system series in date order, `stations` the
/// per-station daily totals. The `top_n` busiest stations by entries are
/// ranked; ties are broken by station name.
pub fn build_summary(
    records: &[RidershipRecord],
    series: &[EnrichedDay],
    stations: &[StationDailyTotal],
    top_n: usize,
) -> RidershipSummary {
    let mut by_year: BTreeMap<i32, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for day in series {
        let (entries, exits) = by_year.entry(day.date.year()).or_default();
        entries.push(day.entries as f64);
        exits.push(day.exits as f64);
    }

    let mut years = Vec::with_capacity(by_year.len());
    let mut previous_mean: Option<f64> = None;
    for (year, (entries, exits)) in by_year {
        let mean_entries = mean(&entries);
        years.push(YearSummary {
            year,
            days: entries.len(),
            mean_daily_entries: mean_entries,
            stddev_daily_entries: stddev(&entries, mean_entries),
            mean_daily_exits: mean(&exits),
            entries_change_pct: previous_mean.and_then(|p| pct_change(p, mean_entries)),
        });
        previous_mean = Some(mean_entries);
    }

    let peak_cases = series
        .iter()
        .filter(|d| d.case_count > 0)
        .max_by(|a, b| a.case_count.cmp(&b.case_count).then(b.date.cmp(&a.date)))
        .map(|d| PeakCases {
            date: d.date,
            case_count: d.case_count,
        });

    RidershipSummary {
        schema_version: 1,
        generated_at: Utc::now(),
        first_date: series.first().map(|d| d.date),
        last_date: series.last().map(|d| d.date),
        records: records.len(),
        unmapped_records: records.iter().filter(|r| r.complex_id.is_none()).count(),
        years,
        peak_cases,
        top_stations: rank_stations(stations, top_n),
    }
}

fn rank_stations(stations: &[StationDailyTotal], top_n: usize) -> Vec<StationRank> {
    let mut totals: HashMap<(&str, Option<u32>), (u64, u64)> = HashMap::new();
    for day in stations {
        let t = totals
            .entry((day.station.as_str(), day.complex_id))
            .or_default();
        t.0 += day.entries;
        t.1 += day.exits;
    }

    let mut ranked: Vec<StationRank> = totals
        .into_iter()
        .map(|((station, complex_id), (entries, exits))| StationRank {
            station: station.to_string(),
            complex_id,
            entries,
            exits,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.entries
            .cmp(&a.entries)
            .then_with(|| a.station.cmp(&b.station))
            .then_with(|| a.complex_id.cmp(&b.complex_id))
    });
    ranked.truncate(top_n);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32, entries: u64, cases: u64) -> EnrichedDay {
        EnrichedDay {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            entries,
            exits: entries / 2,
            case_count: cases,
            entries_avg: None,
            exits_avg: None,
            cases_avg: None,
        }
    }

    fn station(name: &str, d: u32, entries: u64) -> StationDailyTotal {
        StationDailyTotal {
            date: NaiveDate::from_ymd_opt(2020, 1, d).unwrap(),
            station: name.to_string(),
            complex_id: None,
            entries,
            exits: 0,
        }
    }

    #[test]
    fn test_year_summaries_and_change() {
        let series = vec![
            day(2019, 12, 30, 400, 0),
            day(2019, 12, 31, 600, 0),
            day(2020, 4, 1, 100, 3000),
            day(2020, 4, 2, 150, 6000),
        ];

        let summary = build_summary(&[], &series, &[], 5);

        assert_eq!(summary.years.len(), 2);
        assert_eq!(summary.years[0].year, 2019);
        assert_eq!(summary.years[0].mean_daily_entries, 500.0);
        assert_eq!(summary.years[0].stddev_daily_entries, 100.0);
        assert_eq!(summary.years[0].entries_change_pct, None);
        assert_eq!(summary.years[1].mean_daily_entries, 125.0);
        assert_eq!(summary.years[1].entries_change_pct, Some(-75.0));
        assert_eq!(
            summary.peak_cases.map(|p| p.case_count),
            Some(6000)
        );
        assert_eq!(summary.first_date, Some(NaiveDate::from_ymd_opt(2019, 12, 30).unwrap()));
    }

    #[test]
    fn test_top_stations_ranked_by_entries() {
        let stations = vec![
            station("34 ST-PENN STA", 1, 500),
            station("GRD CNTRL-42 ST", 1, 700),
            station("34 ST-PENN STA", 2, 400),
            station("FULTON ST", 1, 100),
        ];

        let summary = build_summary(&[], &[], &stations, 2);

        let names: Vec<&str> = summary.top_stations.iter().map(|s| s.station.as_str()).collect();
        assert_eq!(names, vec!["34 ST-PENN STA", "GRD CNTRL-42 ST"]);
        assert_eq!(summary.top_stations[0].entries, 900);
        assert!(summary.peak_cases.is_none());
    }
}
