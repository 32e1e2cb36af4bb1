//! Joins case counts onto system ridership and smooths every series.

pub mod cases;
pub mod moving_average;

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

pub use cases::{CaseCount, load_case_counts};
pub use moving_average::trailing_mean;

use crate::model::SystemDailyTotal;

pub const DEFAULT_WINDOW: usize = 7;

/// One day of the chart-ready series. Averages are absent until a full
/// window of days is available.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedDay {
    pub date: NaiveDate,
    pub entries: u64,
    pub exits: u64,
    pub case_count: u64,
    pub entries_avg: Option<f64>,
    pub exits_avg: Option<f64>,
    pub cases_avg: Option<f64>,
}

/// Left-joins `cases` onto `totals` by date and adds trailing averages.
///
/// Dates without a case row count as zero cases. When the case series lists
/// a date twice, the first row is used.
pub fn enrich(totals: &[SystemDailyTotal], cases: &[CaseCount], window: usize) -> Vec<EnrichedDay> {
    let mut by_date: HashMap<NaiveDate, u64> = HashMap::new();
    for case in cases {
        by_date.entry(case.date).or_insert(case.case_count);
    }

    let case_counts: Vec<u64> = totals
        .iter()
        .map(|t| by_date.get(&t.date).copied().unwrap_or(0))
        .collect();

    let entries_avg = trailing_mean(&as_f64(totals.iter().map(|t| t.entries)), window);
    let exits_avg = trailing_mean(&as_f64(totals.iter().map(|t| t.exits)), window);
    let cases_avg = trailing_mean(&as_f64(case_counts.iter().copied()), window);

    totals
        .iter()
        .enumerate()
        .map(|(i, t)| EnrichedDay {
            date: t.date,
            entries: t.entries,
            exits: t.exits,
            case_count: case_counts[i],
            entries_avg: entries_avg[i],
            exits_avg: exits_avg[i],
            cases_avg: cases_avg[i],
        })
        .collect()
}

fn as_f64(values: impl Iterator<Item = u64>) -> Vec<f64> {
    values.map(|v| v as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, n).unwrap()
    }

    fn totals(days: u32) -> Vec<SystemDailyTotal> {
        (1..=days)
            .map(|n| SystemDailyTotal {
                date: day(n),
                entries: u64::from(n) * 100,
                exits: u64::from(n) * 10,
            })
            .collect()
    }

    #[test]
    fn test_missing_case_dates_are_zero() {
        let cases = vec![
            CaseCount { date: day(2), case_count: 5 },
            CaseCount { date: day(2), case_count: 99 },
            CaseCount { date: day(30), case_count: 7 },
        ];

        let enriched = enrich(&totals(3), &cases, DEFAULT_WINDOW);

        let counts: Vec<u64> = enriched.iter().map(|d| d.case_count).collect();
        assert_eq!(counts, vec![0, 5, 0]);
    }

    #[test]
    fn test_averages_use_same_trailing_window() {
        let cases: Vec<CaseCount> = (1..=10)
            .map(|n| CaseCount { date: day(n), case_count: u64::from(n) })
            .collect();

        let enriched = enrich(&totals(10), &cases, DEFAULT_WINDOW);

        assert_eq!(enriched.len(), 10);
        for d in &enriched[..6] {
            assert_eq!(d.entries_avg, None);
            assert_eq!(d.exits_avg, None);
            assert_eq!(d.cases_avg, None);
        }
        assert_eq!(enriched[6].entries_avg, Some(400.0));
        assert_eq!(enriched[6].exits_avg, Some(40.0));
        assert_eq!(enriched[6].cases_avg, Some(4.0));
    }

    #[test]
    fn test_no_case_data() {
        let enriched = enrich(&totals(8), &[], DEFAULT_WINDOW);
        assert!(enriched.iter().all(|d| d.case_count == 0));
        assert_eq!(enriched[7].cases_avg, Some(0.0));
    }
}
