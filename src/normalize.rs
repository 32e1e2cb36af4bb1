//! Reconstruction of per-interval ridership from cumulative turnstile counters.
//!
//! Each turnstile reports monotonically increasing entry and exit counters
//! roughly every four hours. Differencing consecutive readings gives the
//! riders in between, except when the device was swapped, the counter reset
//! or ran backwards, or readings went missing. Those cases are absorbed here
//! with a fixed policy instead of being surfaced as errors:
//!
//! | Situation                               | Delta          |
//! |-----------------------------------------|----------------|
//! | first reading of a turnstile            | 0              |
//! | day difference outside `0..=max_day_gap`| 0              |
//! | `abs(diff) > max_delta`                 | 0              |
//! | negative diff within `max_delta`        | `abs(diff)`    |
//! | otherwise                               | `diff`         |

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::{NormalizedInterval, ObservationId, RawReading, TurnstileId};

pub const DEFAULT_MAX_DELTA: u64 = 10_000;
pub const DEFAULT_MAX_DAY_GAP: i64 = 1;

/// Thresholds of the anomaly policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Largest plausible change of one counter between two readings.
    pub max_delta: u64,
    /// Largest day-of-year step between two readings that still counts.
    pub max_day_gap: i64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            max_delta: DEFAULT_MAX_DELTA,
            max_day_gap: DEFAULT_MAX_DAY_GAP,
        }
    }
}

/// Result of differencing one cumulative counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterDelta {
    Forward(u64),
    /// The meter counted down; the magnitude is kept.
    Reversed(u64),
    /// The change was too large to be real ridership.
    Corrupt,
}

impl CounterDelta {
    pub fn between(previous: i64, current: i64, max_delta: u64) -> Self {
        let diff = i128::from(current) - i128::from(previous);
        let magnitude = diff.unsigned_abs();
        if magnitude > u128::from(max_delta) {
            CounterDelta::Corrupt
        } else if diff < 0 {
            CounterDelta::Reversed(magnitude as u64)
        } else {
            CounterDelta::Forward(magnitude as u64)
        }
    }

    pub fn value(self) -> u64 {
        match self {
            CounterDelta::Forward(v) | CounterDelta::Reversed(v) => v,
            CounterDelta::Corrupt => 0,
        }
    }
}

/// Day-of-year difference between two readings. Crossing a year boundary
/// yields a negative value.
pub fn day_diff(previous: NaiveDate, current: NaiveDate) -> i64 {
    i64::from(current.ordinal()) - i64::from(previous.ordinal())
}

/// How many times each branch of the anomaly policy fired.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnomalyCounts {
    pub turnstiles: usize,
    pub first_readings: usize,
    pub day_gaps: usize,
    pub day_rollbacks: usize,
    pub reversed_counters: usize,
    pub corrupt_counters: usize,
    pub duplicate_observations: usize,
}

impl AnomalyCounts {
    fn record(&mut self, delta: CounterDelta) {
        match delta {
            CounterDelta::Forward(_) => {}
            CounterDelta::Reversed(_) => self.reversed_counters += 1,
            CounterDelta::Corrupt => self.corrupt_counters += 1,
        }
    }

    fn merge(&mut self, other: &AnomalyCounts) {
        self.turnstiles += other.turnstiles;
        self.first_readings += other.first_readings;
        self.day_gaps += other.day_gaps;
        self.day_rollbacks += other.day_rollbacks;
        self.reversed_counters += other.reversed_counters;
        self.corrupt_counters += other.corrupt_counters;
        self.duplicate_observations += other.duplicate_observations;
    }
}

/// State carried from one reading of a turnstile to the next.
#[derive(Debug, Clone)]
struct CounterState {
    entries: i64,
    exits: i64,
    date: NaiveDate,
    observation: ObservationId,
}

#[derive(Debug, Default)]
pub struct Normalized {
    pub intervals: Vec<NormalizedInterval>,
    pub anomalies: AnomalyCounts,
}

/// Normalizes the readings of a single turnstile, already in chronological order.
pub fn normalize_turnstile<'a, I>(
    readings: I,
    config: &NormalizerConfig,
) -> (Vec<NormalizedInterval>, AnomalyCounts)
where
    I: IntoIterator<Item = &'a RawReading>,
{
    let mut anomalies = AnomalyCounts {
        turnstiles: 1,
        ..Default::default()
    };
    let mut intervals = Vec::new();
    let mut previous: Option<CounterState> = None;

    for reading in readings {
        let observation = reading.observation_id();

        let (entries, exits) = match &previous {
            None => {
                anomalies.first_readings += 1;
                (0, 0)
            }
            Some(state) => {
                if state.observation == observation {
                    anomalies.duplicate_observations += 1;
                    debug!(observation = observation.as_str(), "Duplicate observation");
                }

                let days = day_diff(state.date, reading.date);
                if days < 0 {
                    anomalies.day_rollbacks += 1;
                    (0, 0)
                } else if days > config.max_day_gap {
                    anomalies.day_gaps += 1;
                    (0, 0)
                } else {
                    let max = config.max_delta;
                    let entries = CounterDelta::between(state.entries, reading.entries, max);
                    let exits = CounterDelta::between(state.exits, reading.exits, max);
                    anomalies.record(entries);
                    anomalies.record(exits);
                    (entries.value(), exits.value())
                }
            }
        };

        intervals.push(NormalizedInterval {
            turnstile_id: reading.turnstile_id(),
            control_area: reading.control_area.clone(),
            unit: reading.unit.clone(),
            scp: reading.scp.clone(),
            station: reading.station.clone(),
            line_name: reading.line_name.clone(),
            date: reading.date,
            time: reading.time,
            entries,
            exits,
        });

        previous = Some(CounterState {
            entries: reading.entries,
            exits: reading.exits,
            date: reading.date,
            observation,
        });
    }

    (intervals, anomalies)
}

/// Normalizes one year of readings.
///
/// Readings are ordered by turnstile then timestamp, with ties kept in input
/// order, and every reading produces exactly one interval.
#[tracing::instrument(skip_all, fields(readings = readings.len()))]
pub fn normalize(readings: &[RawReading], config: &NormalizerConfig) -> Normalized {
    let mut order: Vec<(TurnstileId, NaiveDateTime, usize)> = readings
        .iter()
        .enumerate()
        .map(|(i, r)| (r.turnstile_id(), r.timestamp(), i))
        .collect();
    // The input index makes every key unique, so this is a stable ordering.
    order.sort_unstable();

    let mut normalized = Normalized {
        intervals: Vec::with_capacity(readings.len()),
        anomalies: AnomalyCounts::default(),
    };

    for group in order.chunk_by(|a, b| a.0 == b.0) {
        let (intervals, anomalies) =
            normalize_turnstile(group.iter().map(|(_, _, i)| &readings[*i]), config);
        normalized.intervals.extend(intervals);
        normalized.anomalies.merge(&anomalies);
    }

    let a = &normalized.anomalies;
    info!(
        intervals = normalized.intervals.len(),
        turnstiles = a.turnstiles,
        day_gaps = a.day_gaps,
        day_rollbacks = a.day_rollbacks,
        reversed = a.reversed_counters,
        corrupt = a.corrupt_counters,
        duplicates = a.duplicate_observations,
        "Counters normalized"
    );

    normalized
}
