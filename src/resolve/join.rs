//! Left joins from daily turnstile totals to station complexes and locations.

use std::collections::{HashMap, HashSet};
use tracing::info;

use crate::model::{
    DailyTurnstileTotal, RidershipRecord, StationComplexMapping, StationLocation, TurnstileId,
};

/// Hash-joins daily totals against the mapping and the station table.
///
/// A total fans out to every mapping row sharing its `(station, unit)` and to
/// every station row sharing the matched complex id. The fan-out is then
/// collapsed on `(turnstile, date, station)`, keeping the first row in join
/// order: mapping rows in table order, then station rows in table order.
/// Totals without a match keep their counts with empty enrichment fields.
pub struct IdentityResolver {
    mapping: Vec<StationComplexMapping>,
    locations: Vec<StationLocation>,
    by_station_unit: HashMap<(String, String), Vec<usize>>,
    by_complex: HashMap<u32, Vec<usize>>,
}

impl IdentityResolver {
    pub fn new(mapping: Vec<StationComplexMapping>, locations: Vec<StationLocation>) -> Self {
        let mut by_station_unit: HashMap<(String, String), Vec<usize>> = HashMap::new();
        for (i, row) in mapping.iter().enumerate() {
            by_station_unit
                .entry((row.station.clone(), row.unit.clone()))
                .or_default()
                .push(i);
        }

        let mut by_complex: HashMap<u32, Vec<usize>> = HashMap::new();
        for (i, location) in locations.iter().enumerate() {
            by_complex.entry(location.complex_id).or_default().push(i);
        }

        Self {
            mapping,
            locations,
            by_station_unit,
            by_complex,
        }
    }

    fn matching_mapping(&self, total: &DailyTurnstileTotal) -> Vec<Option<&StationComplexMapping>> {
        match self
            .by_station_unit
            .get(&(total.station.clone(), total.unit.clone()))
        {
            Some(rows) => rows.iter().map(|&i| Some(&self.mapping[i])).collect(),
            None => vec![None],
        }
    }

    fn matching_locations(&self, complex_id: Option<u32>) -> Vec<Option<&StationLocation>> {
        match complex_id.and_then(|id| self.by_complex.get(&id)) {
            Some(rows) => rows.iter().map(|&i| Some(&self.locations[i])).collect(),
            None => vec![None],
        }
    }

    /// Joins one year of daily totals into ridership records.
    #[tracing::instrument(skip_all, fields(totals = totals.len()))]
    pub fn resolve(&self, totals: Vec<DailyTurnstileTotal>) -> Vec<RidershipRecord> {
        let mut joined = Vec::with_capacity(totals.len());

        for total in &totals {
            for mapping in self.matching_mapping(total) {
                let complex_id = mapping.and_then(|m| m.complex_id);
                for location in self.matching_locations(complex_id) {
                    joined.push(RidershipRecord {
                        turnstile_id: total.turnstile_id.clone(),
                        date: total.date,
                        station: total.station.clone(),
                        station_name: location.and_then(|l| non_blank(&l.stop_name)),
                        line_name: total.line_name.clone(),
                        division: mapping.and_then(|m| non_blank(&m.division)),
                        complex_id,
                        latitude: location.map(|l| l.latitude),
                        longitude: location.map(|l| l.longitude),
                        entries: total.entries,
                        exits: total.exits,
                    });
                }
            }
        }

        let fanned_out = joined.len();
        let records = dedup_first(joined);
        let unmapped = records.iter().filter(|r| r.complex_id.is_none()).count();

        info!(
            fanned_out,
            records = records.len(),
            unmapped,
            "Station identities resolved"
        );

        records
    }
}

/// Blank text reads back from the snapshot as a missing field, so it is
/// stored as one.
fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Keeps the first record for each `(turnstile, date, station)`.
pub fn dedup_first(records: Vec<RidershipRecord>) -> Vec<RidershipRecord> {
    let mut seen: HashSet<(TurnstileId, chrono::NaiveDate, String)> = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert((r.turnstile_id.clone(), r.date, r.station.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{read_records, write_records};
    use chrono::NaiveDate;

    fn total(unit: &str, station: &str, day: u32, entries: u64) -> DailyTurnstileTotal {
        DailyTurnstileTotal {
            turnstile_id: TurnstileId::new(unit, "R101", "00-00-00"),
            date: NaiveDate::from_ymd_opt(2020, 4, day).unwrap(),
            station: station.to_string(),
            line_name: "1".to_string(),
            unit: unit.to_string(),
            control_area: "R101".to_string(),
            scp: "00-00-00".to_string(),
            entries,
            exits: entries + 1,
        }
    }

    fn mapping(
        unit: &str,
        station: &str,
        line: &str,
        complex_id: Option<u32>,
    ) -> StationComplexMapping {
        StationComplexMapping {
            unit: unit.to_string(),
            station: station.to_string(),
            line_name: line.to_string(),
            division: "IRT".to_string(),
            complex_id,
        }
    }

    fn location(complex_id: u32, name: &str, lat: f64) -> StationLocation {
        StationLocation {
            complex_id,
            stop_name: name.to_string(),
            borough: "M".to_string(),
            daytime_routes: "1".to_string(),
            latitude: lat,
            longitude: -73.98,
            ada: Some(1),
        }
    }

    #[test]
    fn test_resolve_enriches_matched_rows() {
        let resolver = IdentityResolver::new(
            vec![mapping("R001", "SOUTH FERRY", "1", Some(635))],
            vec![location(635, "South Ferry", 40.702068)],
        );

        let records = resolver.resolve(vec![total("R001", "SOUTH FERRY", 1, 500)]);

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.complex_id, Some(635));
        assert_eq!(r.station_name.as_deref(), Some("South Ferry"));
        assert_eq!(r.division.as_deref(), Some("IRT"));
        assert_eq!(r.latitude, Some(40.702068));
        assert_eq!((r.entries, r.exits), (500, 501));
    }

    #[test]
    fn test_resolve_keeps_unmatched_rows() {
        let resolver = IdentityResolver::new(
            vec![mapping("R001", "SOUTH FERRY", "1", None)],
            vec![location(635, "South Ferry", 40.702068)],
        );

        let records = resolver.resolve(vec![
            total("R001", "SOUTH FERRY", 1, 10),
            total("R999", "NOWHERE", 1, 20),
        ]);

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.complex_id.is_none()));
        assert!(records.iter().all(|r| r.latitude.is_none()));
        assert_eq!(records[0].division.as_deref(), Some("IRT"));
        assert_eq!(records[1].division, None);
        assert_eq!(records[1].entries, 20);
    }

    #[test]
    fn test_resolve_collapses_fan_out_to_first_match() {
        let resolver = IdentityResolver::new(
            vec![
                mapping("R033", "TIMES SQ-42 ST", "1237ACENQRSW", Some(611)),
                mapping("R033", "TIMES SQ-42 ST", "1237ACENQRS", Some(611)),
            ],
            vec![
                location(611, "Times Sq-42 St", 40.75529),
                location(611, "42 St-Port Authority Bus Terminal", 40.757308),
                location(611, "Times Sq-42 St", 40.755983),
            ],
        );

        let records = resolver.resolve(vec![
            total("R033", "TIMES SQ-42 ST", 1, 1000),
            total("R033", "TIMES SQ-42 ST", 2, 900),
        ]);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].latitude, Some(40.75529));
        assert_eq!(records[1].latitude, Some(40.75529));
        assert_eq!(records[0].entries + records[1].entries, 1900);
    }

    #[test]
    fn test_resolve_joins_on_station_and_unit() {
        let resolver = IdentityResolver::new(
            vec![
                mapping("R001", "WHITEHALL S-FRY", "R1W", Some(635)),
                mapping("R002", "SOUTH FERRY", "1", Some(700)),
            ],
            vec![],
        );

        let records = resolver.resolve(vec![total("R001", "SOUTH FERRY", 1, 10)]);

        assert_eq!(records[0].complex_id, None);
    }

    #[test]
    fn test_blank_enrichment_fields_survive_snapshot() {
        let mut blank = mapping("R001", "SOUTH FERRY", "1", Some(635));
        blank.division = String::new();
        let resolver = IdentityResolver::new(vec![blank], vec![location(635, " ", 40.702068)]);

        let records = resolver.resolve(vec![total("R001", "SOUTH FERRY", 1, 10)]);
        assert_eq!(records[0].division, None);
        assert_eq!(records[0].station_name, None);
        assert_eq!(records[0].complex_id, Some(635));

        let mut buffer = Vec::new();
        write_records(&mut buffer, &records).unwrap();
        assert_eq!(read_records(buffer.as_slice()).unwrap(), records);
    }
}
