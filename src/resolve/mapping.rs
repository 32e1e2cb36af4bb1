//! The curated unit to station-complex table.

use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::model::{RawReading, StationComplexMapping};
use crate::resolve::canonical_line_name;

/// Where the curated mapping lives.
///
/// `load` returns `Ok(None)` when nothing has been curated yet.
pub trait MappingSource {
    fn load(&self) -> Result<Option<Vec<StationComplexMapping>>>;
    fn store(&self, rows: &[StationComplexMapping]) -> Result<()>;
}

/// A mapping kept as a CSV file on disk.
#[derive(Debug, Clone)]
pub struct CsvMappingFile {
    path: PathBuf,
}

impl CsvMappingFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MappingSource for CsvMappingFile {
    fn load(&self) -> Result<Option<Vec<StationComplexMapping>>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let file = File::open(&self.path)
            .with_context(|| format!("failed to open mapping {}", self.path.display()))?;
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(file);

        let mut rows = Vec::new();
        for result in rdr.deserialize() {
            let row: StationComplexMapping =
                result.with_context(|| format!("bad row in {}", self.path.display()))?;
            rows.push(row);
        }
        Ok(Some(rows))
    }

    fn store(&self, rows: &[StationComplexMapping]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = WriterBuilder::new()
            .from_path(&self.path)
            .with_context(|| format!("failed to create mapping {}", self.path.display()))?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Whether the mapping in use was curated or freshly derived.
#[derive(Debug)]
pub enum MappingOutcome {
    Curated(Vec<StationComplexMapping>),
    Derived(Vec<StationComplexMapping>),
}

impl MappingOutcome {
    pub fn rows(&self) -> &[StationComplexMapping] {
        match self {
            MappingOutcome::Curated(rows) | MappingOutcome::Derived(rows) => rows,
        }
    }

    pub fn into_rows(self) -> Vec<StationComplexMapping> {
        match self {
            MappingOutcome::Curated(rows) | MappingOutcome::Derived(rows) => rows,
        }
    }
}

/// Builds one mapping row per distinct `(unit, station, line name, division)`
/// among subway readings. Line names are canonicalized first; the first
/// occurrence of each combination wins. Complex ids are left blank.
pub fn derive_mapping(readings: &[RawReading]) -> Vec<StationComplexMapping> {
    let mut seen = HashSet::new();
    let mut rows = Vec::new();

    for reading in readings.iter().filter(|r| r.is_subway()) {
        let line_name = canonical_line_name(&reading.line_name);
        let key = (
            reading.unit.clone(),
            reading.station.clone(),
            line_name.clone(),
            reading.division.clone(),
        );
        if seen.insert(key) {
            rows.push(StationComplexMapping {
                unit: reading.unit.clone(),
                station: reading.station.clone(),
                line_name,
                division: reading.division.clone(),
                complex_id: None,
            });
        }
    }

    rows
}

/// Uses the curated mapping when one exists; otherwise derives a fresh one,
/// stores it for curation and uses it for this run.
#[tracing::instrument(skip_all)]
pub fn load_or_derive<S, F>(source: &S, derive: F) -> Result<MappingOutcome>
where
    S: MappingSource + ?Sized,
    F: FnOnce() -> Result<Vec<StationComplexMapping>>,
{
    if let Some(rows) = source.load()? {
        let mapped = rows.iter().filter(|r| r.complex_id.is_some()).count();
        info!(rows = rows.len(), mapped, "Using curated station mapping");
        return Ok(MappingOutcome::Curated(rows));
    }

    let rows = derive()?;
    source.store(&rows)?;
    warn!(
        rows = rows.len(),
        "No curated station mapping found; wrote a derived one for editing"
    );
    Ok(MappingOutcome::Derived(rows))
}
