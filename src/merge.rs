//! Multi-year concatenation and the ridership snapshot cache.

use anyhow::{Context, Result};
use csv::WriterBuilder;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::model::RidershipRecord;

/// Concatenates yearly record sets in ascending year order.
///
/// No de-duplication happens across years: a turnstile id recurs every year.
pub fn merge_years(mut years: Vec<(i32, Vec<RidershipRecord>)>) -> Vec<RidershipRecord> {
    years.sort_by_key(|(year, _)| *year);

    let total = years.iter().map(|(_, records)| records.len()).sum();
    let mut merged = Vec::with_capacity(total);
    for (year, records) in years {
        debug!(year, records = records.len(), "Merging year");
        merged.extend(records);
    }
    merged
}

/// Gzip-compressed CSV snapshot of the merged ridership records.
///
/// There is exactly one snapshot per year range. It is never invalidated by
/// the pipeline; delete the file to force a rebuild.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    path: PathBuf,
}

impl SnapshotCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The snapshot for `first..=last` inside `dir`.
    pub fn for_years(dir: &Path, first: i32, last: i32) -> Self {
        Self::new(dir.join(format!("ridership_{first}_{last}.csv.gz")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<Vec<RidershipRecord>>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let file = File::open(&self.path)
            .with_context(|| format!("failed to open snapshot {}", self.path.display()))?;
        let records = read_records(GzDecoder::new(BufReader::new(file)))
            .with_context(|| format!("failed to read snapshot {}", self.path.display()))?;
        Ok(Some(records))
    }

    pub fn store(&self, records: &[RidershipRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(&self.path)
            .with_context(|| format!("failed to create snapshot {}", self.path.display()))?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        write_records(&mut encoder, records)?;
        encoder.finish()?.flush()?;
        Ok(())
    }

    /// Returns the cached records, building and storing them on a miss.
    #[tracing::instrument(skip_all, fields(path = %self.path.display()))]
    pub fn get_or_build<F>(&self, build: F) -> Result<Vec<RidershipRecord>>
    where
        F: FnOnce() -> Result<Vec<RidershipRecord>>,
    {
        if let Some(records) = self.load()? {
            info!(records = records.len(), "Snapshot cache hit");
            return Ok(records);
        }

        info!("Snapshot cache miss, building ridership");
        let records = build()?;
        self.store(&records)?;
        info!(records = records.len(), "Snapshot stored");
        Ok(records)
    }
}

pub fn write_records<W: Write>(writer: W, records: &[RidershipRecord]) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_records<R: Read>(reader: R) -> Result<Vec<RidershipRecord>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut records = Vec::new();
    for result in rdr.deserialize() {
        let record: RidershipRecord = result?;
        records.push(record);
    }
    Ok(records)
}
