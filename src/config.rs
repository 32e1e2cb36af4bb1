use anyhow::{Result, bail};
use std::path::PathBuf;

use crate::enrich::DEFAULT_WINDOW;
use crate::ingest::turnstile_path;
use crate::merge::SnapshotCache;
use crate::normalize::NormalizerConfig;
use crate::resolve::CsvMappingFile;

pub const DEFAULT_YEARS: [i32; 3] = [2019, 2020, 2021];

/// Everything one pipeline run needs to know.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub years: Vec<i32>,
    /// Year whose feed seeds a freshly derived station mapping.
    pub mapping_year: i32,
    pub turnstile_dir: PathBuf,
    pub station_locations: PathBuf,
    pub mapping_path: PathBuf,
    pub snapshot_dir: PathBuf,
    pub report_dir: PathBuf,
    /// Local path or URL of the case-count series.
    pub case_source: Option<String>,
    pub normalizer: NormalizerConfig,
    pub moving_average_window: usize,
    pub top_stations: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            years: DEFAULT_YEARS.to_vec(),
            mapping_year: DEFAULT_YEARS[0],
            turnstile_dir: PathBuf::from("data/turnstiles"),
            station_locations: PathBuf::from("data/stations.csv"),
            mapping_path: PathBuf::from("data/station_mapping.csv"),
            snapshot_dir: PathBuf::from("cache"),
            report_dir: PathBuf::from("report"),
            case_source: None,
            normalizer: NormalizerConfig::default(),
            moving_average_window: DEFAULT_WINDOW,
            top_stations: 10,
        }
    }
}

impl PipelineConfig {
    /// First and last configured year. The snapshot is keyed on this range
    /// alone, so the years must cover it without gaps or repeats.
    pub fn year_range(&self) -> Result<(i32, i32)> {
        let mut years = self.years.clone();
        years.sort_unstable();

        let (Some(&first), Some(&last)) = (years.first(), years.last()) else {
            bail!("no years configured");
        };
        if years.windows(2).any(|w| w[1] != w[0] + 1) {
            bail!("years must be consecutive without repeats, got {:?}", self.years);
        }
        Ok((first, last))
    }

    pub fn turnstile_path(&self, year: i32) -> PathBuf {
        turnstile_path(&self.turnstile_dir, year)
    }

    pub fn snapshot_cache(&self) -> Result<SnapshotCache> {
        let (first, last) = self.year_range()?;
        Ok(SnapshotCache::for_years(&self.snapshot_dir, first, last))
    }

    pub fn mapping_file(&self) -> CsvMappingFile {
        CsvMappingFile::new(&self.mapping_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_three_years() {
        let config = PipelineConfig::default();
        assert_eq!(config.year_range().unwrap(), (2019, 2021));
        assert_eq!(config.moving_average_window, 7);
        assert_eq!(config.normalizer.max_delta, 10_000);
        assert!(
            config
                .snapshot_cache()
                .unwrap()
                .path()
                .ends_with("ridership_2019_2021.csv.gz")
        );
        assert!(config.turnstile_path(2020).ends_with("turnstile_2020.csv"));
    }

    #[test]
    fn test_empty_years_is_an_error() {
        let config = PipelineConfig {
            years: vec![],
            ..Default::default()
        };
        assert!(config.year_range().is_err());
    }

    #[test]
    fn test_years_must_be_consecutive() {
        let gapped = PipelineConfig {
            years: vec![2019, 2021],
            ..Default::default()
        };
        assert!(gapped.year_range().is_err());
        assert!(gapped.snapshot_cache().is_err());

        let repeated = PipelineConfig {
            years: vec![2019, 2020, 2020],
            ..Default::default()
        };
        assert!(repeated.year_range().is_err());

        let unordered = PipelineConfig {
            years: vec![2021, 2019, 2020],
            ..Default::default()
        };
        assert_eq!(unordered.year_range().unwrap(), (2019, 2021));
    }
}
