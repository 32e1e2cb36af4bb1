//! NYC COVID-19 daily case counts.

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::fetch::{HttpClient, fetch_bytes};
use crate::ingest::parse_date;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CaseCount {
    pub date: NaiveDate,
    pub case_count: u64,
}

/// A row of the health department export (`date_of_interest,CASE_COUNT,...`)
/// or of a plain `date,case_count` file.
#[derive(Debug, Deserialize)]
struct CaseRow {
    #[serde(alias = "date_of_interest", alias = "DATE_OF_INTEREST")]
    date: String,
    #[serde(alias = "CASE_COUNT")]
    case_count: u64,
}

pub fn parse_case_csv(bytes: &[u8]) -> Result<Vec<CaseCount>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let mut counts = Vec::new();
    for result in rdr.deserialize() {
        let row: CaseRow = result?;
        let date =
            parse_date(&row.date).ok_or_else(|| anyhow!("invalid case date '{}'", row.date))?;
        counts.push(CaseCount {
            date,
            case_count: row.case_count,
        });
    }
    Ok(counts)
}

/// Reads case data from a local path, or through `client` for an HTTP(S) URL.
#[tracing::instrument(skip_all, fields(source = %source))]
pub async fn read_case_source<C: HttpClient>(client: &C, source: &str) -> Result<Vec<u8>> {
    let bytes = if source.starts_with("http") {
        fetch_bytes(client, source).await?
    } else {
        std::fs::read(source)?
    };
    Ok(bytes)
}

/// Loads the case series, treating any failure as "no case data".
pub async fn load_case_counts<C: HttpClient>(client: &C, source: Option<&str>) -> Vec<CaseCount> {
    let Some(source) = source else {
        info!("No case source configured; case counts default to zero");
        return Vec::new();
    };

    let result = match read_case_source(client, source).await {
        Ok(bytes) => parse_case_csv(&bytes),
        Err(e) => Err(e),
    };

    match result {
        Ok(counts) => {
            info!(days = counts.len(), "Case counts loaded");
            counts
        }
        Err(e) => {
            warn!(source, error = %e, "Case counts unavailable; defaulting to zero");
            Vec::new()
        }
    }
}
