//! Ridership summary reporting.
//!
//! Rolls the merged series up into per-year statistics, the busiest
//! stations and the worst case-count day, written out as JSON next to the
//! chart-ready CSV series.

pub mod summary;
pub mod types;
pub mod utility;

pub use summary::build_summary;
pub use types::{PeakCases, RidershipSummary, StationRank, YearSummary};
