pub mod aggregate;
pub mod config;
pub mod enrich;
pub mod error;
pub mod fetch;
pub mod ingest;
pub mod merge;
pub mod model;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod resolve;
