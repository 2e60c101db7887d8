use serde::Serialize;

use crate::report::{YearDelta, YearReport};
use crate::survey::YearBucket;

pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    pub kind: String,
    pub location: String,
    pub range: String,
    pub row_count: usize,
    pub rows_sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShelfManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source: SourceInfo,
    pub link_count: usize,
    pub years: YearBucket,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub generated_at: String,
    pub source: SourceInfo,
    pub link_count: usize,
    #[serde(flatten)]
    pub report: YearReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeltaManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub generated_at: String,
    pub source: SourceInfo,
    pub complete_rows: usize,
    pub deltas: YearDelta,
}
