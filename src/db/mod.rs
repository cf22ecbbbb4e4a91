//! Backing-store layer: bulk upserts (C4), time-series inserts (C5), and
//! partition management supporting both.

pub mod partitions;
pub mod timeseries;
pub mod upsert;

use serde::Serialize;

/// Common shape returned by every bulk write operation (spec.md §4.4/§4.5).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct WriteResult {
    pub row_count: u64,
    pub duration_ms: u64,
}
