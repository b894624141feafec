//! Result data types.

use serde::{Deserialize, Serialize};

pub type RunId = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunManifest {
    pub run_id: RunId,
    pub example_id: String,
    pub model: String,
    /// RFC 3339, UTC.
    pub timestamp: String,
    /// Output variable names; each record's `values` follows this order.
    pub columns: Vec<String>,
    pub rows: usize,
    pub stats: RunStats,
    pub engine_version: String,
}

impl RunManifest {
    /// Manifest stamped with the current UTC time.
    pub fn now(
        run_id: RunId,
        example_id: impl Into<String>,
        model: impl Into<String>,
        columns: Vec<String>,
        rows: usize,
        stats: RunStats,
        engine_version: impl Into<String>,
    ) -> Self {
        Self {
            run_id,
            example_id: example_id.into(),
            model: model.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            columns,
            rows,
            stats,
            engine_version: engine_version.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RunStats {
    pub accepted_steps: u64,
    pub rejected_steps: u64,
    pub rhs_evaluations: u64,
}

/// One grid point. Non-finite outputs are stored as `null`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeseriesRecord {
    pub time: f64,
    pub values: Vec<Option<f64>>,
}

impl TimeseriesRecord {
    pub fn from_row(time: f64, row: impl IntoIterator<Item = f64>) -> Self {
        Self {
            time,
            values: row
                .into_iter()
                .map(|v| v.is_finite().then_some(v))
                .collect(),
        }
    }
}
