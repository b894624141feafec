//! Queries over stored runs.

use crate::types::{RunManifest, TimeseriesRecord};
use crate::{ResultsError, ResultsResult};

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub time_range: Option<(f64, f64)>,
    pub record_count: usize,
    pub columns: Vec<String>,
}

pub fn summarize(manifest: &RunManifest, records: &[TimeseriesRecord]) -> RunSummary {
    let time_range = match (records.first(), records.last()) {
        (Some(first), Some(last)) => Some((first.time, last.time)),
        _ => None,
    };
    RunSummary {
        time_range,
        record_count: records.len(),
        columns: manifest.columns.clone(),
    }
}

/// `(time, value)` pairs of one recorded variable. `time` is also accepted.
pub fn extract_series(
    manifest: &RunManifest,
    records: &[TimeseriesRecord],
    variable: &str,
) -> ResultsResult<Vec<(f64, Option<f64>)>> {
    if variable == "time" && !manifest.columns.iter().any(|c| c == "time") {
        return Ok(records.iter().map(|r| (r.time, Some(r.time))).collect());
    }
    let j = manifest
        .columns
        .iter()
        .position(|c| c == variable)
        .ok_or_else(|| ResultsError::VariableNotFound {
            run_id: manifest.run_id.clone(),
            name: variable.to_string(),
        })?;
    Ok(records
        .iter()
        .map(|r| (r.time, r.values.get(j).copied().flatten()))
        .collect())
}
