//! Series extraction and CSV export for stored runs.

use std::io::Write;

use df_results::extract_series;

use crate::error::AppResult;
use crate::run_service::load_run;
use crate::study_service::StudyContext;

/// `(time, value)` pairs of `variable` in a stored run.
pub fn run_series(
    ctx: &StudyContext,
    run_id: &str,
    variable: &str,
) -> AppResult<Vec<(f64, Option<f64>)>> {
    let (manifest, records) = load_run(ctx, run_id)?;
    Ok(extract_series(&manifest, &records, variable)?)
}

/// Two-column CSV with a `time,<variable>` header. Missing values are empty.
pub fn write_series_csv<W: Write>(
    out: &mut W,
    variable: &str,
    series: &[(f64, Option<f64>)],
) -> std::io::Result<()> {
    writeln!(out, "time,{}", variable)?;
    for (t, value) in series {
        match value {
            Some(v) => writeln!(out, "{},{}", t, v)?,
            None => writeln!(out, "{},", t)?,
        }
    }
    Ok(())
}
