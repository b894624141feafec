//! Content-based hashing for run IDs.

use df_project::schema::ExampleDef;
use sha2::{Digest, Sha256};

use crate::ResultsResult;

/// Run id over the example definition, the compiled model description and
/// the engine version. Any change to one of them yields a new run.
pub fn compute_run_id(
    example: &ExampleDef,
    model_description: &[u8],
    engine_version: &str,
) -> ResultsResult<String> {
    let mut hasher = Sha256::new();

    let example_json = serde_json::to_string(example)?;
    hasher.update(example_json.as_bytes());
    hasher.update([0u8]);
    hasher.update(model_description);
    hasher.update([0u8]);
    hasher.update(engine_version.as_bytes());

    let result = hasher.finalize();
    Ok(format!("{:x}", result))
}
