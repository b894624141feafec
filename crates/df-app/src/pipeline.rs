//! Pipeline stages and per-example failure reports.

use std::fmt;

/// Where in the pipeline an example stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Compile,
    Load,
    MakeExplicit,
    Build,
    Simulate,
    Store,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Compile => "compile",
            Stage::Load => "load",
            Stage::MakeExplicit => "make-explicit",
            Stage::Build => "build",
            Stage::Simulate => "simulate",
            Stage::Store => "store",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Failure of a single example. Other examples of the study are unaffected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("example '{example_id}' failed at {stage} stage of model {model}: {message}")]
pub struct ExampleFailure {
    pub example_id: String,
    pub model: String,
    pub stage: Stage,
    pub message: String,
    /// Rows computed before an integration failure.
    pub partial_rows: Option<usize>,
}

/// Tags errors of one example with the stage they came from.
pub(crate) struct FailureScope<'a> {
    pub example_id: &'a str,
    pub model: &'a str,
}

impl FailureScope<'_> {
    pub(crate) fn at<E: fmt::Display>(&self, stage: Stage) -> impl Fn(E) -> ExampleFailure + '_ {
        move |err| ExampleFailure {
            example_id: self.example_id.to_string(),
            model: self.model.to_string(),
            stage,
            message: err.to_string(),
            partial_rows: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_stage_and_model() {
        let scope = FailureScope {
            example_id: "mass",
            model: "BasicVolumeMassConservation",
        };
        let failure = scope.at(Stage::MakeExplicit)("no equation for der(m)");
        let text = failure.to_string();
        assert!(text.contains("make-explicit"));
        assert!(text.contains("BasicVolumeMassConservation"));
        assert!(text.contains("'mass'"));
        assert!(text.contains("no equation for der(m)"));
    }
}
