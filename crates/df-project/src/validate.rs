//! Study validation logic.

use std::collections::HashSet;

use crate::schema::{CompilerModeDef, ExampleDef, GridDef, IntegratorDef, Study};

pub const LATEST_VERSION: u32 = 1;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Missing field: {field} ({context})")]
    MissingField { field: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

fn invalid(field: String, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

pub fn validate_study(study: &Study) -> Result<(), ValidationError> {
    if study.version == 0 || study.version > LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: study.version,
        });
    }

    if study.compiler.mode == CompilerModeDef::Toolchain && study.compiler.program.is_none() {
        return Err(ValidationError::MissingField {
            field: "compiler.program".to_string(),
            context: "toolchain mode".to_string(),
        });
    }

    let mut ids = HashSet::new();
    for example in &study.examples {
        if !ids.insert(example.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: example.id.clone(),
                context: "examples".to_string(),
            });
        }
        validate_example(example)?;
    }
    Ok(())
}

fn validate_example(example: &ExampleDef) -> Result<(), ValidationError> {
    let field = |name: &str| format!("examples[{}].{}", example.id, name);

    if example.id.trim().is_empty() {
        return Err(ValidationError::MissingField {
            field: "id".to_string(),
            context: "example".to_string(),
        });
    }
    if example.model.trim().is_empty() {
        return Err(ValidationError::MissingField {
            field: field("model"),
            context: "example".to_string(),
        });
    }
    if example.source.trim().is_empty() {
        return Err(ValidationError::MissingField {
            field: field("source"),
            context: "example".to_string(),
        });
    }
    if example.outputs.is_empty() {
        return Err(ValidationError::MissingField {
            field: field("outputs"),
            context: "at least one output variable is required".to_string(),
        });
    }
    let mut outputs = HashSet::new();
    for name in &example.outputs {
        if !outputs.insert(name.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: name.clone(),
                context: field("outputs"),
            });
        }
    }

    match &example.grid {
        GridDef::Linspace { points: 0, .. } => {
            return Err(invalid(field("grid.points"), 0, "must be at least 1"));
        }
        GridDef::Linspace { start, end, points } if *points > 1 && end <= start => {
            return Err(invalid(
                field("grid.end"),
                end,
                "must be greater than grid.start",
            ));
        }
        _ => {}
    }
    let grid_error = |e: df_core::DfError| invalid(field("grid"), format!("{:?}", example.grid), &e.to_string());
    let grid = example.grid.points().map_err(grid_error)?;
    df_core::validate_grid(&grid).map_err(grid_error)?;

    if let Some(initial) = &example.initial_state {
        for (name, value) in initial {
            if !value.is_finite() {
                return Err(invalid(
                    field(&format!("initial_state.{}", name)),
                    value,
                    "must be finite",
                ));
            }
        }
    }

    validate_integrator(&example.integrator, &field)
}

fn validate_integrator(
    def: &IntegratorDef,
    field: &dyn Fn(&str) -> String,
) -> Result<(), ValidationError> {
    let positive = [
        ("integrator.max_step", def.max_step),
        ("integrator.rtol", def.rtol),
        ("integrator.atol", def.atol),
        ("integrator.initial_step", def.initial_step),
        ("integrator.min_step", def.min_step),
    ];
    for (name, value) in positive {
        if let Some(v) = value
            && !(v.is_finite() && v > 0.0)
        {
            return Err(invalid(field(name), v, "must be positive and finite"));
        }
    }
    if def.max_steps_per_interval == Some(0) {
        return Err(invalid(
            field("integrator.max_steps_per_interval"),
            0,
            "must be positive",
        ));
    }
    Ok(())
}
