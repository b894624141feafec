//! Model compilation.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::error::{CompileError, CompileResult};
use crate::mode::CompilerMode;

/// Produces model description XML files in a working directory.
#[derive(Clone, Debug)]
pub struct ModelCompiler {
    mode: CompilerMode,
    work_dir: PathBuf,
}

/// A model name is a non-empty dotted identifier such as `Pkg.Model`.
pub fn validate_model_name(name: &str) -> CompileResult<()> {
    let valid_part = |part: &str| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    if name.split('.').all(valid_part) {
        Ok(())
    } else {
        Err(CompileError::InvalidModelName {
            name: name.to_string(),
        })
    }
}

/// `Pkg.Model` -> `Pkg_Model.xml`
pub fn output_file_name(model_name: &str) -> String {
    format!("{}.xml", model_name.replace('.', "_"))
}

fn substitute(template: &str, model: &str, source: &Path, output: &Path, work_dir: &Path) -> String {
    template
        .replace("{model}", model)
        .replace("{source}", &source.to_string_lossy())
        .replace("{output}", &output.to_string_lossy())
        .replace("{work_dir}", &work_dir.to_string_lossy())
}

impl ModelCompiler {
    pub fn new(mode: CompilerMode, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            work_dir: work_dir.into(),
        }
    }

    pub fn mode(&self) -> &CompilerMode {
        &self.mode
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Path the description of `model_name` is written to.
    pub fn output_path(&self, model_name: &str) -> PathBuf {
        self.work_dir.join(output_file_name(model_name))
    }

    /// Produce the model description of `model_name` defined in `source`.
    pub fn compile(&self, model_name: &str, source: &Path) -> CompileResult<PathBuf> {
        validate_model_name(model_name)?;
        if !source.is_file() {
            return Err(CompileError::Configuration {
                what: format!("Modelica source {} does not exist", source.display()),
            });
        }
        std::fs::create_dir_all(&self.work_dir).map_err(CompileError::io(&self.work_dir))?;
        let output = self.output_path(model_name);

        match &self.mode {
            CompilerMode::Toolchain { program, args } => {
                self.run_toolchain(program, args, model_name, source, &output)?
            }
            CompilerMode::Precompiled { dir } => {
                let dir = match dir {
                    Some(dir) => dir.as_path(),
                    None => source.parent().unwrap_or_else(|| Path::new(".")),
                };
                copy_precompiled(dir, model_name, &output)?
            }
        }

        info!(
            model = model_name,
            mode = self.mode.label(),
            output = %output.display(),
            "model description ready"
        );
        Ok(output)
    }

    fn run_toolchain(
        &self,
        program: &Path,
        args: &[String],
        model_name: &str,
        source: &Path,
        output: &Path,
    ) -> CompileResult<()> {
        let args: Vec<String> = args
            .iter()
            .map(|a| substitute(a, model_name, source, output, &self.work_dir))
            .collect();
        debug!(program = %program.display(), ?args, "running compiler");

        let result = Command::new(program)
            .args(&args)
            .current_dir(&self.work_dir)
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    CompileError::Configuration {
                        what: format!("compiler program {} not found", program.display()),
                    }
                } else {
                    CompileError::Io {
                        path: program.to_path_buf(),
                        source: e,
                    }
                }
            })?;

        if !result.status.success() {
            return Err(CompileError::Toolchain {
                model: model_name.to_string(),
                message: format!(
                    "{} exited with {}: {}",
                    program.display(),
                    result.status,
                    String::from_utf8_lossy(&result.stderr).trim()
                ),
            });
        }
        if !output.is_file() {
            return Err(CompileError::Toolchain {
                model: model_name.to_string(),
                message: format!("compiler did not produce {}", output.display()),
            });
        }
        Ok(())
    }
}

fn copy_precompiled(dir: &Path, model_name: &str, output: &Path) -> CompileResult<()> {
    let artifact = dir.join(format!("precompiled_{}.xml", model_name));
    if !artifact.is_file() {
        return Err(CompileError::Configuration {
            what: format!(
                "no compiler toolchain and no precompiled artifact {}",
                artifact.display()
            ),
        });
    }
    std::fs::copy(&artifact, output).map_err(CompileError::io(&artifact))?;
    Ok(())
}
