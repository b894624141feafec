//! Compiler mode selection.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{CompileError, CompileResult};

/// How model descriptions are produced. Resolved once at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompilerMode {
    /// Run an external compiler. `args` are templates in which `{model}`,
    /// `{source}`, `{output}` and `{work_dir}` are substituted.
    Toolchain { program: PathBuf, args: Vec<String> },
    /// Copy `precompiled_<model>.xml` from `dir`, or from the directory of
    /// the source file when `dir` is `None`.
    Precompiled { dir: Option<PathBuf> },
}

impl CompilerMode {
    pub fn label(&self) -> &'static str {
        match self {
            CompilerMode::Toolchain { .. } => "toolchain",
            CompilerMode::Precompiled { .. } => "precompiled",
        }
    }
}

/// Requested mode, before probing the environment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SettingKind {
    /// Toolchain when `program` is on `PATH`, otherwise precompiled.
    #[default]
    Auto,
    Toolchain,
    Precompiled,
}

/// User-facing compiler configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompilerSetting {
    pub kind: SettingKind,
    pub program: Option<String>,
    pub args: Vec<String>,
    pub precompiled_dir: Option<PathBuf>,
}

impl CompilerSetting {
    /// Decide the compiler mode. `Auto` searches `PATH` here and nowhere else.
    pub fn resolve(&self) -> CompileResult<CompilerMode> {
        let precompiled = || CompilerMode::Precompiled {
            dir: self.precompiled_dir.clone(),
        };
        let mode = match self.kind {
            SettingKind::Precompiled => precompiled(),
            SettingKind::Toolchain => {
                let program = self.program.as_deref().ok_or_else(|| CompileError::Configuration {
                    what: "toolchain mode needs a compiler program".to_string(),
                })?;
                let path = find_in_path(program).ok_or_else(|| CompileError::Configuration {
                    what: format!("compiler program '{}' not found", program),
                })?;
                CompilerMode::Toolchain {
                    program: path,
                    args: self.args.clone(),
                }
            }
            SettingKind::Auto => match self.program.as_deref().and_then(find_in_path) {
                Some(path) => CompilerMode::Toolchain {
                    program: path,
                    args: self.args.clone(),
                },
                None => precompiled(),
            },
        };
        info!(
            requested = ?self.kind,
            mode = mode.label(),
            "resolved compiler mode"
        );
        Ok(mode)
    }
}

/// Locate an executable: paths with a directory component are checked as
/// given, bare names are searched on `PATH`.
pub fn find_in_path(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).find_map(|dir| {
        let full = dir.join(program);
        if full.is_file() {
            return Some(full);
        }
        if cfg!(windows) {
            let exe = full.with_extension("exe");
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_precompiled_skips_path_lookup() {
        let setting = CompilerSetting {
            kind: SettingKind::Precompiled,
            program: Some("definitely-not-a-modelica-compiler".to_string()),
            ..Default::default()
        };
        assert_eq!(
            setting.resolve().unwrap(),
            CompilerMode::Precompiled { dir: None }
        );
    }

    #[test]
    fn auto_falls_back_without_program() {
        let setting = CompilerSetting {
            precompiled_dir: Some(PathBuf::from("artifacts")),
            ..Default::default()
        };
        assert_eq!(
            setting.resolve().unwrap(),
            CompilerMode::Precompiled {
                dir: Some(PathBuf::from("artifacts"))
            }
        );
    }

    #[test]
    fn auto_falls_back_when_program_missing() {
        let setting = CompilerSetting {
            program: Some("definitely-not-a-modelica-compiler".to_string()),
            ..Default::default()
        };
        assert_eq!(setting.resolve().unwrap().label(), "precompiled");
    }

    #[test]
    fn toolchain_requires_program() {
        let setting = CompilerSetting {
            kind: SettingKind::Toolchain,
            ..Default::default()
        };
        assert!(matches!(
            setting.resolve(),
            Err(CompileError::Configuration { .. })
        ));

        let setting = CompilerSetting {
            kind: SettingKind::Toolchain,
            program: Some("definitely-not-a-modelica-compiler".to_string()),
            ..Default::default()
        };
        let err = setting.resolve().unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn finds_program_given_as_path() {
        let exe = std::env::current_exe().unwrap();
        assert_eq!(find_in_path(exe.to_str().unwrap()), Some(exe));
    }
}
