//! Study loading and compiler setup.

use std::path::{Path, PathBuf};

use df_compile::{CompilerSetting, ModelCompiler, SettingKind};
use df_project::{CompilerDef, CompilerModeDef, ExampleDef, Study};
use df_results::RunStore;
use tracing::debug;

use crate::error::AppResult;

const DEFAULT_WORK_DIR: &str = "build";

/// Summary of an example for listing.
#[derive(Debug, Clone)]
pub struct ExampleSummary {
    pub id: String,
    pub model: String,
    pub outputs: Vec<String>,
    pub grid_points: usize,
}

/// A loaded study with its compiler resolved.
///
/// Relative paths in the study file are taken relative to its directory.
#[derive(Debug, Clone)]
pub struct StudyContext {
    path: PathBuf,
    dir: PathBuf,
    study: Study,
    compiler: ModelCompiler,
}

/// Load and validate a study file without touching the compiler setup.
pub fn load_study(path: &Path) -> AppResult<Study> {
    Ok(df_project::load(path)?)
}

fn study_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn compiler_setting(def: &CompilerDef, dir: &Path) -> CompilerSetting {
    CompilerSetting {
        kind: match def.mode {
            CompilerModeDef::Auto => SettingKind::Auto,
            CompilerModeDef::Toolchain => SettingKind::Toolchain,
            CompilerModeDef::Precompiled => SettingKind::Precompiled,
        },
        program: def.program.clone(),
        args: def.args.clone(),
        precompiled_dir: def.precompiled_dir.as_ref().map(|d| dir.join(d)),
    }
}

impl StudyContext {
    /// Load the study and resolve its compiler mode once.
    pub fn open(path: &Path) -> AppResult<Self> {
        let study = load_study(path)?;
        let dir = study_dir(path);
        let mode = compiler_setting(&study.compiler, &dir).resolve()?;
        let work_dir = dir.join(study.work_dir.as_deref().unwrap_or(DEFAULT_WORK_DIR));
        debug!(
            study = %study.name,
            examples = study.examples.len(),
            work_dir = %work_dir.display(),
            "opened study"
        );
        Ok(Self {
            path: path.to_path_buf(),
            dir,
            study,
            compiler: ModelCompiler::new(mode, work_dir),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn study(&self) -> &Study {
        &self.study
    }

    pub fn compiler(&self) -> &ModelCompiler {
        &self.compiler
    }

    pub fn example(&self, id: &str) -> AppResult<&ExampleDef> {
        Ok(self.study.example(id)?)
    }

    pub fn source_path(&self, example: &ExampleDef) -> PathBuf {
        self.dir.join(&example.source)
    }

    pub fn store(&self) -> AppResult<RunStore> {
        Ok(RunStore::for_study(&self.path)?)
    }

    pub fn list_examples(&self) -> Vec<ExampleSummary> {
        self.study
            .examples
            .iter()
            .map(|e| ExampleSummary {
                id: e.id.clone(),
                model: e.model.clone(),
                outputs: e.outputs.clone(),
                grid_points: e.grid.points().map(|g| g.len()).unwrap_or(0),
            })
            .collect()
    }
}
