//! Run execution and caching service.

use std::path::{Path, PathBuf};
use std::time::Instant;

use df_ocp::SymbolicOcp;
use df_project::{ExampleDef, IntegratorDef, MethodDef};
use df_results::{RunManifest, RunStats, RunStore, TimeseriesRecord};
use df_sim::{IntegratorOptions, Method, SimError, SimRecord, Simulator};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::pipeline::{ExampleFailure, FailureScope, Stage};
use crate::study_service::StudyContext;

/// Engine version folded into every run id.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub use_cache: bool,
    pub engine_version: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            engine_version: ENGINE_VERSION.to_string(),
        }
    }
}

/// Wall-clock time spent per stage, in seconds.
#[derive(Debug, Clone, Default)]
pub struct RunTiming {
    pub compile_s: f64,
    pub load_s: f64,
    pub simulate_s: f64,
    pub save_s: f64,
    pub total_s: f64,
}

#[derive(Debug, Clone)]
pub struct RunResponse {
    pub run_id: String,
    pub manifest: RunManifest,
    pub loaded_from_cache: bool,
    pub timing: RunTiming,
}

/// Result of one example within a study run.
#[derive(Debug, Clone)]
pub struct ExampleOutcome {
    pub example_id: String,
    pub result: Result<RunResponse, ExampleFailure>,
}

#[derive(Debug, Clone, Default)]
pub struct StudyReport {
    pub outcomes: Vec<ExampleOutcome>,
}

impl StudyReport {
    pub fn failures(&self) -> impl Iterator<Item = &ExampleFailure> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().err())
    }

    pub fn successes(&self) -> impl Iterator<Item = &RunResponse> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Integrator options for an example; unset fields keep the defaults.
pub fn integrator_options(def: &IntegratorDef) -> IntegratorOptions {
    let defaults = IntegratorOptions::default();
    IntegratorOptions {
        method: match def.method {
            MethodDef::ForwardEuler => Method::ForwardEuler,
            MethodDef::Rk4 => Method::Rk4,
            MethodDef::Dopri45 => Method::Dopri45,
        },
        max_step: def.max_step,
        rtol: def.rtol.unwrap_or(defaults.rtol),
        atol: def.atol.unwrap_or(defaults.atol),
        initial_step: def.initial_step,
        min_step: def.min_step.unwrap_or(defaults.min_step),
        max_steps_per_interval: def
            .max_steps_per_interval
            .unwrap_or(defaults.max_steps_per_interval),
    }
}

/// Run every example of the study, or only `only`.
///
/// Example failures are collected in the report; an error is returned only
/// when the study itself cannot be served.
pub fn run_study(
    ctx: &StudyContext,
    only: Option<&str>,
    options: &RunOptions,
) -> AppResult<StudyReport> {
    let store = ctx.store()?;
    let examples: Vec<&ExampleDef> = match only {
        Some(id) => vec![ctx.example(id)?],
        None => ctx.study().examples.iter().collect(),
    };

    let mut report = StudyReport::default();
    for example in examples {
        let result = run_example(ctx, &store, example, options);
        if let Err(failure) = &result {
            warn!(%failure, "example failed");
        }
        report.outcomes.push(ExampleOutcome {
            example_id: example.id.clone(),
            result,
        });
    }
    Ok(report)
}

/// Compile, load, simulate and store one example, or return its cached run.
pub fn run_example(
    ctx: &StudyContext,
    store: &RunStore,
    example: &ExampleDef,
    options: &RunOptions,
) -> Result<RunResponse, ExampleFailure> {
    let started = Instant::now();
    let mut timing = RunTiming::default();
    let scope = FailureScope {
        example_id: &example.id,
        model: &example.model,
    };

    let xml_path = ctx
        .compiler()
        .compile(&example.model, &ctx.source_path(example))
        .map_err(scope.at(Stage::Compile))?;
    timing.compile_s = started.elapsed().as_secs_f64();

    let xml = std::fs::read_to_string(&xml_path).map_err(scope.at(Stage::Load))?;
    let run_id = df_results::compute_run_id(example, xml.as_bytes(), &options.engine_version)
        .map_err(scope.at(Stage::Store))?;

    if options.use_cache && store.has_run(&run_id) {
        let manifest = store.load_manifest(&run_id).map_err(scope.at(Stage::Store))?;
        timing.total_s = started.elapsed().as_secs_f64();
        info!(example = %example.id, %run_id, "loaded cached run");
        return Ok(RunResponse {
            run_id,
            manifest,
            loaded_from_cache: true,
            timing,
        });
    }

    let load_started = Instant::now();
    let ocp = df_ocp::parse_str(&xml).map_err(scope.at(Stage::Load))?;
    let ocp = ocp.make_explicit().map_err(scope.at(Stage::MakeExplicit))?;
    timing.load_s = load_started.elapsed().as_secs_f64();

    let sim_started = Instant::now();
    let mut simulator = build_simulator(&ocp, example).map_err(scope.at(Stage::Build))?;
    let x0 = initial_state(&simulator, example).map_err(scope.at(Stage::Build))?;
    let record = match simulator.run(x0.as_deref()) {
        Ok(record) => record,
        Err(SimError::Integration(failure)) => {
            let mut err = scope.at(Stage::Simulate)(&failure);
            err.partial_rows = Some(failure.partial.n_rows());
            return Err(err);
        }
        Err(other) => return Err(scope.at(Stage::Simulate)(other)),
    };
    timing.simulate_s = sim_started.elapsed().as_secs_f64();
    simulator.integrator().print_stats();

    let save_started = Instant::now();
    let manifest = RunManifest::now(
        run_id.clone(),
        &example.id,
        &example.model,
        record.columns.clone(),
        record.n_rows(),
        RunStats {
            accepted_steps: record.stats.accepted_steps,
            rejected_steps: record.stats.rejected_steps,
            rhs_evaluations: record.stats.rhs_evaluations,
        },
        &options.engine_version,
    );
    store
        .save_run(&manifest, &to_records(&record))
        .map_err(scope.at(Stage::Store))?;
    timing.save_s = save_started.elapsed().as_secs_f64();
    timing.total_s = started.elapsed().as_secs_f64();

    info!(
        example = %example.id,
        %run_id,
        rows = manifest.rows,
        total_s = timing.total_s,
        "run completed"
    );
    Ok(RunResponse {
        run_id,
        manifest,
        loaded_from_cache: false,
        timing,
    })
}

fn build_simulator(ocp: &SymbolicOcp, example: &ExampleDef) -> Result<Simulator, AppError> {
    let (integrator, outputs) = df_sim::build(ocp, &integrator_options(&example.integrator))?;
    let output = outputs.output(&example.outputs)?;
    let grid = example
        .grid
        .points()
        .map_err(|e| AppError::Simulation(e.to_string()))?;
    Ok(Simulator::new(integrator, output, grid)?)
}

/// Declared start values with the example's overrides applied.
fn initial_state(sim: &Simulator, example: &ExampleDef) -> Result<Option<Vec<f64>>, SimError> {
    let Some(overrides) = &example.initial_state else {
        return Ok(None);
    };
    let dae = sim.integrator().dae();
    let mut x0 = dae.start_values().to_vec();
    for (name, value) in overrides {
        let i = dae
            .state_names()
            .iter()
            .position(|s| s == name)
            .ok_or_else(|| SimError::NameNotFound { name: name.clone() })?;
        x0[i] = *value;
    }
    Ok(Some(x0))
}

fn to_records(record: &SimRecord) -> Vec<TimeseriesRecord> {
    record
        .t
        .iter()
        .enumerate()
        .map(|(r, &t)| TimeseriesRecord::from_row(t, record.values.row(r).iter().copied()))
        .collect()
}

/// Compile one example and return the model description path.
pub fn compile_example(ctx: &StudyContext, example_id: &str) -> AppResult<PathBuf> {
    let example = ctx.example(example_id)?;
    Ok(ctx
        .compiler()
        .compile(&example.model, &ctx.source_path(example))?)
}

/// Load a model description, optionally bringing it to explicit form.
pub fn inspect(xml: &Path, explicit: bool) -> AppResult<SymbolicOcp> {
    let ocp = df_ocp::load(xml)?;
    if explicit {
        Ok(ocp.make_explicit()?)
    } else {
        Ok(ocp)
    }
}

pub fn list_runs(ctx: &StudyContext, example_id: &str) -> AppResult<Vec<RunManifest>> {
    ctx.example(example_id)?;
    Ok(ctx.store()?.list_runs(example_id)?)
}

/// Remove a cached run so the next run of its example recomputes it.
pub fn delete_run(ctx: &StudyContext, run_id: &str) -> AppResult<()> {
    let store = ctx.store()?;
    if !store.has_run(run_id) {
        return Err(AppError::RunNotFound(run_id.to_string()));
    }
    store.delete_run(run_id)?;
    info!(run_id, "deleted cached run");
    Ok(())
}

pub fn load_run(
    ctx: &StudyContext,
    run_id: &str,
) -> AppResult<(RunManifest, Vec<TimeseriesRecord>)> {
    let store = ctx.store()?;
    let manifest = store.load_manifest(run_id)?;
    let records = store.load_timeseries(run_id)?;
    Ok((manifest, records))
}
