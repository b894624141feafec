use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use df_app::{AppError, AppResult, RunOptions, StudyContext};

#[derive(Parser)]
#[command(name = "daeflow")]
#[command(about = "daeflow - compile and simulate Modelica models over time grids", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a study file and resolve its compiler setup
    Validate {
        /// Path to the study file (YAML or JSON)
        study_path: PathBuf,
    },
    /// Run the examples of a study
    Run {
        study_path: PathBuf,
        /// Run only this example
        #[arg(long)]
        example: Option<String>,
        /// Skip cache and force re-run
        #[arg(long)]
        no_cache: bool,
    },
    /// Print the OCP read from a model description XML file
    Inspect {
        xml_path: PathBuf,
        /// Bring the OCP to explicit form first
        #[arg(long)]
        explicit: bool,
    },
    /// Compile one example's model and print the description path
    Compile {
        study_path: PathBuf,
        example_id: String,
    },
    /// List cached runs of an example
    Runs {
        study_path: PathBuf,
        example_id: String,
    },
    /// Show details of a cached run
    ShowRun { study_path: PathBuf, run_id: String },
    /// Delete a cached run
    DeleteRun { study_path: PathBuf, run_id: String },
    /// Export one variable of a run as CSV
    ExportSeries {
        study_path: PathBuf,
        run_id: String,
        variable: String,
        /// Output CSV file path (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { study_path } => cmd_validate(&study_path),
        Commands::Run {
            study_path,
            example,
            no_cache,
        } => cmd_run(&study_path, example.as_deref(), !no_cache),
        Commands::Inspect { xml_path, explicit } => cmd_inspect(&xml_path, explicit),
        Commands::Compile {
            study_path,
            example_id,
        } => cmd_compile(&study_path, &example_id),
        Commands::Runs {
            study_path,
            example_id,
        } => cmd_runs(&study_path, &example_id),
        Commands::ShowRun { study_path, run_id } => cmd_show_run(&study_path, &run_id),
        Commands::DeleteRun { study_path, run_id } => cmd_delete_run(&study_path, &run_id),
        Commands::ExportSeries {
            study_path,
            run_id,
            variable,
            output,
        } => cmd_export_series(&study_path, &run_id, &variable, output.as_deref()),
    }
}

fn cmd_validate(study_path: &Path) -> AppResult<()> {
    println!("Validating study: {}", study_path.display());
    let ctx = StudyContext::open(study_path)?;
    println!(
        "✓ Study '{}' is valid (compiler: {})",
        ctx.study().name,
        ctx.compiler().mode().label()
    );
    for example in ctx.list_examples() {
        println!(
            "  {} - {} ({} grid points, outputs: {})",
            example.id,
            example.model,
            example.grid_points,
            example.outputs.join(", ")
        );
    }
    Ok(())
}

fn cmd_run(study_path: &Path, example: Option<&str>, use_cache: bool) -> AppResult<()> {
    let ctx = StudyContext::open(study_path)?;
    let options = RunOptions {
        use_cache,
        ..Default::default()
    };
    tracing::debug!(study = %ctx.study().name, use_cache, "running study");
    let report = df_app::run_study(&ctx, example, &options)?;

    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(response) if response.loaded_from_cache => {
                println!("✓ {}: loaded from cache {}", outcome.example_id, response.run_id);
            }
            Ok(response) => {
                println!(
                    "✓ {}: {} rows in {:.3} s, run {}",
                    outcome.example_id,
                    response.manifest.rows,
                    response.timing.total_s,
                    response.run_id
                );
                println!(
                    "    steps accepted {}, rejected {}, rhs evaluations {}",
                    response.manifest.stats.accepted_steps,
                    response.manifest.stats.rejected_steps,
                    response.manifest.stats.rhs_evaluations
                );
            }
            Err(failure) => {
                eprintln!("✗ {}", failure);
                if let Some(rows) = failure.partial_rows {
                    eprintln!("    {} rows computed before the failure", rows);
                }
            }
        }
    }

    let failed = report.failures().count();
    if failed > 0 {
        return Err(AppError::ExamplesFailed {
            failed,
            total: report.outcomes.len(),
        });
    }
    Ok(())
}

fn cmd_inspect(xml_path: &Path, explicit: bool) -> AppResult<()> {
    let ocp = df_app::inspect(xml_path, explicit)?;
    print!("{}", ocp);
    Ok(())
}

fn cmd_compile(study_path: &Path, example_id: &str) -> AppResult<()> {
    let ctx = StudyContext::open(study_path)?;
    let xml = df_app::compile_example(&ctx, example_id)?;
    println!("{}", xml.display());
    Ok(())
}

fn cmd_runs(study_path: &Path, example_id: &str) -> AppResult<()> {
    let ctx = StudyContext::open(study_path)?;
    let runs = df_app::list_runs(&ctx, example_id)?;

    if runs.is_empty() {
        println!("No cached runs found for example: {}", example_id);
    } else {
        println!("Cached runs for example '{}':", example_id);
        for manifest in runs {
            println!(
                "  {} ({}, {} rows)",
                manifest.run_id, manifest.timestamp, manifest.rows
            );
        }
    }
    Ok(())
}

fn cmd_show_run(study_path: &Path, run_id: &str) -> AppResult<()> {
    let ctx = StudyContext::open(study_path)?;
    let (manifest, records) = df_app::load_run(&ctx, run_id)?;
    let summary = df_app::summarize(&manifest, &records);

    println!("Run {}", manifest.run_id);
    println!("  Example: {} ({})", manifest.example_id, manifest.model);
    println!("  Created: {}", manifest.timestamp);
    println!("  Engine: {}", manifest.engine_version);
    println!("  Time points: {}", summary.record_count);
    if let Some((t0, t1)) = summary.time_range {
        println!("  Time range: {} - {}", t0, t1);
    }
    println!("  Variables: {}", summary.columns.join(", "));
    println!(
        "  Steps accepted {}, rejected {}, rhs evaluations {}",
        manifest.stats.accepted_steps, manifest.stats.rejected_steps, manifest.stats.rhs_evaluations
    );
    Ok(())
}

fn cmd_delete_run(study_path: &Path, run_id: &str) -> AppResult<()> {
    let ctx = StudyContext::open(study_path)?;
    df_app::delete_run(&ctx, run_id)?;
    println!("✓ Deleted run {}", run_id);
    Ok(())
}

fn cmd_export_series(
    study_path: &Path,
    run_id: &str,
    variable: &str,
    output: Option<&Path>,
) -> AppResult<()> {
    let ctx = StudyContext::open(study_path)?;
    let series = df_app::run_series(&ctx, run_id, variable)?;

    if let Some(path) = output {
        let mut file = io::BufWriter::new(std::fs::File::create(path)?);
        df_app::write_series_csv(&mut file, variable, &series)?;
        file.flush()?;
        println!(
            "✓ Exported {} data points to {}",
            series.len(),
            path.display()
        );
    } else {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        df_app::write_series_csv(&mut lock, variable, &series)?;
    }
    Ok(())
}
