use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dbdraft::compiler::{CompileResult, compile_str};
use dbdraft::layout::{AutoLayout, LayeredLayout};
use dbdraft::project::ProjectError;
use dbdraft::sql::generate_sql;
use dbdraft::store::SchemaGraph;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dbdraft", version, about = "Compile, check and export database schema projects")]
struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Errors only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate PostgreSQL DDL
    Sql {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print compiler diagnostics; fails when the project has errors
    Check { input: PathBuf },
    /// Write the repaired project JSON
    Normalize {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Arrange every table and write the project JSON
    Layout {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("dbdraft=debug")
    } else if quiet {
        EnvFilter::new("dbdraft=error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dbdraft=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn read_input(path: &Path) -> Result<String, ProjectError> {
    fs::read_to_string(path).map_err(|source| ProjectError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn write_output(path: Option<&Path>, text: &str) -> Result<(), ProjectError> {
    match path {
        Some(path) => {
            fs::write(path, text).map_err(|source| ProjectError::Write {
                path: path.to_path_buf(),
                source,
            })?;
            info!(path = %path.display(), "written");
        }
        None => print!("{text}"),
    }
    Ok(())
}

/// Compile `input`, logging repairs. Fails on any error diagnostic.
fn compile_input(input: &Path) -> Result<CompileResult, ProjectError> {
    let result = compile_str(&read_input(input)?);
    for diagnostic in &result.diagnostics {
        match diagnostic.severity {
            dbdraft::Severity::Error => error!("{diagnostic}"),
            dbdraft::Severity::Warning => warn!("{diagnostic}"),
            dbdraft::Severity::Info => info!("{diagnostic}"),
        }
    }
    match result.errors().count() {
        0 => Ok(result),
        n => Err(ProjectError::Rejected(n)),
    }
}

fn run(command: Command) -> Result<ExitCode, ProjectError> {
    match command {
        Command::Sql { input, output } => {
            let project = compile_input(&input)?.patched_data;
            let sql = generate_sql(&project.tables, &project.relations);
            info!(tables = project.tables.len(), relations = project.relations.len(), "sql generated");
            write_output(output.as_deref(), &sql)?;
        }
        Command::Check { input } => {
            let result = compile_str(&read_input(&input)?);
            for diagnostic in &result.diagnostics {
                println!("{diagnostic}");
            }
            let errors = result.errors().count();
            println!(
                "{}: {} table(s), {} relation(s), {} diagnostic(s), {errors} error(s)",
                input.display(),
                result.patched_data.tables.len(),
                result.patched_data.relations.len(),
                result.diagnostics.len(),
            );
            if !result.success {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Normalize { input, output } => {
            let project = compile_input(&input)?.patched_data;
            write_output(output.as_deref(), &project.to_json_pretty()?)?;
        }
        Command::Layout { input, output } => {
            let project = compile_input(&input)?.patched_data;
            let mut graph = SchemaGraph::from_project(project);
            let positions = LayeredLayout::default().layout(graph.tables(), graph.relations());
            let moved = graph.apply_layout(&positions);
            info!(tables = moved, "layout applied");
            write_output(output.as_deref(), &graph.project().to_json_pretty()?)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
