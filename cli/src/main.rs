use std::path::PathBuf;

use clap::Parser;
use sdsim_common::Diagnostic;
use sdsim_engine::Sim;
use thiserror::Error;

/// Runs an XMILE system-dynamics model and prints its time series.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the XMILE file to load.
    path: PathBuf,

    /// Model to run, if the file defines more than one. Defaults to
    /// the file's first model.
    #[arg(short, long)]
    model: Option<String>,

    /// Run only up to this time instead of the model's full horizon.
    #[arg(short, long)]
    until: Option<f64>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to read `{0}`: {1}")]
    ReadFile(PathBuf, std::io::Error),
    #[error("{0}")]
    Load(Diagnostic),
    #[error("failed to compile model:\n{}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n"))]
    Compile(Vec<Diagnostic>),
    #[error("{0}")]
    Runtime(Diagnostic),
}

fn main() -> Result<(), CliError> {
    env_logger::init();
    let args = Args::parse();

    let xml = std::fs::read_to_string(&args.path).map_err(|e| CliError::ReadFile(args.path.clone(), e))?;
    let project = sdsim_xmile::load(&xml).map_err(CliError::Load)?;

    let mut sim = Sim::new(std::rc::Rc::new(project), args.model.as_deref()).map_err(CliError::Compile)?;

    match args.until {
        Some(end) => sim.run_to(end),
        None => sim.run_to_end(),
    }

    print_series(&sim).map_err(CliError::Runtime)
}

fn print_series(sim: &Sim) -> Result<(), Diagnostic> {
    let names = sim.var_names();
    println!("{}", names.join("\t"));

    let columns: Vec<Vec<f64>> = names
        .iter()
        .map(|name| sim.get_series(name))
        .collect::<Result<_, _>>()?;

    for row in 0..=sim.step_count() {
        let line: Vec<String> = columns.iter().map(|col| col[row].to_string()).collect();
        println!("{}", line.join("\t"));
    }

    Ok(())
}
