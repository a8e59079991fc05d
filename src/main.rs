// src/main.rs

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use cifvis::config::Config;
use cifvis::io::{load_structure, save_structure};
use cifvis::physics::operations::ModifierPipeline;
use cifvis::utils::{logger, report};

/// Read a CIF file and prepare its structure for an ORTEP drawing.
#[derive(Debug, Parser)]
#[command(name = "cifvis", version, about)]
struct Cli {
    /// CIF file to read
    #[arg(value_name = "FILE")]
    path: PathBuf,

    /// Data block to load, by index or name (first block if omitted)
    #[arg(short, long, value_name = "N|NAME")]
    block: Option<String>,

    /// Print the prepared structure as JSON instead of the text report
    #[arg(long)]
    json: bool,

    /// Settings file (the OS config directory if omitted)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write the prepared structure, as JSON for `.json` names and CIF otherwise
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,
}

fn run(args: &Cli) -> cifvis::Result<()> {
    // 1. Settings and logging
    let (config, message) = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let _ = logger::init(logger::level_from_str(&config.log_level));
    info!("{message}");

    // 2. Parse, repairing once if needed
    let (name, structure) = load_structure(
        &args.path,
        args.block.as_deref(),
        config.split_su,
        &config.repair,
    )?;

    // 3. Modifiers
    let mut pipeline = ModifierPipeline::from_config(&config)?;
    let prepared = pipeline.apply(&structure)?;

    // 4. Output
    if let Some(output) = &args.output {
        save_structure(output, &prepared, &name)?;
        info!("structure written to {:?}", output);
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&prepared)?);
    } else {
        print!("{}", report::structure_summary(&prepared, &name));
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Cli::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("cifvis: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("cifvis").chain(list.iter().copied()))
    }

    #[test]
    fn options() {
        let a = args(&["x.cif", "--block", "2", "--json", "-o", "out.cif"]).unwrap();
        assert_eq!(a.path, PathBuf::from("x.cif"));
        assert_eq!(a.block.as_deref(), Some("2"));
        assert!(a.json);
        assert_eq!(a.output, Some(PathBuf::from("out.cif")));
        assert_eq!(a.config, None);

        let a = args(&["-b", "mydata", "-c", "settings.json", "y.cif"]).unwrap();
        assert_eq!(a.block.as_deref(), Some("mydata"));
        assert_eq!(a.config, Some(PathBuf::from("settings.json")));
        assert!(!a.json);

        assert!(args(&[]).is_err());
        assert!(args(&["x.cif", "--block"]).is_err());
        assert!(args(&["x.cif", "--frobnicate"]).is_err());
        assert!(args(&["x.cif", "y.cif"]).is_err());
    }

    #[test]
    fn command_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
