//! The `wireloom` command: project scaffolding and compile-and-export.
//!
//! A microcontroller project is an ordinary cargo binary that builds its
//! graph and calls [`wireloom::handle`]; `run` simply delegates to cargo in
//! the project directory and forwards the export flags.

use std::path::PathBuf;
use std::process::Command;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "wireloom",
    about = "Compile signal-block graphs into microcontroller artifacts",
    version
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Initialize a new microcontroller project.
    Init {
        /// Directory for the new project.
        name: PathBuf,
    },
    /// Compile and export a microcontroller project.
    Run {
        /// Path to the project directory.
        path: PathBuf,

        /// Export compiled microcontrollers to the data directory.
        #[arg(long, short = 'm')]
        microcontroller: bool,

        /// Vehicle files to update, separated by commas.
        #[arg(long, short = 'v')]
        vehicle: Option<String>,

        /// Only export microcontrollers matching these name fragments.
        #[arg(long, short = 's')]
        select: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().cmd {
        Cmd::Init { name } => {
            wireloom::handling::init_project(&name)
                .with_context(|| format!("initializing {}", name.display()))?;
        }
        Cmd::Run {
            path,
            microcontroller,
            vehicle,
            select,
        } => {
            let manifest = path.join("Cargo.toml");
            if !manifest.is_file() {
                bail!("{} is not a microcontroller project", path.display());
            }
            let mut cargo = Command::new("cargo");
            cargo
                .arg("run")
                .arg("--quiet")
                .arg("--manifest-path")
                .arg(&manifest)
                .arg("--");
            if microcontroller {
                cargo.arg("--microcontroller");
            }
            if let Some(vehicle) = vehicle {
                cargo.arg("--vehicle").arg(vehicle);
            }
            if let Some(select) = select {
                cargo.arg("--select").arg(select);
            }
            let status = cargo.status().context("running cargo")?;
            if !status.success() {
                std::process::exit(status.code().unwrap_or(1));
            }
        }
    }
    Ok(())
}
