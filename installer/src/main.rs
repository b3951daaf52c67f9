//! Manifest-driven workspace installer.
//!
//! Reads `installer-manifest.yaml` (or `.toml`), brings the workspace into the
//! declared state and records every step in `install-state.json`.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use installer::commands::{self, InstallRequest};
use installer::error::InstallFailure;
use installer::exit_codes;
use installer::io::config::OptionFlags;
use installer::io::paths::InstallerPaths;
use installer::logging;

#[derive(Parser)]
#[command(
    name = "installer",
    version,
    about = "Manifest-driven workspace installer"
)]
struct Cli {
    /// Action to perform.
    #[arg(value_enum, default_value_t = Action::Install)]
    action: Action,
    /// Manifest file (YAML, or TOML by extension).
    #[arg(long, default_value = "installer-manifest.yaml")]
    manifest: PathBuf,
    /// Workspace directory, overriding the manifest.
    #[arg(long)]
    workspace: Option<PathBuf>,
    /// Record planned actions without touching repositories, links, models, or network.
    #[arg(long)]
    dry_run: bool,
    /// Treat every non-canonical source mount as fatal.
    #[arg(long)]
    strict_source: bool,
    /// Accept materialized adapter copies in place of canonical symlinks.
    #[arg(long)]
    allow_copy_fallback: bool,
    /// Skip model staging.
    #[arg(long)]
    skip_models: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Action {
    /// Run the full install pipeline.
    Install,
    /// Re-run the install pipeline over an existing workspace.
    Repair,
    /// Print the recorded install state.
    Status,
    /// Remove installer-generated files from the workspace.
    Clean,
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            match err.downcast_ref::<InstallFailure>() {
                Some(failure) => eprintln!("Install failed: {failure}"),
                None => eprintln!("{:#}", err),
            }
            exit_codes::FAILED
        }
    };
    std::process::exit(code);
}

fn run(cli: &Cli) -> Result<i32> {
    match cli.action {
        Action::Install | Action::Repair => {
            let state_path = commands::install(&install_request(cli))?;
            println!("Install completed. state={}", state_path.display());
            Ok(exit_codes::OK)
        }
        Action::Status => {
            let workspace = commands::locate_workspace(&cli.manifest, cli.workspace.as_deref())?;
            match commands::status(&workspace)? {
                Some(contents) => {
                    print!("{contents}");
                    Ok(exit_codes::OK)
                }
                None => {
                    let paths = InstallerPaths::new(&workspace);
                    println!("No install state found: {}", paths.state_path.display());
                    Ok(exit_codes::FAILED)
                }
            }
        }
        Action::Clean => {
            let workspace = commands::locate_workspace(&cli.manifest, cli.workspace.as_deref())?;
            let removed = commands::clean(&workspace)?;
            if removed.is_empty() {
                println!("Nothing to clean.");
            }
            for path in removed {
                println!("Removed {}", path.display());
            }
            Ok(exit_codes::OK)
        }
    }
}

fn install_request(cli: &Cli) -> InstallRequest {
    InstallRequest {
        manifest: cli.manifest.clone(),
        workspace: cli.workspace.clone(),
        flags: OptionFlags {
            dry_run: cli.dry_run,
            strict_source: cli.strict_source,
            allow_copy_fallback: cli.allow_copy_fallback,
        },
        include_models: !cli.skip_models,
    }
}
