//! fleet — command-line front end for a fleet-managed cluster.
//!
//! # Usage
//!
//! ```text
//! fleet machines
//! fleet --json units
//! fleet status web.service
//! fleet start units/web.service units/db.service
//! fleet destroy web.service
//! fleet ssh 2a9b1c -- uptime
//! ```

use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use fleet_core::data::settings;
use fleet_core::infrastructure::SshRunner;
use fleet_core::logging;
use fleet_core::types::{Machine, RunnerKind, Settings, Unit};
use fleet_core::{Controller, FleetContext};

const ENV_CONFIG: &str = "FLEET_CONFIG";

#[derive(Debug, Parser)]
#[command(author, version, about = "Inspect and drive a fleet cluster", long_about = None)]
struct Cli {
    /// Settings file (YAML). Missing file means defaults.
    #[arg(long, global = true, env = ENV_CONFIG)]
    config: Option<PathBuf>,
    /// Host tried first when discovering the cluster.
    #[arg(long, global = true)]
    fleet_host: Option<String>,
    /// etcd discovery registry used when no known host answers.
    #[arg(long, global = true)]
    discovery_url: Option<String>,
    /// `shell` (local fleetctl --tunnel) or `ssh` (fleetctl on the host).
    #[arg(long, global = true)]
    runner: Option<RunnerKind>,
    /// Print JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List cluster machines.
    Machines,
    /// List units.
    Units,
    /// Rediscover the cluster and refetch units.
    Sync,
    /// Show one unit.
    Status { unit: String },
    /// Submit and start unit files.
    Start {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Submit unit files without scheduling them.
    Submit {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Submit and schedule unit files without starting them.
    Load {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Destroy units by name.
    Destroy {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Run a command on a machine over ssh.
    Ssh {
        machine: String,
        #[arg(long)]
        port: Option<u16>,
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    logging::init(&settings.log)?;
    debug!(?settings, "effective settings");

    let ctx = Rc::new(FleetContext::from_settings(settings));
    let mut controller = Controller::new(Rc::clone(&ctx));
    if !run(&mut controller, &ctx, cli.command, cli.json)? {
        process::exit(1);
    }
    Ok(())
}

/// File, then environment, then flags.
fn load_settings(cli: &Cli) -> Result<Settings> {
    let path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut settings = read_settings(&path)?;
    settings::apply_env(&mut settings)?;
    apply_flags(&mut settings, cli);
    Ok(settings)
}

fn read_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(settings::default_settings());
    }
    settings::load(path).with_context(|| format!("reading settings from {}", path.display()))
}

fn apply_flags(settings: &mut Settings, cli: &Cli) {
    if let Some(ref host) = cli.fleet_host {
        settings.fleet_host = Some(host.clone());
    }
    if let Some(ref url) = cli.discovery_url {
        settings.discovery_url = Some(url.clone());
    }
    if let Some(runner) = cli.runner {
        settings.runner = runner;
    }
}

fn default_config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home)
        .join(".config")
        .join("fleet")
        .join("settings.yaml")
}

/// Execute one subcommand. `Ok(false)` means fleetctl reported failure.
fn run(controller: &mut Controller, ctx: &FleetContext, command: Commands, json: bool) -> Result<bool> {
    match command {
        Commands::Machines => {
            let machines = controller.machines();
            println!("{}", render_machines(&machines, json)?);
            Ok(true)
        }
        Commands::Units => {
            let units = controller.units()?.to_vec();
            println!("{}", render_units(&units, json)?);
            Ok(true)
        }
        Commands::Sync => {
            let ok = controller.sync()?;
            let machines = controller.cluster().machine_set().len();
            let units = controller.cached_units().map(|u| u.len()).unwrap_or(0);
            println!("{} machines, {} units", machines, units);
            Ok(ok)
        }
        Commands::Status { unit } => {
            let found = controller
                .get(&unit)?
                .ok_or_else(|| anyhow!("unit not found: {}", unit))?;
            println!("{}", render_units(&[found], json)?);
            Ok(true)
        }
        Commands::Start { files } => Ok(controller.start(&files)?),
        Commands::Submit { files } => Ok(controller.submit(&files)?),
        Commands::Load { files } => Ok(controller.load(&files)?),
        Commands::Destroy { names } => Ok(controller.destroy(&names)?),
        Commands::Ssh {
            machine,
            port,
            command,
        } => {
            let target = controller
                .cluster_mut()
                .machines()
                .into_iter()
                .find(|m| m.id.starts_with(&machine))
                .ok_or_else(|| anyhow!("machine not found: {}", machine))?;
            let runner = SshRunner::new(ctx.settings.ssh.clone());
            let tokens: Vec<&str> = command.iter().map(String::as_str).collect();
            let port = port.unwrap_or(ctx.settings.ssh.port);
            print!("{}", target.ssh(&runner, &tokens, port)?);
            Ok(true)
        }
    }
}

fn render_machines(machines: &[Rc<Machine>], json: bool) -> Result<String> {
    if json {
        let views: Vec<_> = machines.iter().map(|m| m.view()).collect();
        return Ok(serde_json::to_string_pretty(&views)?);
    }
    let mut out = String::from("MACHINE\tIP\tMETADATA");
    for m in machines {
        out.push_str(&format!(
            "\n{}\t{}\t{}",
            m.id,
            m.ip,
            m.metadata.as_deref().unwrap_or("-")
        ));
    }
    Ok(out)
}

fn render_units(units: &[Rc<Unit>], json: bool) -> Result<String> {
    if json {
        let views: Vec<_> = units.iter().map(|u| u.view()).collect();
        return Ok(serde_json::to_string_pretty(&views)?);
    }
    let mut out = String::from("UNIT\tSTATE\tDSTATE\tMACHINE\tACTIVE\tSUB");
    for u in units {
        let machine = u
            .machine
            .as_ref()
            .map(|m| format!("{}/{}", m.id, m.ip))
            .unwrap_or_else(|| "-".into());
        out.push_str(&format!(
            "\n{}\t{}\t{}\t{}\t{}\t{}",
            u.name, u.state, u.desired_state, machine, u.active, u.sub_state
        ));
    }
    Ok(out)
}
