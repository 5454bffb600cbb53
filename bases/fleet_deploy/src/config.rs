// bases/fleet_deploy/src/config.rs
use clap::Parser;
use deploy_planner::Scope;
use orchestrator::DEFAULT_PROVISIONER;
use std::path::PathBuf;

const DEFAULT_CONFIG: &str = ".fleet-deploy/deployment.yml";

/// What this invocation should do
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    /// Deploy the whole fleet, or add one node
    Deploy(Scope),

    /// Report every problem with the configuration and stop
    Validate,

    /// Put a host back to `new`
    Reset(String),
}

/// Resolved command line
#[derive(Debug, Clone)]
pub struct Config {
    pub config_path: PathBuf,
    pub provisioner: String,
    pub mode: Mode,
    pub json: bool,
    pub verbosity: u8,
}

/// Fleet Deploy - staged multi-host deployment
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Node to add to an already deployed fleet
    ///
    /// Without it the whole fleet is deployed.
    #[arg(value_name = "HOST")]
    pub host: Option<String>,

    /// Deployment configuration file (default: ~/.fleet-deploy/deployment.yml)
    #[arg(short, long, env = "FLEET_DEPLOY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Provisioning command run on every host
    #[arg(long, default_value = DEFAULT_PROVISIONER)]
    pub provisioner: String,

    /// Validate the configuration and report every problem found
    #[arg(long, conflicts_with_all = ["host", "reset"])]
    pub validate: bool,

    /// Reset a host to `new` so the next run starts it over
    #[arg(long, value_name = "HOST", conflicts_with = "host")]
    pub reset: Option<String>,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// More logging (-v for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Config {
    pub fn from_args(args: CliArgs) -> Self {
        let config_path = args.config.unwrap_or_else(default_config_path);
        let mode = if args.validate {
            Mode::Validate
        } else if let Some(host) = args.reset {
            Mode::Reset(host)
        } else {
            Mode::Deploy(args.host.map_or(Scope::Full, Scope::AddNode))
        };

        Self {
            config_path,
            provisioner: args.provisioner,
            mode,
            json: args.json,
            verbosity: args.verbose,
        }
    }

    /// Log filter used when RUST_LOG is not set
    pub fn log_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "fleet_deploy=info,orchestrator=info",
            _ => "fleet_deploy=debug,orchestrator=debug,deploy_planner=debug,remote_exec=debug,deployment_model=debug",
        }
    }
}

fn default_config_path() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(DEFAULT_CONFIG),
        None => PathBuf::from(DEFAULT_CONFIG),
    }
}
