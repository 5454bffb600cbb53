// bases/fleet_deploy/src/app.rs
use crate::config::{Config, Mode};
use color_eyre::Result;
use deploy_planner::Scope;
use deployment_model::{ConfigStore, ValidationLevel};
use orchestrator::{Controller, DeployError, ProgressEvent, RunReport, RunSettings, SubscriptionOverrides};
use remote_exec::{Executor, ShellExecutor};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

pub struct App {
    config: Config,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Returns the process exit code
    pub async fn run(&self) -> Result<i32> {
        let store = ConfigStore::open(&self.config.config_path)?;
        match &self.config.mode {
            Mode::Validate => self.validate(&store),
            Mode::Reset(host) => self.reset(store, host),
            Mode::Deploy(scope) => self.deploy(store, scope).await,
        }
    }

    fn validate(&self, store: &ConfigStore) -> Result<i32> {
        let deployment = store.deployment()?;
        match deployment.validate(ValidationLevel::Full) {
            Ok(()) => {
                println!("{} is valid.", store.path().display());
                Ok(0)
            }
            Err(violations) => {
                print_violations(&violations);
                Ok(1)
            }
        }
    }

    fn reset(&self, mut store: ConfigStore, host: &str) -> Result<i32> {
        let mut deployment = store.deployment()?.clone();
        let previous = deployment.reset_host(host)?;
        store.save_deployment(&deployment)?;
        println!("{} reset from {} to new.", host, previous);
        Ok(0)
    }

    async fn deploy(&self, store: ConfigStore, scope: &Scope) -> Result<i32> {
        let mut deployment = store.deployment()?.clone();
        let settings = RunSettings {
            provisioner: self.config.provisioner.clone(),
            subscription: store.subscription(),
            overrides: SubscriptionOverrides::from_env(),
        };
        info!("Deploying from {} ({})", store.path().display(), scope);

        let executor: Arc<dyn Executor> = Arc::new(ShellExecutor::new());
        let mut controller = Controller::new(executor, store, settings);
        let printer = tokio::spawn(print_progress(controller.subscribe()));

        let result = controller.run(&mut deployment, scope).await;
        // Closing the channel ends the printer
        drop(controller);
        let _ = printer.await;

        match result {
            Ok(report) => {
                self.print_report(&report)?;
                Ok(report.exit_code())
            }
            Err(DeployError::Invalid(violations)) => {
                print_violations(&violations);
                Ok(1)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn print_report(&self, report: &RunReport) -> Result<()> {
        if self.config.json {
            println!("{}", report.to_json()?);
        } else {
            print!("{}", report);
        }
        Ok(())
    }
}

async fn print_progress(mut events: broadcast::Receiver<ProgressEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => eprintln!("{}", event),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!("Progress display fell behind, {} events dropped", missed)
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_violations(violations: &[deployment_model::Violation]) {
    eprintln!("The deployment configuration is not valid:");
    for violation in violations {
        eprintln!("  - {}", violation);
    }
}
