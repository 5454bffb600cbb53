// bases/fleet_deploy/src/main.rs
use clap::Parser;
use color_eyre::Result;

mod app;
mod config;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = config::CliArgs::parse();
    let config = config::Config::from_args(args);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let app = app::App::new(config);
    let code = app.run().await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
