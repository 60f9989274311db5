use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

use surety_common::SuretyConfig;
use surety_node::{
    cli::{Cli, Commands},
    runtime::{
        builder::build_runtime_from,
        scenario::{run_scenario, Scenario},
        source::{FixedStatusSource, SeededStatusSource, StatusSource},
    },
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,surety_node=debug".into()))
        .init();

    match cli.command {
        Commands::InitConfig { out, force } => {
            if out.exists() && !force {
                error!("{} already exists; pass --force to overwrite", out.display());
                return Err(format!("{} already exists", out.display()).into());
            }
            SuretyConfig::default().save_to_file(&out)?;
            info!("📝 Default config written to {}", out.display());
        }
        Commands::Simulate {
            airlines,
            oracles,
            flight,
            seed,
            status,
            dump_state,
        } => {
            info!("--- STARTING FLIGHT SURETY SIMULATION ---");
            let runtime = build_runtime_from(cli.config.as_deref())?;

            let source: Arc<dyn StatusSource> = match status {
                Some(code) => Arc::new(FixedStatusSource(code)),
                None => Arc::new(SeededStatusSource::new(seed)),
            };
            let scenario = Scenario {
                airlines,
                oracles,
                flight,
                ..Scenario::default()
            };

            let report = run_scenario(&runtime, &scenario, source).await?;
            match &report.status {
                Some(status) if status.finalized => info!("✈️ {} finalized as {}", report.key, status.code),
                _ => info!("✈️ {} left unsettled after {} requests", report.key, report.requests),
            }
            if dump_state {
                println!("{}", runtime.ledger.snapshot().await?);
            }
        }
    }

    Ok(())
}
