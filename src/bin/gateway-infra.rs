// Copyright (c) 2025 - Cowboy AI, Inc.
//! gateway-infra command line
//!
//! ```text
//! gateway-infra synth   [--config FILE] [--out DIR]
//! gateway-infra diff    [--config FILE] [--state DIR] [--stack NAME]
//! gateway-infra deploy  [--config FILE] [--state DIR] [--stack NAME]
//! gateway-infra destroy [--config FILE] [--state DIR] [--stack NAME]
//! gateway-infra recover [--config FILE] [--state DIR] [--stack NAME]
//! ```
//!
//! Log level is controlled with `RUST_LOG` (default `info`).

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use gateway_infra::{
    compose, CloudAssembly, DeploymentConfig, DeploymentService, LocalStateProvisioner, StackOutcome,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Deployment configuration (TOML); defaults apply when omitted
    #[arg(long, global = true, env = "GATEWAY_INFRA_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct StateArgs {
    /// Directory holding deployed stack state
    #[arg(long, default_value = ".gateway-infra/state")]
    state: PathBuf,

    /// Restrict the operation to one stack
    #[arg(long)]
    stack: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render every stack template without contacting the provider
    Synth {
        /// Output directory for templates and manifest
        #[arg(long, default_value = "infra.out")]
        out: PathBuf,
    },
    /// Show planned changes against deployed state
    Diff(StateArgs),
    /// Apply stacks in dependency order
    Deploy(StateArgs),
    /// Remove stacks in reverse dependency order
    Destroy(StateArgs),
    /// Mark stacks left mid-deploy or mid-destroy by an interrupted run as failed
    Recover(StateArgs),
}

fn synthesize(config: Option<&Path>) -> Result<CloudAssembly> {
    let config = DeploymentConfig::load(config).context("Failed to load configuration")?;
    let app = compose(&config).context("Failed to compose stacks")?;
    app.synth().context("Synthesis failed")
}

async fn service(state: &Path) -> Result<DeploymentService<LocalStateProvisioner>> {
    let mut service = DeploymentService::new(LocalStateProvisioner::new(state));
    service
        .initialize()
        .await
        .with_context(|| format!("Failed to initialize state at {}", state.display()))?;
    Ok(service)
}

fn print_outcomes(outcomes: &[StackOutcome]) {
    for outcome in outcomes {
        if outcome.skipped {
            println!("{}: no changes ({})", outcome.change_set.stack, outcome.status);
        } else {
            println!("{} ({})", outcome.change_set.summary(), outcome.status);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let assembly = synthesize(cli.config.as_deref())?;

    match cli.command {
        Commands::Synth { out } => {
            let written = assembly
                .write_to(&out)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            for path in written {
                println!("{}", path.display());
            }
        }
        Commands::Diff(args) => {
            let service = service(&args.state).await?;
            let plans = service.diff(&assembly, args.stack.as_deref()).await?;
            for plan in plans {
                println!("{}", plan.summary());
                for change in &plan.changes {
                    println!("  {}", change);
                }
                if plan.outputs_changed {
                    println!("  ~ outputs");
                }
            }
        }
        Commands::Deploy(args) => {
            let mut service = service(&args.state).await?;
            let outcomes = service
                .deploy(&assembly, args.stack.as_deref())
                .await
                .context("Deploy failed")?;
            print_outcomes(&outcomes);
            info!(stacks = outcomes.len(), "Deploy complete");
        }
        Commands::Destroy(args) => {
            let mut service = service(&args.state).await?;
            let outcomes = service
                .destroy(&assembly, args.stack.as_deref())
                .await
                .context("Destroy failed")?;
            print_outcomes(&outcomes);
            info!(stacks = outcomes.len(), "Destroy complete");
        }
        Commands::Recover(args) => {
            let mut service = service(&args.state).await?;
            let outcomes = service
                .recover(&assembly, args.stack.as_deref())
                .await
                .context("Recover failed")?;
            if outcomes.is_empty() {
                println!("no interrupted stacks");
            }
            for outcome in &outcomes {
                println!("{}: {}", outcome.change_set.stack, outcome.status);
            }
        }
    }

    Ok(())
}
