//! rdpg agent binary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use rdpg_agent::{Broker, BrokerError};
use rdpg_core::config::AppConfig;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// rdpg agent - provisions tenant databases on a replicated PostgreSQL cluster
#[derive(Parser, Debug)]
#[command(name = "rdpg-agent")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "RDPG_CONFIG", default_value = "config/agent.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or complete the control and node-local schema
    InitSchema,

    /// Provision a new instance
    Provision {
        #[arg(long)]
        instance_id: String,
        #[arg(long)]
        service_id: String,
        #[arg(long)]
        plan_id: String,
        #[arg(long)]
        organization_id: String,
        #[arg(long)]
        space_id: String,
    },

    /// Tear down an instance and retire its records
    Deprovision {
        #[arg(long)]
        instance_id: String,
    },

    /// Bind an application to an instance
    Bind {
        #[arg(long)]
        instance_id: String,
        /// Generated when omitted
        #[arg(long)]
        binding_id: Option<String>,
    },

    /// Remove a binding
    Unbind {
        #[arg(long)]
        binding_id: String,
    },

    /// Show an active instance
    ShowInstance {
        #[arg(long)]
        instance_id: String,
    },

    /// Show an active binding and its credentials
    ShowBinding {
        #[arg(long)]
        binding_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout carries only the JSON result.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("rdpg-agent v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    let broker = Broker::from_config(&config)
        .await
        .context("failed to initialize agent")?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling after the current step");
            interrupt.cancel();
        }
    });

    match args.command {
        Command::InitSchema => {
            let report = broker.init_schema(&cancel).await?;
            print_json(&report)?;
            if !report.is_clean() {
                anyhow::bail!(
                    "{} catalog entries failed; re-run init-schema to retry",
                    report.failures().count()
                );
            }
        }
        Command::Provision {
            instance_id,
            service_id,
            plan_id,
            organization_id,
            space_id,
        } => {
            let instance = broker.new_instance(
                &instance_id,
                &service_id,
                &plan_id,
                &organization_id,
                &space_id,
            )?;
            let instance = broker.provision(instance, &cancel).await?;
            print_json(&instance)?;
        }
        Command::Deprovision { instance_id } => {
            let outcome = match broker.remove(&instance_id, &cancel).await {
                Ok(outcome) => outcome,
                Err(BrokerError::RemovalCancelled {
                    instance_id,
                    teardown,
                }) => {
                    // Show what already ran before reporting the cancellation.
                    print_json(&teardown)?;
                    return Err(BrokerError::RemovalCancelled {
                        instance_id,
                        teardown,
                    }
                    .into());
                }
                Err(err) => return Err(err.into()),
            };
            print_json(&outcome)?;
        }
        Command::Bind {
            instance_id,
            binding_id,
        } => {
            let binding_id = binding_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let binding = broker.create_binding(&instance_id, &binding_id).await?;
            print_json(&binding)?;
        }
        Command::Unbind { binding_id } => {
            let binding = broker.remove_binding(&binding_id).await?;
            print_json(&binding)?;
        }
        Command::ShowInstance { instance_id } => {
            let instance = broker.find_instance(&instance_id).await?;
            print_json(&instance)?;
        }
        Command::ShowBinding { binding_id } => {
            let binding = broker.find_binding(&binding_id).await?;
            print_json(&binding)?;
        }
    }

    Ok(())
}

/// Load configuration (file is optional, env vars can provide/override everything).
fn load_config(path: &str) -> Result<AppConfig> {
    let config_path = std::path::Path::new(path);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(config_path));
    } else {
        tracing::debug!("No config file found at {}", path);
    }

    // RDPG_CONFIG only names the file
    let has_env_config =
        std::env::vars().any(|(key, _)| key.starts_with("RDPG_") && key != "RDPG_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: rdpg-agent --config /path/to/agent.toml <command>\n  \
             2. Environment variables: RDPG_CONTROL__HOST=10.0.0.1 \
             RDPG_CLUSTER__NODES='[{{host=\"10.0.0.1\"}}]' rdpg-agent <command>\n\n\
             See config/agent.example.toml for example configuration."
        );
    }

    figment
        .merge(Env::prefixed("RDPG_").split("__"))
        .extract()
        .context("failed to load configuration")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to encode result")?;
    println!("{json}");
    Ok(())
}
