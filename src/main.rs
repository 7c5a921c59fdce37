use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use beacon_discovery::codec::{BeanRegistry, Bridge};
use beacon_discovery::endpoint::description_schema;
use beacon_discovery::{
    Config, DiscoveryService, EdefDirectory, ExportEndpoint, ImportRegistry, MdnsChannel,
    StaticDispatcherAccess, Value, edef,
};

/// Beacon Discovery - advertise and discover remote service endpoints
#[derive(Parser)]
#[command(name = "beacon-discovery", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file (defaults to the user config directory)
    #[arg(short, long, env = "BEACON_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run discovery until interrupted
    Run {
        /// EDEF files describing endpoints to export
        #[arg(short, long = "export")]
        exports: Vec<PathBuf>,
    },
    /// Parse an EDEF file and print its endpoints
    Edef {
        /// Path to the EDEF file
        path: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: EdefFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum EdefFormat {
    /// Endpoint properties as plain JSON
    Json,
    /// EDEF document
    Xml,
    /// Foreign typed-collection JSON
    Foreign,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,mdns_sd=warn",
        1 => "info,beacon_discovery=debug,mdns_sd=warn",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Command::Edef { path, format }) => print_edef(&path, format),
        Some(Command::Run { exports }) => {
            run_discovery(load_config(cli.config.as_deref())?, exports).await
        }
        None => run_discovery(load_config(cli.config.as_deref())?, Vec::new()).await,
    }
}

fn load_config(path: Option<&Path>) -> beacon_discovery::Result<Config> {
    path.map_or_else(Config::load, Config::load_from)
}

async fn run_discovery(config: Config, exports: Vec<PathBuf>) -> anyhow::Result<()> {
    tracing::info!(
        framework_uuid = %config.framework_uuid,
        dispatcher_port = config.dispatcher.port,
        edef_dir = ?config.edef.watch_dir,
        "starting beacon discovery"
    );

    let registry = Arc::new(ImportRegistry::new());
    let access = Arc::new(StaticDispatcherAccess::new(
        config.dispatcher.port,
        config.dispatcher.path.clone(),
    ));
    let channel = Arc::new(MdnsChannel::new()?);

    let service = Arc::new(DiscoveryService::new(
        config.framework_uuid.clone(),
        config.discovery.clone(),
        channel,
        registry.clone(),
        access.clone(),
    ));
    service.start()?;

    let mut exported = Vec::new();
    for path in &exports {
        let content = tokio::fs::read_to_string(path).await?;
        exported.extend(
            edef::parse(&content)?
                .iter()
                .map(ExportEndpoint::from_description),
        );
    }
    service.endpoints_added(&exported);

    let edef_dir = config
        .edef
        .watch_dir
        .as_ref()
        .map(|dir| EdefDirectory::new(dir, registry.clone()));

    let mut interval = tokio::time::interval(config.edef.scan_interval);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "failed to listen for ctrl-c");
                }
                break;
            }
            _ = interval.tick() => {
                if let Some(dir) = &edef_dir {
                    match dir.scan() {
                        Ok(report) if !report.is_empty() => tracing::info!(
                            added = report.added.len(),
                            updated = report.updated.len(),
                            deleted = report.deleted.len(),
                            "EDEF folder changed"
                        ),
                        Ok(_) => {}
                        Err(e) => tracing::warn!(
                            path = %dir.folder().display(),
                            error = %e,
                            "EDEF folder scan failed"
                        ),
                    }
                }
                tracing::debug!(
                    imported = registry.len(),
                    exported = service.exported_uids().len(),
                    peers = access.peers().len(),
                    "discovery status"
                );
            }
        }
    }

    tracing::info!("shutting down");
    // Stopping joins the browse threads
    tokio::task::spawn_blocking(move || service.stop()).await?;

    Ok(())
}

fn print_edef(path: &Path, format: EdefFormat) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(path)?;
    let endpoints = edef::parse(&content)?;

    let output = match format {
        EdefFormat::Json => serde_json::to_string_pretty(&serde_json::Value::Array(
            endpoints
                .iter()
                .map(|endpoint| Value::Map(endpoint.properties().clone()).to_json())
                .collect(),
        ))?,
        EdefFormat::Xml => edef::write(&endpoints)?,
        EdefFormat::Foreign => {
            let schema = description_schema();
            let mut beans = BeanRegistry::new();
            beans.register(schema.descriptor());
            let bridge = Bridge::new(beans);

            serde_json::to_string_pretty(&serde_json::Value::Array(
                endpoints
                    .iter()
                    .map(|endpoint| bridge.encode(&Value::Bean(schema.to_bean(endpoint))))
                    .collect(),
            ))?
        }
    };

    println!("{output}");
    Ok(())
}
