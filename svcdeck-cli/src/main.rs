mod client;
mod config;
mod events;
mod http;
mod ops;

use clap::{Parser, Subcommand};
use config::ClientConfig;
use ops::{
    create_resource, delete_resource, get_resource, install_resource, list_resources,
    open_explorer, run_action, run_demo, show_metrics, update_resource, watch_registry, Action,
    OutputFormat,
};
use std::path::PathBuf;
use std::sync::Arc;
use svcdeck_core::{CommandFacade, PushChannel, Registry, RegistryOptions, ResourcePatch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Terminal client for a supervised-resource backend.
#[derive(Parser)]
#[command(name = "svcdeck", author, version, about = "Watch and control supervised services and directories")]
struct Cli {
    /// API base url
    #[arg(long, env = "SD_API_BASE", default_value = "http://127.0.0.1:8080")]
    api_base: String,

    /// Bearer token for authentication
    #[arg(long, env = "SD_TOKEN")]
    token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "SD_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Emit logs as JSON
    #[arg(long, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List services and directories
    List,
    /// Show one resource
    Get { id: String },
    /// Start a service
    Start { id: String },
    /// Stop a service
    Stop { id: String },
    /// Upload payload files to an installable resource
    Install {
        id: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Update resource fields
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        path: Option<String>,
        #[arg(long)]
        service_name: Option<String>,
        #[arg(long)]
        installable: Option<bool>,
    },
    /// Create a resource from a JSON config file
    Create { file: PathBuf },
    /// Delete a resource
    Delete { id: String },
    /// Fetch fresh metrics
    Metrics { id: String },
    /// Open the resource location in the host file explorer
    Open { id: String },
    /// Live view driven by push updates
    Watch,
    /// Live view against a simulated backend
    Demo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载 .env 文件（如果存在），忽略错误
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    if let Commands::Demo = cli.command {
        return run_demo(cli.output).await;
    }

    let config = ClientConfig::new(&cli.api_base, cli.token.clone(), cli.timeout_secs);
    let backend = http::HttpBackend::new(config.clone())?;
    let channel = PushChannel::new();
    let registry = Registry::new(
        CommandFacade::new(Arc::new(backend)),
        &channel,
        RegistryOptions::default(),
    );
    registry.init().await?;

    match cli.command {
        Commands::List => list_resources(&registry, cli.output).await?,
        Commands::Get { id } => get_resource(&registry, &id, cli.output).await?,
        Commands::Start { id } => run_action(&registry, &id, Action::Start, cli.output).await?,
        Commands::Stop { id } => run_action(&registry, &id, Action::Stop, cli.output).await?,
        Commands::Install { id, files } => {
            install_resource(&registry, &id, &files, cli.output).await?
        }
        Commands::Update {
            id,
            name,
            description,
            path,
            service_name,
            installable,
        } => {
            let patch = ResourcePatch {
                name,
                description,
                path,
                installable,
                service_name,
            };
            update_resource(&registry, &id, patch, cli.output).await?
        }
        Commands::Create { file } => create_resource(&registry, &file, cli.output).await?,
        Commands::Delete { id } => delete_resource(&registry, &id).await?,
        Commands::Metrics { id } => show_metrics(&registry, &id, cli.output).await?,
        Commands::Open { id } => open_explorer(&registry, &id).await?,
        Commands::Watch => {
            let bridge = events::spawn_push_bridge(config, channel.clone());
            let result = watch_registry(&registry, cli.output).await;
            bridge.abort();
            result?
        }
        Commands::Demo => unreachable!("handled before connecting"),
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clap_parses() {
        let cli = Cli::parse_from(["svcdeck", "--output", "json", "list"]);
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(matches!(cli.command, Commands::List));
    }

    #[test]
    fn update_flags_map_to_patch_fields() {
        let cli = Cli::parse_from([
            "svcdeck",
            "update",
            "svc1",
            "--name",
            "Gateway v2",
            "--installable",
            "true",
        ]);
        match cli.command {
            Commands::Update {
                id,
                name,
                installable,
                path,
                ..
            } => {
                assert_eq!(id, "svc1");
                assert_eq!(name.as_deref(), Some("Gateway v2"));
                assert_eq!(installable, Some(true));
                assert!(path.is_none());
            }
            _ => panic!("expected update"),
        }
    }

    #[test]
    fn install_requires_files() {
        assert!(Cli::try_parse_from(["svcdeck", "install", "svc1"]).is_err());
    }
}
