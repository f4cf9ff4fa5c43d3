use clap::{Parser, Subcommand};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "mozo")]
#[command(about = "mozo — multi-tenant assistant bot server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the assistant server (HTTP trigger API + per-tenant bot sessions).
    /// Uses the in-memory channel and data provider until real adapters are
    /// wired in; sessions and replies work end to end against scripted data.
    Serve {
        /// Config file path (default: MOZO_CONFIG_PATH or ~/.mozo/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 3000)
        #[arg(long, short)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("mozo {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("serve failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, _path) = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!(
        "starting gateway on {}:{}",
        config.gateway.bind,
        config.gateway.port
    );
    let sessions_dir = lib::config::resolve_sessions_dir(&config);
    let artifacts = lib::channels::LoginArtifacts::new(sessions_dir);
    let channel = Arc::new(lib::channels::MemoryChannel::with_artifacts(artifacts));
    let data = Arc::new(lib::data::MemoryProvider::new());
    lib::gateway::run_gateway(config, channel, data).await
}
