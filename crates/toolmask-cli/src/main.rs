//! Toolmask - hide selected tools of an MCP server from its clients
//!
//! Wraps a stdio MCP server and rewrites its `tools/list` results so that only
//! the tools you choose are visible.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use toolmask_policy::ProxyConfig;
use toolmask_runtime::{format_listing, Lister, ProxySession, SessionEnd};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "toolmask")]
#[command(version)]
#[command(about = "Stdio MCP proxy that hides selected tools", long_about = None)]
struct Cli {
    /// Only expose tools matching these patterns (`*` is a wildcard)
    #[arg(long, short, global = true, action = clap::ArgAction::Append, value_delimiter = ',')]
    include: Vec<String>,

    /// Hide tools matching these patterns (`*` is a wildcard)
    #[arg(long, short, global = true, action = clap::ArgAction::Append, value_delimiter = ',')]
    exclude: Vec<String>,

    /// YAML config file; command line flags take precedence
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Client name announced by `list` during initialize
    #[arg(long, global = true)]
    server_name: Option<String>,

    /// Client version announced by `list` during initialize
    #[arg(long, global = true)]
    server_version: Option<String>,

    /// Enable verbose logging (stderr)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,

    /// Target server command (when no subcommand)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Proxy a target MCP server over stdio
    Run {
        /// Target server command
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Print the tools the target exposes after filtering
    List {
        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Target server command
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries the protocol, logs go to stderr
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match &cli.command {
        Some(Commands::List { timeout, command }) => {
            let mut config = build_config(&cli, command)?;
            if let Some(secs) = timeout {
                config.list_timeout = Some(Duration::from_secs(*secs));
            }
            list_tools(config).await
        }
        Some(Commands::Run { command }) => run_proxy(build_config(&cli, command)?).await,
        None => run_proxy(build_config(&cli, &cli.args)?).await,
    }
}

/// Merge the config file (if any) with command line flags and validate the result
fn build_config(cli: &Cli, command: &[String]) -> Result<ProxyConfig> {
    let mut config = match &cli.config {
        Some(path) => ProxyConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ProxyConfig::default(),
    };

    if !command.is_empty() {
        config.target_command = command.to_vec();
    }
    // A filter flag replaces whichever filter the file chose
    if !cli.include.is_empty() || !cli.exclude.is_empty() {
        config.include_patterns = (!cli.include.is_empty()).then(|| cli.include.clone());
        config.exclude_patterns = (!cli.exclude.is_empty()).then(|| cli.exclude.clone());
    }
    if let Some(name) = &cli.server_name {
        config.server_name = name.clone();
    }
    if let Some(version) = &cli.server_version {
        config.server_version = version.clone();
    }

    config.validate().context("Invalid configuration")?;
    debug!("Configuration: {:?}", config);
    Ok(config)
}

async fn run_proxy(config: ProxyConfig) -> Result<()> {
    info!("Proxying {:?}", config.target_command);
    let mut session = ProxySession::new(config)?;
    session
        .start_stdio()
        .context("Failed to start target server")?;

    let end = tokio::select! {
        end = session.wait() => end,
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
            None
        }
    };
    session.stop().await;

    let code = match end {
        Some(SessionEnd::ServerClosed) => {
            error!("Target server exited, closing proxy");
            1
        }
        Some(SessionEnd::ClientClosed) => {
            debug!("Client disconnected");
            0
        }
        None => 0,
    };

    // Dropping the runtime waits on the blocking stdin read, which only ends
    // when the client closes its end.
    std::process::exit(code)
}

async fn list_tools(config: ProxyConfig) -> Result<()> {
    let mut lister = Lister::new(config)?;
    let tools = lister.list_tools().await.context("Failed to list tools")?;
    for line in format_listing(&tools) {
        println!("{}", line);
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
