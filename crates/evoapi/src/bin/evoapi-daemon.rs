//! evoapi-daemon - Persistent daemon holding one client and its contact cache.
//!
//! CHANGELOG:
//! - 10/18/2026 - Initial implementation

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use evoapi::daemon::client::DaemonClient;
use evoapi::daemon::protocol::Request;
use evoapi::daemon::server::DaemonServer;
use evoapi::daemon::service::DaemonService;
use evoapi::daemon::DEFAULT_SOCKET;
use evoapi_core::{EvolutionClient, EvolutionConfig};

#[derive(Parser)]
#[command(name = "evoapi-daemon")]
#[command(about = "Persistent daemon for the evoapi client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon
    Start {
        /// Socket path
        #[arg(long, default_value = DEFAULT_SOCKET)]
        socket: String,

        /// Run in foreground (don't daemonize)
        #[arg(long)]
        foreground: bool,
    },

    /// Stop the daemon
    Stop {
        /// Socket path
        #[arg(long, default_value = DEFAULT_SOCKET)]
        socket: String,
    },

    /// Check daemon status
    Status {
        /// Socket path
        #[arg(long, default_value = DEFAULT_SOCKET)]
        socket: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { socket, foreground } => cmd_start(&socket, foreground),
        Commands::Stop { socket } => cmd_stop(&socket),
        Commands::Status { socket } => cmd_status(&socket),
    }
}

fn build_server(config: &EvolutionConfig, socket_path: &str) -> Result<DaemonServer> {
    let client = EvolutionClient::from_config(config).context("Failed to create client")?;
    Ok(DaemonServer::new(DaemonService::new(client), socket_path))
}

fn cmd_start(socket: &str, foreground: bool) -> Result<()> {
    let socket_path = shellexpand::tilde(socket).to_string();

    if let Some(parent) = Path::new(&socket_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Fail on bad configuration before forking
    let config = EvolutionConfig::from_env().context("Failed to load configuration")?;

    if foreground {
        tracing::info!("starting in foreground");
        return build_server(&config, &socket_path)?.serve();
    }

    let pid_file = format!("{}.pid", socket_path);
    daemonize::Daemonize::new()
        .pid_file(&pid_file)
        .working_directory("/tmp")
        .start()
        .map_err(|e| anyhow!("Failed to daemonize: {}", e))?;

    // The HTTP client owns background threads, so it is created after the fork
    build_server(&config, &socket_path)?.serve()
}

fn cmd_stop(socket: &str) -> Result<()> {
    let socket_path = shellexpand::tilde(socket).to_string();
    let pid_file = format!("{}.pid", socket_path);

    let pid_str = std::fs::read_to_string(&pid_file)
        .with_context(|| format!("Failed to read pid file {}", pid_file))?;
    let pid: i32 = pid_str.trim().parse()?;

    // SAFETY: plain signal delivery to a pid we wrote ourselves
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc != 0 {
        tracing::warn!(pid, "SIGTERM failed, process may already be gone");
    }

    let _ = std::fs::remove_file(&pid_file);
    let _ = std::fs::remove_file(&socket_path);

    println!("Daemon stopped (pid {})", pid);

    Ok(())
}

fn cmd_status(socket: &str) -> Result<()> {
    let socket_path = shellexpand::tilde(socket).to_string();
    let client = DaemonClient::new(&socket_path, Duration::from_secs(5));

    match client.call(&Request::new("health", HashMap::new())) {
        Ok(response) if response.ok => {
            let result = response.result.unwrap_or_default();
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Ok(response) => {
            let message = response
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "unknown error".to_string());
            Err(anyhow!("Daemon unhealthy: {}", message))
        }
        Err(e) => {
            println!("Daemon not running ({})", e);
            std::process::exit(1);
        }
    }
}
