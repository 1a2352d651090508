use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use mysql_role_coordinator::agent::ConsensusAgent;
use mysql_role_coordinator::config::{self, Config};
use mysql_role_coordinator::hooks::Components;

#[derive(Parser)]
#[command(name = "coordinator", version, about = "MySQL raft role coordinator hooks")]
struct Cli {
    /// Configuration file (defaults to config/coordinator.toml or coordinator.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Probes against the local MySQL
    Mysql {
        #[command(subcommand)]
        hook: MySqlHook,
    },
    /// Hooks invoked around the consensus agent
    Agent {
        #[command(subcommand)]
        hook: AgentHook,
    },
    /// Raft administration
    Raft {
        #[command(subcommand)]
        command: RaftCommand,
    },
    /// Raft membership administration
    Cluster {
        #[command(subcommand)]
        command: ClusterCommand,
    },
}

#[derive(Subcommand)]
enum MySqlHook {
    Liveness,
    Readiness,
}

#[derive(Subcommand)]
enum AgentHook {
    Liveness,
    Readiness,
    PreStop,
    LeaderStart,
    LeaderStop,
    /// Request a rebuild when local transactions diverged from the leader
    PostStart,
}

#[derive(Subcommand)]
enum RaftCommand {
    Status {
        /// Agent host (defaults to the configured agent host)
        #[arg(long)]
        host: Option<String>,
    },
    TryLeader {
        #[arg(long)]
        host: Option<String>,
    },
}

#[derive(Subcommand)]
enum ClusterCommand {
    Add {
        #[arg(long)]
        peer: String,
        #[arg(long)]
        host: Option<String>,
    },
    Remove {
        #[arg(long)]
        peer: String,
        #[arg(long)]
        host: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = load_or_default_config(cli.config.as_deref())?;
    config.apply_env();
    let components = Components::new(config);

    match cli.command {
        Command::Mysql { hook } => run_mysql(&components, hook).await,
        Command::Agent { hook } => run_agent(&components, hook).await,
        Command::Raft { command } => run_raft(&components, command).await,
        Command::Cluster { command } => run_cluster(&components, command).await,
    }
}

async fn run_mysql(components: &Components, hook: MySqlHook) -> anyhow::Result<()> {
    match hook {
        MySqlHook::Liveness => components
            .mysql_liveness()
            .await
            .context("mysql liveness")?,
        MySqlHook::Readiness => {
            components
                .mysql_readiness()
                .await
                .context("mysql readiness")?;
        }
    }
    Ok(())
}

async fn run_agent(components: &Components, hook: AgentHook) -> anyhow::Result<()> {
    if let AgentHook::Liveness = hook {
        return components
            .agent_liveness()
            .await
            .context("agent liveness");
    }

    let resolver = components
        .role_resolver()
        .await
        .context("failed to set up role resolver")?;

    match hook {
        AgentHook::Liveness => {}
        AgentHook::Readiness => resolver.readiness().await.context("agent readiness")?,
        AgentHook::PreStop => resolver.pre_stop().await.context("pre-stop")?,
        AgentHook::LeaderStart => resolver.leader_start().await.context("leader-start")?,
        AgentHook::LeaderStop => resolver.leader_stop().await.context("leader-stop")?,
        AgentHook::PostStart => {
            let outcome = resolver.post_start().await.context("post-start")?;
            info!(outcome = ?outcome, "Post-start check finished");
        }
    }
    Ok(())
}

async fn run_raft(components: &Components, command: RaftCommand) -> anyhow::Result<()> {
    let agent = components.agent();
    let default_host = &components.config().agent.host;

    match command {
        RaftCommand::Status { host } => {
            let host = host.as_deref().unwrap_or(default_host);
            let status = agent.status(host).await.context("raft status")?;
            println!(
                "role={} leader={} peers={}",
                status.role.as_state(),
                status.leader.as_deref().unwrap_or(""),
                status.peers.join(",")
            );
        }
        RaftCommand::TryLeader { host } => {
            let host = host.as_deref().unwrap_or(default_host);
            agent
                .force_leader_transfer(host)
                .await
                .context("raft try-leader")?;
            info!(host = %host, "Leader transfer requested");
        }
    }
    Ok(())
}

async fn run_cluster(components: &Components, command: ClusterCommand) -> anyhow::Result<()> {
    let agent = components.agent();
    let default_host = &components.config().agent.host;

    match command {
        ClusterCommand::Add { peer, host } => {
            let host = host.as_deref().unwrap_or(default_host);
            agent
                .add_member(host, &peer)
                .await
                .context("cluster add")?;
            info!(host = %host, peer = %peer, "Member added");
        }
        ClusterCommand::Remove { peer, host } => {
            let host = host.as_deref().unwrap_or(default_host);
            agent
                .remove_member(host, &peer)
                .await
                .context("cluster remove")?;
            info!(host = %host, peer = %peer, "Member removed");
        }
    }
    Ok(())
}

fn load_or_default_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    if let Some(path) = explicit {
        let config = config::load_config(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        return Ok(config);
    }

    let config_paths = ["config/coordinator.toml", "coordinator.toml"];

    for path in config_paths {
        match config::load_config(path) {
            Ok(config) => {
                info!(path = path, "Loaded configuration");
                return Ok(config);
            }
            Err(e) => {
                warn!(path = path, error = %e, "Failed to load config");
            }
        }
    }

    info!("Using default configuration");
    Ok(Config::default())
}
