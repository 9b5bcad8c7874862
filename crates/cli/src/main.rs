mod commands;
mod config;
mod error;
mod output;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use metaledger_storage::{ClusterNode, Network, RecordKind};
use tracing_subscriber::EnvFilter;

use crate::error::CliError;
use crate::output::report_error;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Deployment-record ledger for agreements, deployments, clusters and proofs.
#[derive(Parser)]
#[command(
    name = "metaledger",
    version,
    about = "Deployment-record ledger for agreements, deployments, clusters and proofs"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Store root directory (overrides METALEDGER_HOME and the config file)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Config file (default: <store root>/metaledger.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create and move agreements through their lifecycle
    Agreement {
        #[command(subcommand)]
        command: AgreementCommands,
    },

    /// Create and move deployment configs through their lifecycle
    Deployment {
        #[command(subcommand)]
        command: DeploymentCommands,
    },

    /// Create and move cluster configs through their lifecycle
    Cluster {
        #[command(subcommand)]
        command: ClusterCommands,
    },

    /// Create and verify verification proofs
    Proof {
        #[command(subcommand)]
        command: ProofCommands,
    },

    /// Show the current state of any record
    Status {
        /// Record id
        id: String,
    },

    /// List records of one kind, oldest first
    List {
        /// Record kind (agreement, deployment, cluster, proof)
        kind: RecordKind,
        /// Only records owned by this application
        #[arg(long)]
        app: Option<String>,
    },

    /// Show the lifecycle journal of one record
    History {
        /// Record id
        id: String,
    },

    /// Check whether a JSON-RPC endpoint is reachable
    Probe {
        /// Endpoint URL (default: the configured testnet RPC endpoint)
        endpoint: Option<String>,
        /// Make a single attempt instead of retrying with backoff
        #[arg(long)]
        no_retry: bool,
    },

    /// Verify the journal hash chain and every stored record
    Audit,

    /// Show the effective configuration
    Config,
}

#[derive(Subcommand)]
enum AgreementCommands {
    /// Create an agreement in status `created`
    Create {
        /// Owning application id
        #[arg(long)]
        app: String,
        /// Agreement type
        #[arg(long = "type", default_value = "standard")]
        agreement_type: String,
        /// Network name
        #[arg(long, default_value = "testnet")]
        network: String,
        /// RPC endpoint (default: the configured endpoint for the network)
        #[arg(long)]
        rpc: Option<String>,
        /// Free-form metadata as key=value, repeatable
        #[arg(long = "meta", value_parser = parse_key_value)]
        meta: Vec<(String, String)>,
    },
    /// created → deployed
    Deploy { id: String },
    /// deployed → verified
    Verify { id: String },
    /// Probe the RPC endpoint and mark the agreement connected
    Connect {
        id: String,
        /// Endpoint to connect to (default: the agreement's own endpoint)
        #[arg(long)]
        rpc: Option<String>,
    },
    /// created | deployed → archived
    Archive { id: String },
}

#[derive(Subcommand)]
enum DeploymentCommands {
    /// Create a deployment config
    Create {
        /// Owning application id
        #[arg(long)]
        app: String,
        /// Directory holding the application
        #[arg(long)]
        path: String,
        /// Target network (testnet or mainnet)
        #[arg(long, default_value = "testnet")]
        network: Network,
        /// Wallet reference; required on mainnet
        #[arg(long)]
        wallet: Option<String>,
        /// Algorithm name, repeatable; duplicates are dropped
        #[arg(long = "algorithm")]
        algorithms: Vec<String>,
        /// IPFS gateway (default: the configured gateway for the network)
        #[arg(long)]
        ipfs: Option<String>,
    },
    /// created → active
    Activate { id: String },
    /// active → archived
    Archive { id: String },
}

#[derive(Subcommand)]
enum ClusterCommands {
    /// Create a cluster config
    Create {
        /// Owning application id
        #[arg(long)]
        app: String,
        /// Node as node_id:port:role, repeatable
        #[arg(long = "node", required = true)]
        nodes: Vec<ClusterNode>,
        /// RPC endpoint (default: the configured testnet endpoint)
        #[arg(long)]
        rpc: Option<String>,
    },
    /// created → configured
    Configure { id: String },
    /// configured → archived
    Archive { id: String },
}

#[derive(Subcommand)]
enum ProofCommands {
    /// Record a proof over an agreement or deployment
    Create {
        /// Agreement or deployment id
        subject: String,
        /// Proof provider name
        #[arg(long, default_value = "local")]
        provider: String,
    },
    /// created → verified, if the subject is unchanged
    Verify { id: String },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => Err(format!("expected key=value, got '{}'", s)),
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_logging() {
    let filter = EnvFilter::try_from_env("METALEDGER_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to start async runtime: {}", e);
            process::exit(1);
        }
    };

    let (output, quiet) = (cli.output, cli.quiet);
    if let Err(err) = runtime.block_on(run(cli)) {
        report_error(&err, output, quiet);
        process::exit(err.exit_code());
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let settings = config::Settings::from_env(cli.store.as_deref(), cli.config.as_deref())?;
    let ctx = commands::Context {
        settings,
        output: cli.output,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Agreement { command } => match command {
            AgreementCommands::Create {
                app,
                agreement_type,
                network,
                rpc,
                meta,
            } => {
                commands::agreement::cmd_create(&ctx, app, agreement_type, network, rpc, meta)
                    .await
            }
            AgreementCommands::Deploy { id } => commands::agreement::cmd_deploy(&ctx, &id).await,
            AgreementCommands::Verify { id } => commands::agreement::cmd_verify(&ctx, &id).await,
            AgreementCommands::Connect { id, rpc } => {
                commands::agreement::cmd_connect(&ctx, &id, rpc.as_deref()).await
            }
            AgreementCommands::Archive { id } => {
                commands::agreement::cmd_archive(&ctx, &id).await
            }
        },
        Commands::Deployment { command } => match command {
            DeploymentCommands::Create {
                app,
                path,
                network,
                wallet,
                algorithms,
                ipfs,
            } => {
                commands::deployment::cmd_create(&ctx, app, path, network, wallet, algorithms, ipfs)
                    .await
            }
            DeploymentCommands::Activate { id } => {
                commands::deployment::cmd_activate(&ctx, &id).await
            }
            DeploymentCommands::Archive { id } => {
                commands::deployment::cmd_archive(&ctx, &id).await
            }
        },
        Commands::Cluster { command } => match command {
            ClusterCommands::Create { app, nodes, rpc } => {
                commands::cluster::cmd_create(&ctx, app, nodes, rpc).await
            }
            ClusterCommands::Configure { id } => commands::cluster::cmd_configure(&ctx, &id).await,
            ClusterCommands::Archive { id } => commands::cluster::cmd_archive(&ctx, &id).await,
        },
        Commands::Proof { command } => match command {
            ProofCommands::Create { subject, provider } => {
                commands::proof::cmd_create(&ctx, &provider, &subject).await
            }
            ProofCommands::Verify { id } => commands::proof::cmd_verify(&ctx, &id).await,
        },
        Commands::Status { id } => commands::query::cmd_status(&ctx, &id).await,
        Commands::List { kind, app } => commands::query::cmd_list(&ctx, kind, app.as_deref()).await,
        Commands::History { id } => commands::query::cmd_history(&ctx, &id).await,
        Commands::Probe { endpoint, no_retry } => {
            commands::probe::cmd_probe(&ctx, endpoint.as_deref(), no_retry).await
        }
        Commands::Audit => commands::audit::cmd_audit(&ctx).await,
        Commands::Config => commands::config::cmd_config(&ctx),
    }
}
