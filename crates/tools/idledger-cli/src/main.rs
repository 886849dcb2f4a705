use anyhow::Result;
use clap::{Parser, Subcommand};
use idledger_types::constants::DEFAULT_SCHEMA_TYPE;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

use commands::LedgerArgs;
use config::CliConfig;

/// Command-line interface for identity ledger schemas and issuer keys
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// Ledger state file of the simulated pool
    #[clap(long, global = true, default_value = "ledger.json")]
    ledger: PathBuf,

    /// Keypair file requests are signed with
    #[clap(long, global = true)]
    keypair: Option<PathBuf>,

    /// TOML configuration file
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Consensus wait budget in milliseconds, overrides the config file
    #[clap(long, global = true)]
    timeout_ms: Option<u64>,

    /// Pause between consensus polls in milliseconds, overrides the config file
    #[clap(long, global = true)]
    retry_interval_ms: Option<u64>,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

/// CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Keypair management commands
    #[clap(subcommand)]
    Keypair(KeypairCommands),

    /// Validator pool commands
    #[clap(subcommand)]
    Pool(PoolCommands),

    /// Schema commands
    #[clap(subcommand)]
    Schema(SchemaCommands),

    /// Issuer key commands
    #[clap(subcommand)]
    Keys(KeysCommands),

    /// Ledger inspection
    #[clap(subcommand)]
    Ledger(LedgerCommands),
}

/// Keypair management commands
#[derive(Subcommand)]
enum KeypairCommands {
    /// Generate a new keypair
    Generate {
        /// Output file for the keypair
        #[clap(long, short)]
        output: PathBuf,

        /// Derive the key from an alias instead of randomness
        #[clap(long)]
        seed: Option<String>,
    },

    /// Show information about a keypair
    Info {
        /// Path to the keypair file
        #[clap(long, short)]
        input: PathBuf,
    },
}

#[derive(Subcommand)]
enum PoolCommands {
    /// Create a ledger state file for a new test pool
    Init {
        /// Node aliases, comma separated
        #[clap(long)]
        nodes: String,

        /// Pool identifier, also used to name the stewards
        #[clap(long, default_value = "sandbox")]
        pool_id: String,

        /// Replace an existing ledger state file
        #[clap(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum SchemaCommands {
    /// Write a schema under the keypair's identity
    Submit {
        #[clap(long)]
        name: String,

        #[clap(long)]
        version: String,

        /// Attribute names, comma separated
        #[clap(long)]
        attrs: String,

        #[clap(long, default_value = DEFAULT_SCHEMA_TYPE)]
        schema_type: String,
    },

    /// Read a schema by issuer, name and version
    Get {
        /// DID of the issuer
        #[clap(long)]
        issuer: String,

        #[clap(long)]
        name: String,

        #[clap(long)]
        version: String,
    },
}

#[derive(Subcommand)]
enum KeysCommands {
    /// Publish issuer keys for a schema
    Submit {
        /// Sequence number of the schema
        #[clap(long)]
        schema_id: u64,

        /// JSON file with the primary public key
        #[clap(long)]
        primary: PathBuf,

        /// JSON file with the revocation public key
        #[clap(long)]
        revocation: Option<PathBuf>,
    },

    /// Read the keys an issuer published for a schema
    Get {
        /// DID of the issuer
        #[clap(long)]
        issuer: String,

        /// Sequence number of the schema
        #[clap(long)]
        schema_id: u64,

        /// Show the revocation key instead of the primary key
        #[clap(long)]
        revocation: bool,
    },
}

#[derive(Subcommand)]
enum LedgerCommands {
    /// List the pool and its ordered transactions
    Show,
}

fn init_tracing(config: &CliConfig) {
    let log_level_str = config.log_level.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level_str))
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref())?
        .with_overrides(cli.timeout_ms, cli.retry_interval_ms);
    init_tracing(&config);

    let args = LedgerArgs {
        ledger: &cli.ledger,
        keypair: cli.keypair.as_deref(),
        config: &config,
    };
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Commands::Keypair(cmd) => match cmd {
            KeypairCommands::Generate { output, seed } => {
                commands::generate_keypair(&mut out, output, seed.as_deref())?;
            }
            KeypairCommands::Info { input } => {
                commands::keypair_info(&mut out, input)?;
            }
        },
        Commands::Pool(cmd) => match cmd {
            PoolCommands::Init {
                nodes,
                pool_id,
                force,
            } => {
                commands::init_pool(&mut out, &cli.ledger, pool_id, nodes, *force)?;
            }
        },
        Commands::Schema(cmd) => match cmd {
            SchemaCommands::Submit {
                name,
                version,
                attrs,
                schema_type,
            } => {
                commands::submit_schema(&mut out, &args, name, version, attrs, schema_type).await?;
            }
            SchemaCommands::Get {
                issuer,
                name,
                version,
            } => {
                commands::get_schema(&mut out, &args, issuer, name, version).await?;
            }
        },
        Commands::Keys(cmd) => match cmd {
            KeysCommands::Submit {
                schema_id,
                primary,
                revocation,
            } => {
                commands::submit_keys(&mut out, &args, *schema_id, primary, revocation.as_deref())
                    .await?;
            }
            KeysCommands::Get {
                issuer,
                schema_id,
                revocation,
            } => {
                commands::get_keys(&mut out, &args, issuer, *schema_id, *revocation).await?;
            }
        },
        Commands::Ledger(cmd) => match cmd {
            LedgerCommands::Show => {
                commands::show_ledger(&mut out, &cli.ledger).await?;
            }
        },
    }

    Ok(())
}
