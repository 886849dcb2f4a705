use anyhow::{anyhow, bail, Context, Error, Result};
use colored::Colorize;
use idledger_client::{KeyWallet, LedgerGateway, LedgerSnapshot, PoolGenesis, SimulatedLedger};
use idledger_identity::{Did, KeyPair, KeypairFile};
use idledger_types::constants::{ISSUER_KEY, NAME, SCHEMA, VERSION};
use idledger_types::{IssuerKeyId, PublicKey, RevocationPublicKey, Schema, SchemaKey};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::CliConfig;

/// Turns a `serde_json::Error` into an error naming the file and the position.
fn format_serde_json_error(err: &serde_json::Error, file_path: &Path, context: &str) -> Error {
    let path = file_path.display();
    match err.classify() {
        serde_json::error::Category::Io => {
            anyhow!("{} I/O error while parsing JSON file '{}': {}", context, path, err)
        }
        serde_json::error::Category::Syntax => anyhow!(
            "{} Invalid JSON syntax in file '{}' at line {} column {}: {}",
            context,
            path,
            err.line(),
            err.column(),
            err
        ),
        serde_json::error::Category::Data => {
            anyhow!("{} Invalid data structure in JSON file '{}': {}", context, path, err)
        }
        serde_json::error::Category::Eof => {
            anyhow!("{} Unexpected end of JSON file '{}'", context, path)
        }
    }
}

/// Reads a JSON file into `T`.
fn read_and_parse_json<T: serde::de::DeserializeOwned>(file_path: &Path, what: &str) -> Result<T> {
    let json_str = std::fs::read_to_string(file_path).map_err(|io_err| {
        anyhow!("Failed to read {} file '{}': {}", what, file_path.display(), io_err)
    })?;

    serde_json::from_str(&json_str).map_err(|json_err| {
        format_serde_json_error(&json_err, file_path, &format!("Failed to parse {} from", what))
    })
}

/// Writes string content to a file, providing context-aware error messages.
fn write_string_to_file(content: &str, path: &Path, context_msg: &str) -> Result<()> {
    std::fs::write(path, content)
        .map_err(|e| anyhow!("Failed to write {} to file '{}': {}", context_msg, path.display(), e))
}

fn write_pretty<T: Serialize>(out: &mut dyn Write, value: &T) -> Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}

fn parse_did(input: &str) -> Result<Did> {
    input
        .parse()
        .map_err(|e| anyhow!("Invalid DID '{}': {}", input, e))
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Where the ledger state lives and who signs requests against it.
pub struct LedgerArgs<'a> {
    pub ledger: &'a Path,
    pub keypair: Option<&'a Path>,
    pub config: &'a CliConfig,
}

/// A simulated pool loaded from disk plus a gateway signing with the
/// caller's identity. Call [`LedgerSession::save`] after every operation,
/// including failed ones, so requests still waiting for consensus survive.
struct LedgerSession {
    path: PathBuf,
    ledger: SimulatedLedger,
    gateway: LedgerGateway,
}

impl LedgerSession {
    fn open(args: &LedgerArgs<'_>, require_identity: bool) -> Result<Self> {
        let snapshot: LedgerSnapshot = read_and_parse_json(args.ledger, "ledger state")
            .context("Create a ledger with `idledger pool init` first")?;
        snapshot.genesis.validate()?;

        let keypair = match args.keypair {
            Some(path) => load_keypair(path)?,
            None if require_identity => bail!("This command signs a write; pass --keypair <file>"),
            None => {
                debug!("No keypair given, reading with an ephemeral identity");
                KeyPair::generate()
            }
        };

        let ledger = SimulatedLedger::from_snapshot(snapshot, args.config.sim.clone());
        let gateway = LedgerGateway::new(
            Arc::new(ledger.clone()),
            Arc::new(KeyWallet::new(keypair)),
            &args.config.gateway,
        );
        Ok(Self {
            path: args.ledger.to_path_buf(),
            ledger,
            gateway,
        })
    }

    async fn save(&self) -> Result<()> {
        let snapshot = self.ledger.snapshot().await;
        let json = serde_json::to_string_pretty(&snapshot)?;
        write_string_to_file(&json, &self.path, "ledger state")
    }
}

fn load_keypair(path: &Path) -> Result<KeyPair> {
    let file = KeypairFile::load(path)
        .with_context(|| format!("Failed to read keypair file '{}'", path.display()))?;
    file.to_keypair()
        .with_context(|| format!("Keypair file '{}' is invalid", path.display()))
}

/// Generate a new keypair, or a deterministic one from an alias seed.
pub fn generate_keypair(out: &mut dyn Write, output: &Path, seed: Option<&str>) -> Result<()> {
    writeln!(out, "Generating new Ed25519 keypair...")?;

    let keypair = match seed {
        Some(alias) => KeyPair::from_alias(alias),
        None => KeyPair::generate(),
    };
    KeypairFile::from_keypair(&keypair)
        .save(output)
        .with_context(|| format!("Failed to write keypair to '{}'", output.display()))?;

    writeln!(out, "Keypair saved to: {}", output.display())?;
    writeln!(out, "DID: {}", keypair.did.as_str().green())?;
    Ok(())
}

/// Show information about a keypair
pub fn keypair_info(out: &mut dyn Write, input: &Path) -> Result<()> {
    writeln!(out, "Reading keypair from: {}", input.display())?;
    let keypair_data: KeypairFile = read_and_parse_json(input, "keypair data")?;

    match keypair_data.to_keypair() {
        Ok(keypair) => writeln!(out, "DID: {}", keypair.did)?,
        Err(err) => writeln!(
            out,
            "DID: {} ({})",
            keypair_data.did.red(),
            err.to_string().yellow()
        )?,
    }
    writeln!(out, "Public Key: {}", keypair_data.public_key)?;
    writeln!(out, "Generated: {}", keypair_data.generated_at)?;
    Ok(())
}

/// Create a fresh ledger state file for a test pool.
pub fn init_pool(
    out: &mut dyn Write,
    ledger: &Path,
    pool_id: &str,
    nodes: &str,
    force: bool,
) -> Result<()> {
    if ledger.exists() && !force {
        bail!(
            "Ledger state '{}' already exists; pass --force to replace it",
            ledger.display()
        );
    }

    let names = split_list(nodes);
    let genesis = PoolGenesis::generate(pool_id, &names[..]);
    genesis.validate()?;

    let json = serde_json::to_string_pretty(&LedgerSnapshot::new(genesis.clone()))?;
    write_string_to_file(&json, ledger, "ledger state")?;
    info!("Initialized pool {} at {}", pool_id, ledger.display());

    writeln!(
        out,
        "{}",
        format!(
            "Pool {} initialized with {} nodes (tolerates {} faulty)",
            genesis.pool_id,
            genesis.node_count(),
            genesis.max_faulty()
        )
        .green()
    )?;
    for node in &genesis.nodes {
        writeln!(out, "  {} {} (steward {})", node.alias, node.did, node.steward_alias)?;
    }
    Ok(())
}

pub async fn submit_schema(
    out: &mut dyn Write,
    args: &LedgerArgs<'_>,
    name: &str,
    version: &str,
    attrs: &str,
    schema_type: &str,
) -> Result<()> {
    let schema = Schema::new(name, version, split_list(attrs)).with_schema_type(schema_type);
    let session = LedgerSession::open(args, true)?;

    let result = session.gateway.submit_schema(&schema).await;
    session.save().await?;

    match result.context("Schema submission failed")? {
        Some(stored) => writeln!(
            out,
            "{}",
            format!(
                "Schema {} {} added with sequence number {}",
                stored.name,
                stored.version,
                stored.seq_id.unwrap_or_default()
            )
            .green()
        )?,
        None => writeln!(
            out,
            "{}",
            format!(
                "Schema {} {} confirmed without a sequence number",
                schema.name, schema.version
            )
            .yellow()
        )?,
    }
    Ok(())
}

pub async fn get_schema(
    out: &mut dyn Write,
    args: &LedgerArgs<'_>,
    issuer: &str,
    name: &str,
    version: &str,
) -> Result<()> {
    let key = SchemaKey::new(name, version, parse_did(issuer)?);
    let session = LedgerSession::open(args, false)?;

    let result = session.gateway.get_schema(&key).await;
    session.save().await?;

    match result.context("Schema lookup failed")? {
        Some(schema) => write_pretty(out, &schema)?,
        None => writeln!(
            out,
            "{}",
            format!("No schema {} {} from {}", name, version, key.issuer_id).yellow()
        )?,
    }
    Ok(())
}

pub async fn submit_keys(
    out: &mut dyn Write,
    args: &LedgerArgs<'_>,
    schema_id: u64,
    primary: &Path,
    revocation: Option<&Path>,
) -> Result<()> {
    let pk: PublicKey = read_and_parse_json(primary, "primary public key")?;
    let pk_r: Option<RevocationPublicKey> = revocation
        .map(|path| read_and_parse_json(path, "revocation public key"))
        .transpose()?;
    let session = LedgerSession::open(args, true)?;

    let result = session
        .gateway
        .submit_public_keys(schema_id, &pk, pk_r.as_ref())
        .await;
    session.save().await?;

    match result.context("Issuer key submission failed")? {
        Some((pk, _)) => writeln!(
            out,
            "{}",
            format!(
                "Issuer keys for schema {} added with sequence number {}",
                schema_id,
                pk.seq_id.unwrap_or_default()
            )
            .green()
        )?,
        None => writeln!(
            out,
            "{}",
            format!(
                "Issuer keys for schema {} confirmed without a sequence number",
                schema_id
            )
            .yellow()
        )?,
    }
    Ok(())
}

pub async fn get_keys(
    out: &mut dyn Write,
    args: &LedgerArgs<'_>,
    issuer: &str,
    schema_id: u64,
    revocation: bool,
) -> Result<()> {
    let id = IssuerKeyId::new(schema_id, parse_did(issuer)?);
    let session = LedgerSession::open(args, false)?;

    let found = if revocation {
        let result = session.gateway.get_public_key_revocation(&id).await;
        session.save().await?;
        match result.context("Revocation key lookup failed")? {
            Some(pk_r) => {
                write_pretty(out, &pk_r)?;
                true
            }
            None => false,
        }
    } else {
        let result = session.gateway.get_public_key(&id).await;
        session.save().await?;
        match result.context("Public key lookup failed")? {
            Some(pk) => {
                write_pretty(out, &pk)?;
                true
            }
            None => false,
        }
    };

    if !found {
        let kind = if revocation { "revocation key" } else { "public key" };
        writeln!(
            out,
            "{}",
            format!("No {} for schema {} from {}", kind, schema_id, id.issuer_id).yellow()
        )?;
    }
    Ok(())
}

/// Print the pool and every ordered transaction.
pub async fn show_ledger(out: &mut dyn Write, ledger: &Path) -> Result<()> {
    let snapshot: LedgerSnapshot = read_and_parse_json(ledger, "ledger state")?;
    let genesis = &snapshot.genesis;

    writeln!(
        out,
        "Pool {}: {} nodes, tolerates {} faulty, {} replies for consensus",
        genesis.pool_id.bold(),
        genesis.node_count(),
        genesis.max_faulty(),
        genesis.reply_quorum()
    )?;
    if snapshot.txns.is_empty() {
        writeln!(out, "{}", "No transactions".yellow())?;
    }
    for txn in &snapshot.txns {
        let summary = match txn.txn_type.as_str() {
            SCHEMA => format!(
                "SCHEMA {} {}",
                txn.data.get(NAME).and_then(|v| v.as_str()).unwrap_or("?"),
                txn.data.get(VERSION).and_then(|v| v.as_str()).unwrap_or("?")
            ),
            ISSUER_KEY => format!("ISSUER_KEY for schema {}", txn.reference.unwrap_or_default()),
            other => format!("type {}", other),
        };
        writeln!(out, "{:>5}  {}  {}", txn.seq_no, summary, txn.identifier)?;
    }
    if !snapshot.pending.is_empty() {
        writeln!(
            out,
            "{}",
            format!("{} request(s) waiting for consensus", snapshot.pending.len()).yellow()
        )?;
    }
    Ok(())
}
