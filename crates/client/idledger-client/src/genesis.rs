use anyhow::{anyhow, Context, Result};
use idledger_identity::{Did, KeyPair};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// One validator node of a pool and the steward operating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisNode {
    pub alias: String,
    pub did: Did,
    pub steward_alias: String,
    pub steward_did: Did,
    /// sha256 (hex) of the node DID.
    pub txn_id: String,
}

/// Membership of a validator pool.
///
/// Test pools derive every key from a padded alias (see
/// [`idledger_identity::seed_from_alias`]), so the genesis can be recomputed
/// from the pool id and node names alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolGenesis {
    pub pool_id: String,
    pub nodes: Vec<GenesisNode>,
}

impl PoolGenesis {
    /// Build the genesis of a test pool. The steward of the i-th node
    /// (1-based) is called `<pool_id>Steward<i>`.
    pub fn generate<S: AsRef<str>>(pool_id: &str, node_names: &[S]) -> Self {
        let nodes = node_names
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let alias = name.as_ref().to_string();
                let steward_alias = format!("{}Steward{}", pool_id, index + 1);
                let steward = KeyPair::from_alias(&steward_alias);
                let node = KeyPair::from_alias(&alias);
                let txn_id = hex::encode(Sha256::digest(node.did.as_str().as_bytes()));
                GenesisNode {
                    alias,
                    did: node.did,
                    steward_alias,
                    steward_did: steward.did,
                    txn_id,
                }
            })
            .collect();

        Self {
            pool_id: pool_id.to_string(),
            nodes,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of faulty nodes the pool tolerates: `f = (n - 1) / 3`.
    pub fn max_faulty(&self) -> usize {
        self.node_count().saturating_sub(1) / 3
    }

    /// Matching replies a client needs before trusting an answer: `f + 1`.
    pub fn reply_quorum(&self) -> usize {
        self.max_faulty() + 1
    }

    /// Honest nodes needed to order a request: `n - f`.
    pub fn ordering_quorum(&self) -> usize {
        self.node_count() - self.max_faulty()
    }

    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(anyhow!("pool {} has no nodes", self.pool_id));
        }
        let mut aliases: Vec<&str> = self.nodes.iter().map(|n| n.alias.as_str()).collect();
        aliases.sort_unstable();
        aliases.dedup();
        if aliases.len() != self.nodes.len() {
            return Err(anyhow!("pool {} has duplicate node aliases", self.pool_id));
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pool genesis {}", path.display()))?;
        let genesis: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse pool genesis {}", path.display()))?;
        genesis.validate()?;
        Ok(genesis)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write pool genesis {}", path.display()))
    }
}
