//! An in-process validator pool.
//!
//! Every node runs the same deterministic execution, so honest nodes always
//! agree; faulty nodes answer with replies nobody else produces. Ordering
//! needs `n - f` honest nodes and a client trusts a reply once `f + 1` nodes
//! returned it, which is enough to exercise the client's consensus handling
//! without a network.

mod execution;

pub use execution::CommittedTxn;

use async_trait::async_trait;
use idledger_types::{ConsensusReply, LedgerError, RequestKey, SignedRequest};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::genesis::PoolGenesis;
use crate::transport::LedgerClient;
use execution::LedgerLog;

/// Behaviour knobs of a simulated pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSimConfig {
    /// Time between submission and the moment the pool orders a request.
    #[serde(rename = "confirmation_delay_ms", with = "duration_ms")]
    pub confirmation_delay: Duration,
    /// Nodes answering with divergent replies.
    pub faulty_nodes: usize,
    /// Honest nodes quote reply payloads with `'` like older node versions.
    pub legacy_quotes: bool,
}

impl Default for LedgerSimConfig {
    fn default() -> Self {
        Self {
            confirmation_delay: Duration::ZERO,
            faulty_nodes: 0,
            legacy_quotes: false,
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Persistable state of a simulated pool.
///
/// Requests that were still waiting to be ordered are kept and become
/// orderable as soon as the snapshot is loaded again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub genesis: PoolGenesis,
    #[serde(default)]
    pub txns: Vec<CommittedTxn>,
    #[serde(default)]
    pub pending: Vec<SignedRequest>,
}

impl LedgerSnapshot {
    pub fn new(genesis: PoolGenesis) -> Self {
        Self {
            genesis,
            txns: Vec::new(),
            pending: Vec::new(),
        }
    }
}

/// What each honest node answers for an ordered request.
type Outcome = Result<ConsensusReply, String>;

struct PendingRequest {
    request: SignedRequest,
    ready_at: Instant,
}

#[derive(Default)]
struct PoolState {
    log: LedgerLog,
    pending: VecDeque<PendingRequest>,
    /// Outcome of every request ordered by this instance, so that late polls
    /// and duplicate submits can be answered. Entries are never evicted and
    /// are not part of a [`LedgerSnapshot`]; the map lives as long as the
    /// `SimulatedLedger` and a restored pool starts with it empty.
    outcomes: HashMap<RequestKey, Outcome>,
}

impl PoolState {
    fn is_known(&self, key: &RequestKey) -> bool {
        self.outcomes.contains_key(key) || self.pending.iter().any(|p| &p.request.key() == key)
    }

    /// Order every request whose confirmation delay has passed, in
    /// submission order.
    fn order_ready(&mut self, now: Instant) {
        while self
            .pending
            .front()
            .map_or(false, |pending| pending.ready_at <= now)
        {
            let Some(pending) = self.pending.pop_front() else {
                break;
            };
            let key = pending.request.key();
            let outcome = self.log.execute(&pending.request);
            match &outcome {
                Ok(reply) => debug!("Ordered request {} (seqNo {:?})", key, reply.seq_no),
                Err(reason) => debug!("Pool rejected request {}: {}", key, reason),
            }
            self.outcomes.insert(key, outcome);
        }
    }
}

/// A [`LedgerClient`] backed by an in-memory validator pool.
///
/// Cloning is cheap and clones share the same pool.
#[derive(Clone)]
pub struct SimulatedLedger {
    genesis: Arc<PoolGenesis>,
    config: LedgerSimConfig,
    state: Arc<RwLock<PoolState>>,
}

impl SimulatedLedger {
    pub fn new(genesis: PoolGenesis, config: LedgerSimConfig) -> Self {
        if config.faulty_nodes > genesis.max_faulty() {
            warn!(
                "Pool {} has {} faulty node(s) but tolerates {}; nothing will be ordered",
                genesis.pool_id,
                config.faulty_nodes,
                genesis.max_faulty()
            );
        }
        Self {
            genesis: Arc::new(genesis),
            config,
            state: Arc::new(RwLock::new(PoolState::default())),
        }
    }

    pub fn from_snapshot(snapshot: LedgerSnapshot, config: LedgerSimConfig) -> Self {
        let ledger = Self::new(snapshot.genesis, config);
        let now = Instant::now();
        let state = PoolState {
            log: LedgerLog::from_txns(snapshot.txns),
            pending: snapshot
                .pending
                .into_iter()
                .map(|request| PendingRequest {
                    request,
                    ready_at: now,
                })
                .collect(),
            outcomes: HashMap::new(),
        };
        Self {
            state: Arc::new(RwLock::new(state)),
            ..ledger
        }
    }

    pub async fn snapshot(&self) -> LedgerSnapshot {
        let state = self.state.read().await;
        LedgerSnapshot {
            genesis: self.genesis.as_ref().clone(),
            txns: state.log.txns().to_vec(),
            pending: state.pending.iter().map(|p| p.request.clone()).collect(),
        }
    }

    pub async fn transactions(&self) -> Vec<CommittedTxn> {
        self.state.read().await.log.txns().to_vec()
    }

    pub fn genesis(&self) -> &PoolGenesis {
        &self.genesis
    }

    pub fn config(&self) -> &LedgerSimConfig {
        &self.config
    }

    fn can_order(&self) -> bool {
        self.config.faulty_nodes <= self.genesis.max_faulty()
    }

    /// Collect one answer per node and return the first answer given by at
    /// least `f + 1` of them.
    fn tally(&self, key: &RequestKey, honest: &Outcome) -> Option<Outcome> {
        let n = self.genesis.node_count();
        let faulty = self.config.faulty_nodes.min(n);

        let honest = match honest {
            Ok(reply) if self.config.legacy_quotes => Ok(legacy_quoted(reply)),
            other => other.clone(),
        };
        let mut answers: Vec<Outcome> = vec![honest; n - faulty];
        answers.extend((0..faulty).map(|node| divergent_reply(key, node)));

        let mut counts: Vec<(&Outcome, usize)> = Vec::new();
        for answer in &answers {
            match counts.iter().position(|(seen, _)| *seen == answer) {
                Some(index) => counts[index].1 += 1,
                None => counts.push((answer, 1)),
            }
        }
        counts
            .into_iter()
            .find(|(_, count)| *count >= self.genesis.reply_quorum())
            .map(|(answer, _)| answer.clone())
    }
}

fn legacy_quoted(reply: &ConsensusReply) -> ConsensusReply {
    ConsensusReply {
        data: reply.data.as_ref().map(|data| data.replace('"', "'")),
        ..reply.clone()
    }
}

fn divergent_reply(key: &RequestKey, node: usize) -> Outcome {
    Ok(ConsensusReply {
        identifier: Some(key.identifier.clone()),
        req_id: Some(key.req_id),
        txn_type: None,
        seq_no: Some(u64::MAX - node as u64),
        data: Some(format!("{{\"faulty\":{}}}", node)),
    })
}

#[async_trait]
impl LedgerClient for SimulatedLedger {
    async fn submit(&self, request: SignedRequest) -> Result<RequestKey, LedgerError> {
        let key = request.key();
        let mut state = self.state.write().await;
        if state.is_known(&key) {
            return Err(LedgerError::Transport(format!(
                "request {} was already submitted",
                key
            )));
        }

        let now = Instant::now();
        state.pending.push_back(PendingRequest {
            request,
            ready_at: now + self.config.confirmation_delay,
        });
        if self.can_order() {
            state.order_ready(now);
        }
        info!("Pool {} accepted request {}", self.genesis.pool_id, key);
        Ok(key)
    }

    async fn reply_if_consensus(
        &self,
        key: &RequestKey,
    ) -> (Option<ConsensusReply>, Option<String>) {
        let mut state = self.state.write().await;
        if self.can_order() {
            state.order_ready(Instant::now());
        }

        let Some(outcome) = state.outcomes.get(key) else {
            return (None, None);
        };
        match self.tally(key, outcome) {
            Some(Ok(reply)) => (Some(reply), None),
            Some(Err(reason)) => (None, Some(reason)),
            None => (None, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::wallet::{KeyWallet, Wallet};
    use idledger_identity::KeyPair;
    use idledger_types::{Request, Schema};

    fn pool(config: LedgerSimConfig) -> SimulatedLedger {
        SimulatedLedger::new(
            PoolGenesis::generate("Test", &["Alpha", "Beta", "Gamma", "Delta"]),
            config,
        )
    }

    fn schema_request(wallet: &KeyWallet, name: &str) -> SignedRequest {
        let schema = Schema::new(name, "1.0", ["name", "age"]);
        let request = Request::new(
            wallet.default_id(),
            wallet.next_req_id(),
            codec::submit_schema(&schema),
        );
        wallet.prepare_request(request).unwrap()
    }

    #[tokio::test]
    async fn honest_pool_confirms_with_next_seq_no() {
        let ledger = pool(LedgerSimConfig::default());
        let wallet = KeyWallet::new(KeyPair::from_alias("Faber"));

        let first = ledger.submit(schema_request(&wallet, "degree")).await.unwrap();
        let second = ledger.submit(schema_request(&wallet, "transcript")).await.unwrap();

        let (reply, err) = ledger.reply_if_consensus(&first).await;
        assert_eq!(err, None);
        assert_eq!(reply.unwrap().seq_no, Some(1));
        let (reply, _) = ledger.reply_if_consensus(&second).await;
        assert_eq!(reply.unwrap().seq_no, Some(2));
        assert_eq!(ledger.transactions().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_until_confirmation_delay_passes() {
        let ledger = pool(LedgerSimConfig {
            confirmation_delay: Duration::from_secs(5),
            ..Default::default()
        });
        let wallet = KeyWallet::new(KeyPair::from_alias("Faber"));
        let key = ledger.submit(schema_request(&wallet, "degree")).await.unwrap();

        assert_eq!(ledger.reply_if_consensus(&key).await, (None, None));
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(ledger.reply_if_consensus(&key).await.0.is_some());
    }

    #[tokio::test]
    async fn tampered_signature_is_rejected() {
        let ledger = pool(LedgerSimConfig::default());
        let wallet = KeyWallet::new(KeyPair::from_alias("Faber"));
        let mut request = schema_request(&wallet, "degree");
        request.request.req_id += 1;

        let key = ledger.submit(request).await.unwrap();
        let (reply, err) = ledger.reply_if_consensus(&key).await;
        assert!(reply.is_none());
        assert_eq!(err.as_deref(), Some("invalid signature"));
    }

    #[tokio::test]
    async fn resubmitting_a_key_is_refused() {
        let ledger = pool(LedgerSimConfig::default());
        let wallet = KeyWallet::new(KeyPair::from_alias("Faber"));
        let request = schema_request(&wallet, "degree");

        ledger.submit(request.clone()).await.unwrap();
        let err = ledger.submit(request).await.unwrap_err();
        assert!(matches!(err, LedgerError::Transport(_)));
    }

    #[tokio::test]
    async fn tolerated_faults_still_reach_quorum() {
        let ledger = pool(LedgerSimConfig {
            faulty_nodes: 1,
            ..Default::default()
        });
        let wallet = KeyWallet::new(KeyPair::from_alias("Faber"));
        let key = ledger.submit(schema_request(&wallet, "degree")).await.unwrap();

        let (reply, _) = ledger.reply_if_consensus(&key).await;
        assert_eq!(reply.unwrap().seq_no, Some(1));
    }

    #[tokio::test]
    async fn too_many_faults_block_ordering() {
        let ledger = pool(LedgerSimConfig {
            faulty_nodes: 2,
            ..Default::default()
        });
        let wallet = KeyWallet::new(KeyPair::from_alias("Faber"));
        let key = ledger.submit(schema_request(&wallet, "degree")).await.unwrap();

        assert_eq!(ledger.reply_if_consensus(&key).await, (None, None));
        assert!(ledger.transactions().await.is_empty());
        assert_eq!(ledger.snapshot().await.pending.len(), 1);
    }

    #[tokio::test]
    async fn legacy_quotes_rewrite_reply_payloads() {
        let ledger = pool(LedgerSimConfig {
            legacy_quotes: true,
            ..Default::default()
        });
        let wallet = KeyWallet::new(KeyPair::from_alias("Faber"));
        let key = ledger.submit(schema_request(&wallet, "degree")).await.unwrap();

        let data = ledger.reply_if_consensus(&key).await.0.unwrap().data.unwrap();
        assert!(data.contains('\''));
        assert!(!data.contains('"'));
    }

    #[tokio::test]
    async fn snapshot_restores_log_and_pending_requests() {
        let ledger = pool(LedgerSimConfig {
            faulty_nodes: 2,
            ..Default::default()
        });
        let wallet = KeyWallet::new(KeyPair::from_alias("Faber"));
        let key = ledger.submit(schema_request(&wallet, "degree")).await.unwrap();

        let json = serde_json::to_string(&ledger.snapshot().await).unwrap();
        let snapshot: LedgerSnapshot = serde_json::from_str(&json).unwrap();
        let restored = SimulatedLedger::from_snapshot(snapshot, LedgerSimConfig::default());

        let (reply, err) = restored.reply_if_consensus(&key).await;
        assert_eq!(err, None);
        assert_eq!(reply.unwrap().seq_no, Some(1));
        let txns = restored.transactions().await;
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].seq_no, 1);
        assert_eq!(txns[0].identifier, wallet.default_id());
    }

    #[tokio::test]
    async fn restored_pool_forgets_earlier_outcomes() {
        let ledger = pool(LedgerSimConfig::default());
        let wallet = KeyWallet::new(KeyPair::from_alias("Faber"));
        let key = ledger.submit(schema_request(&wallet, "degree")).await.unwrap();
        assert!(ledger.reply_if_consensus(&key).await.0.is_some());

        let restored =
            SimulatedLedger::from_snapshot(ledger.snapshot().await, LedgerSimConfig::default());
        assert_eq!(restored.transactions().await.len(), 1);
        assert_eq!(restored.reply_if_consensus(&key).await, (None, None));
    }

    #[test]
    fn sim_config_reads_millis() {
        let config: LedgerSimConfig =
            serde_json::from_str(r#"{"confirmation_delay_ms": 1500, "faulty_nodes": 1}"#).unwrap();
        assert_eq!(config.confirmation_delay, Duration::from_millis(1500));
        assert_eq!(config.faulty_nodes, 1);
        assert!(!config.legacy_quotes);
    }
}
