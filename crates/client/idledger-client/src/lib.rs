//! Client for quorum-replicated identity ledgers.
//!
//! [`LedgerGateway`] turns schema and issuer key reads and writes into signed
//! ledger requests, hands them to a [`LedgerClient`] and waits with a
//! [`ConsensusWaiter`] until the pool has agreed on the outcome.
//! [`SimulatedLedger`] is an in-process pool for tests and the CLI.

pub mod codec;
pub mod config;
pub mod consensus;
pub mod gateway;
pub mod genesis;
pub mod sim;
pub mod transport;
pub mod wallet;

pub use codec::ReplyData;
pub use config::GatewayConfig;
pub use consensus::{ConsensusWaiter, PollOutcome, WaitConfig};
pub use gateway::LedgerGateway;
pub use genesis::{GenesisNode, PoolGenesis};
pub use sim::{CommittedTxn, LedgerSimConfig, LedgerSnapshot, SimulatedLedger};
pub use transport::LedgerClient;
pub use wallet::{KeyWallet, Wallet};
