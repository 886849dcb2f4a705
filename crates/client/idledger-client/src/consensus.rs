//! Bounded polling for quorum-confirmed replies.
//!
//! A submitted request is in one of three states from the client's point of
//! view: confirmed by a quorum, rejected by a quorum, or neither yet. Only
//! the last one is worth waiting on; the waiter polls until one of the first
//! two shows up or the time budget runs out.

use idledger_types::{ConsensusReply, DecodeError, LedgerError, RequestKey};
use std::time::Duration;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, trace};

use crate::transport::LedgerClient;

/// Outcome of a single consensus poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Confirmed(ConsensusReply),
    Pending,
    Rejected(String),
}

impl PollOutcome {
    /// Classify the `(reply, error)` pair returned by a ledger client.
    /// A rejection wins over a reply.
    pub fn from_reply_pair(pair: (Option<ConsensusReply>, Option<String>)) -> Self {
        match pair {
            (_, Some(reason)) => PollOutcome::Rejected(reason),
            (Some(reply), None) => PollOutcome::Confirmed(reply),
            (None, None) => PollOutcome::Pending,
        }
    }
}

/// Time budget of a single wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    pub timeout: Duration,
    pub retry_interval: Duration,
}

impl WaitConfig {
    pub fn new(timeout: Duration, retry_interval: Duration) -> Self {
        Self {
            timeout,
            retry_interval,
        }
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(20), Duration::from_secs(2))
    }
}

/// Polls a [`LedgerClient`] until a request is confirmed, rejected, or the
/// budget is spent.
///
/// The waiter holds no per-request state; every call to [`await_reply`]
/// keeps its own clock, so one waiter can serve any number of concurrent
/// waits.
///
/// [`await_reply`]: ConsensusWaiter::await_reply
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsensusWaiter {
    config: WaitConfig,
}

impl ConsensusWaiter {
    pub fn new(config: WaitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> WaitConfig {
        self.config
    }

    /// Wait for the quorum reply to `key`.
    ///
    /// Polls immediately, then every `retry_interval`. The last sleep is
    /// shortened so that one final poll lands exactly on the deadline; a
    /// reply that arrives before `timeout` is therefore never missed. A poll
    /// that has not answered by the deadline is abandoned.
    pub async fn await_reply(
        &self,
        client: &dyn LedgerClient,
        key: &RequestKey,
    ) -> Result<ConsensusReply, LedgerError> {
        let started = Instant::now();
        let deadline = started + self.config.timeout;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            trace!("Consensus poll #{} for request {}", attempt, key);

            let Ok(pair) = timeout_at(deadline, client.reply_if_consensus(key)).await else {
                let waited = started.elapsed();
                debug!(
                    "Consensus poll #{} for request {} did not answer within {:?}",
                    attempt, key, waited
                );
                return Err(LedgerError::Timeout {
                    key: key.clone(),
                    waited,
                });
            };

            match PollOutcome::from_reply_pair(pair) {
                PollOutcome::Confirmed(reply) => {
                    debug!(
                        "Request {} confirmed after {} poll(s), seqNo {:?}",
                        key, attempt, reply.seq_no
                    );
                    return Ok(reply);
                }
                PollOutcome::Rejected(reason) => {
                    debug!("Request {} rejected by the ledger: {}", key, reason);
                    return Err(LedgerError::Rejected {
                        key: key.clone(),
                        reason,
                    });
                }
                PollOutcome::Pending => {
                    let elapsed = started.elapsed();
                    if elapsed >= self.config.timeout {
                        debug!(
                            "Request {} still pending after {:?} and {} poll(s), giving up",
                            key, elapsed, attempt
                        );
                        return Err(LedgerError::Timeout {
                            key: key.clone(),
                            waited: elapsed,
                        });
                    }
                    let remaining = self.config.timeout - elapsed;
                    sleep(self.config.retry_interval.min(remaining)).await;
                }
            }
        }
    }

    /// Wait for the quorum reply to `key` and run `decode` on it once.
    ///
    /// Decode failures are not retried: a confirmed reply never changes.
    pub async fn await_consensus<T, F>(
        &self,
        client: &dyn LedgerClient,
        key: &RequestKey,
        decode: F,
    ) -> Result<T, LedgerError>
    where
        F: FnOnce(ConsensusReply) -> Result<T, DecodeError>,
    {
        let reply = self.await_reply(client, key).await?;
        Ok(decode(reply)?)
    }
}
