use idledger_types::{ConsensusReply, LedgerError, RequestKey, SignedRequest};

/// Connection to a pool of ledger nodes.
///
/// Implementations must tolerate concurrent `submit` and
/// `reply_if_consensus` calls from many tasks.
#[async_trait::async_trait]
pub trait LedgerClient: Send + Sync {
    /// Send a signed request to the pool. Returns the key its outcome can be
    /// looked up by; it does not wait for the outcome.
    async fn submit(&self, request: SignedRequest) -> Result<RequestKey, LedgerError>;

    /// Look up the outcome of a submitted request.
    ///
    /// - `(Some(reply), None)`: a quorum of nodes agreed on `reply`
    /// - `(None, None)`: no quorum yet
    /// - `(_, Some(reason))`: a quorum of nodes rejected the request
    async fn reply_if_consensus(
        &self,
        key: &RequestKey,
    ) -> (Option<ConsensusReply>, Option<String>);
}
