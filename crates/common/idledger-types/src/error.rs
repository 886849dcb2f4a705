use crate::request::RequestKey;
use idledger_identity::Did;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by every ledger gateway operation.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger reached consensus on rejecting the request. Terminal.
    #[error("ledger rejected request {key}: {reason}")]
    Rejected { key: RequestKey, reason: String },

    /// No quorum reply arrived within the wait budget. The request may still
    /// be ordered later.
    #[error("consensus not reached for request {key} within {waited:?}")]
    Timeout { key: RequestKey, waited: Duration },

    #[error("failed to decode ledger reply: {0}")]
    Decode(#[from] DecodeError),

    /// The ledger schema has no transaction for this capability.
    #[error("operation not supported by the ledger: {0}")]
    Unsupported(&'static str),

    #[error("failed to sign request: {0}")]
    Signing(#[from] SigningError),

    #[error("ledger transport error: {0}")]
    Transport(String),
}

impl LedgerError {
    /// Whether the ledger might still confirm the request later.
    pub fn is_timeout(&self) -> bool {
        matches!(self, LedgerError::Timeout { .. })
    }
}

/// Errors decoding a reply payload. They indicate a protocol or version
/// mismatch with the ledger and are never retried.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("reply payload is not JSON even after quote normalization: {source}")]
    Json {
        payload: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("reply payload is missing field `{0}`")]
    MissingField(&'static str),

    #[error("reply field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("wallet holds no key for identity {0}")]
    UnknownIdentity(Did),

    #[error("request could not be serialized for signing: {0}")]
    Serialization(#[from] serde_json::Error),
}
