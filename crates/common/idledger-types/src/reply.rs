use idledger_identity::Did;
use serde::{Deserialize, Serialize};

/// A reply envelope that a quorum of ledger nodes agreed on.
///
/// `data` holds the JSON text of the payload (older nodes quote it with
/// single quotes). `seq_no` is set for ordered writes; reads usually carry
/// the sequence number inside `data` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<Did>,
    #[serde(rename = "reqId", default, skip_serializing_if = "Option::is_none")]
    pub req_id: Option<u64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub txn_type: Option<String>,
    #[serde(rename = "seqNo", default)]
    pub seq_no: Option<u64>,
    #[serde(default)]
    pub data: Option<String>,
}

impl ConsensusReply {
    /// A bare reply with only a payload and sequence number.
    pub fn new(data: impl Into<String>, seq_no: Option<u64>) -> Self {
        Self {
            identifier: None,
            req_id: None,
            txn_type: None,
            seq_no,
            data: Some(data.into()),
        }
    }
}
