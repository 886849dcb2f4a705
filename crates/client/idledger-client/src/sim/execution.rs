//! The deterministic transaction logic every honest node runs.

use idledger_identity::Did;
use idledger_types::constants::{
    ATTR_NAMES, DATA, GET_ISSUER_KEY, GET_SCHEMA, ISSUER_KEY, NAME, ORIGIN, PRIMARY, REF,
    REVOCATION, SCHEMA, SEQ_NO, TARGET_NYM, TYPE, VERSION,
};
use idledger_types::{ConsensusReply, SignedRequest};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// A write transaction ordered into the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommittedTxn {
    #[serde(rename = "seqNo")]
    pub seq_no: u64,
    #[serde(rename = "type")]
    pub txn_type: String,
    pub identifier: Did,
    #[serde(rename = "reqId")]
    pub req_id: u64,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<u64>,
    pub data: Value,
}

/// Ordered write transactions.
#[derive(Debug, Clone, Default)]
pub(crate) struct LedgerLog {
    txns: Vec<CommittedTxn>,
}

impl LedgerLog {
    pub(crate) fn from_txns(txns: Vec<CommittedTxn>) -> Self {
        Self { txns }
    }

    pub(crate) fn txns(&self) -> &[CommittedTxn] {
        &self.txns
    }

    fn next_seq_no(&self) -> u64 {
        self.txns.last().map_or(1, |txn| txn.seq_no + 1)
    }

    /// Execute a request against the log. Writes are appended; reads only
    /// look. `Err` is the rejection reason every honest node reports.
    pub(crate) fn execute(&mut self, request: &SignedRequest) -> Result<ConsensusReply, String> {
        verify_signature(request)?;

        let op = request.operation();
        match op.txn_type() {
            Some(SCHEMA) => self.write_schema(request),
            Some(ISSUER_KEY) => self.write_issuer_key(request),
            Some(GET_SCHEMA) => self.read_schema(request),
            Some(GET_ISSUER_KEY) => self.read_issuer_key(request),
            Some(other) => Err(format!("unsupported transaction type {}", other)),
            None => Err("operation has no transaction type".to_string()),
        }
    }

    fn write_schema(&mut self, request: &SignedRequest) -> Result<ConsensusReply, String> {
        let data = operation_data(request)?;
        let name = non_empty_str(&data, NAME)?;
        let version = non_empty_str(&data, VERSION)?;
        non_empty_str(&data, ATTR_NAMES)?;
        non_empty_str(&data, TYPE)?;

        let issuer = &request.request.identifier;
        if self.find_schema(issuer, name, version).is_some() {
            return Err(format!(
                "schema {} {} already exists for {}",
                name, version, issuer
            ));
        }
        Ok(self.append(request, None, data))
    }

    fn write_issuer_key(&mut self, request: &SignedRequest) -> Result<ConsensusReply, String> {
        let schema_ref = reference(request)?;
        if !self
            .txns
            .iter()
            .any(|txn| txn.seq_no == schema_ref && txn.txn_type == SCHEMA)
        {
            return Err(format!("unknown schema reference {}", schema_ref));
        }

        let issuer = &request.request.identifier;
        if self.find_issuer_key(issuer, schema_ref).is_some() {
            return Err(format!(
                "issuer keys for schema {} already published by {}",
                schema_ref, issuer
            ));
        }

        let data = operation_data(request)?;
        if data.get(PRIMARY).map_or(true, Value::is_null) {
            return Err("issuer key transaction has no primary key".to_string());
        }
        Ok(self.append(request, Some(schema_ref), data))
    }

    fn read_schema(&self, request: &SignedRequest) -> Result<ConsensusReply, String> {
        let op = request.operation();
        let dest: Did = op
            .get_str(TARGET_NYM)
            .ok_or("schema lookup has no target identity")?
            .parse()
            .map_err(|e| format!("invalid target identity: {}", e))?;
        let data = operation_data(request)?;
        let name = non_empty_str(&data, NAME)?;
        let version = non_empty_str(&data, VERSION)?;

        let result = match self.find_schema(&dest, name, version) {
            Some(txn) => {
                let mut found = txn.data.as_object().cloned().unwrap_or_default();
                found.insert(ORIGIN.to_string(), json!(txn.identifier));
                found.insert(SEQ_NO.to_string(), json!(txn.seq_no));
                Value::Object(found)
            }
            None => Value::Object(Map::new()),
        };
        Ok(read_reply(request, &result))
    }

    fn read_issuer_key(&self, request: &SignedRequest) -> Result<ConsensusReply, String> {
        let op = request.operation();
        let schema_ref = reference(request)?;
        let origin: Did = op
            .get_str(ORIGIN)
            .ok_or("issuer key lookup has no origin")?
            .parse()
            .map_err(|e| format!("invalid origin: {}", e))?;

        let result = match self.find_issuer_key(&origin, schema_ref) {
            Some(txn) => json!({
                DATA: {
                    PRIMARY: txn.data.get(PRIMARY).cloned().unwrap_or(Value::Null),
                    REVOCATION: txn.data.get(REVOCATION).cloned().unwrap_or(Value::Null),
                },
                ORIGIN: txn.identifier,
                REF: schema_ref,
                SEQ_NO: txn.seq_no,
            }),
            None => Value::Object(Map::new()),
        };
        Ok(read_reply(request, &result))
    }

    fn find_schema(&self, issuer: &Did, name: &str, version: &str) -> Option<&CommittedTxn> {
        self.txns.iter().find(|txn| {
            txn.txn_type == SCHEMA
                && &txn.identifier == issuer
                && txn.data.get(NAME).and_then(Value::as_str) == Some(name)
                && txn.data.get(VERSION).and_then(Value::as_str) == Some(version)
        })
    }

    fn find_issuer_key(&self, issuer: &Did, schema_ref: u64) -> Option<&CommittedTxn> {
        self.txns.iter().find(|txn| {
            txn.txn_type == ISSUER_KEY
                && &txn.identifier == issuer
                && txn.reference == Some(schema_ref)
        })
    }

    fn append(
        &mut self,
        request: &SignedRequest,
        reference: Option<u64>,
        data: Value,
    ) -> ConsensusReply {
        let txn = CommittedTxn {
            seq_no: self.next_seq_no(),
            txn_type: request.operation().txn_type().unwrap_or_default().to_string(),
            identifier: request.request.identifier.clone(),
            req_id: request.request.req_id,
            reference,
            data,
        };
        let reply = ConsensusReply {
            identifier: Some(txn.identifier.clone()),
            req_id: Some(txn.req_id),
            txn_type: Some(txn.txn_type.clone()),
            seq_no: Some(txn.seq_no),
            data: request.operation().get_str(DATA).map(str::to_string),
        };
        self.txns.push(txn);
        reply
    }
}

fn read_reply(request: &SignedRequest, result: &Value) -> ConsensusReply {
    ConsensusReply {
        identifier: Some(request.request.identifier.clone()),
        req_id: Some(request.request.req_id),
        txn_type: request.operation().txn_type().map(str::to_string),
        seq_no: None,
        data: Some(result.to_string()),
    }
}

fn verify_signature(request: &SignedRequest) -> Result<(), String> {
    let bytes = hex::decode(&request.signature).map_err(|_| "invalid signature".to_string())?;
    let signature = ed25519_dalek::Signature::from_slice(&bytes)
        .map_err(|_| "invalid signature".to_string())?;
    let message = request
        .request
        .signing_bytes()
        .map_err(|e| format!("request cannot be serialized: {}", e))?;
    if request.request.identifier.verify(&message, &signature) {
        Ok(())
    } else {
        Err("invalid signature".to_string())
    }
}

/// The `data` field of an operation, which the wire format carries as JSON
/// text.
fn operation_data(request: &SignedRequest) -> Result<Value, String> {
    let raw = request
        .operation()
        .get_str(DATA)
        .ok_or("operation data must be a JSON string")?;
    let data: Value =
        serde_json::from_str(raw).map_err(|e| format!("operation data is not JSON: {}", e))?;
    if data.is_object() {
        Ok(data)
    } else {
        Err("operation data must be a JSON object".to_string())
    }
}

fn reference(request: &SignedRequest) -> Result<u64, String> {
    request
        .operation()
        .get(REF)
        .and_then(Value::as_u64)
        .ok_or_else(|| "operation has no schema reference".to_string())
}

fn non_empty_str<'a>(data: &'a Value, field: &str) -> Result<&'a str, String> {
    match data.get(field).and_then(Value::as_str) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(format!("field {} is required", field)),
    }
}
